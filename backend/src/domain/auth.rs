//! Identity resolution and the layered authorization guards.
//!
//! `IdentityResolver` turns the optional `Authorization` header into the
//! request's [`Identity`]; `Authorizer` applies the guard chain
//! (authenticated, then activated, then permitted), short-circuiting at
//! the first failure. Both bound their storage calls with a per-call
//! timeout and fail closed on timeout or storage error.

use std::sync::Arc;
use std::time::Duration;

use tracing::error;

use super::account::Account;
use super::identity::Identity;
use super::permission::Permission;
use super::ports::{AccountRepository, PermissionRepository};
use super::token::{self, TokenScope};
use super::Error;

/// Upper bound on a single storage call made during authorization.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(3);

const BEARER_PREFIX: &str = "Bearer ";

/// Resolves a bearer credential to the request identity.
#[derive(Clone)]
pub struct IdentityResolver {
    accounts: Arc<dyn AccountRepository>,
    call_timeout: Duration,
}

impl IdentityResolver {
    /// Create a resolver over the given account lookup collaborator.
    pub fn new(accounts: Arc<dyn AccountRepository>) -> Self {
        Self {
            accounts,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Override the per-call storage timeout.
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Produce exactly one identity for the request.
    ///
    /// A missing header yields [`Identity::Anonymous`], which is not an
    /// error. A wrong scheme or a malformed token fails with
    /// `InvalidCredentialFormat` before any storage round-trip. Unknown,
    /// expired, and wrong-scope tokens all fail with one
    /// indistinguishable `InvalidOrExpiredCredential`; the lookup filters
    /// on the authentication scope, so activation and password-reset
    /// tokens never authenticate. A storage failure or timeout fails
    /// closed as `InternalFailure`, never as anonymous.
    pub async fn resolve(&self, authorization: Option<&str>) -> Result<Identity, Error> {
        let Some(header) = authorization else {
            return Ok(Identity::Anonymous);
        };

        let plaintext = header
            .strip_prefix(BEARER_PREFIX)
            .ok_or_else(Error::invalid_credential_format)?;
        if !token::has_valid_shape(plaintext) {
            return Err(Error::invalid_credential_format());
        }

        let digest = token::digest(plaintext);
        let lookup = self
            .accounts
            .find_by_token(&digest, TokenScope::Authentication);
        match tokio::time::timeout(self.call_timeout, lookup).await {
            Err(_elapsed) => {
                error!(timeout = ?self.call_timeout, "token lookup timed out");
                Err(Error::internal("token lookup timed out"))
            }
            Ok(Err(err)) => {
                error!(error = %err, "token lookup failed");
                Err(Error::internal("token lookup failed"))
            }
            Ok(Ok(None)) => Err(Error::invalid_or_expired_credential()),
            Ok(Ok(Some(account))) => Ok(Identity::Authenticated(account)),
        }
    }
}

/// The composable guard chain applied to protected operations.
#[derive(Clone)]
pub struct Authorizer {
    permissions: Arc<dyn PermissionRepository>,
    call_timeout: Duration,
}

impl Authorizer {
    /// Create an authorizer over the given permission lookup collaborator.
    pub fn new(permissions: Arc<dyn PermissionRepository>) -> Self {
        Self {
            permissions,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Override the per-call storage timeout.
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Guard 1: the identity must be authenticated.
    pub fn require_authenticated<'a>(&self, identity: &'a Identity) -> Result<&'a Account, Error> {
        identity
            .account()
            .ok_or_else(Error::authentication_required)
    }

    /// Guard 2: the account must additionally be activated.
    ///
    /// Anonymous identities never reach the activation check; they already
    /// failed guard 1.
    pub fn require_activated<'a>(&self, identity: &'a Identity) -> Result<&'a Account, Error> {
        let account = self.require_authenticated(identity)?;
        if !account.is_activated() {
            return Err(Error::account_not_activated());
        }
        Ok(account)
    }

    /// Guard 3: the account must additionally hold `permission`.
    ///
    /// The permission set is fetched per request so grants take effect
    /// immediately; the fetch only happens once the cheap guards passed.
    pub async fn require_permission<'a>(
        &self,
        identity: &'a Identity,
        permission: Permission,
    ) -> Result<&'a Account, Error> {
        let account = self.require_activated(identity)?;

        let fetch = self.permissions.for_account(account.id());
        let held = match tokio::time::timeout(self.call_timeout, fetch).await {
            Err(_elapsed) => {
                error!(timeout = ?self.call_timeout, "permission lookup timed out");
                return Err(Error::internal("permission lookup timed out"));
            }
            Ok(Err(err)) => {
                error!(error = %err, "permission lookup failed");
                return Err(Error::internal("permission lookup failed"));
            }
            Ok(Ok(held)) => held,
        };

        if !held.includes(permission) {
            return Err(Error::permission_denied());
        }
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::{TimeDelta, Utc};
    use rstest::rstest;

    use crate::domain::account::{AccountId, AccountName, Email, PasswordDigest};
    use crate::domain::permission::PermissionSet;
    use crate::domain::ports::{
        AccountRepositoryError, FixtureAuthStore, FixturePermissionRepository, NewAccount,
        PermissionRepositoryError, TokenRepository,
    };
    use crate::domain::token::TokenDigest;
    use crate::domain::ErrorCode;

    use super::*;

    fn new_account(email: &str) -> NewAccount {
        NewAccount {
            name: AccountName::new("Ada Lovelace").expect("valid name"),
            email: Email::new(email).expect("valid email"),
            password: PasswordDigest::from_phc_string("$argon2id$stub"),
        }
    }

    async fn registered_account(store: &FixtureAuthStore) -> Account {
        store
            .accounts()
            .insert(new_account("ada@example.com"))
            .await
            .expect("account inserts")
    }

    fn resolver(store: &FixtureAuthStore) -> IdentityResolver {
        IdentityResolver::new(Arc::new(store.accounts()))
    }

    #[tokio::test]
    async fn missing_header_resolves_to_anonymous() {
        let store = FixtureAuthStore::new();
        let identity = resolver(&store).resolve(None).await.expect("resolves");
        assert!(identity.is_anonymous());
    }

    #[rstest]
    #[case("Basic QWxhZGRpbjpvcGVuc2VzYW1l")] // wrong scheme
    #[case("Bearer")] // no token at all
    #[case("Bearer short")] // wrong length
    #[case("Bearer abcdefghijklmnopqrstuvwxyz")] // wrong alphabet
    #[tokio::test]
    async fn malformed_credentials_fail_with_format_error(#[case] header: &str) {
        let store = FixtureAuthStore::new();
        let err = resolver(&store)
            .resolve(Some(header))
            .await
            .expect_err("must fail");
        assert_eq!(err.code(), ErrorCode::InvalidCredentialFormat);
    }

    #[tokio::test]
    async fn authentication_token_resolves_to_its_account() {
        let store = FixtureAuthStore::new();
        let account = registered_account(&store).await;
        let issued = token::issue(account.id(), TimeDelta::hours(24), TokenScope::Authentication);
        store.tokens().insert(issued.record()).await.expect("token inserts");

        let identity = resolver(&store)
            .resolve(Some(&format!("Bearer {}", issued.plaintext())))
            .await
            .expect("resolves");
        assert_eq!(identity.account().map(Account::id), Some(account.id()));
    }

    #[tokio::test]
    async fn unknown_token_is_rejected() {
        let store = FixtureAuthStore::new();
        let err = resolver(&store)
            .resolve(Some("Bearer ABCDEFGHIJKLMNOPQRSTUVWXYZ"))
            .await
            .expect_err("must fail");
        assert_eq!(err.code(), ErrorCode::InvalidOrExpiredCredential);
    }

    #[tokio::test]
    async fn tampered_token_is_rejected() {
        let store = FixtureAuthStore::new();
        let account = registered_account(&store).await;
        let issued = token::issue(account.id(), TimeDelta::hours(24), TokenScope::Authentication);
        store.tokens().insert(issued.record()).await.expect("token inserts");

        // Flip the first character to a different alphabet member.
        let mut tampered: Vec<char> = issued.plaintext().chars().collect();
        tampered[0] = if tampered[0] == 'A' { 'B' } else { 'A' };
        let tampered: String = tampered.into_iter().collect();

        let err = resolver(&store)
            .resolve(Some(&format!("Bearer {tampered}")))
            .await
            .expect_err("must fail");
        assert_eq!(err.code(), ErrorCode::InvalidOrExpiredCredential);
    }

    #[tokio::test]
    async fn activation_scoped_token_never_authenticates() {
        let store = FixtureAuthStore::new();
        let account = registered_account(&store).await;
        // Unexpired, but issued for activation.
        let issued = token::issue(account.id(), TimeDelta::days(3), TokenScope::Activation);
        store.tokens().insert(issued.record()).await.expect("token inserts");

        let err = resolver(&store)
            .resolve(Some(&format!("Bearer {}", issued.plaintext())))
            .await
            .expect_err("must fail");
        assert_eq!(err.code(), ErrorCode::InvalidOrExpiredCredential);
    }

    #[tokio::test]
    async fn expired_token_is_rejected_even_though_the_hash_exists() {
        let store = FixtureAuthStore::new();
        let account = registered_account(&store).await;
        let issued = token::issue(account.id(), TimeDelta::seconds(-1), TokenScope::Authentication);
        store.tokens().insert(issued.record()).await.expect("token inserts");

        let err = resolver(&store)
            .resolve(Some(&format!("Bearer {}", issued.plaintext())))
            .await
            .expect_err("must fail");
        assert_eq!(err.code(), ErrorCode::InvalidOrExpiredCredential);
    }

    struct FailingAccounts;

    #[async_trait]
    impl AccountRepository for FailingAccounts {
        async fn insert(&self, _account: NewAccount) -> Result<Account, AccountRepositoryError> {
            unimplemented!("not exercised")
        }

        async fn find_by_email(
            &self,
            _email: &Email,
        ) -> Result<Option<Account>, AccountRepositoryError> {
            unimplemented!("not exercised")
        }

        async fn find_by_token(
            &self,
            _digest: &TokenDigest,
            _scope: TokenScope,
        ) -> Result<Option<Account>, AccountRepositoryError> {
            Err(AccountRepositoryError::connection("database unavailable"))
        }

        async fn update(&self, _account: &Account) -> Result<u32, AccountRepositoryError> {
            unimplemented!("not exercised")
        }
    }

    struct StalledAccounts;

    #[async_trait]
    impl AccountRepository for StalledAccounts {
        async fn insert(&self, _account: NewAccount) -> Result<Account, AccountRepositoryError> {
            unimplemented!("not exercised")
        }

        async fn find_by_email(
            &self,
            _email: &Email,
        ) -> Result<Option<Account>, AccountRepositoryError> {
            unimplemented!("not exercised")
        }

        async fn find_by_token(
            &self,
            _digest: &TokenDigest,
            _scope: TokenScope,
        ) -> Result<Option<Account>, AccountRepositoryError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(None)
        }

        async fn update(&self, _account: &Account) -> Result<u32, AccountRepositoryError> {
            unimplemented!("not exercised")
        }
    }

    #[tokio::test]
    async fn storage_failure_fails_closed() {
        let resolver = IdentityResolver::new(Arc::new(FailingAccounts));
        let err = resolver
            .resolve(Some("Bearer ABCDEFGHIJKLMNOPQRSTUVWXYZ"))
            .await
            .expect_err("must fail");
        assert_eq!(err.code(), ErrorCode::InternalFailure);
    }

    #[tokio::test]
    async fn stalled_storage_fails_closed_after_the_timeout() {
        let resolver = IdentityResolver::new(Arc::new(StalledAccounts))
            .with_call_timeout(Duration::from_millis(20));
        let err = resolver
            .resolve(Some("Bearer ABCDEFGHIJKLMNOPQRSTUVWXYZ"))
            .await
            .expect_err("must fail");
        assert_eq!(err.code(), ErrorCode::InternalFailure);
    }

    fn account_fixture(activated: bool) -> Account {
        Account::from_parts(
            AccountId::new(7),
            AccountName::new("Ada Lovelace").expect("valid name"),
            Email::new("ada@example.com").expect("valid email"),
            PasswordDigest::from_phc_string("$argon2id$stub"),
            activated,
            Utc::now(),
            1,
        )
    }

    fn authorizer() -> (Authorizer, FixturePermissionRepository) {
        let permissions = FixturePermissionRepository::new();
        (Authorizer::new(Arc::new(permissions.clone())), permissions)
    }

    #[tokio::test]
    async fn anonymous_identity_fails_the_first_guard_never_the_third() {
        let (authorizer, _permissions) = authorizer();
        let err = authorizer
            .require_permission(&Identity::Anonymous, Permission::CatalogWrite)
            .await
            .expect_err("must fail");
        assert_eq!(err.code(), ErrorCode::AuthenticationRequired);
    }

    #[tokio::test]
    async fn inactive_account_fails_the_second_guard_never_the_third() {
        let (authorizer, permissions) = authorizer();
        let identity = Identity::Authenticated(account_fixture(false));
        // Even with the permission granted, activation is checked first.
        permissions
            .grant(AccountId::new(7), &[Permission::CatalogWrite])
            .await
            .expect("grants");

        let err = authorizer
            .require_permission(&identity, Permission::CatalogWrite)
            .await
            .expect_err("must fail");
        assert_eq!(err.code(), ErrorCode::AccountNotActivated);
    }

    #[tokio::test]
    async fn activated_account_without_the_permission_is_denied() {
        let (authorizer, permissions) = authorizer();
        let identity = Identity::Authenticated(account_fixture(true));
        permissions
            .grant(AccountId::new(7), &[Permission::CatalogRead])
            .await
            .expect("grants");

        let err = authorizer
            .require_permission(&identity, Permission::CatalogWrite)
            .await
            .expect_err("must fail");
        assert_eq!(err.code(), ErrorCode::PermissionDenied);
    }

    #[tokio::test]
    async fn activated_account_with_the_permission_passes() {
        let (authorizer, permissions) = authorizer();
        let identity = Identity::Authenticated(account_fixture(true));
        permissions
            .grant(AccountId::new(7), &[Permission::CatalogWrite])
            .await
            .expect("grants");

        let account = authorizer
            .require_permission(&identity, Permission::CatalogWrite)
            .await
            .expect("passes");
        assert_eq!(account.id(), AccountId::new(7));
    }

    struct StalledPermissions;

    #[async_trait]
    impl PermissionRepository for StalledPermissions {
        async fn for_account(
            &self,
            _account_id: AccountId,
        ) -> Result<PermissionSet, PermissionRepositoryError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(PermissionSet::empty())
        }

        async fn grant(
            &self,
            _account_id: AccountId,
            _permissions: &[Permission],
        ) -> Result<(), PermissionRepositoryError> {
            unimplemented!("not exercised")
        }
    }

    #[tokio::test]
    async fn stalled_permission_lookup_fails_closed() {
        let authorizer = Authorizer::new(Arc::new(StalledPermissions))
            .with_call_timeout(Duration::from_millis(20));
        let identity = Identity::Authenticated(account_fixture(true));

        let err = authorizer
            .require_permission(&identity, Permission::CatalogRead)
            .await
            .expect_err("must fail");
        assert_eq!(err.code(), ErrorCode::InternalFailure);
    }
}
