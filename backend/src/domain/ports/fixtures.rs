//! In-memory fixture adapters for the domain ports.
//!
//! These honour the same contracts as the PostgreSQL adapters, including
//! expiry/scope filtering on token lookup and compare-and-swap semantics
//! on conditioned updates (each update runs under the store lock, so the
//! version check and the write are atomic). They back the integration
//! tests and database-less runs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use crate::domain::account::{Account, AccountId, Email};
use crate::domain::catalog::{
    CatalogItem, Filters, ItemId, Metadata, NewCatalogItem, SortOrder,
};
use crate::domain::permission::{Permission, PermissionSet};
use crate::domain::token::{TokenDigest, TokenRecord, TokenScope};

use super::account_repository::{AccountRepository, AccountRepositoryError, NewAccount};
use super::catalog_repository::{CatalogRepository, CatalogRepositoryError};
use super::mailer::{MailTemplate, Mailer, MailerError};
use super::permission_repository::{PermissionRepository, PermissionRepositoryError};
use super::token_repository::{TokenRepository, TokenRepositoryError};

#[derive(Default)]
struct AuthState {
    accounts: HashMap<i64, Account>,
    tokens: Vec<TokenRecord>,
    next_id: i64,
}

/// Shared in-memory store behind the account and token fixtures.
///
/// Both repositories view the same state so token lookups can join onto
/// accounts, mirroring the SQL adapters.
#[derive(Clone, Default)]
pub struct FixtureAuthStore {
    state: Arc<Mutex<AuthState>>,
}

impl FixtureAuthStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Account repository view.
    pub fn accounts(&self) -> FixtureAccountRepository {
        FixtureAccountRepository {
            state: Arc::clone(&self.state),
        }
    }

    /// Token repository view.
    pub fn tokens(&self) -> FixtureTokenRepository {
        FixtureTokenRepository {
            state: Arc::clone(&self.state),
        }
    }
}

fn lock_auth(state: &Mutex<AuthState>) -> MutexGuard<'_, AuthState> {
    state.lock().expect("fixture auth store lock poisoned")
}

/// In-memory [`AccountRepository`].
#[derive(Clone)]
pub struct FixtureAccountRepository {
    state: Arc<Mutex<AuthState>>,
}

#[async_trait]
impl AccountRepository for FixtureAccountRepository {
    async fn insert(&self, account: NewAccount) -> Result<Account, AccountRepositoryError> {
        let mut state = lock_auth(&self.state);
        if state
            .accounts
            .values()
            .any(|existing| existing.email() == &account.email)
        {
            return Err(AccountRepositoryError::DuplicateEmail);
        }
        state.next_id += 1;
        let created = Account::from_parts(
            AccountId::new(state.next_id),
            account.name,
            account.email,
            account.password,
            false,
            Utc::now(),
            1,
        );
        state.accounts.insert(created.id().as_i64(), created.clone());
        Ok(created)
    }

    async fn find_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<Account>, AccountRepositoryError> {
        let state = lock_auth(&self.state);
        Ok(state
            .accounts
            .values()
            .find(|account| account.email() == email)
            .cloned())
    }

    async fn find_by_token(
        &self,
        digest: &TokenDigest,
        scope: TokenScope,
    ) -> Result<Option<Account>, AccountRepositoryError> {
        let state = lock_auth(&self.state);
        let now = Utc::now();
        let owner = state.tokens.iter().find(|record| {
            record.digest().as_bytes() == digest.as_bytes()
                && record.scope() == scope
                && record.expiry() > now
        });
        Ok(owner.and_then(|record| state.accounts.get(&record.account_id().as_i64()).cloned()))
    }

    async fn update(&self, account: &Account) -> Result<u32, AccountRepositoryError> {
        let mut state = lock_auth(&self.state);
        // Version check and write happen under one lock: the compare and
        // the swap are atomic, as the SQL adapter's single UPDATE is.
        let stored = state
            .accounts
            .get_mut(&account.id().as_i64())
            .ok_or(AccountRepositoryError::Conflict)?;
        if stored.version() != account.version() {
            return Err(AccountRepositoryError::Conflict);
        }
        let mut updated = account.clone();
        updated.advance_version();
        let new_version = updated.version();
        *stored = updated;
        Ok(new_version)
    }
}

/// In-memory [`TokenRepository`].
#[derive(Clone)]
pub struct FixtureTokenRepository {
    state: Arc<Mutex<AuthState>>,
}

#[async_trait]
impl TokenRepository for FixtureTokenRepository {
    async fn insert(&self, record: &TokenRecord) -> Result<(), TokenRepositoryError> {
        lock_auth(&self.state).tokens.push(record.clone());
        Ok(())
    }

    async fn delete_all_for_account(
        &self,
        account_id: AccountId,
        scope: TokenScope,
    ) -> Result<(), TokenRepositoryError> {
        lock_auth(&self.state)
            .tokens
            .retain(|record| record.account_id() != account_id || record.scope() != scope);
        Ok(())
    }
}

/// In-memory [`PermissionRepository`].
#[derive(Clone, Default)]
pub struct FixturePermissionRepository {
    grants: Arc<Mutex<HashMap<i64, Vec<Permission>>>>,
}

impl FixturePermissionRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PermissionRepository for FixturePermissionRepository {
    async fn for_account(
        &self,
        account_id: AccountId,
    ) -> Result<PermissionSet, PermissionRepositoryError> {
        let grants = self.grants.lock().expect("fixture grants lock poisoned");
        Ok(grants
            .get(&account_id.as_i64())
            .map(|permissions| permissions.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn grant(
        &self,
        account_id: AccountId,
        permissions: &[Permission],
    ) -> Result<(), PermissionRepositoryError> {
        let mut grants = self.grants.lock().expect("fixture grants lock poisoned");
        let held = grants.entry(account_id.as_i64()).or_default();
        for permission in permissions {
            if !held.contains(permission) {
                held.push(*permission);
            }
        }
        Ok(())
    }
}

#[derive(Default)]
struct CatalogState {
    items: HashMap<i64, CatalogItem>,
    next_id: i64,
}

/// In-memory [`CatalogRepository`].
#[derive(Clone, Default)]
pub struct FixtureCatalogRepository {
    state: Arc<Mutex<CatalogState>>,
}

impl FixtureCatalogRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches_filters(item: &CatalogItem, filters: &Filters) -> bool {
    if let Some(title) = filters.title() {
        let haystack = item.title().as_ref().to_lowercase();
        if !haystack.contains(&title.to_lowercase()) {
            return false;
        }
    }
    filters
        .tags()
        .iter()
        .all(|tag| item.tags().as_slice().contains(tag))
}

fn compare(a: &CatalogItem, b: &CatalogItem, sort: SortOrder) -> std::cmp::Ordering {
    let ordering = match sort {
        SortOrder::Id | SortOrder::IdDesc => a.id().cmp(&b.id()),
        SortOrder::Title | SortOrder::TitleDesc => a.title().as_ref().cmp(b.title().as_ref()),
        SortOrder::Year | SortOrder::YearDesc => a.year().cmp(&b.year()),
        SortOrder::Duration | SortOrder::DurationDesc => a.duration().cmp(&b.duration()),
    };
    let ordering = match sort {
        SortOrder::IdDesc | SortOrder::TitleDesc | SortOrder::YearDesc | SortOrder::DurationDesc => {
            ordering.reverse()
        }
        _ => ordering,
    };
    // Tie-break on id so pagination is stable across requests.
    ordering.then(a.id().cmp(&b.id()))
}

#[async_trait]
impl CatalogRepository for FixtureCatalogRepository {
    async fn insert(&self, item: NewCatalogItem) -> Result<CatalogItem, CatalogRepositoryError> {
        let mut state = self.state.lock().expect("fixture catalog lock poisoned");
        state.next_id += 1;
        let created = CatalogItem::from_parts(
            ItemId::new(state.next_id),
            item.title,
            item.year,
            item.duration,
            item.tags,
            Utc::now(),
            1,
        );
        state.items.insert(created.id().as_i64(), created.clone());
        Ok(created)
    }

    async fn find(&self, id: ItemId) -> Result<Option<CatalogItem>, CatalogRepositoryError> {
        let state = self.state.lock().expect("fixture catalog lock poisoned");
        Ok(state.items.get(&id.as_i64()).cloned())
    }

    async fn list(
        &self,
        filters: &Filters,
    ) -> Result<(Vec<CatalogItem>, Metadata), CatalogRepositoryError> {
        let state = self.state.lock().expect("fixture catalog lock poisoned");
        let mut matching: Vec<CatalogItem> = state
            .items
            .values()
            .filter(|item| matches_filters(item, filters))
            .cloned()
            .collect();
        matching.sort_by(|a, b| compare(a, b, filters.sort()));

        let total = matching.len() as u64;
        let metadata = Metadata::compute(total, filters.page(), filters.page_size());
        let page: Vec<CatalogItem> = matching
            .into_iter()
            .skip(usize::try_from(filters.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(filters.limit()).unwrap_or(0))
            .collect();
        Ok((page, metadata))
    }

    async fn update(&self, item: &CatalogItem) -> Result<u32, CatalogRepositoryError> {
        let mut state = self.state.lock().expect("fixture catalog lock poisoned");
        // Version check and write happen under one lock: the compare and
        // the swap are atomic, as the SQL adapter's single UPDATE is.
        let stored = state
            .items
            .get_mut(&item.id().as_i64())
            .ok_or(CatalogRepositoryError::Conflict)?;
        if stored.version() != item.version() {
            return Err(CatalogRepositoryError::Conflict);
        }
        let mut updated = item.clone();
        updated.advance_version();
        let new_version = updated.version();
        *stored = updated;
        Ok(new_version)
    }

    async fn delete(&self, id: ItemId) -> Result<(), CatalogRepositoryError> {
        let mut state = self.state.lock().expect("fixture catalog lock poisoned");
        state
            .items
            .remove(&id.as_i64())
            .map(|_| ())
            .ok_or(CatalogRepositoryError::NotFound)
    }
}

/// One message captured by [`FixtureMailer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub recipient: Email,
    pub template: MailTemplate,
    pub payload: Value,
}

/// Mailer fixture recording every send for assertions.
#[derive(Clone, Default)]
pub struct FixtureMailer {
    sent: Arc<Mutex<Vec<SentMail>>>,
}

impl FixtureMailer {
    /// Create an empty mailer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages sent so far.
    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().expect("fixture mailer lock poisoned").clone()
    }
}

#[async_trait]
impl Mailer for FixtureMailer {
    async fn send(
        &self,
        recipient: &Email,
        template: MailTemplate,
        payload: Value,
    ) -> Result<(), MailerError> {
        self.sent
            .lock()
            .expect("fixture mailer lock poisoned")
            .push(SentMail {
                recipient: recipient.clone(),
                template,
                payload,
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use rstest::rstest;

    use crate::domain::account::{AccountName, Password, PasswordDigest};
    use crate::domain::catalog::{Duration, TagSet, Title, Year};
    use crate::domain::token;

    use super::*;

    fn new_account(email: &str) -> NewAccount {
        NewAccount {
            name: AccountName::new("Ada Lovelace").expect("valid name"),
            email: Email::new(email).expect("valid email"),
            password: PasswordDigest::from_phc_string("$argon2id$stub"),
        }
    }

    fn new_item(title: &str, year: i32, minutes: i32, tags: &[&str]) -> NewCatalogItem {
        NewCatalogItem {
            title: Title::new(title).expect("valid title"),
            year: Year::new(year).expect("valid year"),
            duration: Duration::new(minutes).expect("valid duration"),
            tags: TagSet::new(tags.iter().map(|&t| t.to_owned()).collect()).expect("valid tags"),
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = FixtureAuthStore::new();
        let accounts = store.accounts();
        accounts.insert(new_account("ada@example.com")).await.expect("inserts");

        let err = accounts
            .insert(new_account("ada@example.com"))
            .await
            .expect_err("duplicate must fail");
        assert_eq!(err, AccountRepositoryError::DuplicateEmail);
    }

    #[tokio::test]
    async fn token_lookup_filters_scope_and_expiry() {
        let store = FixtureAuthStore::new();
        let accounts = store.accounts();
        let tokens = store.tokens();
        let account = accounts.insert(new_account("ada@example.com")).await.expect("inserts");

        let live = token::issue(account.id(), TimeDelta::hours(1), TokenScope::Activation);
        tokens.insert(live.record()).await.expect("inserts");

        let expired = TokenRecord::from_parts(
            token::digest("EXPIREDEXPIREDEXPIREDEXPIR"),
            account.id(),
            Utc::now() - TimeDelta::minutes(1),
            TokenScope::Activation,
        );
        tokens.insert(&expired).await.expect("inserts");

        // Right digest, right scope: resolves.
        let found = accounts
            .find_by_token(live.record().digest(), TokenScope::Activation)
            .await
            .expect("lookup succeeds");
        assert_eq!(found.map(|a| a.id()), Some(account.id()));

        // Right digest, wrong scope: does not resolve.
        let wrong_scope = accounts
            .find_by_token(live.record().digest(), TokenScope::Authentication)
            .await
            .expect("lookup succeeds");
        assert!(wrong_scope.is_none());

        // Expired: does not resolve even though the digest is stored.
        let gone = accounts
            .find_by_token(expired.digest(), TokenScope::Activation)
            .await
            .expect("lookup succeeds");
        assert!(gone.is_none());
    }

    #[tokio::test]
    async fn stale_account_update_conflicts() {
        let store = FixtureAuthStore::new();
        let accounts = store.accounts();
        let mut first = accounts.insert(new_account("ada@example.com")).await.expect("inserts");
        let mut second = first.clone();

        first.mark_activated();
        let version = accounts.update(&first).await.expect("first update wins");
        assert_eq!(version, 2);

        second.mark_activated();
        let err = accounts.update(&second).await.expect_err("stale update loses");
        assert_eq!(err, AccountRepositoryError::Conflict);
    }

    #[tokio::test]
    async fn catalog_update_requires_the_observed_version() {
        let repo = FixtureCatalogRepository::new();
        let item = repo
            .insert(new_item("Metropolis", 1927, 153, &["sci-fi"]))
            .await
            .expect("inserts");
        assert_eq!(item.version(), 1);

        let mut fresh = item.clone();
        fresh.set_title(Title::new("Metropolis (restored)").expect("valid"));
        assert_eq!(repo.update(&fresh).await.expect("updates"), 2);

        let mut stale = item;
        stale.set_title(Title::new("Metropolis (stale)").expect("valid"));
        assert_eq!(
            repo.update(&stale).await.expect_err("stale must conflict"),
            CatalogRepositoryError::Conflict
        );
    }

    #[rstest]
    #[case(Some("metro"), &[], 1)]
    #[case(None, &["sci-fi"], 2)]
    #[case(Some("metro"), &["noir"], 0)]
    #[tokio::test]
    async fn listing_applies_title_and_tag_filters(
        #[case] title: Option<&str>,
        #[case] tags: &[&str],
        #[case] expected: usize,
    ) {
        let repo = FixtureCatalogRepository::new();
        repo.insert(new_item("Metropolis", 1927, 153, &["sci-fi"]))
            .await
            .expect("inserts");
        repo.insert(new_item("Stalker", 1979, 162, &["sci-fi", "drama"]))
            .await
            .expect("inserts");

        let filters = Filters::new(
            title.map(str::to_owned),
            tags.iter().map(|&t| t.to_owned()).collect(),
            1,
            20,
            None,
        )
        .expect("valid filters");
        let (items, metadata) = repo.list(&filters).await.expect("lists");
        assert_eq!(items.len(), expected);
        assert_eq!(metadata.total_records, expected as u64);
    }

    #[tokio::test]
    async fn listing_sorts_and_paginates() {
        let repo = FixtureCatalogRepository::new();
        repo.insert(new_item("Alien", 1979, 117, &["horror"]))
            .await
            .expect("inserts");
        repo.insert(new_item("Blade Runner", 1982, 117, &["sci-fi"]))
            .await
            .expect("inserts");
        repo.insert(new_item("Casablanca", 1942, 102, &["romance"]))
            .await
            .expect("inserts");

        let filters =
            Filters::new(None, Vec::new(), 2, 1, Some("-year")).expect("valid filters");
        let (items, metadata) = repo.list(&filters).await.expect("lists");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title().as_ref(), "Alien");
        assert_eq!(metadata.last_page, 3);
    }

    #[tokio::test]
    async fn deleting_a_missing_item_reports_not_found() {
        let repo = FixtureCatalogRepository::new();
        assert_eq!(
            repo.delete(ItemId::new(42)).await.expect_err("must fail"),
            CatalogRepositoryError::NotFound
        );
    }

    #[tokio::test]
    async fn password_digest_round_trips_through_the_store() {
        let store = FixtureAuthStore::new();
        let accounts = store.accounts();
        let password = Password::new("correct-horse-battery").expect("valid");
        let digest = PasswordDigest::generate(&password).expect("hashes");
        let account = accounts
            .insert(NewAccount {
                name: AccountName::new("Ada Lovelace").expect("valid"),
                email: Email::new("ada@example.com").expect("valid"),
                password: digest,
            })
            .await
            .expect("inserts");

        let fetched = accounts
            .find_by_email(account.email())
            .await
            .expect("lookup succeeds")
            .expect("account exists");
        assert!(fetched.password().matches(&password).expect("verifies"));
    }
}
