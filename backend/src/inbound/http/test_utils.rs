//! Helpers shared by handler tests.

use std::sync::Arc;

use actix_web::{web, App};
use chrono::TimeDelta;

use crate::domain::account::{AccountName, Email, PasswordDigest};
use crate::domain::ports::{
    AccountRepository, NewAccount, PermissionRepository, TokenRepository,
};
use crate::domain::token::{self, TokenScope};
use crate::domain::Permission;
use crate::tasks::BackgroundTasks;

use super::state::{FixturePorts, HttpState};

/// Fixture-backed state plus handles for seeding and assertions.
pub(crate) fn test_state() -> (web::Data<HttpState>, FixturePorts) {
    let fixtures = FixturePorts::new();
    let state = HttpState::new(
        fixtures.ports(),
        Arc::new(BackgroundTasks::default()),
        "test",
    );
    (web::Data::new(state), fixtures)
}

/// An app exposing the full `/v1` surface over the given state.
pub(crate) fn test_app(
    state: web::Data<HttpState>,
) -> App<
    impl actix_web::dev::ServiceFactory<
        actix_web::dev::ServiceRequest,
        Config = (),
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new().app_data(state).configure(super::configure)
}

/// Shape of an account to seed directly into the fixtures.
pub(crate) struct TestAccount {
    pub email: &'static str,
    pub permissions: &'static [Permission],
}

impl TestAccount {
    /// An account holding both catalog permissions.
    pub(crate) fn writer() -> Self {
        Self {
            email: "writer@example.com",
            permissions: &[Permission::CatalogRead, Permission::CatalogWrite],
        }
    }

    /// An account holding only the read permission.
    pub(crate) fn reader() -> Self {
        Self {
            email: "reader@example.com",
            permissions: &[Permission::CatalogRead],
        }
    }
}

/// Seed an activated account with the given grants and return a live
/// authentication token for it.
pub(crate) async fn activated_account_token(
    fixtures: &FixturePorts,
    profile: TestAccount,
) -> String {
    let accounts = fixtures.store.accounts();
    let mut account = accounts
        .insert(NewAccount {
            name: AccountName::new("Test Account").expect("valid name"),
            email: Email::new(profile.email).expect("valid email"),
            password: PasswordDigest::from_phc_string("$argon2id$stub"),
        })
        .await
        .expect("account inserts");

    account.mark_activated();
    accounts.update(&account).await.expect("account updates");

    fixtures
        .permissions
        .grant(account.id(), profile.permissions)
        .await
        .expect("permissions grant");

    let issued = token::issue(account.id(), TimeDelta::hours(1), TokenScope::Authentication);
    fixtures
        .store
        .tokens()
        .insert(issued.record())
        .await
        .expect("token inserts");
    issued.plaintext().to_owned()
}
