//! Port abstraction for account persistence adapters.

use async_trait::async_trait;
use serde_json::json;

use crate::domain::account::{Account, AccountName, Email, PasswordDigest};
use crate::domain::token::{TokenDigest, TokenScope};
use crate::domain::Error;

/// Contents of an account to be created; the storage layer assigns the
/// identifier, timestamp, and initial version.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: AccountName,
    pub email: Email,
    pub password: PasswordDigest,
}

/// Persistence errors raised by account repository adapters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountRepositoryError {
    /// Repository connection could not be established.
    #[error("account repository connection failed: {message}")]
    Connection { message: String },
    /// Query or mutation failed during execution.
    #[error("account repository query failed: {message}")]
    Query { message: String },
    /// The email address is already registered.
    #[error("an account with this email address already exists")]
    DuplicateEmail,
    /// A conditioned update matched no row: a concurrent writer won the
    /// race, or the row is gone.
    #[error("account was modified concurrently")]
    Conflict,
}

impl AccountRepositoryError {
    /// Create a connection error with the given message.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a query error with the given message.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }
}

impl From<AccountRepositoryError> for Error {
    fn from(err: AccountRepositoryError) -> Self {
        match err {
            AccountRepositoryError::DuplicateEmail => {
                Self::validation_failed("a user with this email address already exists")
                    .with_details(json!({ "field": "email" }))
            }
            AccountRepositoryError::Conflict => Self::edit_conflict(),
            AccountRepositoryError::Connection { message }
            | AccountRepositoryError::Query { message } => Self::internal(message),
        }
    }
}

/// Account persistence operations consumed by the core.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Insert a new, unactivated account and return it with its assigned
    /// identifier and initial version.
    async fn insert(&self, account: NewAccount) -> Result<Account, AccountRepositoryError>;

    /// Fetch an account by email address.
    async fn find_by_email(&self, email: &Email)
        -> Result<Option<Account>, AccountRepositoryError>;

    /// Resolve a token digest to its owning account.
    ///
    /// Implementations must match on digest AND scope and must exclude
    /// tokens whose expiry has passed; an expired or wrong-scope token
    /// behaves exactly like an unknown one.
    async fn find_by_token(
        &self,
        digest: &TokenDigest,
        scope: TokenScope,
    ) -> Result<Option<Account>, AccountRepositoryError>;

    /// Persist changed fields of `account`, conditioned on the stored
    /// version still equalling `account.version()`. The update and the
    /// version increment are one atomic statement. Returns the new
    /// version; fails with [`AccountRepositoryError::Conflict`] when no
    /// row matched.
    async fn update(&self, account: &Account) -> Result<u32, AccountRepositoryError>;
}
