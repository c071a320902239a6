//! Port abstraction for token persistence adapters.

use async_trait::async_trait;

use crate::domain::account::AccountId;
use crate::domain::token::{TokenRecord, TokenScope};
use crate::domain::Error;

/// Persistence errors raised by token repository adapters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenRepositoryError {
    /// Repository connection could not be established.
    #[error("token repository connection failed: {message}")]
    Connection { message: String },
    /// Query or mutation failed during execution.
    #[error("token repository query failed: {message}")]
    Query { message: String },
}

impl TokenRepositoryError {
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

impl From<TokenRepositoryError> for Error {
    fn from(err: TokenRepositoryError) -> Self {
        match err {
            TokenRepositoryError::Connection { message }
            | TokenRepositoryError::Query { message } => Self::internal(message),
        }
    }
}

/// Token persistence operations consumed by the core.
#[async_trait]
pub trait TokenRepository: Send + Sync {
    /// Persist an issued token record. Only the digest is stored.
    async fn insert(&self, record: &TokenRecord) -> Result<(), TokenRepositoryError>;

    /// Delete every token of `scope` owned by `account_id`, invalidating
    /// superseded credentials in one sweep.
    async fn delete_all_for_account(
        &self,
        account_id: AccountId,
        scope: TokenScope,
    ) -> Result<(), TokenRepositoryError>;
}
