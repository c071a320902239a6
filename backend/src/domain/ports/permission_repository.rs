//! Port abstraction for permission lookup and grants.

use async_trait::async_trait;

use crate::domain::account::AccountId;
use crate::domain::permission::{Permission, PermissionSet};
use crate::domain::Error;

/// Persistence errors raised by permission repository adapters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PermissionRepositoryError {
    /// Repository connection could not be established.
    #[error("permission repository connection failed: {message}")]
    Connection { message: String },
    /// Query or mutation failed during execution.
    #[error("permission repository query failed: {message}")]
    Query { message: String },
}

impl PermissionRepositoryError {
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

impl From<PermissionRepositoryError> for Error {
    fn from(err: PermissionRepositoryError) -> Self {
        match err {
            PermissionRepositoryError::Connection { message }
            | PermissionRepositoryError::Query { message } => Self::internal(message),
        }
    }
}

/// Permission lookup consumed by the authorization chain.
///
/// The permission set is fetched per request, never cached across
/// requests, so grants and revocations take effect immediately.
#[async_trait]
pub trait PermissionRepository: Send + Sync {
    /// Fetch the permission set held by `account_id`.
    async fn for_account(
        &self,
        account_id: AccountId,
    ) -> Result<PermissionSet, PermissionRepositoryError>;

    /// Grant `permissions` to `account_id`.
    async fn grant(
        &self,
        account_id: AccountId,
        permissions: &[Permission],
    ) -> Result<(), PermissionRepositoryError>;
}
