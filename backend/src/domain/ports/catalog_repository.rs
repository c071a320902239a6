//! Port abstraction for catalog item persistence adapters.

use async_trait::async_trait;

use crate::domain::catalog::{CatalogItem, Filters, ItemId, Metadata, NewCatalogItem};
use crate::domain::Error;

/// Persistence errors raised by catalog repository adapters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogRepositoryError {
    /// Repository connection could not be established.
    #[error("catalog repository connection failed: {message}")]
    Connection { message: String },
    /// Query or mutation failed during execution.
    #[error("catalog repository query failed: {message}")]
    Query { message: String },
    /// A conditioned update matched no row: a concurrent writer won the
    /// race, or the row is gone.
    #[error("catalog item was modified concurrently")]
    Conflict,
    /// The addressed item does not exist.
    #[error("catalog item not found")]
    NotFound,
}

impl CatalogRepositoryError {
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

impl From<CatalogRepositoryError> for Error {
    fn from(err: CatalogRepositoryError) -> Self {
        match err {
            CatalogRepositoryError::Conflict => Self::edit_conflict(),
            CatalogRepositoryError::NotFound => Self::resource_not_found(),
            CatalogRepositoryError::Connection { message }
            | CatalogRepositoryError::Query { message } => Self::internal(message),
        }
    }
}

/// Catalog persistence operations consumed by the core.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Insert a new item and return it with its assigned identifier and
    /// version 1.
    async fn insert(&self, item: NewCatalogItem) -> Result<CatalogItem, CatalogRepositoryError>;

    /// Fetch an item by identifier.
    async fn find(&self, id: ItemId) -> Result<Option<CatalogItem>, CatalogRepositoryError>;

    /// List items matching `filters` together with pagination metadata.
    async fn list(
        &self,
        filters: &Filters,
    ) -> Result<(Vec<CatalogItem>, Metadata), CatalogRepositoryError>;

    /// Persist changed fields of `item`, conditioned on the stored version
    /// still equalling `item.version()`. The update and the version
    /// increment are one atomic statement, never a read-then-write pair.
    /// Returns the new version; fails with
    /// [`CatalogRepositoryError::Conflict`] when no row matched.
    async fn update(&self, item: &CatalogItem) -> Result<u32, CatalogRepositoryError>;

    /// Delete an item. Fails with [`CatalogRepositoryError::NotFound`]
    /// when no row matched.
    async fn delete(&self, id: ItemId) -> Result<(), CatalogRepositoryError>;
}
