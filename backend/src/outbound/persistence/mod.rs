//! PostgreSQL persistence adapters built on Diesel and diesel-async.

mod diesel_account_repository;
mod diesel_catalog_repository;
mod diesel_permission_repository;
mod diesel_token_repository;
mod models;
pub mod pool;
pub mod schema;

pub use diesel_account_repository::DieselAccountRepository;
pub use diesel_catalog_repository::DieselCatalogRepository;
pub use diesel_permission_repository::DieselPermissionRepository;
pub use diesel_token_repository::DieselTokenRepository;
pub use pool::{DbPool, PoolConfig, PoolError};
