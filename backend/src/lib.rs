//! Catalog and account API: opaque bearer-token authentication, layered
//! authorization, per-client rate limiting, and optimistic-concurrency
//! updates over PostgreSQL.

pub mod doc;
pub mod domain;
pub mod inbound;
pub mod middleware;
pub mod outbound;
pub mod server;
pub mod tasks;

/// Public OpenAPI surface used by Swagger UI and tooling.
pub use doc::ApiDoc;
