//! Actix middlewares: rate limiting, panic recovery, and request tracing.

pub mod rate_limit;
pub mod recover;
pub mod request_id;

pub use rate_limit::{RateLimit, RateLimiter, RateLimiterConfigError, RateLimiterSettings};
pub use recover::Recover;
pub use request_id::RequestId;
