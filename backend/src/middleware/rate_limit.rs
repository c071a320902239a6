//! Per-client token-bucket rate limiting.
//!
//! The limiter is an explicitly owned component: it is constructed once at
//! startup, validated there, and passed into the HTTP pipeline. Each
//! client address owns one bucket holding up to `burst` permits,
//! continuously refilled at `requests_per_second`. A background sweep
//! evicts buckets idle past the threshold so memory stays bounded under
//! churn of distinct clients.
//!
//! Lock discipline: all bucket access (admit, lazy create, sweep) goes
//! through one mutex over the whole map; the sweep task sleeps outside the
//! lock and only acquires it for each pass.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use actix_web::body::EitherBody;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{Error as ActixError, ResponseError};
use futures_util::future::{ready, LocalBoxFuture, Ready};
use tracing::{debug, trace};

use crate::domain::Error;
use crate::inbound::http::error::ApiError;

/// Tunables for [`RateLimiter::new`].
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimiterSettings {
    /// Sustained refill rate, in requests per second.
    pub requests_per_second: f64,
    /// Bucket capacity: the largest instantaneous burst admitted.
    pub burst: u32,
    /// How long a client may go unseen before its bucket is evicted.
    pub idle_after: Duration,
    /// How often the sweep task runs.
    pub sweep_interval: Duration,
}

impl Default for RateLimiterSettings {
    fn default() -> Self {
        Self {
            requests_per_second: 2.0,
            burst: 4,
            idle_after: Duration::from_secs(180),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Rejections raised by [`RateLimiter::new`] for invalid settings.
///
/// Invalid configuration is a startup-time error, never a runtime panic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RateLimiterConfigError {
    /// The refill rate must be positive and finite.
    #[error("limiter requests per second must be a positive, finite number")]
    NonPositiveRate,
    /// The burst capacity must admit at least one request.
    #[error("limiter burst must be at least 1")]
    ZeroBurst,
    /// Idle threshold and sweep interval must be positive.
    #[error("limiter idle threshold and sweep interval must be positive")]
    ZeroInterval,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
    last_seen: Instant,
}

#[derive(Debug)]
struct Inner {
    requests_per_second: f64,
    burst: f64,
    idle_after: Duration,
    sweep_interval: Duration,
    clients: Mutex<HashMap<String, Bucket>>,
}

/// Token-bucket rate limiter keyed by client address.
#[derive(Debug)]
pub struct RateLimiter {
    inner: Option<Inner>,
}

impl RateLimiter {
    /// Construct an enabled limiter, validating the settings.
    pub fn new(settings: RateLimiterSettings) -> Result<Self, RateLimiterConfigError> {
        if !settings.requests_per_second.is_finite() || settings.requests_per_second <= 0.0 {
            return Err(RateLimiterConfigError::NonPositiveRate);
        }
        if settings.burst == 0 {
            return Err(RateLimiterConfigError::ZeroBurst);
        }
        if settings.idle_after.is_zero() || settings.sweep_interval.is_zero() {
            return Err(RateLimiterConfigError::ZeroInterval);
        }
        Ok(Self {
            inner: Some(Inner {
                requests_per_second: settings.requests_per_second,
                burst: f64::from(settings.burst),
                idle_after: settings.idle_after,
                sweep_interval: settings.sweep_interval,
                clients: Mutex::new(HashMap::new()),
            }),
        })
    }

    /// Construct a disabled limiter: every request is admitted, no bucket
    /// state is kept, and no sweep task is spawned.
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    /// Whether the limiter keeps any state.
    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Admit or reject a request from `client`.
    pub fn admit(&self, client: &str) -> bool {
        self.admit_at(client, Instant::now())
    }

    fn admit_at(&self, client: &str, now: Instant) -> bool {
        let Some(inner) = &self.inner else {
            return true;
        };

        let mut clients = lock_clients(inner);
        let bucket = clients.entry(client.to_owned()).or_insert_with(|| Bucket {
            // New clients start at full capacity.
            tokens: inner.burst,
            last_refill: now,
            last_seen: now,
        });

        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * inner.requests_per_second).min(inner.burst);
        bucket.last_refill = now;
        bucket.last_seen = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Run one eviction pass, dropping buckets idle past the threshold.
    pub fn sweep(&self) {
        self.sweep_at(Instant::now());
    }

    fn sweep_at(&self, now: Instant) {
        let Some(inner) = &self.inner else {
            return;
        };
        let mut clients = lock_clients(inner);
        let before = clients.len();
        clients.retain(|_, bucket| now.saturating_duration_since(bucket.last_seen) <= inner.idle_after);
        let evicted = before - clients.len();
        if evicted > 0 {
            trace!(evicted, remaining = clients.len(), "evicted idle rate-limiter buckets");
        }
    }

    /// Spawn the periodic sweep task. Returns `None` when the limiter is
    /// disabled. The task runs for the process lifetime; the caller may
    /// abort the handle at shutdown.
    pub fn spawn_sweeper(self: Arc<Self>) -> Option<tokio::task::JoinHandle<()>> {
        let sweep_interval = self.inner.as_ref()?.sweep_interval;
        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(sweep_interval);
            // The first tick fires immediately; skip it so the first pass
            // happens one interval after startup.
            interval.tick().await;
            loop {
                interval.tick().await;
                self.sweep();
            }
        }))
    }

    #[cfg(test)]
    fn tracked_clients(&self) -> usize {
        self.inner
            .as_ref()
            .map_or(0, |inner| lock_clients(inner).len())
    }
}

fn lock_clients(inner: &Inner) -> MutexGuard<'_, HashMap<String, Bucket>> {
    // A poisoned lock means a thread panicked while holding it; the map
    // itself is still sound (evictions and refills are idempotent), so
    // recover the guard rather than wedging every subsequent request.
    inner
        .clients
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Middleware rejecting requests before any handler work when the client
/// has exhausted its budget.
#[derive(Clone)]
pub struct RateLimit {
    limiter: Arc<RateLimiter>,
}

impl RateLimit {
    /// Wrap a shared limiter instance.
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = ActixError> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = ActixError;
    type InitError = ();
    type Transform = RateLimitMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddleware {
            service,
            limiter: Arc::clone(&self.limiter),
        }))
    }
}

/// Service wrapper produced by [`RateLimit`].
pub struct RateLimitMiddleware<S> {
    service: S,
    limiter: Arc<RateLimiter>,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = ActixError> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = ActixError;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // The real client address, honouring proxy-forwarded headers the
        // framework has been told to trust.
        let client = {
            let info = req.connection_info();
            info.realip_remote_addr().unwrap_or("unknown").to_owned()
        };

        if self.limiter.admit(&client) {
            let fut = self.service.call(req);
            Box::pin(async move { Ok(fut.await?.map_into_left_body()) })
        } else {
            debug!(client = %client, "request rejected by rate limiter");
            let response = ApiError::from(Error::rate_limit_exceeded()).error_response();
            Box::pin(ready(Ok(req.into_response(response).map_into_right_body())))
        }
    }
}
