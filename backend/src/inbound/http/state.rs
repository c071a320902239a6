//! Shared HTTP adapter state.
//!
//! Handlers accept this state via `actix_web::web::Data` so they depend
//! only on domain ports and remain testable without I/O.

use std::sync::Arc;

use chrono::TimeDelta;

use crate::domain::ports::{
    AccountRepository, CatalogRepository, FixtureAuthStore, FixtureCatalogRepository,
    FixtureMailer, FixturePermissionRepository, Mailer, PermissionRepository, TokenRepository,
};
use crate::domain::{Authorizer, IdentityResolver};
use crate::tasks::BackgroundTasks;

/// Time-to-live per token scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenTtls {
    /// Authentication tokens issued at login.
    pub authentication: TimeDelta,
    /// Activation tokens issued at registration or on request.
    pub activation: TimeDelta,
    /// Password-reset tokens.
    pub password_reset: TimeDelta,
}

impl Default for TokenTtls {
    fn default() -> Self {
        Self {
            authentication: TimeDelta::hours(24),
            activation: TimeDelta::days(3),
            password_reset: TimeDelta::minutes(30),
        }
    }
}

/// Parameter object bundling the port implementations handlers need.
pub struct HttpPorts {
    pub accounts: Arc<dyn AccountRepository>,
    pub tokens: Arc<dyn TokenRepository>,
    pub permissions: Arc<dyn PermissionRepository>,
    pub catalog: Arc<dyn CatalogRepository>,
    pub mailer: Arc<dyn Mailer>,
}

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub accounts: Arc<dyn AccountRepository>,
    pub tokens: Arc<dyn TokenRepository>,
    pub permissions: Arc<dyn PermissionRepository>,
    pub catalog: Arc<dyn CatalogRepository>,
    pub mailer: Arc<dyn Mailer>,
    pub identity: IdentityResolver,
    pub authorizer: Authorizer,
    pub tasks: Arc<BackgroundTasks>,
    pub ttls: TokenTtls,
    pub environment: String,
}

impl HttpState {
    /// Construct state from a ports bundle. The identity resolver and
    /// authorizer are wired over the same ports.
    pub fn new(ports: HttpPorts, tasks: Arc<BackgroundTasks>, environment: impl Into<String>) -> Self {
        let HttpPorts {
            accounts,
            tokens,
            permissions,
            catalog,
            mailer,
        } = ports;
        let identity = IdentityResolver::new(Arc::clone(&accounts));
        let authorizer = Authorizer::new(Arc::clone(&permissions));
        Self {
            accounts,
            tokens,
            permissions,
            catalog,
            mailer,
            identity,
            authorizer,
            tasks,
            ttls: TokenTtls::default(),
            environment: environment.into(),
        }
    }

    /// Override the token time-to-lives.
    pub fn with_ttls(mut self, ttls: TokenTtls) -> Self {
        self.ttls = ttls;
        self
    }
}

/// Concrete handles to the fixture adapters behind a fixture-backed
/// [`HttpState`], kept for seeding and assertions.
#[derive(Clone)]
pub struct FixturePorts {
    pub store: FixtureAuthStore,
    pub permissions: FixturePermissionRepository,
    pub catalog: FixtureCatalogRepository,
    pub mailer: FixtureMailer,
}

impl FixturePorts {
    /// Create fresh fixture adapters.
    pub fn new() -> Self {
        Self {
            store: FixtureAuthStore::new(),
            permissions: FixturePermissionRepository::new(),
            catalog: FixtureCatalogRepository::new(),
            mailer: FixtureMailer::new(),
        }
    }

    /// View the fixtures as a ports bundle.
    pub fn ports(&self) -> HttpPorts {
        HttpPorts {
            accounts: Arc::new(self.store.accounts()),
            tokens: Arc::new(self.store.tokens()),
            permissions: Arc::new(self.permissions.clone()),
            catalog: Arc::new(self.catalog.clone()),
            mailer: Arc::new(self.mailer.clone()),
        }
    }
}

impl Default for FixturePorts {
    fn default() -> Self {
        Self::new()
    }
}
