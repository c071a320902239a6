//! Process configuration.
//!
//! Every knob is a command-line flag with an environment-variable
//! override and a default, parsed with clap. Invalid configuration is
//! rejected at startup; nothing here panics on bad input.

use std::time::Duration;

use clap::Parser;

use crate::middleware::RateLimiterSettings;

const ENVIRONMENTS: [&str; 3] = ["development", "staging", "production"];

/// Command-line and environment configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "reelgate", about = "Catalog and account API server", version)]
pub struct Settings {
    /// API server port.
    #[arg(long, env = "REELGATE_PORT", default_value_t = 4000)]
    pub port: u16,

    /// Deployment environment (development|staging|production).
    #[arg(long = "env", env = "REELGATE_ENV", default_value = "development")]
    pub environment: String,

    /// PostgreSQL DSN. Leave empty to run on the in-memory fixture
    /// adapters (state is lost at exit).
    #[arg(long = "db-dsn", env = "REELGATE_DB_DSN", default_value = "")]
    pub database_url: String,

    /// PostgreSQL maximum open connections.
    #[arg(long = "db-max-conns", env = "REELGATE_DB_MAX_CONNS", default_value_t = 25)]
    pub database_max_connections: u32,

    /// Enable the per-client rate limiter.
    #[arg(
        long = "limiter-enabled",
        env = "REELGATE_LIMITER_ENABLED",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub limiter_enabled: bool,

    /// Rate limiter sustained requests per second.
    #[arg(long = "limiter-rps", env = "REELGATE_LIMITER_RPS", default_value_t = 2.0)]
    pub limiter_rps: f64,

    /// Rate limiter maximum burst.
    #[arg(long = "limiter-burst", env = "REELGATE_LIMITER_BURST", default_value_t = 4)]
    pub limiter_burst: u32,

    /// Seconds a client may go unseen before its bucket is evicted.
    #[arg(
        long = "limiter-idle-secs",
        env = "REELGATE_LIMITER_IDLE_SECS",
        default_value_t = 180
    )]
    pub limiter_idle_secs: u64,

    /// Seconds between bucket eviction sweeps.
    #[arg(
        long = "limiter-sweep-secs",
        env = "REELGATE_LIMITER_SWEEP_SECS",
        default_value_t = 60
    )]
    pub limiter_sweep_secs: u64,
}

/// Rejections raised by [`Settings::validate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    /// The environment name is not one of the known deployments.
    #[error("unknown environment {name:?}; expected development, staging, or production")]
    UnknownEnvironment { name: String },
}

impl Settings {
    /// Reject invalid configuration before any component is built.
    /// Limiter numbers are validated by the limiter's own constructor.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !ENVIRONMENTS.contains(&self.environment.as_str()) {
            return Err(SettingsError::UnknownEnvironment {
                name: self.environment.clone(),
            });
        }
        Ok(())
    }

    /// The limiter tunables in the limiter's own terms.
    pub fn limiter_settings(&self) -> RateLimiterSettings {
        RateLimiterSettings {
            requests_per_second: self.limiter_rps,
            burst: self.limiter_burst,
            idle_after: Duration::from_secs(self.limiter_idle_secs),
            sweep_interval: Duration::from_secs(self.limiter_sweep_secs),
        }
    }
}
