//! Server wiring: port assembly, middleware ordering, migrations, and
//! graceful shutdown with background-task drain.

pub mod config;

use std::net::Ipv4Addr;
use std::sync::Arc;

use actix_web::http::header;
use actix_web::middleware::DefaultHeaders;
use actix_web::{web, App, HttpServer};
use diesel::pg::PgConnection;
use diesel::Connection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::{info, warn};
#[cfg(debug_assertions)]
use utoipa::OpenApi;
#[cfg(debug_assertions)]
use utoipa_swagger_ui::SwaggerUi;

use crate::inbound::http::state::{FixturePorts, HttpPorts, HttpState};
use crate::middleware::{RateLimit, RateLimiter, Recover, RequestId};
use crate::outbound::notify::TracingMailer;
use crate::outbound::persistence::{
    DbPool, DieselAccountRepository, DieselCatalogRepository, DieselPermissionRepository,
    DieselTokenRepository, PoolConfig,
};
use crate::tasks::BackgroundTasks;

use self::config::Settings;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

/// Run the server until it is shut down, then drain background work.
pub async fn run(settings: Settings) -> std::io::Result<()> {
    settings.validate().map_err(std::io::Error::other)?;

    let limiter = if settings.limiter_enabled {
        Arc::new(RateLimiter::new(settings.limiter_settings()).map_err(std::io::Error::other)?)
    } else {
        info!("rate limiter disabled by configuration");
        Arc::new(RateLimiter::disabled())
    };
    // The sweeper only exists for an enabled limiter; it runs for the
    // process lifetime.
    let sweeper = Arc::clone(&limiter).spawn_sweeper();

    let tasks = Arc::new(BackgroundTasks::default());
    let ports = build_ports(&settings).await?;
    let state = web::Data::new(HttpState::new(
        ports,
        Arc::clone(&tasks),
        settings.environment.clone(),
    ));

    info!(
        port = settings.port,
        environment = %settings.environment,
        "starting server"
    );

    let app_state = state.clone();
    let app_limiter = Arc::clone(&limiter);
    let server = HttpServer::new(move || {
        // Registration order is inside-out: panic recovery is outermost,
        // then request tracing, then rate limiting, so a rejected or
        // panicking request is still traced and contained.
        let app = App::new()
            .app_data(app_state.clone())
            .configure(crate::inbound::http::configure)
            .wrap(DefaultHeaders::new().add((header::VARY, "Authorization")))
            .wrap(RateLimit::new(Arc::clone(&app_limiter)))
            .wrap(RequestId)
            .wrap(Recover);

        #[cfg(debug_assertions)]
        let app = app.service(
            SwaggerUi::new("/docs/{_:.*}").url("/api-docs/openapi.json", crate::ApiDoc::openapi()),
        );

        app
    })
    .bind((Ipv4Addr::UNSPECIFIED, settings.port))?
    .run();

    server.await?;

    // The listener is closed; let in-flight notification sends finish
    // before the process exits.
    info!("completing background tasks");
    tasks.drain().await;
    if let Some(handle) = sweeper {
        handle.abort();
    }
    info!("stopped server");
    Ok(())
}

async fn build_ports(settings: &Settings) -> std::io::Result<HttpPorts> {
    if settings.database_url.is_empty() {
        warn!("no database DSN configured; using in-memory fixture adapters");
        let mut ports = FixturePorts::new().ports();
        ports.mailer = Arc::new(TracingMailer::new());
        return Ok(ports);
    }

    run_migrations(settings.database_url.clone()).await?;

    let pool = DbPool::new(
        PoolConfig::new(&settings.database_url)
            .with_max_size(settings.database_max_connections),
    )
    .await
    .map_err(std::io::Error::other)?;
    info!("database connection pool established");

    Ok(HttpPorts {
        accounts: Arc::new(DieselAccountRepository::new(pool.clone())),
        tokens: Arc::new(DieselTokenRepository::new(pool.clone())),
        permissions: Arc::new(DieselPermissionRepository::new(pool.clone())),
        catalog: Arc::new(DieselCatalogRepository::new(pool)),
        mailer: Arc::new(TracingMailer::new()),
    })
}

async fn run_migrations(database_url: String) -> std::io::Result<()> {
    // Diesel migrations run on a synchronous connection; keep them off
    // the async runtime.
    let applied = tokio::task::spawn_blocking(move || {
        let mut conn =
            PgConnection::establish(&database_url).map_err(|err| err.to_string())?;
        conn.run_pending_migrations(MIGRATIONS)
            .map(|versions| versions.len())
            .map_err(|err| err.to_string())
    })
    .await
    .map_err(std::io::Error::other)?
    .map_err(std::io::Error::other)?;

    if applied > 0 {
        info!(applied, "database migrations applied");
    }
    Ok(())
}
