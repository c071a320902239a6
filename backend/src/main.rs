//! Application bootstrap: parse configuration, initialise tracing, run
//! the server.

use clap::Parser;
use tracing::warn;
use tracing_subscriber::{fmt, EnvFilter};

use reelgate::server::{self, config::Settings};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(err) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %err, "tracing init failed");
    }

    let settings = Settings::parse();
    server::run(settings).await
}
