//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API server on its own.
//!
//! ## Intended use
//! Useful for development and debugging when you only want the REST server (with
//! OpenAPI/Swagger UI) and no `.env` loading. The workspace's main `clinic-run` binary is the
//! one meant for deployment.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the clinic REST API server
///
/// Configuration comes from the environment; see [`api_rest::ServerConfig`].
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?)
                .add_directive("clinic_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = api_rest::ServerConfig::from_env()?;
    api_rest::serve(config).await
}
