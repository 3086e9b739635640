//! Clinic server entry point.
//!
//! Loads `.env`, resolves configuration from the environment, bootstraps the default
//! administrator and serves the REST API until ctrl-c.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the clinic application
///
/// # Environment Variables
/// - `CLINIC_REST_ADDR`: REST server address (default: "0.0.0.0:3456")
/// - `CLINIC_DATA_DIR`: Directory for record storage (default: "clinic_data")
/// - `CLINIC_TRANSITION_POLICY`: `permissive` (default) or `strict`
/// - `CLINIC_API_KEY`: API key required on every API route except `/health` and the docs, when set
/// - `DEFAULT_ADMIN_USERNAME` / `DEFAULT_ADMIN_PASSWORD`: administrator created on first start
///
/// # Returns
/// * `Ok(())` - If the server starts and shuts down cleanly
/// * `Err(anyhow::Error)` - If configuration, bootstrap or serving fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("clinic_run=info".parse()?)
                .add_directive("api_rest=info".parse()?)
                .add_directive("clinic_core=info".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = api_rest::ServerConfig::from_env()?;
    tracing::info!("++ Starting clinic server on {}", config.addr);
    api_rest::serve(config).await
}
