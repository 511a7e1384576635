use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use farm_fulfillment::api;
use farm_fulfillment::config::Config;
use farm_fulfillment::error::AppError;
use farm_fulfillment::providers::registry::ProviderRegistry;
use farm_fulfillment::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    if config.uses_development_secret() {
        tracing::warn!("PICKUP_QR_SECRET not set; signing pickup codes with the development key");
    }

    let registry = ProviderRegistry::load(config.provider_registry_file.as_deref())?;
    tracing::info!(
        environment = %config.environment,
        couriers = registry.couriers.len(),
        ordering = ?config.quote_ordering,
        single_use_pickup = config.pickup_single_use,
        "configuration loaded"
    );

    let shared_state = Arc::new(AppState::new(&config, registry));
    let app = api::rest::router(shared_state);

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "http server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
