use std::sync::Arc;

use delivery_router::api;
use delivery_router::config::{Config, LogFormat};
use delivery_router::engine::lifecycle::run_lifecycle_supervisor;
use delivery_router::error::AppError;
use delivery_router::state::AppState;
use delivery_router::store::MemoryStore;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false);
    match config.log_format {
        LogFormat::Compact => subscriber.compact().init(),
        LogFormat::Json => subscriber.json().init(),
    }

    let store = Arc::new(MemoryStore::new());
    let (app_state, failures_rx) = AppState::new(&config, store);
    let shared_state = Arc::new(app_state);

    tokio::spawn(run_lifecycle_supervisor(shared_state.clone(), failures_rx));

    let app = api::rest::router(shared_state);

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(
        http_port = config.http_port,
        proximity_threshold_m = config.routing.proximity_threshold_m,
        nearest_area_count = config.routing.nearest_area_count,
        "http server started"
    );

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
