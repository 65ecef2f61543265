use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, routing::get, routing::post};
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::{
    services::{health, load_image, refresh, status, supply_catalog},
    state::AppState,
};
use crate::config::Config;
use crate::service::FeedService;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub fn router(service: Arc<FeedService>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/refresh", post(refresh))
        .route("/images/load", post(load_image))
        .route("/catalog", post(supply_catalog))
        .with_state(AppState::new(service))
}

/// Build the service from config, start it and serve the status API until shutdown
pub async fn run(address: Option<SocketAddr>) -> Result<(), AnyError> {
    info!("Loading configuration");
    let config = Config::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let address = address.unwrap_or(config.server.bind_addr);

    let service = Arc::new(FeedService::from_config(&config)?);
    service.start().await?;

    let result = serve(Arc::clone(&service), address).await;
    service.stop().await;
    result
}

/// Serve the status API for an already-built service
pub async fn serve(service: Arc<FeedService>, address: SocketAddr) -> Result<(), AnyError> {
    let app = router(service);

    let listener = TcpListener::bind(address).await?;
    info!(%address, "camfeed status API listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
