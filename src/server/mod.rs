//! REST server
//!
//! Axum front end over the job orchestrator, the model registry and the
//! prediction service.

mod api;
mod error;
mod handlers;
mod state;

pub use api::create_router;
pub use error::ServerError;
pub use state::AppState;

use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

/// Serve `state` until ctrl+c
pub async fn run_server(state: Arc<AppState>) -> anyhow::Result<()> {
    let start_time = state.started_at;
    let settings = state.settings.clone();

    let addr: SocketAddr = format!("{}:{}", settings.host, settings.port).parse()?;
    info!(
        host = %settings.host,
        port = settings.port,
        address = %addr,
        models_dir = %settings.models_dir.display(),
        workers = settings.workers,
        data_rows = state.data.len(),
        started_at = %start_time.to_rfc3339(),
        "Mortality model server starting"
    );
    info!(url = %format!("http://{}/api/health", addr), "Health endpoint available");

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, pid = std::process::id(), "Server listening and ready to accept connections");

    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for ctrl+c");
            return;
        }
        let stop_time = chrono::Utc::now();
        let uptime = stop_time.signed_duration_since(start_time);
        info!(
            stopped_at = %stop_time.to_rfc3339(),
            uptime_secs = uptime.num_seconds(),
            "Shutdown signal received, stopping server gracefully"
        );
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shut down cleanly");
    Ok(())
}
