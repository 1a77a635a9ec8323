//! Telemetry HTTP server for audio-fanout
//!
//! Exposes the latest telemetry snapshot for external dashboards.

use axum::{extract::State, routing::get, Json, Router};
use std::net::SocketAddr;
use thiserror::Error;
use tracing::info;

use crate::telemetry::{SharedTelemetry, TelemetrySnapshot};

/// Errors that can occur when running the telemetry server
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid listen address '{0}'")]
    InvalidAddress(String),

    #[error("Failed to bind to address: {0}")]
    BindError(#[from] std::io::Error),
}

/// Handler for GET /telemetry
async fn get_telemetry(State(telemetry): State<SharedTelemetry>) -> Json<TelemetrySnapshot> {
    let snapshot = telemetry.read().await.clone();
    Json(snapshot)
}

/// Creates the axum Router with the telemetry endpoint
pub fn create_telemetry_router(telemetry: SharedTelemetry) -> Router {
    Router::new()
        .route("/telemetry", get(get_telemetry))
        .with_state(telemetry)
}

/// Parses a `host:port` listen address
pub fn parse_listen_addr(addr: &str) -> Result<SocketAddr, ServerError> {
    addr.parse()
        .map_err(|_| ServerError::InvalidAddress(addr.to_string()))
}

/// Serves `GET /telemetry` on `addr` until the task is dropped
pub async fn run_telemetry_server(
    telemetry: SharedTelemetry,
    addr: SocketAddr,
) -> Result<(), ServerError> {
    let app = create_telemetry_router(telemetry);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Telemetry available at http://{}/telemetry", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
