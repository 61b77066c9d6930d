//! Read-only REST API over a finished simulation.
//!
//! Provides three GET endpoints:
//! - `/state`: simulation config, run summary and per-installation KPIs
//! - `/ticks`: power samples, filtered by installation, resolution and tick range
//! - `/expected`: expected-power curves of a representative day

mod handlers;
mod types;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tracing::info;

use crate::sim::kpi::RunSummary;
use crate::sim::types::SimConfig;
use crate::sink::MemorySink;

pub use types::{ErrorResponse, ExpectedQuery, StateResponse, TicksQuery};

/// Immutable application state shared across all request handlers.
///
/// Constructed once after the simulation completes and wrapped in `Arc`;
/// all data is read-only.
pub struct AppState {
    /// Simulation configuration used for the run.
    pub config: SimConfig,
    /// Headline figures of the run.
    pub summary: RunSummary,
    /// Everything the engine reported.
    pub results: MemorySink,
}

/// Builds the axum router with all API routes.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/state", get(handlers::get_state))
        .route("/ticks", get(handlers::get_ticks))
        .route("/expected", get(handlers::get_expected))
        .with_state(state)
}

/// Binds to the given address and serves the API until the server stops.
///
/// # Errors
///
/// Returns the I/O error if the listener cannot bind or the server fails.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> std::io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "API server listening");
    axum::serve(listener, app).await
}
