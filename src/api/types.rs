//! API response and query types.

use serde::{Deserialize, Serialize};

use crate::sim::kpi::{InstallationKpi, RunSummary};
use crate::sim::types::SimConfig;

/// Combined state response: config, run summary and installation KPIs.
#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub config: SimConfig,
    pub summary: RunSummary,
    pub kpis: Vec<InstallationKpi>,
}

/// Filters of the `/ticks` endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct TicksQuery {
    /// Installation id; the aggregate trace when absent.
    pub installation: Option<String>,
    /// `minute` (default) or `hourly`.
    pub resolution: Option<String>,
    /// First tick (inclusive).
    pub from: Option<u64>,
    /// Last tick (inclusive).
    pub to: Option<u64>,
}

/// Filter of the `/expected` endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct ExpectedQuery {
    /// Installation id; every installation when absent.
    pub installation: Option<String>,
}

/// Error response body for 4xx errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
}
