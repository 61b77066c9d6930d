//! Request handlers for the API endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;

use crate::sink::{ExpectedRecord, Resolution, TickRecord};

use super::AppState;
use super::types::{ErrorResponse, ExpectedQuery, StateResponse, TicksQuery};

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error(status: StatusCode, message: String) -> ApiError {
    (status, Json(ErrorResponse { error: message }))
}

fn check_installation(state: &AppState, id: Option<&str>) -> Result<(), ApiError> {
    match id {
        Some(id) if state.results.kpi(id).is_none() => Err(error(
            StatusCode::NOT_FOUND,
            format!("unknown installation \"{id}\""),
        )),
        _ => Ok(()),
    }
}

/// Returns simulation config, run summary and installation KPIs.
///
/// `GET /state` → 200 + `StateResponse` JSON
pub async fn get_state(State(state): State<Arc<AppState>>) -> Json<StateResponse> {
    Json(StateResponse {
        config: state.config.clone(),
        summary: state.summary.clone(),
        kpis: state.results.kpis.clone(),
    })
}

/// Returns power samples of one installation or of the aggregate.
///
/// `GET /ticks` → aggregate minute trace
/// `GET /ticks?installation=h1&resolution=hourly&from=0&to=1439` → filtered (inclusive)
/// `GET /ticks?from=10&to=5` → 400 + `ErrorResponse`
/// `GET /ticks?installation=nope` → 404 + `ErrorResponse`
pub async fn get_ticks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TicksQuery>,
) -> Result<Json<Vec<TickRecord>>, ApiError> {
    let from = query.from.unwrap_or(0);
    let to = query.to.unwrap_or(u64::MAX);
    if from > to {
        return Err(error(
            StatusCode::BAD_REQUEST,
            format!("`from` ({from}) must be <= `to` ({to})"),
        ));
    }
    let resolution = match query.resolution.as_deref() {
        None => Resolution::Minute,
        Some(name) => Resolution::parse(name).ok_or_else(|| {
            error(
                StatusCode::BAD_REQUEST,
                format!("unknown resolution \"{name}\", expected `minute` or `hourly`"),
            )
        })?,
    };
    let installation = query.installation.as_deref();
    check_installation(&state, installation)?;

    let records: Vec<TickRecord> = state
        .results
        .series(installation, resolution)
        .filter(|r| r.tick >= from && r.tick <= to)
        .cloned()
        .collect();
    Ok(Json(records))
}

/// Returns expected-power curves.
///
/// `GET /expected` → every installation
/// `GET /expected?installation=h1` → one installation, 1440 points
pub async fn get_expected(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ExpectedQuery>,
) -> Result<Json<Vec<ExpectedRecord>>, ApiError> {
    let installation = query.installation.as_deref();
    check_installation(&state, installation)?;
    let records: Vec<ExpectedRecord> = state
        .results
        .expected
        .iter()
        .filter(|r| installation.is_none_or(|id| r.installation == id))
        .cloned()
        .collect();
    Ok(Json(records))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use tower::util::ServiceExt;

    use super::*;
    use crate::api::router;
    use crate::sim::kpi::{InstallationKpi, KpiRecord, RunSummary};
    use crate::sim::types::SimConfig;
    use crate::sink::{MemorySink, ResultsSink};

    fn make_test_state() -> Arc<AppState> {
        let mut results = MemorySink::new();
        for t in 0..120 {
            results.add_tick_result("h1", Resolution::Minute, t, 100.0 + t as f64, 10.0);
            results.add_aggregated_tick_result(Resolution::Minute, t, 100.0 + t as f64, 10.0);
        }
        results.add_tick_result("h1", Resolution::Hourly, 0, 129.5, 10.0);
        results.add_tick_result("h1", Resolution::Hourly, 60, 189.5, 10.0);
        for minute in 0..1440 {
            results.add_expected_power_tick("h1", minute, 50.0, 0.0);
        }
        results.add_kpis(&InstallationKpi {
            installation: "h1".to_string(),
            kpi: KpiRecord::default(),
            reactive_energy: 0.0,
        });
        Arc::new(AppState {
            config: SimConfig::new(1, 1, 42),
            summary: RunSummary::default(),
            results,
        })
    }

    async fn get(uri: &str) -> (StatusCode, serde_json::Value) {
        let app = router(make_test_state());
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn state_returns_200() {
        let (status, json) = get("/state").await;
        assert_eq!(status, StatusCode::OK);
        assert!(json.get("config").is_some());
        assert!(json.get("summary").is_some());
        assert_eq!(json["kpis"][0]["installation"], "h1");
    }

    #[tokio::test]
    async fn ticks_default_to_the_aggregate_minute_trace() {
        let (status, json) = get("/ticks").await;
        assert_eq!(status, StatusCode::OK);
        let records = json.as_array().unwrap();
        assert_eq!(records.len(), 120);
        assert!(records[0]["installation"].is_null());
    }

    #[tokio::test]
    async fn ticks_range_query() {
        let (status, json) = get("/ticks?installation=h1&from=5&to=10").await;
        assert_eq!(status, StatusCode::OK);
        let records = json.as_array().unwrap();
        assert_eq!(records.len(), 6);
        assert_eq!(records[0]["tick"], 5);
        assert_eq!(records[5]["tick"], 10);
    }

    #[tokio::test]
    async fn ticks_hourly_resolution() {
        let (status, json) = get("/ticks?installation=h1&resolution=hourly").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json.as_array().unwrap().len(), 2);
        assert_eq!(json[1]["resolution"], "hourly");
    }

    #[tokio::test]
    async fn ticks_invalid_range_returns_400() {
        let (status, json) = get("/ticks?from=10&to=5").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json.get("error").is_some());
    }

    #[tokio::test]
    async fn ticks_unknown_resolution_returns_400() {
        let (status, _) = get("/ticks?resolution=daily").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_installation_returns_404() {
        let (status, json) = get("/expected?installation=nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(json["error"].as_str().unwrap().contains("nope"));
    }

    #[tokio::test]
    async fn expected_returns_a_full_day() {
        let (status, json) = get("/expected?installation=h1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json.as_array().unwrap().len(), 1440);
    }
}
