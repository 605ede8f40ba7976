//! Scan API endpoints.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{AppError, Result};
use crate::types::{InstrumentSnapshot, ScanPhase, ScanReport, TriggerResponse};
use crate::AppState;

const MAX_RESULTS: usize = 100;

/// API response wrapper.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
    pub meta: ApiMeta,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiMeta {
    pub count: usize,
}

/// Query parameters for the results endpoint.
#[derive(Debug, Deserialize)]
pub struct ResultsQuery {
    pub limit: Option<usize>,
}

/// Scanner status.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    /// False when the scanner could not be configured.
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub phase: ScanPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_report: Option<ScanReport>,
}

/// Create the scan router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(trigger_scan))
        .route("/results", get(get_results))
        .route("/status", get(get_status))
}

/// Run one scan cycle and report how many instruments were updated.
async fn trigger_scan(State(state): State<AppState>) -> (StatusCode, Json<TriggerResponse>) {
    let Some(scanner) = state.scanner.clone() else {
        let reason = state
            .startup_error
            .clone()
            .unwrap_or_else(|| "scanner not configured".to_string());
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(TriggerResponse::failed(reason)),
        );
    };

    info!("Manual scan triggered");
    match scanner.run().await {
        Ok(report) => (
            StatusCode::OK,
            Json(TriggerResponse::updated(report.instruments_updated)),
        ),
        Err(e) => {
            error!("Manual scan failed: {}", e);
            let status = if e.is_fatal() {
                StatusCode::SERVICE_UNAVAILABLE
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            (status, Json(TriggerResponse::failed(e.to_string())))
        }
    }
}

/// Current top results from the sink.
async fn get_results(
    State(state): State<AppState>,
    Query(query): Query<ResultsQuery>,
) -> Result<Json<ApiResponse<Vec<InstrumentSnapshot>>>> {
    let limit = query.limit.unwrap_or(state.config.scan.top_n);
    if limit == 0 || limit > MAX_RESULTS {
        return Err(AppError::BadRequest(format!(
            "limit must be between 1 and {}",
            MAX_RESULTS
        )));
    }

    let instruments = state.sink.top(limit).await?;
    Ok(Json(ApiResponse {
        meta: ApiMeta {
            count: instruments.len(),
        },
        data: instruments,
    }))
}

/// Current scan phase and the last completed report.
async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let response = match &state.scanner {
        Some(scanner) => StatusResponse {
            enabled: true,
            error: None,
            phase: scanner.phase().await,
            last_report: scanner.last_report().await,
        },
        None => StatusResponse {
            enabled: false,
            error: state.startup_error.clone(),
            phase: ScanPhase::Idle,
            last_report: None,
        },
    };
    Json(response)
}
