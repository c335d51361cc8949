//! Analysis Endpoint
//!
//! `POST /api/v1/analyze` answers a question about system health over a time
//! range. Input problems are rejected with 400 before the analyzer runs.

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use vigil_core::AnalysisResult;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::telemetry::METRICS;

/// Request body for an analysis.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnalyzeRequest {
    /// Natural-language question
    pub question: String,
    /// RFC3339 range start
    pub start_time: String,
    /// RFC3339 range end
    pub end_time: String,
    /// Signals to analyze; empty means every known signal
    #[serde(default)]
    pub metrics: Vec<String>,
}

fn parse_timestamp(value: &str, what: &str) -> ApiResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| ApiError::invalid_format(what))
}

/// POST /api/v1/analyze
#[utoipa::path(
    post,
    path = "/api/v1/analyze",
    tag = "Analysis",
    request_body = AnalyzeRequest,
    responses(
        (status = 200, description = "Analysis result", body = AnalysisResult),
        (status = 400, description = "Invalid request", body = String, content_type = "text/plain"),
        (status = 500, description = "Analysis failed", body = String, content_type = "text/plain"),
        (status = 504, description = "Analysis timed out", body = String, content_type = "text/plain"),
    ),
)]
pub async fn analyze(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> ApiResult<Json<AnalysisResult>> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::debug!(error = %rejection, "rejected analyze body");
        ApiError::invalid_input("Invalid request")
    })?;

    let start = parse_timestamp(&request.start_time, "start time")?;
    let end = parse_timestamp(&request.end_time, "end time")?;

    if request.question.trim().is_empty() {
        return Err(ApiError::missing_field("question"));
    }
    if start > end {
        return Err(ApiError::invalid_range("Start time must not be after end time"));
    }

    let metrics = METRICS.as_ref().ok();
    let outcome = tokio::time::timeout(
        state.request_timeout,
        state
            .analyzer
            .analyze_report(&request.question, start, end, request.metrics),
    )
    .await;

    match outcome {
        Ok(Ok(report)) => {
            if let Some(m) = metrics {
                m.record_served(&report.served);
            }
            Ok(Json(report.result))
        }
        Ok(Err(e)) => {
            tracing::error!(error = %e, "analysis failed");
            if let Some(m) = metrics {
                m.record_failure("error");
            }
            Err(e.into())
        }
        Err(_) => {
            tracing::warn!(
                timeout_secs = state.request_timeout.as_secs(),
                "analysis timed out"
            );
            if let Some(m) = metrics {
                m.record_failure("timeout");
            }
            Err(ApiError::timeout("Analysis", state.request_timeout))
        }
    }
}
