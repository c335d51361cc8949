//! Signal catalog endpoint.

use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Signals advertised to clients.
const ADVERTISED_METRICS: &[&str] = &[
    "process_cpu_seconds_total",
    "process_resident_memory_bytes",
    "http_requests_total",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MetricsListResponse {
    pub metrics: Vec<String>,
}

/// GET /api/v1/metrics - fixed placeholder list; the live catalog is not queried.
#[utoipa::path(
    get,
    path = "/api/v1/metrics",
    tag = "Analysis",
    responses(
        (status = 200, description = "Available metric names", body = MetricsListResponse),
    ),
)]
pub async fn list_metrics() -> Json<MetricsListResponse> {
    Json(MetricsListResponse {
        metrics: ADVERTISED_METRICS.iter().map(|m| m.to_string()).collect(),
    })
}
