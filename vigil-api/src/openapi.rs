//! OpenAPI document for the Vigil HTTP API, served at `/openapi.json`.

use utoipa::OpenApi;
use vigil_core::AnalysisResult;

use crate::routes::analyze::{self, AnalyzeRequest};
use crate::routes::catalog::{self, MetricsListResponse};
use crate::routes::health::{self, CacheHealth, HealthDetails, HealthResponse, HealthStatus};
use crate::telemetry::metrics;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Vigil API",
        description = "Natural-language analysis of operational telemetry",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    tags(
        (name = "Analysis", description = "Question answering over metrics, traces and logs"),
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Observability", description = "Prometheus scrape endpoint")
    ),
    paths(
        analyze::analyze,
        catalog::list_metrics,
        health::ping,
        health::liveness,
        health::readiness,
        metrics::metrics_handler,
    ),
    components(schemas(
        AnalyzeRequest,
        AnalysisResult,
        MetricsListResponse,
        HealthResponse,
        HealthStatus,
        HealthDetails,
        CacheHealth,
    ))
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_analyze_path() -> Result<(), String> {
        let json = ApiDoc::openapi().to_json().map_err(|e| e.to_string())?;
        assert!(json.contains("/api/v1/analyze"));
        assert!(json.contains("AnalyzeRequest"));
        Ok(())
    }
}
