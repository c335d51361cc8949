//! Prometheus Metrics Definitions
//!
//! Request, cache and dispatch metrics for the service, exposed at `/metrics`.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram, register_histogram_vec, register_int_counter,
    register_int_gauge, CounterVec, Encoder, Histogram, HistogramVec, IntCounter, IntGauge,
    TextEncoder,
};
use std::time::Duration;
use vigil_analyzer::Served;
use vigil_core::ParseMode;

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Inference dispatch latency buckets (seconds); completions are slow.
const DISPATCH_LATENCY_BUCKETS: &[f64] = &[0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0];

/// Global metrics instance - initialized once at startup
pub static METRICS: Lazy<ApiResult<VigilMetrics>> = Lazy::new(VigilMetrics::new);

fn register_failed(name: &str, e: prometheus::Error) -> ApiError {
    ApiError::internal_error(format!("Failed to register {}: {}", name, e))
}

/// Container for all Vigil metrics.
#[derive(Clone)]
pub struct VigilMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Analyses by outcome - labels: outcome (cache, fresh, error, timeout)
    pub analyses_total: CounterVec,

    pub cache_hits_total: IntCounter,
    pub cache_misses_total: IntCounter,

    /// Responses that fell back to raw-text parsing
    pub parse_fallbacks_total: IntCounter,

    /// Single inference dispatch latency
    pub dispatch_duration_seconds: Histogram,

    /// Live cache entries after the latest sweep
    pub cache_entries: IntGauge,
}

impl VigilMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "vigil_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| register_failed("http_requests_total", e))?,

            http_request_duration_seconds: register_histogram_vec!(
                "vigil_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| register_failed("http_request_duration_seconds", e))?,

            analyses_total: register_counter_vec!(
                "vigil_analyses_total",
                "Analysis requests by outcome",
                &["outcome"]
            )
            .map_err(|e| register_failed("analyses_total", e))?,

            cache_hits_total: register_int_counter!(
                "vigil_cache_hits_total",
                "Analyses answered from the result cache"
            )
            .map_err(|e| register_failed("cache_hits_total", e))?,

            cache_misses_total: register_int_counter!(
                "vigil_cache_misses_total",
                "Analyses that had to be computed"
            )
            .map_err(|e| register_failed("cache_misses_total", e))?,

            parse_fallbacks_total: register_int_counter!(
                "vigil_parse_fallbacks_total",
                "Completions that were not valid structured output"
            )
            .map_err(|e| register_failed("parse_fallbacks_total", e))?,

            dispatch_duration_seconds: register_histogram!(
                "vigil_dispatch_duration_seconds",
                "Inference dispatch duration in seconds",
                DISPATCH_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| register_failed("dispatch_duration_seconds", e))?,

            cache_entries: register_int_gauge!(
                "vigil_cache_entries",
                "Live entries in the result cache"
            )
            .map_err(|e| register_failed("cache_entries", e))?,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, status_str.as_str()])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    /// Record a successful analysis.
    pub fn record_served(&self, served: &Served) {
        match served {
            Served::Cache => {
                self.cache_hits_total.inc();
                self.analyses_total.with_label_values(&["cache"]).inc();
            }
            Served::Fresh {
                parse_mode,
                dispatch_latency,
            } => {
                self.cache_misses_total.inc();
                self.analyses_total.with_label_values(&["fresh"]).inc();
                self.observe_dispatch(*dispatch_latency);
                if *parse_mode == ParseMode::Fallback {
                    self.parse_fallbacks_total.inc();
                }
            }
        }
    }

    /// Record a failed analysis - `outcome` is "error" or "timeout".
    pub fn record_failure(&self, outcome: &str) {
        self.analyses_total.with_label_values(&[outcome]).inc();
    }

    pub fn observe_dispatch(&self, latency: Duration) {
        self.dispatch_duration_seconds.observe(latency.as_secs_f64());
    }

    pub fn set_cache_entries(&self, count: usize) {
        self.cache_entries.set(count as i64);
    }
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "Observability",
    responses(
        (status = 200, description = "Prometheus metrics in text format", content_type = "text/plain"),
        (status = 500, description = "Failed to encode metrics"),
    ),
)]
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}
