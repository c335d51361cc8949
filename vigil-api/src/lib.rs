//! Vigil API - HTTP boundary for the analysis service
//!
//! Exposes the analyzer over REST (Axum), with Prometheus metrics, health
//! probes, an OpenAPI document and static asset serving.

pub mod config;
pub mod error;
pub mod jobs;
pub mod openapi;
pub mod routes;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use config::{ApiConfig, FileConfig};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use openapi::ApiDoc;
pub use routes::create_api_router;
pub use state::AppState;
