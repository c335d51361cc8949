//! Vigil Collectors - telemetry sources
//!
//! Defines the [`TelemetrySource`] seam the context assembler pulls from, plus
//! HTTP implementations for Prometheus, Jaeger and Loki.

use async_trait::async_trait;
use std::sync::Arc;
use vigil_core::{TimeRange, VigilResult};

mod composite;
mod http;
mod jaeger;
mod loki;
mod prometheus;

pub use composite::CompositeSource;
pub use http::HttpQueryClient;
pub use jaeger::JaegerSource;
pub use loki::LokiSource;
pub use prometheus::PrometheusSource;

/// A backend that can enumerate signals and render their data as text.
///
/// Implementations must be thread-safe (Send + Sync). The returned payload is
/// opaque to callers; an empty string means "no data in range".
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Short identifier for logs and error messages (e.g. "prometheus").
    fn kind(&self) -> &'static str;

    /// List every signal name this source can serve.
    async fn list_names(&self) -> VigilResult<Vec<String>>;

    /// Fetch formatted data for one signal over `range`.
    async fn fetch_data(&self, name: &str, range: TimeRange) -> VigilResult<String>;
}

#[async_trait]
impl<T: TelemetrySource + ?Sized> TelemetrySource for Arc<T> {
    fn kind(&self) -> &'static str {
        (**self).kind()
    }

    async fn list_names(&self) -> VigilResult<Vec<String>> {
        (**self).list_names().await
    }

    async fn fetch_data(&self, name: &str, range: TimeRange) -> VigilResult<String> {
        (**self).fetch_data(name, range).await
    }
}
