//! Prometheus HTTP API source

use crate::{HttpQueryClient, TelemetrySource};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::time::Duration;
use vigil_core::{TelemetryError, TimeRange, VigilResult};

const KIND: &str = "prometheus";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: String,
    data: Option<T>,
    #[serde(default, rename = "errorType")]
    error_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    warnings: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "resultType", content = "result", rename_all = "lowercase")]
enum QueryData {
    Vector(Vec<VectorSample>),
    Matrix(Vec<MatrixStream>),
    Scalar(serde_json::Value),
    String(serde_json::Value),
}

#[derive(Debug, Deserialize)]
struct VectorSample {
    #[serde(default)]
    metric: BTreeMap<String, String>,
    value: (f64, String),
}

#[derive(Debug, Deserialize)]
struct MatrixStream {
    #[serde(default)]
    metric: BTreeMap<String, String>,
    values: Vec<(f64, String)>,
}

/// Reads metric names and instant-query results from Prometheus.
#[derive(Debug, Clone)]
pub struct PrometheusSource {
    http: HttpQueryClient,
}

impl PrometheusSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http: HttpQueryClient::new(KIND, base_url, timeout),
        }
    }

    fn unwrap_envelope<T>(&self, envelope: Envelope<T>, signal: Option<&str>) -> VigilResult<T> {
        if !envelope.warnings.is_empty() {
            tracing::warn!(
                signal = signal.unwrap_or("*"),
                warnings = ?envelope.warnings,
                "prometheus returned warnings"
            );
        }

        if envelope.status != "success" {
            return Err(TelemetryError::QueryRejected {
                source_kind: KIND.to_string(),
                status: envelope.error_type.unwrap_or(envelope.status),
                message: envelope.error.unwrap_or_default(),
            }
            .into());
        }

        envelope.data.ok_or_else(|| {
            TelemetryError::QueryRejected {
                source_kind: KIND.to_string(),
                status: "success".to_string(),
                message: "response carried no data".to_string(),
            }
            .into()
        })
    }
}

#[async_trait]
impl TelemetrySource for PrometheusSource {
    fn kind(&self) -> &'static str {
        KIND
    }

    async fn list_names(&self) -> VigilResult<Vec<String>> {
        let envelope: Envelope<Vec<String>> = self
            .http
            .get_json("/api/v1/label/__name__/values", &[])
            .await
            .map_err(|e| TelemetryError::CatalogFailed {
                source_kind: KIND.to_string(),
                reason: e.to_string(),
            })?;

        let names = self.unwrap_envelope(envelope, None)?;
        tracing::info!(count = names.len(), "found metrics");
        Ok(names)
    }

    async fn fetch_data(&self, name: &str, range: TimeRange) -> VigilResult<String> {
        let escaped = escape_metric_name(name);
        tracing::debug!(metric = name, escaped = %escaped, "querying metric");

        let at = range.end().to_rfc3339_opts(SecondsFormat::Secs, true);
        let envelope: Envelope<QueryData> = self
            .http
            .get_json("/api/v1/query", &[("query", escaped), ("time", at)])
            .await?;

        let data = self.unwrap_envelope(envelope, Some(name))?;
        let rendered = render_query_data(name, &data);
        if rendered.is_empty() {
            tracing::warn!(metric = name, "empty result for metric");
        }
        Ok(rendered)
    }
}

/// Prometheus metric names cannot contain dots.
pub(crate) fn escape_metric_name(name: &str) -> String {
    name.replace('.', "_")
}

fn render_labels(labels: &BTreeMap<String, String>) -> String {
    let parts: Vec<String> = labels
        .iter()
        .filter(|(k, _)| k.as_str() != "__name__")
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();

    if parts.is_empty() {
        String::new()
    } else {
        format!("{{{}}}", parts.join(", "))
    }
}

fn render_timestamp(secs: f64) -> String {
    let whole = secs.trunc() as i64;
    let nanos = (secs.fract() * 1e9) as u32;
    DateTime::from_timestamp(whole, nanos)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| secs.to_string())
}

fn render_query_data(name: &str, data: &QueryData) -> String {
    let mut out = String::new();
    match data {
        QueryData::Vector(samples) => {
            for sample in samples {
                let _ = writeln!(
                    out,
                    "{}{}: {}",
                    name,
                    render_labels(&sample.metric),
                    sample.value.1
                );
            }
        }
        QueryData::Matrix(streams) => {
            for stream in streams {
                let _ = writeln!(out, "{}{}:", name, render_labels(&stream.metric));
                for (ts, value) in &stream.values {
                    let _ = writeln!(out, "  {}: {}", render_timestamp(*ts), value);
                }
            }
        }
        QueryData::Scalar(_) | QueryData::String(_) => {
            tracing::warn!(metric = name, "unexpected scalar result type");
        }
    }
    out
}
