//! Loki log source
//!
//! Signal names are the values of one stream label; data is the raw log lines.

use crate::{HttpQueryClient, TelemetrySource};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use vigil_core::{TelemetryError, TimeRange, VigilResult};

const KIND: &str = "loki";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct StreamsData {
    #[serde(default)]
    result: Vec<Stream>,
}

#[derive(Debug, Deserialize)]
struct Stream {
    /// (nanosecond timestamp, line)
    #[serde(default)]
    values: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct LokiSource {
    http: HttpQueryClient,
    label: String,
    line_limit: usize,
}

impl LokiSource {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        label: impl Into<String>,
        line_limit: usize,
    ) -> Self {
        Self {
            http: HttpQueryClient::new(KIND, base_url, timeout),
            label: label.into(),
            line_limit: line_limit.max(1),
        }
    }

    /// LogQL stream selector for one label value.
    fn selector(&self, value: &str) -> String {
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        format!("{{{}=\"{}\"}}", self.label, escaped)
    }
}

fn ensure_success<T>(envelope: Envelope<T>) -> VigilResult<Option<T>> {
    if envelope.status != "success" {
        return Err(TelemetryError::QueryRejected {
            source_kind: KIND.to_string(),
            status: envelope.status,
            message: "query did not succeed".to_string(),
        }
        .into());
    }
    Ok(envelope.data)
}

#[async_trait]
impl TelemetrySource for LokiSource {
    fn kind(&self) -> &'static str {
        KIND
    }

    async fn list_names(&self) -> VigilResult<Vec<String>> {
        let path = format!("/loki/api/v1/label/{}/values", self.label);
        let envelope: Envelope<Vec<String>> =
            self.http
                .get_json(&path, &[])
                .await
                .map_err(|e| TelemetryError::CatalogFailed {
                    source_kind: KIND.to_string(),
                    reason: e.to_string(),
                })?;
        Ok(ensure_success(envelope)?.unwrap_or_default())
    }

    async fn fetch_data(&self, name: &str, range: TimeRange) -> VigilResult<String> {
        let start_ns = range.start().timestamp_nanos_opt().unwrap_or_default();
        let end_ns = range.end().timestamp_nanos_opt().unwrap_or(i64::MAX);
        let query = [
            ("query", self.selector(name)),
            ("start", start_ns.to_string()),
            ("end", end_ns.to_string()),
            ("limit", self.line_limit.to_string()),
            ("direction", "backward".to_string()),
        ];
        let envelope: Envelope<StreamsData> = self
            .http
            .get_json("/loki/api/v1/query_range", &query)
            .await?;

        let data = ensure_success(envelope)?;
        Ok(data.map(|d| render_streams(&d)).unwrap_or_default())
    }
}

fn render_streams(data: &StreamsData) -> String {
    let mut entries: Vec<(&str, &str)> = data
        .result
        .iter()
        .flat_map(|s| s.values.iter().map(|(ts, line)| (ts.as_str(), line.as_str())))
        .collect();
    // Decimal nanosecond strings: shorter sorts first, then lexically.
    entries.sort_by(|a, b| a.0.len().cmp(&b.0.len()).then_with(|| a.0.cmp(b.0)));
    entries
        .into_iter()
        .map(|(_, line)| line)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_escapes_quotes() {
        let source = LokiSource::new("http://loki", Duration::from_secs(1), "job", 10);
        assert_eq!(source.selector("api"), "{job=\"api\"}");
        assert_eq!(source.selector("a\"b"), "{job=\"a\\\"b\"}");
    }

    #[test]
    fn test_render_streams_in_time_order() {
        let envelope: Envelope<StreamsData> = serde_json::from_str(
            r#"{"status":"success","data":{"resultType":"streams","result":[
                {"stream":{"job":"api"},"values":[["1704067260000000000","second"],["1704067200000000000","first"]]}
            ]}}"#,
        )
        .unwrap();
        let data = ensure_success(envelope).unwrap().unwrap();
        assert_eq!(render_streams(&data), "first\nsecond");
    }

    #[test]
    fn test_failed_status_rejected() {
        let envelope: Envelope<StreamsData> =
            serde_json::from_str(r#"{"status":"error"}"#).unwrap();
        assert!(ensure_success(envelope).is_err());
    }

    #[test]
    fn test_envelope_without_data_decodes_as_none() {
        let envelope: Envelope<StreamsData> =
            serde_json::from_str(r#"{"status":"success"}"#).unwrap();
        assert!(envelope.data.is_none());
    }
}
