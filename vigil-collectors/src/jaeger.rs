//! Jaeger query-service source
//!
//! Signal names are service names; data is one line per span.

use crate::{HttpQueryClient, TelemetrySource};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use vigil_core::{TelemetryError, TimeRange, VigilResult};

const KIND: &str = "jaeger";

#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Option<Vec<JaegerErrorItem>>,
}

#[derive(Debug, Deserialize)]
struct JaegerErrorItem {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    msg: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Trace {
    #[serde(rename = "traceID")]
    trace_id: String,
    #[serde(default)]
    spans: Vec<Span>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Span {
    #[serde(rename = "traceID")]
    trace_id: Option<String>,
    #[serde(rename = "spanID")]
    span_id: String,
    operation_name: String,
    /// Microseconds since epoch
    start_time: i64,
    /// Microseconds
    duration: i64,
    #[serde(rename = "processID", default)]
    process_id: String,
}

/// Reads services and spans from the Jaeger HTTP query API.
#[derive(Debug, Clone)]
pub struct JaegerSource {
    http: HttpQueryClient,
    trace_limit: usize,
}

impl JaegerSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration, trace_limit: usize) -> Self {
        Self {
            http: HttpQueryClient::new(KIND, base_url, timeout),
            trace_limit: trace_limit.max(1),
        }
    }
}

fn check_errors<T>(envelope: DataEnvelope<T>) -> VigilResult<Option<T>> {
    if let Some(first) = envelope.errors.as_ref().and_then(|e| e.first()) {
        return Err(TelemetryError::QueryRejected {
            source_kind: KIND.to_string(),
            status: first.code.to_string(),
            message: first.msg.clone(),
        }
        .into());
    }
    Ok(envelope.data)
}

#[async_trait]
impl TelemetrySource for JaegerSource {
    fn kind(&self) -> &'static str {
        KIND
    }

    async fn list_names(&self) -> VigilResult<Vec<String>> {
        let envelope: DataEnvelope<Vec<String>> = self
            .http
            .get_json("/api/services", &[])
            .await
            .map_err(|e| TelemetryError::CatalogFailed {
                source_kind: KIND.to_string(),
                reason: e.to_string(),
            })?;
        Ok(check_errors(envelope)?.unwrap_or_default())
    }

    async fn fetch_data(&self, name: &str, range: TimeRange) -> VigilResult<String> {
        let query = [
            ("service", name.to_string()),
            ("start", range.start().timestamp_micros().to_string()),
            ("end", range.end().timestamp_micros().to_string()),
            ("limit", self.trace_limit.to_string()),
        ];
        let envelope: DataEnvelope<Vec<Trace>> =
            self.http.get_json("/api/traces", &query).await?;

        let traces = check_errors(envelope)?.unwrap_or_default();
        Ok(render_traces(name, &traces))
    }
}

fn render_duration(micros: i64) -> String {
    format!("{:?}", Duration::from_micros(micros.max(0) as u64))
}

fn render_start(micros: i64) -> String {
    chrono::DateTime::from_timestamp_micros(micros)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| micros.to_string())
}

fn render_traces(service: &str, traces: &[Trace]) -> String {
    let mut lines = Vec::new();
    for trace in traces {
        for span in &trace.spans {
            lines.push(format!(
                "Trace: [ServiceName={};TraceID={};SpanID={};Duration={};StartTime={};ProcessID={};OperationName={}]",
                service,
                span.trace_id.as_deref().unwrap_or(&trace.trace_id),
                span.span_id,
                render_duration(span.duration),
                render_start(span.start_time),
                span.process_id,
                span.operation_name,
            ));
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_traces() {
        let envelope: DataEnvelope<Vec<Trace>> = serde_json::from_str(
            r#"{"data":[{"traceID":"abc","spans":[
                {"traceID":"abc","spanID":"s1","operationName":"GET /","startTime":1704067200000000,"duration":1500,"processID":"p1"}
            ]}]}"#,
        )
        .unwrap();
        let traces = check_errors(envelope).unwrap().unwrap();
        let out = render_traces("api", &traces);
        assert_eq!(
            out,
            "Trace: [ServiceName=api;TraceID=abc;SpanID=s1;Duration=1.5ms;StartTime=2024-01-01T00:00:00+00:00;ProcessID=p1;OperationName=GET /]"
        );
    }

    #[test]
    fn test_no_traces_renders_empty() {
        assert_eq!(render_traces("api", &[]), "");
    }

    #[test]
    fn test_error_items_rejected() {
        let envelope: DataEnvelope<Vec<Trace>> =
            serde_json::from_str(r#"{"data":null,"errors":[{"code":400,"msg":"bad service"}]}"#)
                .unwrap();
        let err = check_errors(envelope).unwrap_err();
        assert!(err.to_string().contains("bad service"));
    }
}
