//! Vigil Test Utilities
//!
//! Shared test infrastructure for the Vigil workspace:
//! - Mock telemetry source and inference provider with call counters
//! - A manually driven clock for TTL tests
//! - Proptest generators for queries, ranges and results
//! - Fixtures and assertions for common scenarios

pub use vigil_cache::{Clock, ManualClock};
pub use vigil_core::{
    AnalysisQuery, AnalysisResult, CompletionRequest, LlmError, TelemetryError, TimeRange,
    VigilError, VigilResult,
};

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use vigil_collectors::TelemetrySource;
use vigil_llm::InferenceProvider;

// ============================================================================
// MOCK TELEMETRY SOURCE
// ============================================================================

/// In-memory [`TelemetrySource`] with scripted data and failures.
///
/// Signals are listed in the order they were added.
#[derive(Debug, Default)]
pub struct MockSource {
    data: HashMap<String, Option<String>>,
    catalog: Vec<String>,
    catalog_fails: bool,
    delay: Option<Duration>,
    fetches: AtomicUsize,
    catalog_calls: AtomicUsize,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `data` for `name`.
    pub fn with_signal(mut self, name: impl Into<String>, data: impl Into<String>) -> Self {
        let name = name.into();
        self.catalog.push(name.clone());
        self.data.insert(name, Some(data.into()));
        self
    }

    /// List `name`, but fail every fetch of it.
    pub fn with_failing_signal(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.catalog.push(name.clone());
        self.data.insert(name, None);
        self
    }

    pub fn with_failing_catalog(mut self) -> Self {
        self.catalog_fails = true;
        self
    }

    /// Sleep before answering each fetch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn catalog_count(&self) -> usize {
        self.catalog_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TelemetrySource for MockSource {
    fn kind(&self) -> &'static str {
        "mock"
    }

    async fn list_names(&self) -> VigilResult<Vec<String>> {
        self.catalog_calls.fetch_add(1, Ordering::SeqCst);
        if self.catalog_fails {
            return Err(TelemetryError::CatalogFailed {
                source_kind: "mock".to_string(),
                reason: "catalog unavailable".to_string(),
            }
            .into());
        }
        Ok(self.catalog.clone())
    }

    async fn fetch_data(&self, name: &str, _range: TimeRange) -> VigilResult<String> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.data.get(name) {
            Some(Some(data)) => Ok(data.clone()),
            Some(None) => Err(TelemetryError::FetchFailed {
                source_kind: "mock".to_string(),
                signal: name.to_string(),
                reason: "scripted failure".to_string(),
            }
            .into()),
            None => Ok(String::new()),
        }
    }
}

// ============================================================================
// MOCK INFERENCE PROVIDER
// ============================================================================

/// [`InferenceProvider`] that returns scripted replies and counts calls.
///
/// Queued replies are consumed first; after that every call gets the default.
#[derive(Debug)]
pub struct MockProvider {
    queued: Mutex<VecDeque<Result<String, LlmError>>>,
    default_reply: Result<String, LlmError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    last_request: Mutex<Option<CompletionRequest>>,
}

impl MockProvider {
    pub fn replying(text: impl Into<String>) -> Self {
        Self::with_default(Ok(text.into()))
    }

    pub fn failing(error: LlmError) -> Self {
        Self::with_default(Err(error))
    }

    fn with_default(default_reply: Result<String, LlmError>) -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
            default_reply,
            delay: None,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Answer the next unanswered call with `reply` before falling back to the default.
    pub fn then_reply(self, reply: Result<String, LlmError>) -> Self {
        if let Ok(mut queued) = self.queued.lock() {
            queued.push_back(reply);
        }
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.last_request.lock().ok().and_then(|r| r.clone())
    }
}

#[async_trait]
impl InferenceProvider for MockProvider {
    fn provider_id(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: &CompletionRequest) -> VigilResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(request.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let reply = self
            .queued
            .lock()
            .ok()
            .and_then(|mut queued| queued.pop_front())
            .unwrap_or_else(|| self.default_reply.clone());
        reply.map_err(VigilError::from)
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for Vigil types.

    use super::*;
    use chrono::{DateTime, Utc};
    use proptest::prelude::*;

    /// Prometheus-style metric name.
    pub fn arb_signal_name() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,30}"
    }

    /// Signal payload, sometimes empty.
    pub fn arb_signal_data() -> impl Strategy<Value = String> {
        prop_oneof![
            1 => Just(String::new()),
            4 => "[ -~]{1,400}",
        ]
    }

    /// Timestamp between 2020 and 2030.
    pub fn arb_timestamp() -> impl Strategy<Value = DateTime<Utc>> {
        (1_577_836_800i64..1_893_456_000i64)
            .prop_map(|secs| DateTime::from_timestamp(secs, 0).unwrap_or_default())
    }

    /// Well-ordered range of up to one day.
    pub fn arb_time_range() -> impl Strategy<Value = TimeRange> {
        (arb_timestamp(), 0i64..86_400).prop_filter_map("range must be ordered", |(start, len)| {
            TimeRange::new(start, start + chrono::Duration::seconds(len)).ok()
        })
    }

    pub fn arb_query() -> impl Strategy<Value = AnalysisQuery> {
        (
            "[a-zA-Z ?]{1,60}",
            arb_time_range(),
            prop::collection::vec(arb_signal_name(), 0..5),
        )
            .prop_map(|(question, range, signals)| AnalysisQuery::new(question, range, signals))
    }

    pub fn arb_analysis_result() -> impl Strategy<Value = AnalysisResult> {
        (
            "[ -~]{0,200}",
            0.0f64..=1.0,
            prop::collection::vec("[ -~]{1,40}", 0..4),
            prop::collection::vec(arb_signal_name(), 0..4),
        )
            .prop_map(|(analysis, confidence, suggestions, relevant_metrics)| AnalysisResult {
                analysis,
                confidence,
                suggestions,
                relevant_metrics,
            })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built values for common scenarios.

    use super::*;
    use chrono::{TimeZone, Utc};

    /// 2024-01-01T00:00:00Z to 2024-01-01T01:00:00Z.
    pub fn hour_range() -> TimeRange {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap();
        TimeRange::new(start, end).expect("fixture range is ordered")
    }

    pub fn query(question: &str, signals: &[&str]) -> AnalysisQuery {
        AnalysisQuery::new(
            question,
            hour_range(),
            signals.iter().map(|s| s.to_string()).collect(),
        )
    }

    /// A reply in the exact shape the provider is asked for.
    pub const STRUCTURED_REPLY: &str = r#"{"analysis":"ok","confidence":0.9,"suggestions":[],"relevant_metrics":[]}"#;

    pub fn structured_result() -> AnalysisResult {
        AnalysisResult {
            analysis: "ok".to_string(),
            confidence: 0.9,
            suggestions: Vec::new(),
            relevant_metrics: Vec::new(),
        }
    }

    pub fn upstream_failure() -> LlmError {
        LlmError::RequestFailed {
            provider: "mock".to_string(),
            status: 503,
            message: "upstream unavailable".to_string(),
        }
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for Vigil results.

    use super::*;

    #[track_caller]
    pub fn assert_confidence_in_range(result: &AnalysisResult) {
        assert!(
            (0.0..=1.0).contains(&result.confidence),
            "confidence out of range: {}",
            result.confidence
        );
    }

    #[track_caller]
    pub fn assert_llm_error<T: std::fmt::Debug>(result: &VigilResult<T>) {
        match result {
            Err(VigilError::Llm(_)) => {}
            other => panic!("Expected Llm error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &VigilResult<T>) {
        match result {
            Err(VigilError::Validation(_)) => {}
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use vigil_core::ChatMessage;

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: "m".to_string(),
            messages: vec![ChatMessage::user("hi")],
            max_tokens: 10,
            temperature: None,
        }
    }

    #[tokio::test]
    async fn test_mock_source_scripted() {
        let source = MockSource::new()
            .with_signal("a", "X")
            .with_failing_signal("b");
        let range = fixtures::hour_range();

        assert_eq!(source.list_names().await.unwrap(), vec!["a", "b"]);
        assert_eq!(source.fetch_data("a", range).await.unwrap(), "X");
        assert!(source.fetch_data("b", range).await.is_err());
        assert_eq!(source.fetch_data("unknown", range).await.unwrap(), "");
        assert_eq!(source.fetch_count(), 3);
    }

    #[tokio::test]
    async fn test_mock_source_failing_catalog() {
        let source = MockSource::new().with_failing_catalog();
        assert!(source.list_names().await.is_err());
        assert_eq!(source.catalog_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_provider_queue_then_default() {
        let provider = MockProvider::replying("default")
            .then_reply(Err(fixtures::upstream_failure()));

        assertions::assert_llm_error(&provider.complete(&request()).await);
        assert_eq!(provider.complete(&request()).await.unwrap(), "default");
        assert_eq!(provider.call_count(), 2);
        assert_eq!(provider.last_request(), Some(request()));
    }

    #[test]
    fn test_structured_fixture_matches_parser() {
        let parsed = vigil_llm::parse_response(fixtures::STRUCTURED_REPLY);
        assert_eq!(parsed.result, fixtures::structured_result());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_generated_ranges_are_ordered(range in generators::arb_time_range()) {
            prop_assert!(range.start() <= range.end());
        }

        #[test]
        fn prop_generated_results_are_in_range(result in generators::arb_analysis_result()) {
            assertions::assert_confidence_in_range(&result);
        }
    }
}
