//! Vigil Analyzer - the analysis pipeline
//!
//! Answers a natural-language question about system health over a time range:
//! cache lookup, context assembly, one inference dispatch, tolerant parsing,
//! cache store. Errors are never cached.

mod changes;
mod flight;

pub use changes::{load_change_history, ChangeHistoryError};

use chrono::{DateTime, Utc};
use flight::InFlight;
use std::sync::Arc;
use std::time::{Duration, Instant};
use vigil_cache::ResultCache;
use vigil_collectors::TelemetrySource;
use vigil_context::ContextAssembler;
use vigil_core::{
    AnalysisQuery, AnalysisResult, AnalyzerConfig, CacheKey, ParseMode, TimeRange,
    ValidationError, VigilResult,
};
use vigil_llm::{parse_response, ChangeHistory, InferenceProvider, PromptBuilder};

/// How a result was produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Served {
    /// Returned from the cache without any collaborator I/O
    Cache,
    /// Computed by the pipeline and stored
    Fresh {
        parse_mode: ParseMode,
        dispatch_latency: Duration,
    },
}

/// A result plus how it was obtained, for instrumentation.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    pub result: AnalysisResult,
    pub served: Served,
}

/// Orchestrates one analysis request end to end.
pub struct Analyzer {
    cache: Arc<ResultCache>,
    assembler: ContextAssembler,
    prompts: PromptBuilder,
    source: Arc<dyn TelemetrySource>,
    provider: Arc<dyn InferenceProvider>,
    changes: ChangeHistory,
    single_flight: bool,
    in_flight: InFlight,
}

impl Analyzer {
    /// Build an analyzer with a fresh cache sized by `config.cache_ttl`.
    pub fn new(
        config: &AnalyzerConfig,
        source: Arc<dyn TelemetrySource>,
        provider: Arc<dyn InferenceProvider>,
    ) -> VigilResult<Self> {
        let cache = Arc::new(ResultCache::new(config.cache_ttl));
        Self::with_cache(config, source, provider, cache)
    }

    /// Build an analyzer around an existing cache.
    pub fn with_cache(
        config: &AnalyzerConfig,
        source: Arc<dyn TelemetrySource>,
        provider: Arc<dyn InferenceProvider>,
        cache: Arc<ResultCache>,
    ) -> VigilResult<Self> {
        Ok(Self {
            cache,
            assembler: ContextAssembler::new(config)?,
            prompts: PromptBuilder::new(config),
            source,
            provider,
            changes: ChangeHistory::default(),
            single_flight: config.single_flight,
            in_flight: InFlight::new(),
        })
    }

    /// Attach the change history included in every prompt.
    pub fn with_change_history(mut self, changes: ChangeHistory) -> Self {
        self.changes = changes;
        self
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub fn change_history(&self) -> &ChangeHistory {
        &self.changes
    }

    /// Analyze `question` over `[start, end]` using `signals` (empty = all).
    ///
    /// # Errors
    /// - `VigilError::Validation` if the question is blank or `start > end`
    /// - `VigilError::Telemetry` if the signal catalog cannot be listed
    /// - `VigilError::Llm` if the single dispatch fails
    pub async fn analyze(
        &self,
        question: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        signals: Vec<String>,
    ) -> VigilResult<AnalysisResult> {
        let report = self.analyze_report(question, start, end, signals).await?;
        Ok(report.result)
    }

    /// Same as [`analyze`](Self::analyze) but reports whether the cache answered.
    pub async fn analyze_report(
        &self,
        question: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        signals: Vec<String>,
    ) -> VigilResult<AnalysisReport> {
        if question.trim().is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "question".to_string(),
            }
            .into());
        }
        let range = TimeRange::new(start, end)?;
        self.analyze_query(&AnalysisQuery::new(question, range, signals))
            .await
    }

    pub async fn analyze_query(&self, query: &AnalysisQuery) -> VigilResult<AnalysisReport> {
        let key = query.cache_key();

        if let Some(result) = self.cache.get_key(&key) {
            tracing::debug!(key_len = key.as_str().len(), "analysis served from cache");
            return Ok(cached(result));
        }

        if !self.single_flight {
            return self.compute(query, key).await;
        }

        let _permit = self.in_flight.acquire(&key).await;
        // Another caller may have filled the cache while we waited.
        // The miss was already counted above.
        if let Some(result) = self.cache.peek_key(&key) {
            tracing::debug!("analysis served from cache after in-flight wait");
            return Ok(cached(result));
        }
        self.compute(query, key).await
    }

    async fn compute(&self, query: &AnalysisQuery, key: CacheKey) -> VigilResult<AnalysisReport> {
        let window = self
            .assembler
            .assemble(self.source.as_ref(), query.range(), query.signals())
            .await?;

        let request = self.prompts.build(query.question(), &window, &self.changes);

        let started = Instant::now();
        let raw = self.provider.complete(&request).await.map_err(|e| {
            tracing::error!(
                provider = self.provider.provider_id(),
                error = %e,
                "failed to get chat completion"
            );
            e
        })?;
        let dispatch_latency = started.elapsed();

        let parsed = parse_response(&raw);
        if parsed.mode == ParseMode::Fallback {
            tracing::warn!(
                provider = self.provider.provider_id(),
                response_len = raw.len(),
                "failed to parse structured response, using raw text"
            );
        }

        tracing::info!(
            signals = window.len(),
            estimated_tokens = window.used_tokens,
            dispatch_ms = dispatch_latency.as_millis() as u64,
            parse_mode = parsed.mode.as_str(),
            "analysis completed"
        );

        self.cache.set_key(key, parsed.result.clone());

        Ok(AnalysisReport {
            result: parsed.result,
            served: Served::Fresh {
                parse_mode: parsed.mode,
                dispatch_latency,
            },
        })
    }
}

fn cached(result: AnalysisResult) -> AnalysisReport {
    AnalysisReport {
        result,
        served: Served::Cache,
    }
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("cache", &self.cache)
            .field("assembler", &self.assembler)
            .field("source", &self.source.kind())
            .field("provider", &self.provider.provider_id())
            .field("single_flight", &self.single_flight)
            .finish()
    }
}
