//! Vigil Core - shared types
//!
//! Queries, results, errors and configuration used by every other crate.
//! No I/O lives here.

mod analysis;
mod config;
mod error;
mod llm;
mod query;

pub use analysis::{clamp_confidence, AnalysisResult, ParseMode, DEFAULT_CONFIDENCE};
pub use config::{
    read_token_file, AnalyzerConfig, ChangeHistoryConfig, CollectorConfig, ProviderConfig,
    DEFAULT_IMPORTANT_SIGNALS,
};
pub use error::{ConfigError, LlmError, TelemetryError, ValidationError, VigilError, VigilResult};
pub use llm::{ChatMessage, CompletionRequest, Role};
pub use query::{AnalysisQuery, CacheKey, TimeRange};
