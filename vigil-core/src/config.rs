//! Configuration types

use crate::{ConfigError, VigilResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Signals that are always admitted into the context, whatever the budget.
pub const DEFAULT_IMPORTANT_SIGNALS: [&str; 4] = [
    "machine_cpu_cores",
    "machine_cpu_physical_cores",
    "machine_memory_bytes",
    "grpc_server_handled_total",
];

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_list(key: &str) -> Option<Vec<String>> {
    std::env::var(key).ok().map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

// ============================================================================
// ANALYZER
// ============================================================================

/// Pipeline configuration: budget, model, cache and concurrency knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Ceiling on estimated input tokens for the assembled context
    pub token_budget: usize,
    /// Fixed per-block token reserve added to every estimate
    pub baseline_tokens: usize,
    pub important_signals: Vec<String>,
    pub model: String,
    pub max_output_tokens: u32,
    pub cache_ttl: Duration,
    pub cleanup_interval: Duration,
    /// Maximum concurrent telemetry fetches per request (1 = sequential)
    pub fetch_concurrency: usize,
    /// Collapse concurrent identical cache misses into one dispatch
    pub single_flight: bool,
    /// Character cap on the change-history diff excerpt
    pub diff_char_limit: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            token_budget: 20_000,
            baseline_tokens: 100,
            important_signals: DEFAULT_IMPORTANT_SIGNALS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            model: "gpt-4o-mini".to_string(),
            max_output_tokens: 2000,
            cache_ttl: Duration::from_secs(30 * 60),
            cleanup_interval: Duration::from_secs(5 * 60),
            fetch_concurrency: 1,
            single_flight: true,
            diff_char_limit: 2000,
        }
    }
}

impl AnalyzerConfig {
    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `VIGIL_TOKEN_BUDGET` (default: 20000)
    /// - `VIGIL_BASELINE_TOKENS` (default: 100)
    /// - `VIGIL_IMPORTANT_SIGNALS`: comma-separated list
    /// - `VIGIL_MODEL` (default: gpt-4o-mini)
    /// - `VIGIL_MAX_OUTPUT_TOKENS` (default: 2000)
    /// - `VIGIL_CACHE_TTL_SECS` (default: 1800)
    /// - `VIGIL_CACHE_CLEANUP_SECS` (default: 300)
    /// - `VIGIL_FETCH_CONCURRENCY` (default: 1)
    /// - `VIGIL_SINGLE_FLIGHT` (default: true)
    /// - `VIGIL_DIFF_CHAR_LIMIT` (default: 2000)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            token_budget: env_or("VIGIL_TOKEN_BUDGET", defaults.token_budget),
            baseline_tokens: env_or("VIGIL_BASELINE_TOKENS", defaults.baseline_tokens),
            important_signals: env_list("VIGIL_IMPORTANT_SIGNALS")
                .unwrap_or(defaults.important_signals),
            model: env_opt("VIGIL_MODEL").unwrap_or(defaults.model),
            max_output_tokens: env_or("VIGIL_MAX_OUTPUT_TOKENS", defaults.max_output_tokens),
            cache_ttl: Duration::from_secs(env_or(
                "VIGIL_CACHE_TTL_SECS",
                defaults.cache_ttl.as_secs(),
            )),
            cleanup_interval: Duration::from_secs(env_or(
                "VIGIL_CACHE_CLEANUP_SECS",
                defaults.cleanup_interval.as_secs(),
            )),
            fetch_concurrency: env_or("VIGIL_FETCH_CONCURRENCY", defaults.fetch_concurrency),
            single_flight: env_or("VIGIL_SINGLE_FLIGHT", defaults.single_flight),
            diff_char_limit: env_or("VIGIL_DIFF_CHAR_LIMIT", defaults.diff_char_limit),
        }
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - token_budget, max_output_tokens and fetch_concurrency > 0
    /// - cache_ttl and cleanup_interval are positive
    /// - model is not blank
    pub fn validate(&self) -> VigilResult<()> {
        if self.token_budget == 0 {
            return Err(invalid("token_budget", "0", "token_budget must be greater than 0"));
        }

        if self.max_output_tokens == 0 {
            return Err(invalid(
                "max_output_tokens",
                "0",
                "max_output_tokens must be greater than 0",
            ));
        }

        if self.fetch_concurrency == 0 {
            return Err(invalid(
                "fetch_concurrency",
                "0",
                "fetch_concurrency must be at least 1",
            ));
        }

        if self.cache_ttl.is_zero() {
            return Err(invalid(
                "cache_ttl",
                &format!("{:?}", self.cache_ttl),
                "cache_ttl must be positive",
            ));
        }

        if self.cleanup_interval.is_zero() {
            return Err(invalid(
                "cleanup_interval",
                &format!("{:?}", self.cleanup_interval),
                "cleanup_interval must be positive",
            ));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "model".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

fn invalid(field: &str, value: &str, reason: &str) -> crate::VigilError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

// ============================================================================
// INFERENCE PROVIDER
// ============================================================================

/// Connection settings for an OpenAI-compatible inference endpoint.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: String,
    pub requests_per_minute: u32,
    pub request_timeout: Duration,
}

impl ProviderConfig {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com/v1";
    pub const DEFAULT_TOKEN_FILE: &'static str = "../.token_key";

    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            requests_per_minute: 60,
            request_timeout: Duration::from_secs(120),
        }
    }

    /// Load from the environment.
    ///
    /// - `VIGIL_LLM_BASE_URL` (default: the public OpenAI endpoint)
    /// - `VIGIL_LLM_API_KEY`, or the contents of the file named by
    ///   `VIGIL_LLM_TOKEN_FILE` (default: `../.token_key`), trimmed
    /// - `VIGIL_LLM_RPM` (default: 60)
    /// - `VIGIL_LLM_TIMEOUT_SECS` (default: 120)
    pub fn from_env() -> VigilResult<Self> {
        let base_url =
            env_opt("VIGIL_LLM_BASE_URL").unwrap_or_else(|| Self::DEFAULT_BASE_URL.to_string());

        let api_key = match env_opt("VIGIL_LLM_API_KEY") {
            Some(key) => key,
            None => {
                let path = env_opt("VIGIL_LLM_TOKEN_FILE")
                    .unwrap_or_else(|| Self::DEFAULT_TOKEN_FILE.to_string());
                read_token_file(Path::new(&path))?
            }
        };

        let mut config = Self::new(base_url, api_key);
        config.requests_per_minute = env_or("VIGIL_LLM_RPM", config.requests_per_minute);
        config.request_timeout = Duration::from_secs(env_or(
            "VIGIL_LLM_TIMEOUT_SECS",
            config.request_timeout.as_secs(),
        ));
        Ok(config)
    }
}

/// Read an API key from a file, trimming surrounding whitespace.
pub fn read_token_file(path: &Path) -> VigilResult<String> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let token = raw.trim();
    if token.is_empty() {
        return Err(ConfigError::MissingRequired {
            field: format!("api key in {}", path.display()),
        }
        .into());
    }
    Ok(token.to_string())
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("requests_per_minute", &self.requests_per_minute)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

// ============================================================================
// TELEMETRY SOURCES
// ============================================================================

/// Endpoints for the telemetry backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorConfig {
    pub prometheus_url: String,
    pub jaeger_url: Option<String>,
    pub loki_url: Option<String>,
    /// Label whose values name Loki streams
    pub loki_label: String,
    pub loki_line_limit: usize,
    pub jaeger_trace_limit: usize,
    pub http_timeout: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            prometheus_url: "http://localhost:9090".to_string(),
            jaeger_url: None,
            loki_url: None,
            loki_label: "job".to_string(),
            loki_line_limit: 100,
            jaeger_trace_limit: 20,
            http_timeout: Duration::from_secs(30),
        }
    }
}

impl CollectorConfig {
    /// Environment variables:
    /// - `VIGIL_PROMETHEUS_URL` (default: http://localhost:9090)
    /// - `VIGIL_JAEGER_URL`, `VIGIL_LOKI_URL` (unset disables the source)
    /// - `VIGIL_LOKI_LABEL` (default: job)
    /// - `VIGIL_LOKI_LINE_LIMIT` (default: 100)
    /// - `VIGIL_JAEGER_TRACE_LIMIT` (default: 20)
    /// - `VIGIL_COLLECTOR_TIMEOUT_SECS` (default: 30)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            prometheus_url: env_opt("VIGIL_PROMETHEUS_URL").unwrap_or(defaults.prometheus_url),
            jaeger_url: env_opt("VIGIL_JAEGER_URL"),
            loki_url: env_opt("VIGIL_LOKI_URL"),
            loki_label: env_opt("VIGIL_LOKI_LABEL").unwrap_or(defaults.loki_label),
            loki_line_limit: env_or("VIGIL_LOKI_LINE_LIMIT", defaults.loki_line_limit),
            jaeger_trace_limit: env_or("VIGIL_JAEGER_TRACE_LIMIT", defaults.jaeger_trace_limit),
            http_timeout: Duration::from_secs(env_or(
                "VIGIL_COLLECTOR_TIMEOUT_SECS",
                defaults.http_timeout.as_secs(),
            )),
        }
    }
}

/// Where the change-history reader runs git.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeHistoryConfig {
    pub enabled: bool,
    pub repo_dir: PathBuf,
    /// Pathspecs passed to `git diff`
    pub diff_paths: Vec<String>,
}

impl Default for ChangeHistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            repo_dir: PathBuf::from("."),
            diff_paths: vec![
                "*.rs".to_string(),
                "*.yaml".to_string(),
                "*.json".to_string(),
                "*.md".to_string(),
            ],
        }
    }
}

impl ChangeHistoryConfig {
    /// - `VIGIL_CHANGE_HISTORY` (default: true)
    /// - `VIGIL_REPO_DIR` (default: .)
    /// - `VIGIL_DIFF_PATHS`: comma-separated pathspecs
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            enabled: env_or("VIGIL_CHANGE_HISTORY", defaults.enabled),
            repo_dir: env_opt("VIGIL_REPO_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.repo_dir),
            diff_paths: env_list("VIGIL_DIFF_PATHS").unwrap_or(defaults.diff_paths),
        }
    }
}
