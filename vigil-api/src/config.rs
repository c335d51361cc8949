//! API Configuration Module
//!
//! Server, CORS and static-asset settings loaded from environment variables,
//! plus the optional YAML file that overrides a handful of them.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use vigil_core::{AnalyzerConfig, CollectorConfig, ProviderConfig};

use crate::error::{ApiError, ApiResult};

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    // ========================================================================
    // Listener
    // ========================================================================
    pub host: String,
    pub port: u16,

    /// Upper bound on one analyze request, including collaborator I/O.
    pub request_timeout: Duration,

    /// Directory served for any path the API does not handle.
    pub static_dir: PathBuf,

    // ========================================================================
    // CORS Configuration
    // ========================================================================
    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins.
    pub cors_origins: Vec<String>,

    /// Whether to allow credentials in CORS requests.
    pub cors_allow_credentials: bool,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout: Duration::from_secs(120),
            static_dir: PathBuf::from("static"),
            cors_origins: Vec::new(),
            cors_allow_credentials: false,
            cors_max_age_secs: 86400,
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `VIGIL_API_BIND`: listen host (default: 0.0.0.0)
    /// - `PORT` or `VIGIL_API_PORT`: listen port (default: 8080)
    /// - `VIGIL_REQUEST_TIMEOUT_SECS` (default: 120)
    /// - `VIGIL_STATIC_DIR` (default: static)
    /// - `VIGIL_CORS_ORIGINS`: comma-separated allowed origins (empty = allow all)
    /// - `VIGIL_CORS_ALLOW_CREDENTIALS`: "true" or "false" (default: false)
    /// - `VIGIL_CORS_MAX_AGE_SECS` (default: 86400)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = std::env::var("PORT")
            .or_else(|_| std::env::var("VIGIL_API_PORT"))
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(defaults.port);

        let cors_origins = std::env::var("VIGIL_CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            host: std::env::var("VIGIL_API_BIND").unwrap_or(defaults.host),
            port,
            request_timeout: std::env::var("VIGIL_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            static_dir: std::env::var("VIGIL_STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_dir),
            cors_origins,
            cors_allow_credentials: std::env::var("VIGIL_CORS_ALLOW_CREDENTIALS")
                .map(|s| s == "true" || s == "1")
                .unwrap_or(defaults.cors_allow_credentials),
            cors_max_age_secs: std::env::var("VIGIL_CORS_MAX_AGE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.cors_max_age_secs),
        }
    }

    /// Socket address to bind.
    pub fn bind_addr(&self) -> ApiResult<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| {
                ApiError::internal_error(format!(
                    "Invalid bind address {}:{}: {}",
                    self.host, self.port, e
                ))
            })
    }
}

// ============================================================================
// YAML FILE CONFIGURATION
// ============================================================================

/// Optional `config.yaml` overrides.
///
/// ```yaml
/// server:
///   port: 8080
/// prometheus:
///   url: http://prometheus:9090
/// openai:
///   model: gpt-4o-mini
///   base_url: https://api.openai.com/v1
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub server: ServerSection,
    pub prometheus: PrometheusSection,
    pub openai: OpenAiSection,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PrometheusSection {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct OpenAiSection {
    pub model: Option<String>,
    pub base_url: Option<String>,
}

impl FileConfig {
    pub fn from_yaml(text: &str) -> ApiResult<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Load the file named by `VIGIL_CONFIG` (default: `config.yaml`).
    /// A missing file yields no overrides.
    pub fn from_env() -> ApiResult<Self> {
        let path = std::env::var("VIGIL_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());
        Self::load(Path::new(&path))
    }

    pub fn load(path: &Path) -> ApiResult<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                tracing::info!(path = %path.display(), "loaded config file");
                Self::from_yaml(&text)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(ApiError::internal_error(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Overwrite the environment-derived settings with any values present in the file.
    pub fn apply(
        &self,
        api: &mut ApiConfig,
        collectors: &mut CollectorConfig,
        analyzer: &mut AnalyzerConfig,
        provider: &mut ProviderConfig,
    ) {
        if let Some(port) = self.server.port {
            api.port = port;
        }
        if let Some(url) = &self.prometheus.url {
            collectors.prometheus_url = url.clone();
        }
        if let Some(model) = &self.openai.model {
            analyzer.model = model.clone();
        }
        if let Some(base_url) = &self.openai.base_url {
            provider.base_url = base_url.clone();
        }
    }
}
