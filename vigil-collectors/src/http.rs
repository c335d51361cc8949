//! Shared JSON-over-HTTP client for the query APIs

use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use vigil_core::{TelemetryError, VigilResult};

/// Thin GET-only client bound to one backend base URL.
#[derive(Clone)]
pub struct HttpQueryClient {
    client: Client,
    base_url: String,
    kind: &'static str,
}

impl HttpQueryClient {
    pub fn new(kind: &'static str, base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            kind,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `path` with query parameters and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> VigilResult<T> {
        let url = format!("{}{}", self.base_url, path);
        tracing::trace!(source = self.kind, url = %url, "telemetry query");

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| self.rejected("transport", format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(self.rejected(status.as_str(), body));
        }

        response
            .json()
            .await
            .map_err(|e| self.rejected("decode", format!("Failed to parse response: {}", e)))
    }

    fn rejected(&self, status: &str, message: String) -> vigil_core::VigilError {
        TelemetryError::QueryRejected {
            source_kind: self.kind.to_string(),
            status: status.to_string(),
            message,
        }
        .into()
    }
}

impl std::fmt::Debug for HttpQueryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpQueryClient")
            .field("kind", &self.kind)
            .field("base_url", &self.base_url)
            .finish()
    }
}
