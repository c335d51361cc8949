//! Fan several sources into one catalog.

use crate::TelemetrySource;
use async_trait::async_trait;
use std::sync::Arc;
use vigil_core::{TimeRange, VigilResult};

const SEPARATOR: &str = "::";

/// Routes signal names across one primary and any number of secondary sources.
///
/// Primary names pass through unchanged. Secondary names are exposed as
/// `"<kind>::<name>"` and stripped of the prefix again on fetch. A secondary
/// catalog failure is logged and contributes nothing; a primary failure is fatal.
pub struct CompositeSource {
    primary: Arc<dyn TelemetrySource>,
    secondary: Vec<Arc<dyn TelemetrySource>>,
}

impl CompositeSource {
    pub fn new(primary: Arc<dyn TelemetrySource>) -> Self {
        Self {
            primary,
            secondary: Vec::new(),
        }
    }

    pub fn with_secondary(mut self, source: Arc<dyn TelemetrySource>) -> Self {
        self.secondary.push(source);
        self
    }

    /// Unknown prefixes are not stripped; the whole name goes to the primary.
    fn route<'a>(&'a self, name: &'a str) -> (&'a dyn TelemetrySource, &'a str) {
        if let Some((prefix, rest)) = name.split_once(SEPARATOR) {
            if let Some(source) = self.secondary.iter().find(|s| s.kind() == prefix) {
                return (source.as_ref(), rest);
            }
        }
        (self.primary.as_ref(), name)
    }
}

#[async_trait]
impl TelemetrySource for CompositeSource {
    fn kind(&self) -> &'static str {
        self.primary.kind()
    }

    async fn list_names(&self) -> VigilResult<Vec<String>> {
        let mut names = self.primary.list_names().await?;

        for source in &self.secondary {
            match source.list_names().await {
                Ok(extra) => names.extend(
                    extra
                        .into_iter()
                        .map(|n| format!("{}{}{}", source.kind(), SEPARATOR, n)),
                ),
                Err(e) => {
                    tracing::warn!(source = source.kind(), error = %e, "secondary catalog unavailable");
                }
            }
        }

        Ok(names)
    }

    async fn fetch_data(&self, name: &str, range: TimeRange) -> VigilResult<String> {
        let (source, local) = self.route(name);
        source.fetch_data(local, range).await
    }
}

impl std::fmt::Debug for CompositeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeSource")
            .field("primary", &self.primary.kind())
            .field(
                "secondary",
                &self.secondary.iter().map(|s| s.kind()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
