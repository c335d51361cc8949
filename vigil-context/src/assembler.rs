//! Pulls telemetry from a source into a budgeted [`ContextWindow`].

use crate::window::{BudgetPolicy, ContextWindow};
use futures_util::stream::{self, StreamExt};
use vigil_collectors::TelemetrySource;
use vigil_core::{AnalyzerConfig, TimeRange, VigilResult};

/// Context assembler that builds context windows from telemetry sources.
/// Offers signals in request order until the budget is exhausted.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    policy: BudgetPolicy,
    fetch_concurrency: usize,
}

impl ContextAssembler {
    /// Create an assembler from validated analyzer configuration.
    pub fn new(config: &AnalyzerConfig) -> VigilResult<Self> {
        config.validate()?;
        Ok(Self::with_policy(
            BudgetPolicy::new(
                config.token_budget,
                config.baseline_tokens,
                config.important_signals.iter().cloned(),
            ),
            config.fetch_concurrency,
        ))
    }

    pub fn with_policy(policy: BudgetPolicy, fetch_concurrency: usize) -> Self {
        Self {
            policy,
            fetch_concurrency: fetch_concurrency.max(1),
        }
    }

    pub fn policy(&self) -> &BudgetPolicy {
        &self.policy
    }

    pub fn token_budget(&self) -> usize {
        self.policy.max_tokens
    }

    /// Assemble context for `signals` over `range`.
    ///
    /// An empty `signals` list resolves the source's full catalog first; a
    /// catalog failure is the only error this returns. Individual fetch
    /// failures are logged and the signal is skipped.
    pub async fn assemble(
        &self,
        source: &dyn TelemetrySource,
        range: TimeRange,
        signals: &[String],
    ) -> VigilResult<ContextWindow> {
        let catalog;
        let names: &[String] = if signals.is_empty() {
            catalog = source.list_names().await?;
            tracing::debug!(count = catalog.len(), "resolved full signal catalog");
            &catalog
        } else {
            signals
        };

        let mut window = ContextWindow::new(self.policy.max_tokens);

        if self.fetch_concurrency == 1 {
            for name in names {
                // Saturation can only grow, so skip the fetch outright.
                if window.is_saturated() && !self.policy.is_important(name) {
                    window.skip(name, "No budget remaining");
                    continue;
                }
                let result = source.fetch_data(name, range).await;
                self.admit(&mut window, source, name, result);
            }
        } else {
            let mut fetches = stream::iter(names)
                .map(|name| async move { (name, source.fetch_data(name, range).await) })
                .buffered(self.fetch_concurrency)
                .boxed();

            while let Some((name, result)) = fetches.next().await {
                self.admit(&mut window, source, name, result);
            }
        }

        tracing::debug!(
            total_signals = window.len(),
            estimated_tokens = window.used_tokens,
            "collected telemetry context"
        );

        Ok(window)
    }

    fn admit(
        &self,
        window: &mut ContextWindow,
        source: &dyn TelemetrySource,
        name: &str,
        result: VigilResult<String>,
    ) {
        match result {
            Ok(data) => {
                window.offer(&self.policy, name, &data);
            }
            Err(e) => {
                tracing::warn!(
                    source = source.kind(),
                    signal = name,
                    error = %e,
                    "failed to get signal data"
                );
                window.skip(name, format!("Fetch failed: {}", e));
            }
        }
    }
}
