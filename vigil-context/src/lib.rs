//! Vigil Context - Context Assembly
//!
//! Turns a list of telemetry signals and a time range into an ordered,
//! token-budgeted text block. Important signals are never dropped for budget
//! reasons and always lead the output.

mod assembler;
mod tokens;
mod window;

pub use assembler::ContextAssembler;
pub use tokens::{estimate_tokens, safe_truncate, truncate_with_marker, TRUNCATION_MARKER};
pub use window::{AssemblyAction, AssemblyDecision, BudgetPolicy, ContextWindow, SignalBlock};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use vigil_collectors::TelemetrySource;
    use vigil_core::{AnalyzerConfig, TelemetryError, TimeRange, VigilResult};

    #[derive(Default)]
    struct MapSource {
        data: HashMap<String, Option<String>>,
        catalog: Vec<String>,
        fetches: AtomicUsize,
    }

    impl MapSource {
        fn with(mut self, name: &str, data: Option<&str>) -> Self {
            self.data.insert(name.to_string(), data.map(str::to_string));
            self.catalog.push(name.to_string());
            self
        }
    }

    #[async_trait]
    impl TelemetrySource for MapSource {
        fn kind(&self) -> &'static str {
            "map"
        }

        async fn list_names(&self) -> VigilResult<Vec<String>> {
            Ok(self.catalog.clone())
        }

        async fn fetch_data(&self, name: &str, _range: TimeRange) -> VigilResult<String> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            match self.data.get(name) {
                Some(Some(d)) => Ok(d.clone()),
                _ => Err(TelemetryError::FetchFailed {
                    source_kind: "map".to_string(),
                    signal: name.to_string(),
                    reason: "unavailable".to_string(),
                }
                .into()),
            }
        }
    }

    fn range() -> TimeRange {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap();
        TimeRange::new(start, end).unwrap()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_context_assembler_basic() -> VigilResult<()> {
        let source = MapSource::default()
            .with("a", Some("X"))
            .with("b", Some(""));
        let assembler = ContextAssembler::new(&AnalyzerConfig::default())?;
        let window = assembler
            .assemble(&source, range(), &names(&["a", "b"]))
            .await?;
        assert_eq!(window.as_text(), "Metric: X\n");
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_failure_skips_signal() -> VigilResult<()> {
        let source = MapSource::default()
            .with("a", None)
            .with("b", Some("2"));
        let assembler = ContextAssembler::new(&AnalyzerConfig::default())?;
        let window = assembler
            .assemble(&source, range(), &names(&["a", "b"]))
            .await?;
        assert_eq!(window.signal_names(), vec!["b"]);
        assert!(window
            .assembly_trace
            .iter()
            .any(|d| d.signal == "a" && d.action == AssemblyAction::Exclude));
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_list_uses_catalog() -> VigilResult<()> {
        let source = MapSource::default()
            .with("a", Some("1"))
            .with("machine_memory_bytes", Some("2"));
        let assembler = ContextAssembler::new(&AnalyzerConfig::default())?;
        let window = assembler.assemble(&source, range(), &[]).await?;
        assert_eq!(window.signal_names(), vec!["machine_memory_bytes", "a"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_saturated_window_skips_fetch() -> VigilResult<()> {
        let source = MapSource::default()
            .with("machine_cpu_cores", Some("8"))
            .with("a", Some("1"))
            .with("b", Some("2"));
        let assembler = ContextAssembler::with_policy(
            BudgetPolicy::new(100, 100, names(&["machine_cpu_cores"])),
            1,
        );
        let window = assembler
            .assemble(&source, range(), &names(&["machine_cpu_cores", "a", "b"]))
            .await?;
        assert_eq!(window.signal_names(), vec!["machine_cpu_cores"]);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_tiny_budget_keeps_only_important() -> VigilResult<()> {
        let big = "x".repeat(600);
        let source = MapSource::default()
            .with("a", Some(&big))
            .with("b", Some("y"))
            .with("machine_cpu_cores", Some("8"));
        let assembler = ContextAssembler::with_policy(
            BudgetPolicy::new(100, 100, names(&["machine_cpu_cores"])),
            1,
        );
        let window = assembler
            .assemble(&source, range(), &names(&["a", "b", "machine_cpu_cores"]))
            .await?;
        assert_eq!(window.signal_names(), vec!["machine_cpu_cores"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_fetch_matches_sequential_order() -> VigilResult<()> {
        let source = MapSource::default()
            .with("a", Some("1"))
            .with("b", Some("2"))
            .with("machine_cpu_cores", Some("8"))
            .with("c", Some("3"));
        let list = names(&["a", "b", "machine_cpu_cores", "c"]);

        let sequential = ContextAssembler::new(&AnalyzerConfig::default())?;
        let parallel = ContextAssembler::new(&AnalyzerConfig {
            fetch_concurrency: 4,
            ..AnalyzerConfig::default()
        })?;

        let a = sequential.assemble(&source, range(), &list).await?;
        let b = parallel.assemble(&source, range(), &list).await?;
        assert_eq!(a.as_text(), b.as_text());
        assert_eq!(a.signal_names(), vec!["machine_cpu_cores", "a", "b", "c"]);
        Ok(())
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    const IMPORTANT: [&str; 2] = ["machine_cpu_cores", "machine_memory_bytes"];

    fn arb_signal() -> impl Strategy<Value = (String, String)> {
        (
            prop_oneof![
                Just("machine_cpu_cores".to_string()),
                Just("machine_memory_bytes".to_string()),
                "[a-z]{1,8}",
            ],
            "[ -~]{0,400}",
        )
    }

    fn policy(max: usize) -> BudgetPolicy {
        BudgetPolicy::new(max, 100, IMPORTANT.iter().map(|s| s.to_string()))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_important_signals_always_present(
            signals in prop::collection::vec(arb_signal(), 0..20),
            budget in 0usize..2000,
        ) {
            let p = policy(budget);
            let mut window = ContextWindow::new(budget);
            for (name, data) in &signals {
                window.offer(&p, name, data);
            }
            let included = window.signal_names();
            for (name, data) in &signals {
                if p.is_important(name) && !data.is_empty() {
                    prop_assert!(included.contains(&name.as_str()));
                }
            }
        }

        #[test]
        fn prop_non_important_usage_within_budget(
            signals in prop::collection::vec(arb_signal(), 0..20),
            budget in 0usize..2000,
        ) {
            let p = policy(budget);
            let mut window = ContextWindow::new(budget);
            for (name, data) in &signals {
                window.offer(&p, name, data);
            }
            let normal: usize = window.blocks().filter(|b| !b.important).map(|b| b.tokens).sum();
            let important: usize = window.blocks().filter(|b| b.important).map(|b| b.tokens).sum();
            prop_assert_eq!(normal + important, window.used_tokens);
            prop_assert!(normal <= budget);
            // Overflow is bounded by the important blocks' own cost.
            prop_assert!(window.used_tokens <= budget + important);
        }

        #[test]
        fn prop_important_blocks_lead(
            signals in prop::collection::vec(arb_signal(), 0..20),
        ) {
            let p = policy(5000);
            let mut window = ContextWindow::new(5000);
            for (name, data) in &signals {
                window.offer(&p, name, data);
            }
            let flags: Vec<bool> = window.blocks().map(|b| b.important).collect();
            let first_normal = flags.iter().position(|i| !i).unwrap_or(flags.len());
            prop_assert!(flags[first_normal..].iter().all(|i| !i));
        }

        #[test]
        fn prop_important_admission_independent_of_budget(
            signals in prop::collection::vec(arb_signal(), 0..20),
            budget in 0usize..2000,
            extra in 0usize..2000,
        ) {
            let small = policy(budget);
            let large = policy(budget + extra);
            let mut a = ContextWindow::new(budget);
            let mut b = ContextWindow::new(budget + extra);
            for (name, data) in &signals {
                a.offer(&small, name, data);
                b.offer(&large, name, data);
            }
            let important_a = a.blocks().filter(|x| x.important).count();
            let important_b = b.blocks().filter(|x| x.important).count();
            prop_assert_eq!(important_a, important_b);
        }
    }
}
