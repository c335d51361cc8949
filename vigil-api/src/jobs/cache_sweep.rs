//! Cache Sweep Background Task
//!
//! Periodically removes expired entries from the result cache so that
//! entries nobody reads again do not accumulate. Lookups already treat
//! expired entries as absent; the sweep only bounds memory.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use vigil_cache::ResultCache;

use crate::telemetry::METRICS;

/// Counters accumulated over the task's lifetime.
#[derive(Debug, Default)]
pub struct CacheSweepMetrics {
    pub sweeps: AtomicU64,
    pub entries_removed: AtomicU64,
}

impl CacheSweepMetrics {
    pub fn sweeps(&self) -> u64 {
        self.sweeps.load(Ordering::Relaxed)
    }

    pub fn entries_removed(&self) -> u64 {
        self.entries_removed.load(Ordering::Relaxed)
    }
}

/// Run the sweep every `every` until `shutdown_rx` flips to `true`.
///
/// ```rust,ignore
/// let (shutdown_tx, shutdown_rx) = watch::channel(false);
/// let handle = tokio::spawn(cache_sweep_task(cache, Duration::from_secs(300), shutdown_rx));
/// let _ = shutdown_tx.send(true);
/// let metrics = handle.await?;
/// ```
pub async fn cache_sweep_task(
    cache: Arc<ResultCache>,
    every: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<CacheSweepMetrics> {
    let metrics = Arc::new(CacheSweepMetrics::default());

    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately; nothing can have expired yet.
    ticker.tick().await;

    tracing::info!(interval_secs = every.as_secs(), "Cache sweep task started");

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Cache sweep task shutting down");
                    break;
                }
            }

            _ = ticker.tick() => {
                sweep_once(&cache, &metrics);
            }
        }
    }

    tracing::info!(
        sweeps = metrics.sweeps(),
        entries_removed = metrics.entries_removed(),
        "Cache sweep task stopped"
    );
    metrics
}

fn sweep_once(cache: &ResultCache, metrics: &CacheSweepMetrics) {
    let removed = cache.cleanup();
    metrics.sweeps.fetch_add(1, Ordering::Relaxed);
    metrics
        .entries_removed
        .fetch_add(removed as u64, Ordering::Relaxed);

    let remaining = cache.len();
    if let Ok(m) = METRICS.as_ref() {
        m.set_cache_entries(remaining);
    }
    if removed > 0 {
        tracing::debug!(removed, remaining, "Swept expired cache entries");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_test_utils::{fixtures, ManualClock};

    #[test]
    fn test_sweep_once_removes_expired() {
        let clock = Arc::new(ManualClock::new());
        let cache = ResultCache::with_clock(Duration::from_secs(60), clock.clone());
        cache.set(&fixtures::query("old", &[]), fixtures::structured_result());
        clock.advance(Duration::from_secs(61));
        cache.set(&fixtures::query("new", &[]), fixtures::structured_result());

        let metrics = CacheSweepMetrics::default();
        sweep_once(&cache, &metrics);

        assert_eq!(cache.len(), 1);
        assert_eq!(metrics.sweeps(), 1);
        assert_eq!(metrics.entries_removed(), 1);
    }

    #[tokio::test]
    async fn test_task_stops_on_shutdown() -> Result<(), String> {
        let cache = Arc::new(ResultCache::new(Duration::from_secs(60)));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(cache_sweep_task(
            cache,
            Duration::from_millis(10),
            shutdown_rx,
        ));
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(true).map_err(|e| e.to_string())?;

        let metrics = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .map_err(|_| "sweep task did not stop".to_string())?
            .map_err(|e| e.to_string())?;
        assert!(metrics.sweeps() >= 1);
        Ok(())
    }
}
