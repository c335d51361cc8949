//! Per-key gates that collapse concurrent identical cache misses.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use vigil_core::CacheKey;

type Gate = AsyncMutex<()>;

/// Registry of in-flight computations keyed by [`CacheKey`].
///
/// The map holds only weak references; a gate lives as long as some caller is
/// waiting on or holding it, and its entry is removed by the last one out.
#[derive(Debug, Default)]
pub(crate) struct InFlight {
    gates: Mutex<HashMap<CacheKey, Weak<Gate>>>,
}

impl InFlight {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Wait until no other caller is computing `key`, then hold the gate.
    pub(crate) async fn acquire(&self, key: &CacheKey) -> FlightPermit<'_> {
        let gate = self.gate_for(key);
        let guard = gate.lock_owned().await;
        FlightPermit {
            registry: self,
            key: key.clone(),
            guard: Some(guard),
        }
    }

    fn gate_for(&self, key: &CacheKey) -> Arc<Gate> {
        let Ok(mut gates) = self.gates.lock() else {
            // Poisoned registry: fall back to an unshared gate.
            return Arc::new(Gate::new(()));
        };

        if let Some(gate) = gates.get(key).and_then(Weak::upgrade) {
            return gate;
        }

        let gate = Arc::new(Gate::new(()));
        gates.insert(key.clone(), Arc::downgrade(&gate));
        gate
    }

    fn release(&self, key: &CacheKey) {
        if let Ok(mut gates) = self.gates.lock() {
            if gates.get(key).is_some_and(|gate| gate.strong_count() == 0) {
                gates.remove(key);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.gates.lock().map(|g| g.len()).unwrap_or(0)
    }
}

/// Exclusive hold on one key's gate. Dropping it wakes the next waiter.
pub(crate) struct FlightPermit<'a> {
    registry: &'a InFlight,
    key: CacheKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for FlightPermit<'_> {
    fn drop(&mut self) {
        // Release our strong reference before checking whether anyone else holds one.
        self.guard.take();
        self.registry.release(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn key(s: &str) -> CacheKey {
        let range = vigil_test_utils::fixtures::hour_range();
        CacheKey::for_query(&vigil_core::AnalysisQuery::new(s, range, vec![]))
    }

    #[tokio::test]
    async fn test_entry_removed_after_last_permit() {
        let flights = InFlight::new();
        {
            let _permit = flights.acquire(&key("a")).await;
            assert_eq!(flights.len(), 1);
        }
        assert_eq!(flights.len(), 0);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let flights = InFlight::new();
        let _a = flights.acquire(&key("a")).await;
        let _b = tokio::time::timeout(Duration::from_secs(1), flights.acquire(&key("b")))
            .await
            .expect("distinct keys must not share a gate");
        assert_eq!(flights.len(), 2);
    }

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let flights = Arc::new(InFlight::new());
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let flights = flights.clone();
                let active = active.clone();
                let max_seen = max_seen.clone();
                tokio::spawn(async move {
                    let _permit = flights.acquire(&key("same")).await;
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(flights.len(), 0);
    }
}
