//! Vigil Cache - in-memory result cache
//!
//! Maps a query's [`CacheKey`] to a previously computed [`AnalysisResult`]
//! for a fixed time-to-live. Entries expire lazily on read and are swept in
//! bulk by [`ResultCache::cleanup`], which the service calls on a timer.
//!
//! # Concurrency
//!
//! Reads of the entry count may proceed in parallel. `get` takes the write
//! lock because it may delete: the expiry check and the delete happen in one
//! critical section, so a concurrent `set` can never be erased by a stale read.

mod clock;

pub use clock::{Clock, ManualClock, SystemClock};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use vigil_core::{AnalysisQuery, AnalysisResult, CacheKey};

#[derive(Debug, Clone)]
struct CacheEntry {
    value: AnalysisResult,
    /// `None` when `now + ttl` is not representable; such an entry never expires.
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Cache statistics for monitoring.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries removed because their TTL elapsed (lazily or by sweep)
    pub expirations: u64,
    pub entry_count: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// TTL-bounded store of analysis results.
pub struct ResultCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
}

impl ResultCache {
    /// Create a cache whose entries live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up the result for `query`.
    ///
    /// # Returns
    /// * `Some(AnalysisResult)` - A clone of the stored value, if present and fresh
    /// * `None` - If absent or expired (an expired entry is removed)
    pub fn get(&self, query: &AnalysisQuery) -> Option<AnalysisResult> {
        self.get_key(&query.cache_key())
    }

    pub fn get_key(&self, key: &CacheKey) -> Option<AnalysisResult> {
        let now = self.clock.now();
        let Ok(mut entries) = self.entries.write() else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        let found = match entries.get(key) {
            None => None,
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                self.expirations.fetch_add(1, Ordering::Relaxed);
                None
            }
            Some(entry) => Some(entry.value.clone()),
        };
        drop(entries);

        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Fresh value for `key` without touching the hit and miss counters.
    /// Expired entries read as absent and are left for `get` or `cleanup`.
    pub fn peek_key(&self, key: &CacheKey) -> Option<AnalysisResult> {
        let now = self.clock.now();
        let entries = self.entries.read().ok()?;
        entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone())
    }

    /// Store `result` for `query`, replacing any previous entry.
    pub fn set(&self, query: &AnalysisQuery, result: AnalysisResult) {
        self.set_key(query.cache_key(), result);
    }

    pub fn set_key(&self, key: CacheKey, value: AnalysisResult) {
        let expires_at = self.clock.now().checked_add(self.ttl);
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key, CacheEntry { value, expires_at });
        }
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn cleanup(&self) -> usize {
        let now = self.clock.now();
        let Ok(mut entries) = self.entries.write() else {
            return 0;
        };

        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - entries.len();
        drop(entries);

        if removed > 0 {
            self.expirations.fetch_add(removed as u64, Ordering::Relaxed);
            tracing::debug!(removed, "swept expired cache entries");
        }
        removed
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            entry_count: self.len() as u64,
        }
    }
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("ttl", &self.ttl)
            .field("current_size", &self.len())
            .finish()
    }
}
