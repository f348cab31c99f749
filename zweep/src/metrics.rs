//! String-keyed counter registry for monitoring a running join.
//!
//! The registry is strictly an observe-only side channel: every component
//! accepts it optionally and behaves identically without it. Monitoring may
//! poll concurrently with the driving thread, which is why the storage is a
//! concurrent map rather than a plain one.

use std::sync::Arc;

use dashmap::DashMap;

/// A concurrent registry of named counters.
///
/// Clones share the same underlying counters, so a registry can be attached
/// to several components of one join and polled from a monitoring thread.
/// Well-known counter names live in [`crate::common::constants`].
///
/// # Examples
///
/// ```rust,ignore
/// use zweep::metrics::MetricsRegistry;
/// use zweep::common::constants::RESULT_PAIRS;
///
/// let metrics = MetricsRegistry::new();
/// metrics.increment(RESULT_PAIRS);
/// assert_eq!(metrics.get(RESULT_PAIRS), 1);
/// ```
#[derive(Clone, Default)]
pub struct MetricsRegistry {
    counters: Arc<DashMap<String, u64>>,
}

impl MetricsRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        MetricsRegistry {
            counters: Arc::new(DashMap::new()),
        }
    }

    /// Increments a counter by one.
    pub fn increment(&self, name: &str) {
        self.add(name, 1);
    }

    /// Adds a delta to a counter, creating it at zero first.
    pub fn add(&self, name: &str, delta: u64) {
        *self.counters.entry(name.to_string()).or_insert(0) += delta;
    }

    /// Overwrites a counter with an absolute value.
    pub fn set(&self, name: &str, value: u64) {
        self.counters.insert(name.to_string(), value);
    }

    /// Raises a counter to `value` if it is currently lower (high-water mark).
    pub fn raise_to(&self, name: &str, value: u64) {
        let mut entry = self.counters.entry(name.to_string()).or_insert(0);
        if *entry < value {
            *entry = value;
        }
    }

    /// Reads a counter; absent counters read as zero.
    pub fn get(&self, name: &str) -> u64 {
        self.counters.get(name).map(|v| *v).unwrap_or(0)
    }

    /// A point-in-time copy of all counters, sorted by name.
    pub fn snapshot(&self) -> Vec<(String, u64)> {
        let mut entries: Vec<(String, u64)> = self
            .counters
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect();
        entries.sort();
        entries
    }

    /// Removes all counters.
    pub fn clear(&self) {
        self.counters.clear();
    }
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.snapshot()).finish()
    }
}
