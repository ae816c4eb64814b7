//! Statistics for the expiring store.
//!
//! Atomic counters for store operations and for what the expiry timers did
//! when they fired.

use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics for store operations.
///
/// All counters are atomic and can be read from any thread.
/// Use `ExpiringStore::stats()` to get a snapshot.
///
/// Only the store itself updates the counters:
///
/// ```compile_fail
/// let store = expiring_store::ByteStore::default();
/// store.stats_ref().record_hit();
/// ```
#[derive(Debug, Default)]
pub struct StoreStats {
    /// `get` calls that found a live entry.
    hits: AtomicU64,

    /// `get` calls that found nothing.
    misses: AtomicU64,

    /// Successful inserts, new or replacing.
    sets: AtomicU64,

    /// Inserts refused under the no-overwrite policy.
    rejected_sets: AtomicU64,

    /// Inserts that replaced a live entry.
    replacements: AtomicU64,

    /// Entries removed early by `expire`.
    manual_expirations: AtomicU64,

    /// Entries removed by their own timer.
    timer_expirations: AtomicU64,

    /// Timers that fired against an absent or newer entry and did nothing.
    stale_fires: AtomicU64,

    /// Current number of live entries.
    size: AtomicU64,
}

impl StoreStats {
    /// Create a new stats instance with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_set(&self) {
        self.sets.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected_set(&self) {
        self.rejected_sets.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_replacement(&self) {
        self.replacements.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_manual_expiration(&self) {
        self.manual_expirations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_timer_expiration(&self) {
        self.timer_expirations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_stale_fire(&self) {
        self.stale_fires.fetch_add(1, Ordering::Relaxed);
    }

    /// Set the size to a specific value.
    ///
    /// Size is written under the store lock from the map's own length, so it
    /// never drifts from the map.
    pub(crate) fn set_size(&self, size: u64) {
        self.size.store(size, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn sets(&self) -> u64 {
        self.sets.load(Ordering::Relaxed)
    }

    pub fn rejected_sets(&self) -> u64 {
        self.rejected_sets.load(Ordering::Relaxed)
    }

    pub fn replacements(&self) -> u64 {
        self.replacements.load(Ordering::Relaxed)
    }

    pub fn manual_expirations(&self) -> u64 {
        self.manual_expirations.load(Ordering::Relaxed)
    }

    pub fn timer_expirations(&self) -> u64 {
        self.timer_expirations.load(Ordering::Relaxed)
    }

    pub fn stale_fires(&self) -> u64 {
        self.stale_fires.load(Ordering::Relaxed)
    }

    pub fn size(&self) -> u64 {
        self.size.load(Ordering::Relaxed)
    }

    /// Calculate the hit rate as a percentage (0.0 to 100.0).
    /// Returns 0.0 if no reads have been performed.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 {
            0.0
        } else {
            (hits as f64 / total as f64) * 100.0
        }
    }

    /// Create a snapshot of the current statistics.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            hits: self.hits(),
            misses: self.misses(),
            sets: self.sets(),
            rejected_sets: self.rejected_sets(),
            replacements: self.replacements(),
            manual_expirations: self.manual_expirations(),
            timer_expirations: self.timer_expirations(),
            stale_fires: self.stale_fires(),
            size: self.size(),
            hit_rate: self.hit_rate(),
        }
    }
}

/// A point-in-time snapshot of store statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub rejected_sets: u64,
    pub replacements: u64,
    pub manual_expirations: u64,
    pub timer_expirations: u64,
    pub stale_fires: u64,
    pub size: u64,
    pub hit_rate: f64,
}
