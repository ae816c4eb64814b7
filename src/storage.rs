//! Internal storage implementation for the store.
//!
//! One map behind one lock. Every operation, including a timer firing, takes
//! the lock for its whole critical section, so all of them are linearized.
//!
//! Each insertion is stamped with a generation from a per-store counter. The
//! timer armed for an insertion carries that generation and only removes the
//! key if the live entry still has it. Entries leaving the map early (replaced,
//! expired by hand, cleared) have their timers cancelled.
//!
//! An entry whose lifetime has run out is treated as absent even if its timer
//! has not been serviced yet.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::config::{StoreConfig, WritePolicy};
use crate::entry::Entry;
use crate::error::{StoreError, StoreResult};
use crate::scheduler::{deadline_after, Scheduler, TimerHandle};
use crate::stats::StoreStats;

struct State<V> {
    entries: HashMap<String, Entry<V>>,
    next_generation: u64,
}

impl<V> State<V> {
    /// The entry for `key` if it is present and its lifetime has not run out.
    fn live(&self, key: &str, now: Instant) -> Option<&Entry<V>> {
        self.entries.get(key).filter(|entry| !entry.is_due_at(now))
    }
}

/// Map, lock and timer bookkeeping shared by every `ExpiringStore` handle.
///
/// This is the internal implementation; users should use `ExpiringStore` instead.
pub(crate) struct Storage<V> {
    state: Mutex<State<V>>,
    config: StoreConfig,
    scheduler: Arc<dyn Scheduler>,
    stats: Arc<StoreStats>,
}

impl<V> Storage<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(config: StoreConfig, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            state: Mutex::new(State {
                entries: HashMap::new(),
                next_generation: 1,
            }),
            config,
            scheduler,
            stats: Arc::new(StoreStats::new()),
        }
    }

    pub(crate) fn exists(&self, key: &str) -> bool {
        self.state.lock().live(key, Instant::now()).is_some()
    }

    pub(crate) fn get(&self, key: &str) -> StoreResult<V> {
        let state = self.state.lock();
        match state.live(key, Instant::now()) {
            Some(entry) => {
                self.stats.record_hit();
                Ok(entry.value().clone())
            }
            None => {
                self.stats.record_miss();
                trace!(key = %key, "get miss");
                Err(StoreError::KeyNotFound(key.to_string()))
            }
        }
    }

    pub(crate) fn remaining_lifetime(&self, key: &str) -> StoreResult<Duration> {
        let now = Instant::now();
        self.state
            .lock()
            .live(key, now)
            .map(|entry| entry.remaining_at(now))
            .ok_or_else(|| StoreError::KeyNotFound(key.to_string()))
    }

    /// Insert under the configured write policy and arm a timer for `lifetime`.
    pub(crate) fn insert(
        self: &Arc<Self>,
        key: String,
        value: V,
        lifetime: Duration,
    ) -> StoreResult<()> {
        let now = Instant::now();
        let mut state = self.state.lock();
        self.reap_if_due(&mut state, &key, now);

        let rejects_overwrite = self.config.write_policy == WritePolicy::NoOverwrite;
        if rejects_overwrite && state.entries.contains_key(&key) {
            self.stats.record_rejected_set();
            trace!(key = %key, "write rejected, key is live");
            return Err(StoreError::KeyExists(key));
        }

        let generation = state.next_generation;
        state.next_generation += 1;

        let timer = self.arm(key.clone(), generation, lifetime);
        trace!(key = %key, generation, ?lifetime, "set");

        let entry = Entry::new(value, generation, deadline_after(now, lifetime), timer);
        if let Some(previous) = state.entries.insert(key, entry) {
            previous.retire();
            self.stats.record_replacement();
        }

        self.stats.record_set();
        self.stats.set_size(state.entries.len() as u64);
        Ok(())
    }

    /// Remove `key` now and disarm its timer.
    pub(crate) fn expire(&self, key: &str) -> StoreResult<()> {
        let mut state = self.state.lock();
        self.reap_if_due(&mut state, key, Instant::now());

        match state.entries.remove(key) {
            Some(entry) => {
                debug!(key = %key, generation = entry.generation(), "expired early");
                entry.retire();
                self.stats.record_manual_expiration();
                self.stats.set_size(state.entries.len() as u64);
                Ok(())
            }
            None => Err(StoreError::KeyNotFound(key.to_string())),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn clear(&self) {
        let mut state = self.state.lock();
        let removed = state.entries.len();
        for (_, entry) in state.entries.drain() {
            entry.retire();
        }
        self.stats.set_size(0);
        debug!(removed, "cleared");
    }

    pub(crate) fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub(crate) fn stats(&self) -> Arc<StoreStats> {
        Arc::clone(&self.stats)
    }

    fn arm(self: &Arc<Self>, key: String, generation: u64, lifetime: Duration) -> TimerHandle {
        let storage = Arc::downgrade(self);
        self.scheduler.schedule(
            lifetime,
            Box::new(move || {
                // Gone means every store handle was dropped; nothing to remove.
                if let Some(storage) = storage.upgrade() {
                    storage.fire(&key, generation);
                }
            }),
        )
    }

    /// Timer callback: remove `key` only if it still holds `generation`.
    fn fire(&self, key: &str, generation: u64) {
        let mut state = self.state.lock();
        let current = state.entries.get(key).map(Entry::generation);

        if current != Some(generation) {
            self.stats.record_stale_fire();
            debug!(key = %key, generation, ?current, "stale expiry skipped");
            return;
        }

        if let Some(entry) = state.entries.remove(key) {
            entry.retire();
            self.stats.record_timer_expiration();
            self.stats.set_size(state.entries.len() as u64);
            debug!(key = %key, generation, "expired");
        }
    }

    /// Drop an entry whose lifetime ran out before its timer was serviced.
    fn reap_if_due(&self, state: &mut State<V>, key: &str, now: Instant) {
        let due = state.entries.get(key).is_some_and(|entry| entry.is_due_at(now));
        if !due {
            return;
        }
        if let Some(entry) = state.entries.remove(key) {
            debug!(key = %key, generation = entry.generation(), "expired ahead of its timer");
            entry.retire();
            self.stats.record_timer_expiration();
            self.stats.set_size(state.entries.len() as u64);
        }
    }
}

impl<V> std::fmt::Debug for Storage<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("len", &self.state.lock().entries.len())
            .field("config", &self.config)
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

impl<V> Drop for Storage<V> {
    fn drop(&mut self) {
        for (_, entry) in self.state.get_mut().entries.drain() {
            entry.retire();
        }
    }
}
