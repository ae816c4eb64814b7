//! The main store interface.
//!
//! This module provides the `ExpiringStore` type that users interact with.
//! It wraps the internal storage and provides a clean, thread-safe API.

use bytes::Bytes;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use crate::config::StoreConfig;
use crate::error::StoreResult;
use crate::scheduler::{HeapScheduler, Scheduler};
use crate::stats::{StatsSnapshot, StoreStats};
use crate::storage::Storage;

/// A thread-safe, in-memory key/value store whose entries remove themselves.
///
/// Every insertion arms a one-shot timer for the entry's lifetime. When it
/// fires the entry is removed, unless that exact insertion was already
/// replaced or expired by hand. No caller has to sweep.
///
/// Cloning an `ExpiringStore` creates a new handle to the same entries.
/// Separate `new` calls create fully independent stores.
///
/// # Example
/// ```
/// use expiring_store::{ExpiringStore, StoreConfig};
/// use std::time::Duration;
///
/// let config = StoreConfig::new()
///     .default_lifetime(Duration::from_secs(300))
///     .build();
///
/// let store: ExpiringStore<String> = ExpiringStore::new(config);
///
/// store.set("user:123", "Alice".to_string()).unwrap();
/// assert_eq!(store.get("user:123").unwrap(), "Alice");
///
/// store
///     .set_with_lifetime("session:abc", "data".to_string(), Duration::from_secs(60))
///     .unwrap();
/// store.expire("session:abc").unwrap();
/// assert!(!store.exists("session:abc"));
/// ```
#[derive(Debug)]
pub struct ExpiringStore<V = Bytes> {
    storage: Arc<Storage<V>>,
}

/// A store of raw byte values.
pub type ByteStore = ExpiringStore<Bytes>;

impl<V> Clone for ExpiringStore<V> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
        }
    }
}

impl<V> ExpiringStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a new store with its own scheduler thread.
    ///
    /// The thread stops once the last handle to this store is dropped.
    ///
    /// # Panics
    ///
    /// Panics if the OS refuses to spawn the scheduler thread.
    pub fn new(config: StoreConfig) -> Self {
        Self::with_scheduler(config, Arc::new(HeapScheduler::new()))
    }

    /// Create a new store with its own scheduler thread, reporting a failed
    /// thread spawn instead of panicking.
    pub fn try_new(config: StoreConfig) -> io::Result<Self> {
        Ok(Self::with_scheduler(config, Arc::new(HeapScheduler::try_new()?)))
    }

    /// Create a new store whose timers run on `scheduler`.
    ///
    /// Use this to run expiry on a tokio runtime via `TokioScheduler`, or to
    /// let several stores share one `HeapScheduler` thread. The map and its
    /// lock are never shared.
    pub fn with_scheduler(config: StoreConfig, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            storage: Arc::new(Storage::new(config, scheduler)),
        }
    }

    /// Check whether `key` has a live entry.
    ///
    /// An entry whose lifetime has run out reads as absent even if its timer
    /// has not been serviced yet.
    pub fn exists(&self, key: &str) -> bool {
        self.storage.exists(key)
    }

    /// Get a copy of the value stored at `key`.
    ///
    /// Returns `StoreError::KeyNotFound` if the key has no live entry.
    ///
    /// # Example
    /// ```
    /// use expiring_store::{ExpiringStore, StoreConfig, StoreError};
    ///
    /// let store: ExpiringStore<u32> = ExpiringStore::new(StoreConfig::default());
    /// store.set("hits", 7u32).unwrap();
    ///
    /// assert_eq!(store.get("hits"), Ok(7));
    /// assert_eq!(
    ///     store.get("misses"),
    ///     Err(StoreError::KeyNotFound("misses".to_string()))
    /// );
    /// ```
    pub fn get(&self, key: &str) -> StoreResult<V> {
        self.storage.get(key)
    }

    /// Store `value` at `key` for the configured default lifetime.
    ///
    /// Under `WritePolicy::Overwrite` an existing entry is replaced and its
    /// timer disarmed. Under `WritePolicy::NoOverwrite` a live key makes this
    /// fail with `StoreError::KeyExists` and nothing changes.
    pub fn set(&self, key: impl Into<String>, value: impl Into<V>) -> StoreResult<()> {
        let lifetime = self.storage.config().default_lifetime;
        self.storage.insert(key.into(), value.into(), lifetime)
    }

    /// Store `value` at `key` for `lifetime` instead of the default.
    ///
    /// Follows the same write policy as [`ExpiringStore::set`]. A zero
    /// lifetime is accepted; the entry is due at once.
    ///
    /// # Example
    /// ```
    /// use expiring_store::{ByteStore, StoreConfig};
    /// use std::time::Duration;
    ///
    /// let store = ByteStore::new(StoreConfig::default());
    /// store
    ///     .set_with_lifetime("token", "abc", Duration::from_secs(3600))
    ///     .unwrap();
    /// assert!(store.exists("token"));
    /// ```
    pub fn set_with_lifetime(
        &self,
        key: impl Into<String>,
        value: impl Into<V>,
        lifetime: Duration,
    ) -> StoreResult<()> {
        self.storage.insert(key.into(), value.into(), lifetime)
    }

    /// Remove `key` right now and disarm its timer.
    ///
    /// Returns `StoreError::KeyNotFound` if the key has no live entry.
    pub fn expire(&self, key: &str) -> StoreResult<()> {
        self.storage.expire(key)
    }

    /// Time left before `key` is removed.
    pub fn remaining_lifetime(&self, key: &str) -> StoreResult<Duration> {
        self.storage.remaining_lifetime(key)
    }

    /// Number of entries in the map.
    ///
    /// Note: this may include entries whose lifetime has just run out and
    /// whose timer has not been serviced yet.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Check if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Remove every entry and disarm every timer.
    pub fn clear(&self) {
        self.storage.clear();
    }

    /// The configuration this store was built with.
    pub fn config(&self) -> &StoreConfig {
        self.storage.config()
    }

    /// Get a snapshot of the store statistics.
    pub fn stats(&self) -> StatsSnapshot {
        self.storage.stats().snapshot()
    }

    /// Get a reference to the live statistics counters.
    ///
    /// This is useful for integrating with external metrics systems.
    pub fn stats_ref(&self) -> Arc<StoreStats> {
        self.storage.stats()
    }
}

impl<V> Default for ExpiringStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WritePolicy;
    use crate::error::StoreError;
    use std::thread;

    fn short_lived(policy: WritePolicy) -> ByteStore {
        ExpiringStore::new(
            StoreConfig::new()
                .default_lifetime(Duration::from_millis(20))
                .write_policy(policy)
                .build(),
        )
    }

    #[test]
    fn test_store_basic_operations() {
        let store = ByteStore::default();

        store.set("key", "value").unwrap();
        assert_eq!(store.get("key"), Ok(Bytes::from("value")));
        assert!(store.exists("key"));

        store.expire("key").unwrap();
        assert!(!store.exists("key"));
    }

    #[test]
    fn test_try_new() {
        let store: ExpiringStore<String> = ExpiringStore::try_new(StoreConfig::default()).unwrap();
        store.set("key", "value").unwrap();
        assert_eq!(store.get("key").unwrap(), "value");
    }

    #[test]
    fn test_store_is_clone() {
        let store1 = ByteStore::default();
        store1.set("key", "value").unwrap();

        let store2 = store1.clone();

        // Both point to the same underlying data
        assert_eq!(store2.get("key"), Ok(Bytes::from("value")));

        store2.set("key2", "value2").unwrap();
        assert_eq!(store1.get("key2"), Ok(Bytes::from("value2")));
    }

    #[test]
    fn test_separate_stores_are_independent() {
        let a = ByteStore::default();
        let b = ByteStore::default();

        a.set("key", "a").unwrap();
        assert!(!b.exists("key"));
    }

    #[test]
    fn test_entry_expires_on_its_own() {
        let store = short_lived(WritePolicy::Overwrite);
        store.set("key", "value").unwrap();
        assert!(store.exists("key"));

        thread::sleep(Duration::from_millis(100));

        assert!(!store.exists("key"));
        assert_eq!(store.len(), 0);
        assert_eq!(store.stats().timer_expirations, 1);
    }

    #[test]
    fn test_overwrite_restarts_lifetime() {
        let store = short_lived(WritePolicy::Overwrite);
        store.set_with_lifetime("key", "old", Duration::from_millis(30)).unwrap();
        store.set_with_lifetime("key", "new", Duration::from_secs(60)).unwrap();

        thread::sleep(Duration::from_millis(100));

        assert_eq!(store.get("key"), Ok(Bytes::from("new")));
    }

    #[test]
    fn test_no_overwrite_rejects_second_set() {
        let store = short_lived(WritePolicy::NoOverwrite);
        store.set("key", "v1").unwrap();

        assert_eq!(
            store.set("key", "v2"),
            Err(StoreError::KeyExists("key".to_string()))
        );
        assert_eq!(
            store.set_with_lifetime("key", "v3", Duration::from_secs(60)),
            Err(StoreError::KeyExists("key".to_string()))
        );
        assert_eq!(store.get("key"), Ok(Bytes::from("v1")));
    }

    #[test]
    fn test_store_stats() {
        let store = ByteStore::default();

        store.set("key", "value").unwrap();
        let _ = store.get("key");
        let _ = store.get("missing");

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 1);
    }

    #[test]
    fn test_store_thread_safety() {
        let store = ByteStore::default();
        let mut handles = vec![];

        for i in 0..10 {
            let store = store.clone();
            let handle = thread::spawn(move || {
                for j in 0..100 {
                    let key = format!("key_{}", j);
                    store.set(key.clone(), format!("value_{}_{}", i, j)).unwrap();
                    let _ = store.get(&key);
                }
            });
            handles.push(handle);
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 100);
    }
}
