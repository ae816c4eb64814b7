//! # Expiring Store
//!
//! A thread-safe, in-memory key/value store for Rust where every entry
//! removes itself once its lifetime has elapsed.
//!
//! ## Features
//!
//! - **Self-expiring**: Each insertion arms its own one-shot timer; nobody has to sweep
//! - **Thread-safe**: Share across threads with `Clone` (uses `Arc` internally)
//! - **Write policies**: Replace on `set`, or reject writes to live keys
//! - **Generation-checked timers**: A stale timer never removes a newer value
//! - **Pluggable scheduling**: A dedicated heap thread by default, or tokio tasks
//! - **Statistics**: Track hits, misses, replacements and expirations
//!
//! ## Quick Start
//!
//! ```rust
//! use expiring_store::{ExpiringStore, StoreConfig, StoreError, WritePolicy};
//! use std::time::Duration;
//!
//! let config = StoreConfig::new()
//!     .default_lifetime(Duration::from_secs(300))
//!     .write_policy(WritePolicy::NoOverwrite)
//!     .build();
//!
//! let store: ExpiringStore<String> = ExpiringStore::new(config);
//!
//! store.set("user:123", "Alice").unwrap();
//! assert_eq!(store.get("user:123").unwrap(), "Alice");
//!
//! // Under NoOverwrite a live key cannot be replaced
//! assert!(matches!(store.set("user:123", "Bob"), Err(StoreError::KeyExists(_))));
//!
//! // Remove early instead of waiting for the timer
//! store.expire("user:123").unwrap();
//! assert!(!store.exists("user:123"));
//! ```
//!
//! ## Thread Safety
//!
//! Every operation, including a timer firing, runs under one lock per store,
//! so concurrent callers always see a whole entry or no entry:
//!
//! ```rust
//! use expiring_store::ByteStore;
//! use std::thread;
//!
//! let store = ByteStore::default();
//!
//! let handles: Vec<_> = (0..4).map(|i| {
//!     let store = store.clone();
//!     thread::spawn(move || {
//!         store.set(format!("key_{}", i), format!("value_{}", i)).unwrap();
//!     })
//! }).collect();
//!
//! for handle in handles {
//!     handle.join().unwrap();
//! }
//! assert_eq!(store.len(), 4);
//! ```

pub mod config;
pub mod error;
pub mod runtime;
pub mod scheduler;
pub mod stats;
pub mod store;

pub use config::{StoreConfig, WritePolicy};
pub use error::{StoreError, StoreResult};
pub use runtime::TokioScheduler;
pub use scheduler::{ExpiryCallback, HeapScheduler, Scheduler, TimerHandle};
pub use stats::{StatsSnapshot, StoreStats};
pub use store::{ByteStore, ExpiringStore};

// Internal modules - not part of public API
pub(crate) mod entry;
pub(crate) mod storage;
