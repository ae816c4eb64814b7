//! Configuration for the expiring store.
//!
//! This module provides a builder for the two construction-time choices a
//! store has: how long entries live by default and what `set` does when the
//! key is already present.

use std::time::Duration;

/// What `set` does when the key already has a live entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WritePolicy {
    /// Replace the existing value and restart its lifetime.
    #[default]
    Overwrite,

    /// Reject the write with `StoreError::KeyExists` and leave the entry untouched.
    NoOverwrite,
}

/// Configuration for creating a new store instance.
///
/// ```
/// use expiring_store::{StoreConfig, WritePolicy};
/// use std::time::Duration;
///
/// let config = StoreConfig::new()
///     .default_lifetime(Duration::from_secs(300))
///     .write_policy(WritePolicy::NoOverwrite)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Lifetime given to entries inserted with `set`.
    pub(crate) default_lifetime: Duration,

    /// Behaviour of `set` against a live key.
    pub(crate) write_policy: WritePolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_lifetime: Duration::from_secs(60),
            write_policy: WritePolicy::Overwrite,
        }
    }
}

impl StoreConfig {
    /// Create a new configuration builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the lifetime used by `set`.
    ///
    /// `Duration::ZERO` is accepted: such entries are due immediately and are
    /// removed as soon as the scheduler gets to them.
    pub fn default_lifetime(mut self, lifetime: Duration) -> Self {
        self.default_lifetime = lifetime;
        self
    }

    /// Set the write policy.
    pub fn write_policy(mut self, policy: WritePolicy) -> Self {
        self.write_policy = policy;
        self
    }

    /// Build the final configuration.
    pub fn build(self) -> Self {
        self
    }

    /// Get the default lifetime.
    pub fn get_default_lifetime(&self) -> Duration {
        self.default_lifetime
    }

    /// Get the write policy.
    pub fn get_write_policy(&self) -> WritePolicy {
        self.write_policy
    }
}
