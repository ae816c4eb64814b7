//! Error types for the expiring store.
//!
//! The store is pure in-memory state, so nothing it does can fail transiently.
//! The only conditions reported back are about the key a caller asked for.

use thiserror::Error;

/// The error type for store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The key has no live entry.
    #[error("key not found: '{0}'")]
    KeyNotFound(String),

    /// The key already has a live entry and the store rejects overwrites.
    #[error("key already exists: '{0}'")]
    KeyExists(String),
}

impl StoreError {
    /// Returns `true` for [`StoreError::KeyNotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::KeyNotFound(_))
    }

    /// Returns `true` for [`StoreError::KeyExists`].
    pub fn is_exists(&self) -> bool {
        matches!(self, StoreError::KeyExists(_))
    }

    /// The key the failed operation referred to.
    pub fn key(&self) -> &str {
        match self {
            StoreError::KeyNotFound(key) | StoreError::KeyExists(key) => key,
        }
    }
}

/// A specialized Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::KeyNotFound("mykey".to_string());
        assert_eq!(format!("{}", err), "key not found: 'mykey'");

        let err = StoreError::KeyExists("mykey".to_string());
        assert_eq!(format!("{}", err), "key already exists: 'mykey'");
    }

    #[test]
    fn test_predicates() {
        let err = StoreError::KeyNotFound("a".to_string());
        assert!(err.is_not_found());
        assert!(!err.is_exists());
        assert_eq!(err.key(), "a");

        let err = StoreError::KeyExists("b".to_string());
        assert!(err.is_exists());
        assert_eq!(err.key(), "b");
    }
}
