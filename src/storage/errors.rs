//! Errors raised by the persistence layer.
//!
//! They describe storage failures only. Write conflicts are not errors here:
//! `compare_and_put` reports them through [`PutOutcome`](super::PutOutcome)
//! and the instance store turns them into `StaleState`.

use super::StorageKey;
use std::time::Duration;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A record was inserted at a key that is already taken
    #[error("Record already exists: {key}")]
    AlreadyExists { key: String },

    /// Stored data could not be encoded or decoded
    #[error("Serialization error for {data_type}: {message}")]
    Serialization { message: String, data_type: String },

    /// Backend temporarily unreachable
    #[error("Storage unavailable: {message}")]
    Unavailable {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("Internal storage error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl StorageError {
    pub fn already_exists(key: &StorageKey) -> Self {
        Self::AlreadyExists {
            key: key.to_string(),
        }
    }

    /// Encoding or decoding failure for records of `data_type`.
    pub fn serialization(message: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
            data_type: data_type.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self::Unavailable {
            message: message.into(),
            retry_after,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap a backend error.
    pub fn backend<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Internal {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_temporary(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}
