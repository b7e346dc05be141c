//! Unified error system for Tessera
//!
//! A single error type shared across the workspace. Each variant corresponds to
//! one failure class of the engine: a broken model, a malformed call, or a
//! storage backend that could not load or persist.

use serde::{Deserialize, Serialize};

/// Unified error type for all Tessera operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum TesseraError {
    /// Malformed model definition or configuration file
    ///
    /// Only raised while building a model or enforcer, never mid-operation.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message describing the configuration problem
        message: String,
    },

    /// A call supplied values that do not fit the declared schema
    #[error("Validation error: {message}")]
    Validation {
        /// Error message describing the rejected input
        message: String,
    },

    /// The storage adapter failed to load or persist
    #[error("Storage error: {message}")]
    Storage {
        /// Error message describing the storage failure
        message: String,
    },
}

impl TesseraError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Whether this error came from the storage backend
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage { .. })
    }
}

/// Standard Result type for Tessera operations
pub type Result<T> = std::result::Result<T, TesseraError>;

impl From<std::io::Error> for TesseraError {
    fn from(err: std::io::Error) -> Self {
        Self::storage(err.to_string())
    }
}

impl From<serde_json::Error> for TesseraError {
    fn from(err: serde_json::Error) -> Self {
        Self::storage(format!("JSON encoding failed: {err}"))
    }
}

impl From<toml::de::Error> for TesseraError {
    fn from(err: toml::de::Error) -> Self {
        Self::configuration(format!("Invalid TOML: {err}"))
    }
}
