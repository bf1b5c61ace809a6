//! Error types for the airlift definitions cache.
//!
//! Lookups that find nothing return `None`; the variants here are reserved for
//! data that is broken (contract/invariant violations) and for failures of the
//! codec and storage layers.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the airlift core library.
#[derive(Debug, Error)]
pub enum AirliftError {
    // Data contract errors
    #[error("Schema contract violation on {entity} key '{key}': {message}")]
    SchemaContractViolation {
        entity: &'static str,
        key: String,
        message: String,
    },

    #[error("Construction invariant violated for {entity}: {message}")]
    ConstructionInvariantViolation {
        entity: &'static str,
        message: String,
    },

    #[error("Unsupported envelope schema version {found} (supported: {supported})")]
    UnsupportedSchemaVersion { found: u64, supported: String },

    // Database errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for airlift operations.
pub type Result<T> = std::result::Result<T, AirliftError>;

impl From<std::io::Error> for AirliftError {
    fn from(err: std::io::Error) -> Self {
        AirliftError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for AirliftError {
    fn from(err: serde_json::Error) -> Self {
        AirliftError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for AirliftError {
    fn from(err: rusqlite::Error) -> Self {
        AirliftError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl AirliftError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        AirliftError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    pub(crate) fn contract(
        entity: &'static str,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        AirliftError::SchemaContractViolation {
            entity,
            key: key.into(),
            message: message.into(),
        }
    }

    pub(crate) fn invariant(entity: &'static str, message: impl Into<String>) -> Self {
        AirliftError::ConstructionInvariantViolation {
            entity,
            message: message.into(),
        }
    }

    /// Check if this error means the cached data itself is broken, as opposed
    /// to the storage around it failing.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            AirliftError::SchemaContractViolation { .. }
                | AirliftError::ConstructionInvariantViolation { .. }
        )
    }
}
