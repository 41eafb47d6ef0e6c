//! Error types for the document store and configuration.

use thiserror::Error;

use crate::models::DocumentId;

/// Errors returned by [`crate::DocumentStore`] and [`crate::RecordStore`] implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document {0} not found")]
    NotFound(DocumentId),

    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored document is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("store lock poisoned")]
    Poisoned,

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Errors while loading or saving [`crate::AppConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}
