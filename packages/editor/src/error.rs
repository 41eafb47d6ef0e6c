//! Error types for the editor bridge.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EditorError {
    /// The editor library could not be created on the mount point.
    #[error("failed to create editor on {mount}: {reason}")]
    Create { mount: String, reason: String },

    /// The editor library rejected the change subscription (usually a version mismatch).
    #[error("change subscription failed: {0}")]
    Subscribe(String),

    #[error("editor instance already destroyed")]
    Destroyed,

    #[error(transparent)]
    Upload(#[from] UploadError),
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("failed to read attachment: {0}")]
    Io(#[from] std::io::Error),

    #[error("attachment {0} is empty")]
    Empty(String),

    #[error("attachment {name} is {size} bytes, limit is {limit}")]
    TooLarge { name: String, size: usize, limit: usize },
}
