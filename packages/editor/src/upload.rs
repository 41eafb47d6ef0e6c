//! # Attachment uploads
//!
//! When a user drops a file into the editor, the editor hands it to an
//! [`UploadHandler`] and embeds whatever reference comes back. The default
//! handler, [`DataUriUploader`], inlines the file as a `data:` URI so notes
//! never depend on an attachment host.

use std::path::Path;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};

use crate::error::UploadError;

/// A binary file handed to the editor.
#[derive(Clone, Debug, PartialEq)]
pub struct Attachment {
    pub name: String,
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: None,
            bytes,
        }
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    /// Read an attachment from disk.
    pub async fn from_path(path: &Path) -> Result<Self, UploadError> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("attachment")
            .to_string();
        Ok(Self::new(name, bytes))
    }

    /// Explicit mime type, or one inferred from the file extension.
    pub fn mime_type(&self) -> String {
        self.mime
            .clone()
            .unwrap_or_else(|| {
                mime_guess::from_path(&self.name)
                    .first_raw()
                    .unwrap_or("application/octet-stream")
                    .to_string()
            })
    }
}

/// Resolves an attachment to a reference that can be embedded in content.
#[async_trait]
pub trait UploadHandler: Send + Sync {
    async fn upload(&self, attachment: Attachment) -> Result<String, UploadError>;
}

/// Inlines attachments as base64 `data:` URIs.
#[derive(Clone, Debug, Default)]
pub struct DataUriUploader {
    max_bytes: Option<usize>,
}

impl DataUriUploader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject attachments larger than `limit` bytes.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            max_bytes: Some(limit),
        }
    }
}

#[async_trait]
impl UploadHandler for DataUriUploader {
    async fn upload(&self, attachment: Attachment) -> Result<String, UploadError> {
        if attachment.bytes.is_empty() {
            return Err(UploadError::Empty(attachment.name));
        }
        if let Some(limit) = self.max_bytes {
            if attachment.bytes.len() > limit {
                return Err(UploadError::TooLarge {
                    name: attachment.name,
                    size: attachment.bytes.len(),
                    limit,
                });
            }
        }

        let mime = attachment.mime_type();
        let payload = general_purpose::STANDARD.encode(&attachment.bytes);
        tracing::debug!(name = %attachment.name, %mime, size = attachment.bytes.len(), "inlined attachment");
        Ok(format!("data:{mime};base64,{payload}"))
    }
}
