//! # Domain models for documents
//!
//! Defines the data structures that flow through [`crate::DocumentStore`]. These
//! types are `Serialize + Deserialize` so they can be persisted by any backend
//! and handed across the UI/backend boundary unchanged.
//!
//! ## Types
//!
//! | Struct | Represents |
//! |--------|-----------|
//! | [`Document`] | The canonical persisted note: id, title, raw body, body digest, and the creation / last-modified timestamps. |
//! | [`NewDocument`] | Input to [`crate::DocumentStore::create`]. |
//! | [`DocumentPatch`] | Partial update accepted by [`crate::DocumentStore::update`]; absent fields are left as they are. |
//! | [`DocumentId`] | Opaque, stable identifier (UUID v4). |
//!
//! The `body` is stored as the raw persisted string. It is either legacy markup
//! or a JSON array of blocks; resolving that ambiguity is the editor's job, the
//! store never interprets it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::digest::Sha;

/// Stable identifier of a document.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(Uuid);

impl DocumentId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an id from its string form.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// A persisted note.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
    /// Raw persisted body: legacy markup or a JSON block array
    pub body: String,
    /// SHA-1 of `body` for change detection
    pub body_sha: Sha,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Build a brand-new document stamped with `now`.
    pub fn new(id: DocumentId, title: String, body: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title,
            body_sha: Sha::of(&body),
            body,
            created_at: now,
            updated_at: now,
        }
    }

    /// Would applying `patch` change this document?
    pub fn differs_from(&self, patch: &DocumentPatch) -> bool {
        let title_changed = patch.title.as_ref().is_some_and(|t| *t != self.title);
        let body_changed = patch
            .body
            .as_ref()
            .is_some_and(|b| Sha::of(b) != self.body_sha);
        title_changed || body_changed
    }

    /// Apply the present fields of `patch`, bumping `updated_at` to `now`.
    pub fn apply(&mut self, patch: DocumentPatch, now: DateTime<Utc>) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(body) = patch.body {
            self.body_sha = Sha::of(&body);
            self.body = body;
        }
        self.updated_at = now.max(self.created_at);
    }
}

/// Input for creating a document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NewDocument {
    pub title: String,
    pub body: String,
}

impl NewDocument {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

/// Partial update of a document. `None` fields are left untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocumentPatch {
    pub id: DocumentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl DocumentPatch {
    /// Patch that replaces only the body.
    pub fn body(id: DocumentId, body: impl Into<String>) -> Self {
        Self {
            id,
            title: None,
            body: Some(body.into()),
        }
    }

    /// Patch that replaces only the title.
    pub fn title(id: DocumentId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: Some(title.into()),
            body: None,
        }
    }
}
