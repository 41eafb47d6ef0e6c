//! # Repository — document entry points over an abstract record store
//!
//! This module is the core of the storage layer. [`Repository`] implements the
//! document entry points ([`DocumentStore`]) on top of any [`RecordStore`]
//! backend, so the same rules apply to the in-memory store (tests, desktop
//! fallback) and the filesystem store.
//!
//! ## [`RecordStore`] trait
//!
//! An async interface with four methods: `load`/`save`/`remove` for single
//! documents and `load_all` for listing. Backends persist whatever they are
//! given; they do not stamp timestamps or digests.
//!
//! ## [`DocumentStore`] trait
//!
//! | Method | Description |
//! |--------|-------------|
//! | [`create`](DocumentStore::create) | Assigns a fresh id, stamps both timestamps, digests the body. |
//! | [`update`](DocumentStore::update) | Applies a [`DocumentPatch`]. A patch that changes nothing returns the stored document untouched. |
//! | [`delete`](DocumentStore::delete) | Removes a document. |
//! | [`list`](DocumentStore::list) | All documents, most recently modified first. |
//! | [`get`](DocumentStore::get) | One document by id. |
//!
//! `update` is the single write path for existing documents. The title field,
//! the editor's commit scheduler and a sidebar rename all go through it.

use std::future::Future;

use chrono::Utc;

use crate::error::StoreError;
use crate::models::{Document, DocumentId, DocumentPatch, NewDocument};

/// Async backend for persisting documents.
pub trait RecordStore: Send + Sync {
    fn load(
        &self,
        id: &DocumentId,
    ) -> impl Future<Output = Result<Option<Document>, StoreError>> + Send;
    fn save(&self, doc: &Document) -> impl Future<Output = Result<(), StoreError>> + Send;
    fn remove(&self, id: &DocumentId) -> impl Future<Output = Result<bool, StoreError>> + Send;
    fn load_all(&self) -> impl Future<Output = Result<Vec<Document>, StoreError>> + Send;
}

/// Document entry points consumed by the UI and the editor's commit path.
pub trait DocumentStore: Send + Sync {
    fn create(
        &self,
        draft: NewDocument,
    ) -> impl Future<Output = Result<Document, StoreError>> + Send;
    fn update(
        &self,
        patch: DocumentPatch,
    ) -> impl Future<Output = Result<Document, StoreError>> + Send;
    fn delete(&self, id: &DocumentId) -> impl Future<Output = Result<(), StoreError>> + Send;
    fn list(&self) -> impl Future<Output = Result<Vec<Document>, StoreError>> + Send;
    fn get(&self, id: &DocumentId) -> impl Future<Output = Result<Document, StoreError>> + Send;
}

/// Document store backed by a [`RecordStore`].
#[derive(Clone, Debug)]
pub struct Repository<S: RecordStore> {
    store: S,
}

impl<S: RecordStore> Repository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Access the underlying backend.
    pub fn backend(&self) -> &S {
        &self.store
    }
}

impl<S: RecordStore> DocumentStore for Repository<S> {
    async fn create(&self, draft: NewDocument) -> Result<Document, StoreError> {
        let doc = Document::new(DocumentId::new(), draft.title, draft.body, Utc::now());
        self.store.save(&doc).await?;
        tracing::debug!(id = %doc.id, "created document");
        Ok(doc)
    }

    async fn update(&self, patch: DocumentPatch) -> Result<Document, StoreError> {
        let Some(mut doc) = self.store.load(&patch.id).await? else {
            return Err(StoreError::NotFound(patch.id));
        };

        if !doc.differs_from(&patch) {
            tracing::trace!(id = %doc.id, "update is a no-op");
            return Ok(doc);
        }

        doc.apply(patch, Utc::now());
        self.store.save(&doc).await?;
        tracing::debug!(id = %doc.id, sha = %doc.body_sha, "updated document");
        Ok(doc)
    }

    async fn delete(&self, id: &DocumentId) -> Result<(), StoreError> {
        if self.store.remove(id).await? {
            tracing::debug!(%id, "deleted document");
            Ok(())
        } else {
            Err(StoreError::NotFound(id.clone()))
        }
    }

    async fn list(&self) -> Result<Vec<Document>, StoreError> {
        let mut docs = self.store.load_all().await?;
        docs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        Ok(docs)
    }

    async fn get(&self, id: &DocumentId) -> Result<Document, StoreError> {
        self.store
            .load(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }
}
