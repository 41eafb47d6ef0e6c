//! # Filesystem-backed record store
//!
//! [`FileStore`] is a [`RecordStore`] implementation that persists documents to
//! the local filesystem. It is used on desktop to retain notes across app
//! restarts.
//!
//! ## Layout
//!
//! ```text
//! <base_dir>/
//! └── documents/
//!     └── <document_id>.json     # pretty-printed Document
//! ```
//!
//! Files that fail to parse are reported as [`StoreError::Malformed`] by
//! `load`, and skipped with a warning by `load_all` so one bad file does not
//! hide every other note.

use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::models::{Document, DocumentId};
use crate::repo::RecordStore;

/// Filesystem-backed RecordStore for desktop persistence.
#[derive(Clone, Debug)]
pub struct FileStore {
    base: PathBuf,
}

impl FileStore {
    pub fn new(base: PathBuf) -> Self {
        Self { base }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    fn documents_dir(&self) -> PathBuf {
        self.base.join("documents")
    }

    fn document_path(&self, id: &DocumentId) -> PathBuf {
        self.documents_dir().join(format!("{id}.json"))
    }
}

impl RecordStore for FileStore {
    async fn load(&self, id: &DocumentId) -> Result<Option<Document>, StoreError> {
        match tokio::fs::read(self.document_path(id)).await {
            Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, doc: &Document) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(self.documents_dir()).await?;
        let raw = serde_json::to_vec_pretty(doc)?;
        // Write then rename so a crash never leaves a half-written document
        let path = self.document_path(&doc.id);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, raw).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove(&self, id: &DocumentId) -> Result<bool, StoreError> {
        match tokio::fs::remove_file(self.document_path(id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn load_all(&self) -> Result<Vec<Document>, StoreError> {
        let mut entries = match tokio::fs::read_dir(self.documents_dir()).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut docs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let raw = tokio::fs::read(&path).await?;
            match serde_json::from_slice::<Document>(&raw) {
                Ok(doc) => docs.push(doc),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping malformed document")
                }
            }
        }
        Ok(docs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentPatch, NewDocument};
    use crate::repo::{DocumentStore, Repository};

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();

        let repo = Repository::new(FileStore::new(dir.path().to_path_buf()));
        let doc = repo
            .create(NewDocument::new("hello", "Hello from FileStore!"))
            .await
            .unwrap();

        // Re-open from same directory
        let repo2 = Repository::new(FileStore::new(dir.path().to_path_buf()));
        let docs = repo2.list().await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0], doc);
    }

    #[tokio::test]
    async fn test_missing_directory_lists_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nope"));
        assert!(store.load_all().await.unwrap().is_empty());
        assert!(store.load(&DocumentId::new()).await.unwrap().is_none());
        assert!(!store.remove(&DocumentId::new()).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_and_delete_persist() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::new(FileStore::new(dir.path().to_path_buf()));

        let doc = repo.create(NewDocument::new("n", "one")).await.unwrap();
        repo.update(DocumentPatch::body(doc.id.clone(), "two"))
            .await
            .unwrap();
        assert_eq!(repo.get(&doc.id).await.unwrap().body, "two");

        repo.delete(&doc.id).await.unwrap();
        assert!(matches!(
            repo.get(&doc.id).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_malformed_file_is_skipped_in_listing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf());
        let repo = Repository::new(store.clone());
        repo.create(NewDocument::new("good", "")).await.unwrap();

        std::fs::write(store.documents_dir().join("broken.json"), "{not json").unwrap();

        let docs = repo.list().await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].title, "good");
    }
}
