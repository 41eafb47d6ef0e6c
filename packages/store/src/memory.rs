use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::StoreError;
use crate::models::{Document, DocumentId};
use crate::repo::RecordStore;

/// In-memory RecordStore for testing and desktop fallback.
///
/// Clones share the same underlying map.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    documents: Arc<Mutex<HashMap<DocumentId, Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn documents(&self) -> Result<MutexGuard<'_, HashMap<DocumentId, Document>>, StoreError> {
        self.documents.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl RecordStore for MemoryStore {
    async fn load(&self, id: &DocumentId) -> Result<Option<Document>, StoreError> {
        Ok(self.documents()?.get(id).cloned())
    }

    async fn save(&self, doc: &Document) -> Result<(), StoreError> {
        self.documents()?.insert(doc.id.clone(), doc.clone());
        Ok(())
    }

    async fn remove(&self, id: &DocumentId) -> Result<bool, StoreError> {
        Ok(self.documents()?.remove(id).is_some())
    }

    async fn load_all(&self) -> Result<Vec<Document>, StoreError> {
        Ok(self.documents()?.values().cloned().collect())
    }
}
