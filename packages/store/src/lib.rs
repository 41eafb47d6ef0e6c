pub mod config;
pub mod digest;
pub mod error;
pub mod models;
pub mod repo;

mod file_store;
mod memory;
pub use file_store::FileStore;
pub use memory::MemoryStore;

pub use config::{AppConfig, AuthConfig, EditorConfig};
pub use digest::Sha;
pub use error::{ConfigError, StoreError};
pub use models::{Document, DocumentId, DocumentPatch, NewDocument};
pub use repo::{DocumentStore, RecordStore, Repository};
