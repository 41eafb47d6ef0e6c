//! # Editor crate — keeps a rich-text editor and the document store in step
//!
//! The block editor owns its content in memory; the store owns the persisted
//! body. This crate bridges the two.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`blocks`] | The typed [`Block`] content model |
//! | [`normalize`] | Raw body (block JSON or legacy markup) → blocks, and blocks → body |
//! | [`surface`] | Traits the host editor library is driven through |
//! | [`lifecycle`] | [`EditorInstance`]: one mounted editor and its change subscription |
//! | [`upload`] | Attachment handling for dropped files |
//! | [`sync`] | [`SyncSession`]: inbound application and outbound forwarding with echo suppression |
//! | [`commit`] | [`CommitScheduler`]: debounced, retryable store writes |
//! | [`headless`] | An in-memory editor for tests and background work |

pub mod blocks;
pub mod commit;
pub mod error;
pub mod headless;
pub mod lifecycle;
pub mod normalize;
pub mod surface;
pub mod sync;
pub mod upload;

pub use blocks::{Alignment, Block};
pub use commit::{CommitOutcome, CommitPolicy, CommitScheduler, SyncStatus, TeardownReport};
pub use error::{EditorError, UploadError};
pub use headless::{HeadlessEditor, HeadlessFactory, SubscribeMode};
pub use lifecycle::EditorInstance;
pub use normalize::{detect_format, normalize, serialize, BodyFormat};
pub use surface::{
    ChangeListener, CursorPosition, EditorFactory, EditorOptions, EditorSurface, MountPoint,
    Selection, Subscription,
};
pub use sync::{InboundOutcome, SyncSession, SyncState};
pub use upload::{Attachment, DataUriUploader, UploadHandler};
