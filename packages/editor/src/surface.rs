//! The seam between this crate and the rich-text editor library.
//!
//! The editor itself is owned by a third-party library (a web editor running in
//! the desktop shell's webview, or [`crate::HeadlessEditor`] in tests). This
//! module describes the handful of operations the bridge needs from it.

use std::fmt;
use std::sync::Arc;

use crate::blocks::Block;
use crate::error::EditorError;
use crate::upload::{DataUriUploader, UploadHandler};

/// Callback fired after every content mutation.
pub type ChangeListener = Arc<dyn Fn() + Send + Sync>;

/// Handle returned by a successful change subscription. Dropping it does not
/// unsubscribe; call [`Subscription::unsubscribe`].
pub struct Subscription(Box<dyn FnOnce() + Send + Sync>);

impl Subscription {
    pub fn new(unsubscribe: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self(Box::new(unsubscribe))
    }

    pub fn unsubscribe(self) {
        (self.0)()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Subscription")
    }
}

/// Block-level selection, as indices into the block list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    pub blocks: Vec<usize>,
}

/// Caret position: a block index and a character offset inside it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CursorPosition {
    pub block: usize,
    pub offset: usize,
}

/// Where the editor is mounted, e.g. the id of the container element.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MountPoint(pub String);

impl MountPoint {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for MountPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Configuration handed to the editor library on creation.
#[derive(Clone)]
pub struct EditorOptions {
    pub initial_blocks: Vec<Block>,
    pub upload: Arc<dyn UploadHandler>,
    pub placeholder: String,
}

impl EditorOptions {
    pub fn new(initial_blocks: Vec<Block>) -> Self {
        Self {
            initial_blocks,
            upload: Arc::new(DataUriUploader::new()),
            placeholder: "Start writing...".to_string(),
        }
    }

    pub fn with_upload(mut self, upload: Arc<dyn UploadHandler>) -> Self {
        self.upload = upload;
        self
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = placeholder.into();
        self
    }
}

impl fmt::Debug for EditorOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditorOptions")
            .field("initial_blocks", &self.initial_blocks.len())
            .field("placeholder", &self.placeholder)
            .finish_non_exhaustive()
    }
}

/// A live editor owned by the editor library.
pub trait EditorSurface: Send + Sync {
    /// Current in-memory content.
    fn blocks(&self) -> Vec<Block>;

    /// Atomically replace `old` with `new`.
    fn replace_blocks(&self, old: &[Block], new: Vec<Block>);

    /// Insert `blocks` before index `at` (clamped to the end).
    fn insert_blocks(&self, at: usize, blocks: Vec<Block>);

    /// Register a change listener. `Ok(None)` means the library gave back no
    /// way to unsubscribe.
    fn subscribe(&self, listener: ChangeListener) -> Result<Option<Subscription>, EditorError>;

    fn focus(&self);

    fn selection(&self) -> Option<Selection>;

    fn cursor_position(&self) -> Option<CursorPosition>;

    fn selected_text(&self) -> String;
}

/// Creates editors. Supplied by the host (webview glue, tests).
pub trait EditorFactory: Send + Sync {
    fn create(
        &self,
        mount: &MountPoint,
        options: EditorOptions,
    ) -> Result<Arc<dyn EditorSurface>, EditorError>;
}
