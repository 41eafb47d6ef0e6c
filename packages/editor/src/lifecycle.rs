//! Ownership of one live editor.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::blocks::Block;
use crate::error::EditorError;
use crate::surface::{
    ChangeListener, CursorPosition, EditorFactory, EditorOptions, EditorSurface, MountPoint,
    Selection, Subscription,
};
use crate::upload::{Attachment, UploadHandler};

/// A mounted editor plus the change subscription attached to it.
///
/// Created once per mount by [`EditorInstance::mount`]. Dropping the instance
/// destroys it.
pub struct EditorInstance {
    surface: Arc<dyn EditorSurface>,
    upload: Arc<dyn UploadHandler>,
    mount: MountPoint,
    subscription: Mutex<Option<Subscription>>,
    destroyed: AtomicBool,
}

impl EditorInstance {
    pub fn mount(
        factory: &dyn EditorFactory,
        mount: MountPoint,
        options: EditorOptions,
    ) -> Result<Self, EditorError> {
        let upload = Arc::clone(&options.upload);
        let surface = factory.create(&mount, options)?;
        tracing::info!(%mount, "editor mounted");
        Ok(Self {
            surface,
            upload,
            mount,
            subscription: Mutex::new(None),
            destroyed: AtomicBool::new(false),
        })
    }

    pub fn mount_point(&self) -> &MountPoint {
        &self.mount
    }

    pub fn blocks(&self) -> Vec<Block> {
        self.surface.blocks()
    }

    pub fn replace_blocks(&self, old: &[Block], new: Vec<Block>) {
        if !self.is_destroyed() {
            self.surface.replace_blocks(old, new);
        }
    }

    pub fn insert_blocks(&self, at: usize, blocks: Vec<Block>) {
        if !self.is_destroyed() {
            self.surface.insert_blocks(at, blocks);
        }
    }

    pub fn focus(&self) {
        self.surface.focus();
    }

    pub fn selection(&self) -> Option<Selection> {
        self.surface.selection()
    }

    pub fn cursor_position(&self) -> Option<CursorPosition> {
        self.surface.cursor_position()
    }

    pub fn selected_text(&self) -> String {
        self.surface.selected_text()
    }

    /// Register `listener` for change notifications, replacing any earlier one.
    ///
    /// Returns false when the editor refused the subscription; the editor keeps
    /// working, it just won't report edits.
    pub fn subscribe_to_changes(&self, listener: ChangeListener) -> bool {
        if self.is_destroyed() {
            return false;
        }
        self.release_subscription();

        match self.surface.subscribe(listener) {
            Ok(subscription) => {
                if subscription.is_none() {
                    tracing::debug!(mount = %self.mount, "editor returned no unsubscriber");
                }
                *self
                    .subscription
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = subscription;
                true
            }
            Err(err) => {
                tracing::warn!(mount = %self.mount, "failed to subscribe to editor changes: {err}");
                false
            }
        }
    }

    /// Upload `attachment` and embed it as an image after the caret (or at the
    /// end when there is no caret).
    pub async fn insert_attachment(&self, attachment: Attachment) -> Result<String, EditorError> {
        if self.is_destroyed() {
            return Err(EditorError::Destroyed);
        }
        let caption = attachment.name.clone();
        let url = self.upload.upload(attachment).await?;

        let at = match self.surface.cursor_position() {
            Some(cursor) => cursor.block + 1,
            None => self.surface.blocks().len(),
        };
        self.insert_blocks(at, vec![Block::image(url.clone(), caption)]);
        Ok(url)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Release the change subscription. Safe to call more than once.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.release_subscription();
        tracing::info!(mount = %self.mount, "editor destroyed");
    }

    fn release_subscription(&self) {
        let subscription = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
        }
    }
}

impl Drop for EditorInstance {
    fn drop(&mut self) {
        self.destroy();
    }
}
