//! An in-memory editor with no UI.
//!
//! [`HeadlessEditor`] behaves like the real editor library as far as the bridge
//! can tell: programmatic replacements and user edits both fire change
//! listeners synchronously. It backs the test suite and lets the bridge run
//! without a webview (imports, background processing).

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::blocks::Block;
use crate::error::EditorError;
use crate::surface::{
    ChangeListener, CursorPosition, EditorFactory, EditorOptions, EditorSurface, MountPoint,
    Selection, Subscription,
};

/// How [`HeadlessEditor::subscribe`] behaves, to mimic different library versions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SubscribeMode {
    #[default]
    Normal,
    /// Subscribes but returns no unsubscriber.
    NoUnsubscribe,
    /// Subscription setup fails.
    Fail,
}

#[derive(Debug, Default)]
struct Content {
    blocks: Vec<Block>,
    selection: Option<Selection>,
    cursor: Option<CursorPosition>,
}

type Listeners = Vec<(u64, ChangeListener)>;

#[derive(Default)]
pub struct HeadlessEditor {
    content: Mutex<Content>,
    listeners: Arc<Mutex<Listeners>>,
    next_listener: AtomicU64,
    subscribe_mode: SubscribeMode,
    focused: AtomicBool,
    replacements: AtomicUsize,
}

impl HeadlessEditor {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self {
            content: Mutex::new(Content {
                blocks,
                ..Content::default()
            }),
            ..Self::default()
        }
    }

    pub fn with_subscribe_mode(mut self, mode: SubscribeMode) -> Self {
        self.subscribe_mode = mode;
        self
    }

    /// Simulate a user edit: replace the content and notify listeners.
    pub fn user_edit(&self, blocks: Vec<Block>) {
        self.content().blocks = blocks;
        self.notify();
    }

    /// Place the caret.
    pub fn set_cursor(&self, cursor: Option<CursorPosition>) {
        self.content().cursor = cursor;
    }

    /// Select whole blocks by index.
    pub fn select(&self, blocks: Vec<usize>) {
        self.content().selection = if blocks.is_empty() {
            None
        } else {
            Some(Selection { blocks })
        };
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }

    /// Number of `replace_blocks` calls so far.
    pub fn replacements(&self) -> usize {
        self.replacements.load(Ordering::SeqCst)
    }

    pub fn is_focused(&self) -> bool {
        self.focused.load(Ordering::SeqCst)
    }

    fn content(&self) -> MutexGuard<'_, Content> {
        lock(&self.content)
    }

    fn notify(&self) {
        // Listeners read the editor back, so call them without holding any lock
        let listeners: Vec<ChangeListener> =
            lock(&self.listeners).iter().map(|(_, l)| l.clone()).collect();
        for listener in listeners {
            listener();
        }
    }
}

impl EditorSurface for HeadlessEditor {
    fn blocks(&self) -> Vec<Block> {
        self.content().blocks.clone()
    }

    fn replace_blocks(&self, old: &[Block], new: Vec<Block>) {
        self.replacements.fetch_add(1, Ordering::SeqCst);
        {
            let mut content = self.content();
            match find_run(&content.blocks, old) {
                Some(start) => {
                    content.blocks.splice(start..start + old.len(), new);
                }
                None => {
                    tracing::debug!("replaced blocks not found, replacing whole document");
                    content.blocks = new;
                }
            }
            content.selection = None;
        }
        self.notify();
    }

    fn insert_blocks(&self, at: usize, blocks: Vec<Block>) {
        {
            let mut content = self.content();
            let at = at.min(content.blocks.len());
            content.blocks.splice(at..at, blocks);
        }
        self.notify();
    }

    fn subscribe(&self, listener: ChangeListener) -> Result<Option<Subscription>, EditorError> {
        if self.subscribe_mode == SubscribeMode::Fail {
            return Err(EditorError::Subscribe(
                "onChange is not a function".to_string(),
            ));
        }

        let id = self.next_listener.fetch_add(1, Ordering::SeqCst);
        lock(&self.listeners).push((id, listener));

        if self.subscribe_mode == SubscribeMode::NoUnsubscribe {
            return Ok(None);
        }
        let listeners = Arc::clone(&self.listeners);
        Ok(Some(Subscription::new(move || {
            lock(&listeners).retain(|(other, _)| *other != id);
        })))
    }

    fn focus(&self) {
        self.focused.store(true, Ordering::SeqCst);
    }

    fn selection(&self) -> Option<Selection> {
        self.content().selection.clone()
    }

    fn cursor_position(&self) -> Option<CursorPosition> {
        self.content().cursor
    }

    fn selected_text(&self) -> String {
        let content = self.content();
        let Some(selection) = &content.selection else {
            return String::new();
        };
        selection
            .blocks
            .iter()
            .filter_map(|i| content.blocks.get(*i))
            .map(Block::text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Factory producing [`HeadlessEditor`]s and remembering every instance it made.
#[derive(Default)]
pub struct HeadlessFactory {
    subscribe_mode: SubscribeMode,
    fail_create: bool,
    created: Mutex<Vec<Arc<HeadlessEditor>>>,
}

impl HeadlessFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subscribe_mode(mut self, mode: SubscribeMode) -> Self {
        self.subscribe_mode = mode;
        self
    }

    /// A factory whose `create` always fails.
    pub fn failing() -> Self {
        Self {
            fail_create: true,
            ..Self::default()
        }
    }

    /// The most recently created editor.
    pub fn last(&self) -> Option<Arc<HeadlessEditor>> {
        lock(&self.created).last().cloned()
    }

    pub fn created(&self) -> usize {
        lock(&self.created).len()
    }
}

impl EditorFactory for HeadlessFactory {
    fn create(
        &self,
        mount: &MountPoint,
        options: EditorOptions,
    ) -> Result<Arc<dyn EditorSurface>, EditorError> {
        if self.fail_create {
            return Err(EditorError::Create {
                mount: mount.to_string(),
                reason: "no container".to_string(),
            });
        }
        let editor = Arc::new(
            HeadlessEditor::new(options.initial_blocks).with_subscribe_mode(self.subscribe_mode),
        );
        lock(&self.created).push(Arc::clone(&editor));
        Ok(editor)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Start index of `needle` as a contiguous run inside `haystack`.
fn find_run(haystack: &[Block], needle: &[Block]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
