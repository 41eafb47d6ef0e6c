//! # Editor ↔ store synchronization
//!
//! A [`SyncSession`] binds one mounted editor to one stored document.
//!
//! **Inbound** ([`SyncSession::apply_external`]): a body arriving from the
//! store is normalized and compared with what the editor holds. Equal content
//! is left alone. Content this session sent out since the last inbound
//! replacement is the store echoing our own commit and is skipped too, so a
//! slow round trip cannot rewind the user's typing. Anything else replaces the
//! editor content. [`SyncSession::apply_document`] also refuses a document
//! other than the one the session is bound to.
//!
//! **Outbound** (change listener): every editor change is forwarded to the
//! session's [`CommitScheduler`], except the change notification caused by an
//! inbound replacement. While a replacement is in progress the session records
//! the blocks it expects the editor to hold; a notification showing exactly
//! those blocks is the echo and is dropped.
//!
//! ```text
//!            apply_external            replace done
//!   Idle ─────────────────────▶ ProgrammaticUpdate ──────────▶ Idle
//!    │  ▲
//!    │  │ commit written
//!    ▼  │
//!   PendingCommit ◀──┐                 teardown ─▶ Destroyed
//!    └───────────────┘ commit failed, held for retry
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use store::{Document, DocumentId, DocumentStore};
use tokio::sync::watch;

use crate::blocks::Block;
use crate::commit::{CommitOutcome, CommitPolicy, CommitScheduler, SyncStatus, TeardownReport};
use crate::error::EditorError;
use crate::lifecycle::EditorInstance;
use crate::normalize;
use crate::surface::{EditorFactory, EditorOptions, MountPoint};

/// How many outbound values are remembered for own-echo detection.
const RECENT_OUTBOUND: usize = 16;

/// Where a session is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    /// An inbound replacement is being applied; its echo will be suppressed.
    ProgrammaticUpdate,
    /// Local changes are not in the store yet: waiting, being committed, or
    /// held after a failed commit.
    PendingCommit,
    Destroyed,
}

/// What [`SyncSession::apply_external`] did with an inbound body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InboundOutcome {
    /// The editor already holds this content.
    Unchanged,
    /// The body is a value this session sent out; the editor was not rewound.
    OwnEcho,
    Replaced,
    /// The document is not the one this session is bound to; nothing was applied.
    OtherDocument,
    /// The session has been torn down.
    Detached,
}

#[derive(Default)]
struct Guard {
    /// Blocks the editor should hold once the current inbound replacement lands.
    expected: Option<Vec<Block>>,
    generation: u64,
    recent: VecDeque<Vec<Block>>,
}

impl Guard {
    fn remember(&mut self, blocks: &[Block]) {
        if self.recent.back().is_some_and(|last| last.as_slice() == blocks) {
            return;
        }
        if self.recent.len() == RECENT_OUTBOUND {
            self.recent.pop_front();
        }
        self.recent.push_back(blocks.to_vec());
    }
}

struct Shared {
    document: DocumentId,
    instance: EditorInstance,
    scheduler: CommitScheduler,
    guard: Mutex<Guard>,
    destroyed: AtomicBool,
}

impl Shared {
    fn guard(&self) -> MutexGuard<'_, Guard> {
        self.guard.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn on_change(&self) {
        if self.destroyed.load(Ordering::SeqCst) {
            return;
        }
        let blocks = self.instance.blocks();
        {
            let mut guard = self.guard();
            if guard.expected.as_ref() == Some(&blocks) {
                tracing::trace!(id = %self.document, "suppressed echo of inbound update");
                return;
            }
            guard.remember(&blocks);
        }
        self.scheduler.push(blocks);
    }
}

/// Two-way binding between one editor instance and one document.
pub struct SyncSession {
    shared: Arc<Shared>,
    subscribed: bool,
}

impl SyncSession {
    /// Mount an editor showing `document` and bind it.
    pub fn open<S>(
        factory: &dyn EditorFactory,
        mount: MountPoint,
        options: EditorOptions,
        document: &Document,
        store: Arc<S>,
        policy: CommitPolicy,
    ) -> Result<Self, EditorError>
    where
        S: DocumentStore + 'static,
    {
        tracing::debug!(
            id = %document.id,
            format = ?normalize::detect_format(Some(&document.body)),
            "opening document in editor"
        );
        let options = EditorOptions {
            initial_blocks: normalize::normalize(Some(&document.body)),
            ..options
        };
        let instance = EditorInstance::mount(factory, mount, options)?;
        Ok(Self::attach(instance, document, store, policy))
    }

    /// Bind an already mounted editor to `document`.
    ///
    /// Subscribes once to the editor's change notifications. If the editor
    /// refuses the subscription the session still applies inbound updates,
    /// it just never commits.
    pub fn attach<S>(
        instance: EditorInstance,
        document: &Document,
        store: Arc<S>,
        policy: CommitPolicy,
    ) -> Self
    where
        S: DocumentStore + 'static,
    {
        let scheduler = CommitScheduler::spawn(document.id.clone(), store, policy);
        let shared = Arc::new(Shared {
            document: document.id.clone(),
            instance,
            scheduler,
            guard: Mutex::new(Guard::default()),
            destroyed: AtomicBool::new(false),
        });

        let weak: Weak<Shared> = Arc::downgrade(&shared);
        let subscribed = shared.instance.subscribe_to_changes(Arc::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.on_change();
            }
        }));

        Self { shared, subscribed }
    }

    pub fn document_id(&self) -> &DocumentId {
        &self.shared.document
    }

    pub fn instance(&self) -> &EditorInstance {
        &self.shared.instance
    }

    /// False when the editor refused the change subscription.
    pub fn receives_changes(&self) -> bool {
        self.subscribed
    }

    /// Apply a changed document, provided it is the one this session is bound to.
    pub async fn apply_document(&self, document: &Document) -> InboundOutcome {
        if self.shared.destroyed.load(Ordering::SeqCst) {
            return InboundOutcome::Detached;
        }
        if document.id != self.shared.document {
            tracing::warn!(
                bound = %self.shared.document,
                incoming = %document.id,
                "refusing to load another document into this editor"
            );
            return InboundOutcome::OtherDocument;
        }
        self.apply_external(Some(&document.body)).await
    }

    /// Apply a body that changed in the store.
    pub async fn apply_external(&self, body: Option<&str>) -> InboundOutcome {
        let shared = &self.shared;
        if shared.destroyed.load(Ordering::SeqCst) {
            return InboundOutcome::Detached;
        }

        let incoming = normalize::normalize(body);
        let current = shared.instance.blocks();
        if incoming == current {
            return InboundOutcome::Unchanged;
        }

        let generation = {
            let mut guard = shared.guard();
            if guard.recent.contains(&incoming) {
                tracing::debug!(id = %shared.document, "skipping echo of own commit");
                return InboundOutcome::OwnEcho;
            }
            // The store moved past everything sent so far
            guard.recent.clear();
            guard.generation += 1;
            guard.expected = Some(incoming.clone());
            guard.generation
        };

        tracing::debug!(id = %shared.document, blocks = incoming.len(), "applying external update");
        shared.instance.replace_blocks(&current, incoming);

        // Editors may deliver the change notification on a later tick
        tokio::task::yield_now().await;

        let mut guard = shared.guard();
        if guard.generation == generation {
            guard.expected = None;
        }
        InboundOutcome::Replaced
    }

    pub fn state(&self) -> SyncState {
        let shared = &self.shared;
        if shared.destroyed.load(Ordering::SeqCst) {
            return SyncState::Destroyed;
        }
        if shared.guard().expected.is_some() {
            return SyncState::ProgrammaticUpdate;
        }
        if shared.scheduler.current_status().has_unsaved() {
            SyncState::PendingCommit
        } else {
            SyncState::Idle
        }
    }

    pub fn status(&self) -> watch::Receiver<SyncStatus> {
        self.shared.scheduler.status()
    }

    pub fn current_status(&self) -> SyncStatus {
        self.shared.scheduler.current_status()
    }

    /// Commit the last failed value again.
    pub fn retry(&self) {
        self.shared.scheduler.retry();
    }

    /// Commit pending changes now.
    pub async fn flush(&self) -> Option<CommitOutcome> {
        self.shared.scheduler.flush().await
    }

    /// End the session and wait for the commit task to settle.
    pub async fn teardown(&self) -> TeardownReport {
        if !self.begin_teardown() {
            return TeardownReport::default();
        }
        let flush = self.shared.scheduler.policy().flush_on_teardown;
        self.shared.scheduler.shutdown(flush).await
    }

    /// End the session without waiting. Used from synchronous drop paths.
    pub fn close(&self) {
        if self.begin_teardown() {
            let flush = self.shared.scheduler.policy().flush_on_teardown;
            self.shared.scheduler.close(flush);
        }
    }

    fn begin_teardown(&self) -> bool {
        let shared = &self.shared;
        if shared.destroyed.swap(true, Ordering::SeqCst) {
            return false;
        }
        shared.instance.destroy();
        tracing::info!(id = %shared.document, "sync session closed");
        true
    }
}

impl Drop for SyncSession {
    fn drop(&mut self) {
        self.close();
    }
}
