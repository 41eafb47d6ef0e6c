//! # Commit scheduler
//!
//! Collapses bursts of editor changes into single store writes. Each session
//! owns one [`CommitScheduler`], a spawned task that holds the latest unsaved
//! blocks and writes them with a trailing debounce: every new value restarts
//! the window, and only the last value of a burst reaches the store.
//!
//! A failed write never rolls the editor back. The scheduler keeps the failed
//! value, reports [`SyncStatus::Failed`] and commits it again on
//! [`CommitScheduler::retry`]. A newer edit supersedes it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use store::{DocumentId, DocumentPatch, DocumentStore, EditorConfig};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep_until, Instant};

use crate::blocks::Block;
use crate::normalize;

/// When and how editor content is committed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommitPolicy {
    pub debounce: Duration,
    pub flush_on_teardown: bool,
}

impl Default for CommitPolicy {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            flush_on_teardown: false,
        }
    }
}

impl From<&EditorConfig> for CommitPolicy {
    fn from(config: &EditorConfig) -> Self {
        Self {
            debounce: Duration::from_millis(config.commit_debounce_ms),
            flush_on_teardown: config.flush_on_teardown,
        }
    }
}

/// Result of one store write.
#[derive(Clone, Debug, PartialEq)]
pub enum CommitOutcome {
    Committed { updated_at: DateTime<Utc> },
    Failed { reason: String },
}

/// What the scheduler is doing, for indicators.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum SyncStatus {
    #[default]
    Idle,
    /// Unsaved changes waiting for the debounce window to close.
    Pending,
    Committing,
    Saved { at: DateTime<Utc> },
    Failed { reason: String },
}

impl SyncStatus {
    /// Changes exist that the store has not accepted yet.
    pub fn has_unsaved(&self) -> bool {
        matches!(self, SyncStatus::Pending | SyncStatus::Committing | SyncStatus::Failed { .. })
    }
}

/// What happened to unsaved content when a session ended.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// Unsaved content was written during teardown.
    pub flushed: bool,
    /// Unsaved content was discarded.
    pub dropped_pending: bool,
}

enum Command {
    Push(Vec<Block>),
    Retry,
    Flush(oneshot::Sender<Option<CommitOutcome>>),
    Shutdown {
        flush: bool,
        done: Option<oneshot::Sender<TeardownReport>>,
    },
}

/// Handle to a document's commit task.
///
/// Dropping the handle shuts the task down under the policy's teardown rule.
pub struct CommitScheduler {
    commands: mpsc::UnboundedSender<Command>,
    status: Arc<watch::Sender<SyncStatus>>,
    policy: CommitPolicy,
}

impl CommitScheduler {
    /// Spawn the commit task for `id`. Must be called from within a Tokio runtime.
    pub fn spawn<S>(id: DocumentId, store: Arc<S>, policy: CommitPolicy) -> Self
    where
        S: DocumentStore + 'static,
    {
        let (commands, rx) = mpsc::unbounded_channel();
        let status = Arc::new(watch::Sender::new(SyncStatus::Idle));
        let worker = Worker {
            id,
            store,
            debounce: policy.debounce,
            status: Arc::clone(&status),
            pending: None,
            failed: None,
            deadline: None,
        };
        tokio::spawn(worker.run(rx));
        Self {
            commands,
            status,
            policy,
        }
    }

    pub fn policy(&self) -> CommitPolicy {
        self.policy
    }

    /// Queue `blocks` as the latest content, restarting the debounce window.
    /// Returns false once the task has shut down.
    pub fn push(&self, blocks: Vec<Block>) -> bool {
        if self.commands.send(Command::Push(blocks)).is_err() {
            return false;
        }
        self.status.send_replace(SyncStatus::Pending);
        true
    }

    /// Commit the last failed value again, now.
    pub fn retry(&self) {
        let _ = self.commands.send(Command::Retry);
    }

    /// Commit pending content without waiting for the window to close.
    /// `None` when there was nothing to commit.
    pub async fn flush(&self) -> Option<CommitOutcome> {
        let (tx, rx) = oneshot::channel();
        self.commands.send(Command::Flush(tx)).ok()?;
        rx.await.ok().flatten()
    }

    /// Stop the task, committing unsaved content first when `flush` is set.
    pub async fn shutdown(&self, flush: bool) -> TeardownReport {
        let (tx, rx) = oneshot::channel();
        let sent = self.commands.send(Command::Shutdown {
            flush,
            done: Some(tx),
        });
        if sent.is_err() {
            return TeardownReport::default();
        }
        rx.await.unwrap_or_default()
    }

    /// Stop the task without waiting for it.
    pub fn close(&self, flush: bool) {
        let _ = self.commands.send(Command::Shutdown { flush, done: None });
    }

    pub fn status(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    pub fn current_status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }
}

impl Drop for CommitScheduler {
    fn drop(&mut self) {
        self.close(self.policy.flush_on_teardown);
    }
}

struct Worker<S> {
    id: DocumentId,
    store: Arc<S>,
    debounce: Duration,
    status: Arc<watch::Sender<SyncStatus>>,
    pending: Option<Vec<Block>>,
    failed: Option<Vec<Block>>,
    deadline: Option<Instant>,
}

impl<S: DocumentStore> Worker<S> {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            let command = match self.deadline {
                Some(deadline) => tokio::select! {
                    command = commands.recv() => command,
                    _ = sleep_until(deadline) => {
                        self.commit_pending().await;
                        continue;
                    }
                },
                None => commands.recv().await,
            };

            match command {
                Some(Command::Push(blocks)) => {
                    self.pending = Some(blocks);
                    self.failed = None;
                    self.deadline = Some(Instant::now() + self.debounce);
                    self.status.send_replace(SyncStatus::Pending);
                }
                Some(Command::Retry) => {
                    if self.pending.is_none() {
                        if let Some(blocks) = self.failed.take() {
                            tracing::debug!(id = %self.id, "retrying failed commit");
                            self.commit(blocks).await;
                        }
                    }
                }
                Some(Command::Flush(reply)) => {
                    let outcome = self.commit_pending().await;
                    let _ = reply.send(outcome);
                }
                Some(Command::Shutdown { flush, done }) => {
                    let report = self.finish(flush).await;
                    if let Some(done) = done {
                        let _ = done.send(report);
                    }
                    break;
                }
                None => {
                    self.finish(false).await;
                    break;
                }
            }
        }
    }

    async fn commit_pending(&mut self) -> Option<CommitOutcome> {
        self.deadline = None;
        let blocks = self.pending.take()?;
        Some(self.commit(blocks).await)
    }

    async fn commit(&mut self, blocks: Vec<Block>) -> CommitOutcome {
        self.status.send_replace(SyncStatus::Committing);

        let result = match normalize::serialize(&blocks) {
            Ok(body) => self
                .store
                .update(DocumentPatch::body(self.id.clone(), body))
                .await
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        match result {
            Ok(doc) => {
                tracing::debug!(id = %self.id, sha = %doc.body_sha, blocks = blocks.len(), "committed editor content");
                self.status.send_replace(SyncStatus::Saved {
                    at: doc.updated_at,
                });
                CommitOutcome::Committed {
                    updated_at: doc.updated_at,
                }
            }
            Err(reason) => {
                tracing::warn!(id = %self.id, "commit failed, keeping local content: {reason}");
                self.failed = Some(blocks);
                self.status.send_replace(SyncStatus::Failed {
                    reason: reason.clone(),
                });
                CommitOutcome::Failed { reason }
            }
        }
    }

    async fn finish(&mut self, flush: bool) -> TeardownReport {
        self.deadline = None;
        let Some(blocks) = self.pending.take().or_else(|| self.failed.take()) else {
            return TeardownReport::default();
        };

        if flush {
            let flushed = matches!(self.commit(blocks).await, CommitOutcome::Committed { .. });
            TeardownReport {
                flushed,
                dropped_pending: !flushed,
            }
        } else {
            tracing::warn!(id = %self.id, "editor closed with unsaved changes, discarding them");
            TeardownReport {
                flushed: false,
                dropped_pending: true,
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use store::{Document, MemoryStore, NewDocument, Repository, StoreError};

    /// Store wrapper that counts writes and can be switched to fail them.
    pub(crate) struct CountingStore {
        inner: Repository<MemoryStore>,
        pub(crate) updates: AtomicUsize,
        pub(crate) bodies: Mutex<Vec<String>>,
        pub(crate) failing: AtomicBool,
    }

    impl Default for CountingStore {
        fn default() -> Self {
            Self {
                inner: Repository::new(MemoryStore::new()),
                updates: AtomicUsize::new(0),
                bodies: Mutex::new(Vec::new()),
                failing: AtomicBool::new(false),
            }
        }
    }

    impl CountingStore {
        pub(crate) fn update_count(&self) -> usize {
            self.updates.load(Ordering::SeqCst)
        }

        pub(crate) fn last_body(&self) -> Option<String> {
            self.bodies.lock().unwrap().last().cloned()
        }

        pub(crate) fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }
    }

    impl DocumentStore for CountingStore {
        async fn create(&self, draft: NewDocument) -> Result<Document, StoreError> {
            self.inner.create(draft).await
        }

        async fn update(&self, patch: DocumentPatch) -> Result<Document, StoreError> {
            self.updates.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("disk full".to_string()));
            }
            if let Some(body) = &patch.body {
                self.bodies.lock().unwrap().push(body.clone());
            }
            self.inner.update(patch).await
        }

        async fn delete(&self, id: &DocumentId) -> Result<(), StoreError> {
            self.inner.delete(id).await
        }

        async fn list(&self) -> Result<Vec<Document>, StoreError> {
            self.inner.list().await
        }

        async fn get(&self, id: &DocumentId) -> Result<Document, StoreError> {
            self.inner.get(id).await
        }
    }

    pub(crate) async fn store_with_doc(body: &str) -> (Arc<CountingStore>, Document) {
        let store = Arc::new(CountingStore::default());
        let doc = store.create(NewDocument::new("Note", body)).await.unwrap();
        (store, doc)
    }

    fn body_of(blocks: &[Block]) -> String {
        normalize::serialize(blocks).unwrap()
    }

    #[test]
    fn test_policy_from_config() {
        let config = EditorConfig {
            commit_debounce_ms: 1200,
            flush_on_teardown: true,
        };
        let policy = CommitPolicy::from(&config);
        assert_eq!(policy.debounce, Duration::from_millis(1200));
        assert!(policy.flush_on_teardown);
        assert_eq!(
            CommitPolicy::from(&EditorConfig::default()),
            CommitPolicy::default()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_collapses_into_one_commit() {
        let (store, doc) = store_with_doc("").await;
        let scheduler = CommitScheduler::spawn(doc.id.clone(), store.clone(), CommitPolicy::default());

        for text in ["h", "he", "hel", "hell", "hello"] {
            scheduler.push(vec![Block::paragraph(text)]);
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(store.update_count(), 0);
        assert_eq!(scheduler.current_status(), SyncStatus::Pending);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(store.update_count(), 1);
        assert_eq!(
            store.last_body(),
            Some(body_of(&[Block::paragraph("hello")]))
        );
        assert!(matches!(
            scheduler.current_status(),
            SyncStatus::Saved { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_commits_immediately() {
        let (store, doc) = store_with_doc("").await;
        let scheduler = CommitScheduler::spawn(doc.id.clone(), store.clone(), CommitPolicy::default());

        assert_eq!(scheduler.flush().await, None);

        scheduler.push(vec![Block::heading(1, "now")]);
        let outcome = scheduler.flush().await;
        assert!(matches!(outcome, Some(CommitOutcome::Committed { .. })));
        assert_eq!(store.update_count(), 1);

        // Nothing left for the debounce window to commit
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(store.update_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_keeps_content_and_retry_commits_it() {
        let (store, doc) = store_with_doc("").await;
        let scheduler = CommitScheduler::spawn(doc.id.clone(), store.clone(), CommitPolicy::default());

        store.set_failing(true);
        scheduler.push(vec![Block::paragraph("precious")]);
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(matches!(
            scheduler.current_status(),
            SyncStatus::Failed { .. }
        ));
        assert!(scheduler.current_status().has_unsaved());

        store.set_failing(false);
        scheduler.retry();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(matches!(
            scheduler.current_status(),
            SyncStatus::Saved { .. }
        ));
        assert_eq!(store.update_count(), 2);
        assert_eq!(
            store.inner.get(&doc.id).await.unwrap().body,
            body_of(&[Block::paragraph("precious")])
        );

        // Nothing failed any more
        scheduler.retry();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(store.update_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_edit_supersedes_failed_value() {
        let (store, doc) = store_with_doc("").await;
        let scheduler = CommitScheduler::spawn(doc.id.clone(), store.clone(), CommitPolicy::default());

        store.set_failing(true);
        scheduler.push(vec![Block::paragraph("old")]);
        tokio::time::sleep(Duration::from_millis(400)).await;
        store.set_failing(false);

        scheduler.push(vec![Block::paragraph("new")]);
        scheduler.retry();
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(store.update_count(), 2);
        assert_eq!(store.last_body(), Some(body_of(&[Block::paragraph("new")])));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drops_or_flushes_pending() {
        let (store, doc) = store_with_doc("").await;

        let scheduler = CommitScheduler::spawn(doc.id.clone(), store.clone(), CommitPolicy::default());
        scheduler.push(vec![Block::paragraph("lost")]);
        let report = scheduler.shutdown(false).await;
        assert_eq!(
            report,
            TeardownReport {
                flushed: false,
                dropped_pending: true
            }
        );
        assert!(!scheduler.push(vec![Block::paragraph("late")]));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(store.update_count(), 0);

        let scheduler = CommitScheduler::spawn(doc.id.clone(), store.clone(), CommitPolicy::default());
        scheduler.push(vec![Block::paragraph("kept")]);
        let report = scheduler.shutdown(true).await;
        assert!(report.flushed);
        assert!(!report.dropped_pending);
        assert_eq!(store.last_body(), Some(body_of(&[Block::paragraph("kept")])));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_with_nothing_pending() {
        let (store, doc) = store_with_doc("").await;
        let scheduler = CommitScheduler::spawn(doc.id.clone(), store.clone(), CommitPolicy::default());
        assert_eq!(scheduler.shutdown(true).await, TeardownReport::default());
        // A second shutdown finds the task gone
        assert_eq!(scheduler.shutdown(true).await, TeardownReport::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_applies_teardown_policy() {
        let (store, doc) = store_with_doc("").await;
        let policy = CommitPolicy {
            flush_on_teardown: true,
            ..CommitPolicy::default()
        };
        let scheduler = CommitScheduler::spawn(doc.id.clone(), store.clone(), policy);
        scheduler.push(vec![Block::quote("on drop")]);
        drop(scheduler);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(store.update_count(), 1);
    }
}
