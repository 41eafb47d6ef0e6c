//! Hook binding a document signal to a mounted editor.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use dioxus::core::Task;
use dioxus::prelude::*;
use editor::{
    CommitPolicy, EditorFactory, EditorOptions, MountPoint, SyncSession, SyncStatus,
};
use store::{Document, DocumentStore};

type SessionSlot = Rc<RefCell<Option<Rc<SyncSession>>>>;

/// Handle returned by [`use_editor_sync`].
#[derive(Clone)]
pub struct EditorSync {
    session: SessionSlot,
    status: Signal<SyncStatus>,
    mount_error: Signal<Option<String>>,
}

impl EditorSync {
    /// Latest commit status. Reading it subscribes the component.
    pub fn status(&self) -> SyncStatus {
        (self.status)()
    }

    /// Commit the last failed content again.
    pub fn retry(&self) {
        if let Some(session) = self.session() {
            session.retry();
        }
    }

    /// Commit pending changes without waiting for the debounce window.
    pub fn flush(&self) {
        if let Some(session) = self.session() {
            spawn(async move {
                session.flush().await;
            });
        }
    }

    /// Session for the document currently shown, if the editor is mounted.
    pub fn session(&self) -> Option<Rc<SyncSession>> {
        self.session.borrow().clone()
    }

    /// Why the editor could not be mounted, if it could not.
    pub fn mount_error(&self) -> Option<String> {
        (self.mount_error)()
    }
}

/// Keep a mounted editor in step with `document`.
///
/// The editor is created after the first render. Body changes to `document`
/// are applied to the editor; edits made in the editor are committed to
/// `store` under `policy`. When `document` switches to another note the old
/// session is closed (flushing only if `policy.flush_on_teardown`) and a new
/// editor is mounted for the new note. The session is closed when the
/// component unmounts.
pub fn use_editor_sync<S>(
    factory: Arc<dyn EditorFactory>,
    mount: MountPoint,
    document: Signal<Document>,
    store: Arc<S>,
    policy: CommitPolicy,
) -> EditorSync
where
    S: DocumentStore + 'static,
{
    let mut status = use_signal(SyncStatus::default);
    let mut mount_error = use_signal(|| None::<String>);
    let mut mirror = use_signal(|| None::<Task>);
    let slot: SessionSlot = use_hook(|| Rc::new(RefCell::new(None)));

    use_effect({
        let slot = slot.clone();
        move || {
            let doc = document.read().clone();
            let current = slot.borrow().clone();

            // Same note: apply the changed body
            if let Some(session) = current.filter(|s| s.document_id() == &doc.id) {
                spawn(async move {
                    let outcome = session.apply_document(&doc).await;
                    tracing::trace!(?outcome, "applied document change to editor");
                });
                return;
            }

            // First render or another note: replace the session
            if let Some(previous) = slot.borrow_mut().take() {
                previous.close();
            }
            if let Some(task) = mirror.write().take() {
                task.cancel();
            }

            let options = EditorOptions::new(Vec::new());
            match SyncSession::open(
                factory.as_ref(),
                mount.clone(),
                options,
                &doc,
                store.clone(),
                policy,
            ) {
                Ok(session) => {
                    let session = Rc::new(session);
                    let mut rx = session.status();
                    let task = spawn(async move {
                        loop {
                            status.set(rx.borrow_and_update().clone());
                            if rx.changed().await.is_err() {
                                break;
                            }
                        }
                    });
                    mirror.set(Some(task));
                    mount_error.set(None);
                    *slot.borrow_mut() = Some(session);
                }
                Err(e) => {
                    tracing::warn!(id = %doc.id, "failed to mount editor: {e}");
                    status.set(SyncStatus::Idle);
                    mount_error.set(Some(e.to_string()));
                }
            }
        }
    });

    use_drop({
        let slot = slot.clone();
        move || {
            if let Some(session) = slot.borrow_mut().take() {
                session.close();
            }
        }
    });

    EditorSync {
        session: slot,
        status,
        mount_error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::time::Duration;

    use dioxus_core::{NoOpMutations, VirtualDom};
    use editor::{Block, EditorSurface, HeadlessFactory};
    use store::{MemoryStore, NewDocument, Repository};

    use crate::SyncIndicator;

    const WINDOW: Duration = Duration::from_millis(300);

    struct Rig {
        factory: Arc<HeadlessFactory>,
        store: Arc<Repository<MemoryStore>>,
        initial: Document,
        policy: CommitPolicy,
        document: Cell<Option<Signal<Document>>>,
    }

    #[derive(Clone)]
    struct RigHandle(Rc<Rig>);

    impl PartialEq for RigHandle {
        fn eq(&self, other: &Self) -> bool {
            Rc::ptr_eq(&self.0, &other.0)
        }
    }

    #[component]
    fn Harness(rig: RigHandle) -> Element {
        let document = use_signal(|| rig.0.initial.clone());
        use_hook(|| rig.0.document.set(Some(document)));
        let factory: Arc<dyn EditorFactory> = rig.0.factory.clone();
        let sync = use_editor_sync(
            factory,
            MountPoint::new("note"),
            document,
            rig.0.store.clone(),
            rig.0.policy,
        );
        let status = sync.status();
        rsx! {
            SyncIndicator { status, on_retry: move |_| sync.retry() }
        }
    }

    async fn settle(dom: &mut VirtualDom) {
        for _ in 0..10 {
            let _ = tokio::time::timeout(Duration::from_millis(5), dom.wait_for_work()).await;
            dom.render_immediate(&mut NoOpMutations);
        }
    }

    async fn rig(policy: CommitPolicy) -> (Rc<Rig>, Document) {
        let store = Arc::new(Repository::new(MemoryStore::new()));
        let a = store.create(NewDocument::new("A", "<p>note A</p>")).await.unwrap();
        let b = store.create(NewDocument::new("B", "<p>note B</p>")).await.unwrap();
        let rig = Rc::new(Rig {
            factory: Arc::new(HeadlessFactory::new()),
            store,
            initial: a,
            policy,
            document: Cell::new(None),
        });
        (rig, b)
    }

    fn body_of(blocks: &[Block]) -> String {
        editor::serialize(blocks).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_note_changes_reach_the_editor() {
        let (rig, _) = rig(CommitPolicy::default()).await;
        let mut dom = VirtualDom::new_with_props(Harness, HarnessProps { rig: RigHandle(rig.clone()) });
        dom.rebuild_in_place();
        settle(&mut dom).await;

        assert_eq!(rig.factory.created(), 1);
        let editor = rig.factory.last().unwrap();
        assert_eq!(editor.blocks(), vec![Block::paragraph("note A")]);

        let mut document = rig.document.get().unwrap();
        let mut changed = rig.initial.clone();
        changed.body = body_of(&[Block::paragraph("A from elsewhere")]);
        dom.in_runtime(|| document.set(changed));
        settle(&mut dom).await;

        assert_eq!(rig.factory.created(), 1);
        assert_eq!(editor.blocks(), vec![Block::paragraph("A from elsewhere")]);

        // Inbound changes are not written back
        tokio::time::sleep(WINDOW * 2).await;
        settle(&mut dom).await;
        let stored = rig.store.get(&rig.initial.id).await.unwrap();
        assert_eq!(stored.body, "<p>note A</p>");
    }

    #[tokio::test(start_paused = true)]
    async fn test_switching_notes_remounts_and_commits_to_the_right_note() {
        let policy = CommitPolicy {
            flush_on_teardown: true,
            ..CommitPolicy::default()
        };
        let (rig, b) = rig(policy).await;
        let mut dom = VirtualDom::new_with_props(Harness, HarnessProps { rig: RigHandle(rig.clone()) });
        dom.rebuild_in_place();
        settle(&mut dom).await;

        let editor_a = rig.factory.last().unwrap();
        editor_a.user_edit(vec![Block::paragraph("edit in A")]);

        let mut document = rig.document.get().unwrap();
        let next = b.clone();
        dom.in_runtime(|| document.set(next));
        settle(&mut dom).await;

        assert_eq!(rig.factory.created(), 2);
        assert_eq!(editor_a.listener_count(), 0);
        let editor_b = rig.factory.last().unwrap();
        assert_eq!(editor_b.blocks(), vec![Block::paragraph("note B")]);

        editor_b.user_edit(vec![Block::paragraph("edit in B")]);
        tokio::time::sleep(WINDOW * 2).await;
        settle(&mut dom).await;

        let a = rig.store.get(&rig.initial.id).await.unwrap();
        let b = rig.store.get(&b.id).await.unwrap();
        assert_eq!(a.body, body_of(&[Block::paragraph("edit in A")]));
        assert_eq!(b.body, body_of(&[Block::paragraph("edit in B")]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmount_closes_the_session() {
        let (rig, _) = rig(CommitPolicy::default()).await;
        let mut dom = VirtualDom::new_with_props(Harness, HarnessProps { rig: RigHandle(rig.clone()) });
        dom.rebuild_in_place();
        settle(&mut dom).await;

        let editor = rig.factory.last().unwrap();
        assert_eq!(editor.listener_count(), 1);
        drop(dom);
        assert_eq!(editor.listener_count(), 0);
    }
}
