mod common;

use std::time::Duration;

use common::{eventually, harness, payload, Call};
use pretty_assertions::assert_eq;
use scribe_core::editor::{AutoSaver, NoteEditor, SaveOutcome};
use scribe_core::models::{NoteId, NotePayload, OperationKind};
use scribe_core::state::SaveStatus;
use scribe_core::Error;

#[tokio::test(flavor = "multi_thread")]
async fn online_create_goes_to_server_only() {
    let h = harness(true);
    let editor = NoteEditor::new(h.manager.clone());

    let outcome = editor.create(payload("Hello", "world")).await.unwrap();

    assert_eq!(
        outcome,
        SaveOutcome::Server {
            id: NoteId::new("srv-1")
        }
    );
    assert_eq!(outcome.status().label(), "synced to server");
    assert_eq!(h.server.note("srv-1").unwrap().content, "world");
    assert_eq!(h.manager.pending_count().await.unwrap(), 0);
    assert!(h.store.all_notes().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn online_update_leaves_local_store_untouched() {
    let h = harness(true);
    h.server.seed("n1", "v0", 1_000);
    let editor = NoteEditor::new(h.manager.clone());

    let outcome = editor
        .update(NoteId::new("n1"), payload("Seeded", "v1"))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        SaveOutcome::Server {
            id: NoteId::new("n1")
        }
    );
    assert_eq!(h.server.note("n1").unwrap().content, "v1");
    assert_eq!(h.manager.pending_count().await.unwrap(), 0);
    assert!(h.store.all_notes().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn rejected_update_is_saved_locally_and_queued() {
    let h = harness(true);
    h.server.seed("n1", "v0", 1_000);
    h.server.fail_for("n1");
    let editor = NoteEditor::new(h.manager.clone());

    let outcome = editor
        .update(NoteId::new("n1"), payload("Seeded", "offline edit"))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        SaveOutcome::Local {
            id: NoteId::new("n1")
        }
    );
    assert_eq!(outcome.status(), SaveStatus::SavedLocally);
    assert_eq!(outcome.status().label(), "saved locally, will sync later");

    let cached = h.store.get_note(&NoteId::new("n1")).await.unwrap().unwrap();
    assert_eq!(cached.content, "offline edit");

    let pending = h.store.pending_operations().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].kind, OperationKind::Update);
    assert_eq!(pending[0].data.as_ref().unwrap().content, "offline edit");
    assert_eq!(h.server.note("n1").unwrap().content, "v0");
}

#[tokio::test(flavor = "multi_thread")]
async fn offline_create_writes_cache_and_queues() {
    let h = harness(false);
    let editor = NoteEditor::new(h.manager.clone());

    let outcome = editor.create(payload("Offline", "draft")).await.unwrap();

    let SaveOutcome::Local { id } = &outcome else {
        panic!("expected local save, got {outcome:?}");
    };
    assert_eq!(outcome.status(), SaveStatus::SavedLocally);
    assert!(h.server.calls().is_empty());

    let cached = h.store.get_note(id).await.unwrap().unwrap();
    assert_eq!(cached.title, "Offline");

    let pending = h.store.pending_operations().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].kind, OperationKind::Create);
    assert_eq!(&pending[0].note_id, id);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_server_write_falls_back_to_local() {
    let h = harness(true);
    h.server.set_down(true);
    let editor = NoteEditor::new(h.manager.clone());

    let outcome = editor.create(payload("Flaky", "network")).await.unwrap();

    assert!(matches!(outcome, SaveOutcome::Local { .. }));
    assert!(h.store.get_note(outcome.id()).await.unwrap().is_some());
    assert_eq!(h.manager.pending_count().await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn offline_update_keeps_created_at_and_bumps_updated_at() {
    let h = harness(false);
    let editor = NoteEditor::new(h.manager.clone());
    let mut original = h.server.seed("n1", "v0", 1_000);
    original.created_at = 500;
    h.store.put_note(&original).await.unwrap();

    let outcome = editor
        .update(NoteId::new("n1"), payload("Seeded", "v1"))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        SaveOutcome::Local {
            id: NoteId::new("n1")
        }
    );
    let cached = h.store.get_note(&NoteId::new("n1")).await.unwrap().unwrap();
    assert_eq!(cached.created_at, 500);
    assert!(cached.updated_at > 1_000);
    assert_eq!(cached.content, "v1");
}

#[tokio::test(flavor = "multi_thread")]
async fn offline_delete_only_queues() {
    let h = harness(false);
    let editor = NoteEditor::new(h.manager.clone());
    let cached = h.server.seed("n1", "v0", 1_000);
    h.store.put_note(&cached).await.unwrap();

    let outcome = editor.delete(NoteId::new("n1")).await.unwrap();

    assert!(matches!(outcome, SaveOutcome::Local { .. }));
    assert!(h.store.get_note(&NoteId::new("n1")).await.unwrap().is_some());
    let pending = h.store.pending_operations().await.unwrap();
    assert_eq!(pending[0].kind, OperationKind::Delete);
    assert_eq!(pending[0].data, None);
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_payload_is_rejected_before_any_write() {
    let h = harness(true);
    let editor = NoteEditor::new(h.manager.clone());
    let bad = NotePayload::new("Title", "Body", Some("two words".into()), Vec::<String>::new());

    let result = editor.create(bad).await;

    assert!(matches!(result, Err(Error::InvalidInput(_))));
    assert!(h.server.calls().is_empty());
    assert_eq!(h.manager.pending_count().await.unwrap(), 0);
    assert!(h.store.all_notes().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn update_by_temporary_id_follows_alias() {
    let h = harness(false);
    let editor = NoteEditor::new(h.manager.clone());
    let created = editor.create(payload("Draft", "a")).await.unwrap();

    h.connectivity.set_online(true);
    h.manager.sync().await.unwrap();

    let outcome = editor
        .update(created.id().clone(), payload("Draft", "b"))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        SaveOutcome::Server {
            id: NoteId::new("srv-1")
        }
    );
    assert_eq!(h.server.note("srv-1").unwrap().content, "b");
}

#[tokio::test(flavor = "multi_thread")]
async fn autosave_debounces_to_last_edit() {
    let h = harness(true);
    h.server.seed("n1", "v0", 1);
    let saver = AutoSaver::new(NoteEditor::new(h.manager.clone()), Duration::from_millis(50));

    for content in ["v1", "v2", "v3"] {
        saver
            .schedule(NoteId::new("n1"), payload("T", content))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let server = h.server.clone();
    eventually(|| {
        let server = server.clone();
        async move { !server.calls().is_empty() }
    })
    .await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(
        h.server.calls(),
        vec![Call::Update("n1".into(), "v3".into())]
    );
    assert_eq!(saver.status(), SaveStatus::Synced);
}

#[tokio::test(flavor = "multi_thread")]
async fn cancelled_autosave_never_writes() {
    let h = harness(true);
    h.server.seed("n1", "v0", 1);
    let saver = AutoSaver::new(NoteEditor::new(h.manager.clone()), Duration::from_millis(30));

    saver
        .schedule(NoteId::new("n1"), payload("T", "v1"))
        .unwrap();
    saver.cancel();
    tokio::time::sleep(Duration::from_millis(120)).await;

    assert!(h.server.calls().is_empty());
    assert_eq!(saver.status(), SaveStatus::Idle);
}

#[tokio::test(flavor = "multi_thread")]
async fn submit_supersedes_pending_autosave() {
    let h = harness(false);
    let cached = h.server.seed("n1", "v0", 1);
    h.store.put_note(&cached).await.unwrap();
    let saver = AutoSaver::new(NoteEditor::new(h.manager.clone()), Duration::from_millis(30));

    saver
        .schedule(NoteId::new("n1"), payload("T", "autosaved"))
        .unwrap();
    let outcome = saver
        .submit(NoteId::new("n1"), payload("T", "submitted"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(120)).await;

    assert!(matches!(outcome, SaveOutcome::Local { .. }));
    assert_eq!(saver.status(), SaveStatus::SavedLocally);
    let pending = h.store.pending_operations().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].data.as_ref().unwrap().content, "submitted");
}

#[tokio::test(flavor = "multi_thread")]
async fn autosave_rejects_invalid_payload() {
    let h = harness(true);
    let saver = AutoSaver::new(NoteEditor::new(h.manager.clone()), Duration::from_millis(30));

    let result = saver.schedule(NoteId::new("n1"), payload("", "body"));

    assert!(result.is_err());
}
