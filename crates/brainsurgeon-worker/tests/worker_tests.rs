// SPDX-FileCopyrightText: 2026 BrainSurgeon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Worker handlers driven through a real bus.

use std::sync::Arc;

use brainsurgeon_core::{
    Externalizer, Message, MessagePayload, MessageType, PruneRequest, PruneResponse, RestoreRequest,
    RestoreResponse, SessionCompacted, SessionUpdated, Source, TrashStore,
};
use brainsurgeon_test_utils::{MockExternalizer, MockTrash, RecordingHandler, TestBus};
use brainsurgeon_trash::TrashBin;
use brainsurgeon_worker::{JsonlExternalizer, Worker, WorkerSettings};

fn prune_responses(messages: &[Message]) -> Vec<PruneResponse> {
    messages
        .iter()
        .filter_map(|m| match &m.payload {
            MessagePayload::PruneResponse(r) => Some(r.clone()),
            _ => None,
        })
        .collect()
}

fn restore_responses(messages: &[Message]) -> Vec<RestoreResponse> {
    messages
        .iter()
        .filter_map(|m| match &m.payload {
            MessagePayload::RestoreResponse(r) => Some(r.clone()),
            _ => None,
        })
        .collect()
}

fn restore(agent: &str, session: &str, call: &str) -> RestoreRequest {
    RestoreRequest {
        agent_id: agent.into(),
        session_id: session.into(),
        tool_call_id: call.into(),
    }
}

#[tokio::test]
async fn prune_request_gets_exactly_one_response() {
    let tb = TestBus::new().await.unwrap();
    let ext = Arc::new(MockExternalizer::new().with_externalized("a", "s1", 3));
    let _worker = Worker::attach(
        tb.bus(),
        ext.clone(),
        Arc::new(MockTrash::new()),
        WorkerSettings::default(),
    );

    tb.bus()
        .publish(PruneRequest {
            agent_id: "a".into(),
            session_id: "s1".into(),
            threshold: Some(5),
        })
        .await
        .unwrap();
    tb.pump(5).await.unwrap();

    let pending = tb.bus().get_unprocessed().await.unwrap();
    let responses = prune_responses(&pending);
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].externalized, 3);
    assert!(responses[0].success);
    assert_eq!(responses[0].session_id, "s1");
    // The request itself is done; only the response waits for its consumer.
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].source, Source::Api);
    assert_eq!(ext.prune_calls(), vec![("a".into(), "s1".into(), Some(5))]);
}

#[tokio::test]
async fn failed_prune_is_reported_not_retried() {
    let tb = TestBus::new().await.unwrap();
    let ext = Arc::new(MockExternalizer::new().with_failure("a", "s1", "transcript not found"));
    let _worker = Worker::attach(
        tb.bus(),
        ext.clone(),
        Arc::new(MockTrash::new()),
        WorkerSettings::default(),
    );

    tb.bus()
        .publish(PruneRequest {
            agent_id: "a".into(),
            session_id: "s1".into(),
            threshold: None,
        })
        .await
        .unwrap();
    tb.pump(5).await.unwrap();

    let responses = prune_responses(&tb.bus().get_unprocessed().await.unwrap());
    assert_eq!(responses.len(), 1);
    assert!(!responses[0].success);
    assert_eq!(responses[0].externalized, 0);
    assert!(responses[0].error.as_deref().unwrap().contains("transcript not found"));
    assert_eq!(ext.prune_calls().len(), 1);
}

#[tokio::test]
async fn restore_responses_follow_tool_call_ids() {
    let tb = TestBus::new().await.unwrap();
    let ext = Arc::new(MockExternalizer::new());
    ext.add_restorable("a", "s1", "call_a");
    let _worker = Worker::attach(
        tb.bus(),
        ext.clone(),
        Arc::new(MockTrash::new()),
        WorkerSettings::default(),
    );

    tb.bus().publish(restore("a", "s1", "call_a")).await.unwrap();
    tb.bus().publish(restore("a", "s1", "call_b")).await.unwrap();
    tb.pump(5).await.unwrap();

    let responses = restore_responses(&tb.bus().get_unprocessed().await.unwrap());
    assert_eq!(responses.len(), 2);
    let a = responses.iter().find(|r| r.tool_call_id == "call_a").unwrap();
    let b = responses.iter().find(|r| r.tool_call_id == "call_b").unwrap();
    assert!(a.success);
    assert!(!b.success);
    assert_eq!(b.error.as_deref(), Some("externalized content not found"));
}

async fn compacted_session(root: &std::path::Path) -> (Arc<JsonlExternalizer>, Arc<TrashBin>) {
    let sessions = root.join("agents/main/sessions");
    tokio::fs::create_dir_all(&sessions).await.unwrap();
    tokio::fs::write(
        sessions.join("s1.jsonl"),
        concat!(
            r#"{"type":"tool_result","toolCallId":"call_a","content":"huge listing"}"#,
            "\n",
            r#"{"type":"tool_result","toolCallId":"call_b","content":"recent"}"#,
            "\n",
        ),
    )
    .await
    .unwrap();
    let ext = Arc::new(JsonlExternalizer::new(root, 1));
    let trash = Arc::new(TrashBin::new(root, 14));
    assert_eq!(ext.externalize("main", "s1", None).await.unwrap(), 1);
    assert!(trash.move_to_trash("main", "s1").await.unwrap());
    (ext, trash)
}

#[tokio::test]
async fn restore_falls_back_to_trash_once() {
    let root = tempfile::tempdir().unwrap();
    let (ext, trash) = compacted_session(root.path()).await;
    let sessions = root.path().join("agents/main/sessions");

    let tb = TestBus::new().await.unwrap();
    let _worker = Worker::attach(tb.bus(), ext.clone(), trash.clone(), WorkerSettings::default());
    tb.bus().publish(restore("main", "s1", "call_a")).await.unwrap();
    tb.pump(5).await.unwrap();

    let responses = restore_responses(&tb.bus().get_unprocessed().await.unwrap());
    assert_eq!(responses.len(), 1);
    assert!(responses[0].success, "{:?}", responses[0].error);

    let transcript = tokio::fs::read_to_string(sessions.join("s1.jsonl")).await.unwrap();
    assert!(transcript.contains("huge listing"));
    assert!(!transcript.contains("_externalized"));
    assert!(trash.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_tool_call_leaves_trash_alone() {
    let root = tempfile::tempdir().unwrap();
    let (ext, trash) = compacted_session(root.path()).await;

    let tb = TestBus::new().await.unwrap();
    let _worker = Worker::attach(tb.bus(), ext, trash.clone(), WorkerSettings::default());
    // call_b was never externalized; call_zzz never existed.
    tb.bus().publish(restore("main", "s1", "call_zzz")).await.unwrap();
    tb.bus().publish(restore("main", "s1", "call_b")).await.unwrap();
    tb.pump(5).await.unwrap();

    let responses = restore_responses(&tb.bus().get_unprocessed().await.unwrap());
    assert_eq!(responses.len(), 2);
    for r in &responses {
        assert!(!r.success);
        assert_eq!(r.error.as_deref(), Some("externalized content not found"));
    }
    let entries = trash.list().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].original_session_id, "s1");
    assert!(trash.entry_dir("main", "s1").join("call_a.json").is_file());
    assert!(!trash.extracted_dir("main", "s1").exists());
}

#[tokio::test]
async fn trash_is_consulted_only_for_live_placeholders() {
    let tb = TestBus::new().await.unwrap();
    let ext = Arc::new(MockExternalizer::new());
    ext.add_placeholder("a", "s1", "call_a");
    let trash = Arc::new(MockTrash::new().with_trashed("a", "s1"));
    let _worker = Worker::attach(tb.bus(), ext, trash.clone(), WorkerSettings::default());

    tb.bus().publish(restore("a", "s1", "call_unknown")).await.unwrap();
    tb.pump(5).await.unwrap();
    assert!(trash.is_trashed("a", "s1"));

    tb.bus().publish(restore("a", "s1", "call_a")).await.unwrap();
    tb.pump(5).await.unwrap();
    assert!(!trash.is_trashed("a", "s1"));
}

#[tokio::test]
async fn compaction_moves_payloads_to_trash() {
    let tb = TestBus::new().await.unwrap();
    let trash = Arc::new(MockTrash::new().with_extracted("a", "s1"));
    let worker = Worker::attach(
        tb.bus(),
        Arc::new(MockExternalizer::new()),
        trash.clone(),
        WorkerSettings::default(),
    );

    tb.bus()
        .publish(SessionCompacted {
            agent_id: "a".into(),
            session_id: "s1".into(),
            entries_before: 120,
            entries_after: 30,
        })
        .await
        .unwrap();
    let report = tb.pump(5).await.unwrap();

    assert_eq!(report.processed, 1);
    assert!(trash.is_trashed("a", "s1"));
    assert_eq!(worker.activity().entry_count("a", "s1"), None);
    assert!(tb.bus().get_unprocessed().await.unwrap().is_empty());
}

#[tokio::test]
async fn compaction_with_invalid_id_is_dropped() {
    let tb = TestBus::new().await.unwrap();
    let root = tempfile::tempdir().unwrap();
    let _worker = Worker::attach(
        tb.bus(),
        Arc::new(MockExternalizer::new()),
        Arc::new(TrashBin::new(root.path(), 14)),
        WorkerSettings::default(),
    );
    tb.bus()
        .publish(SessionCompacted {
            agent_id: "../etc".into(),
            session_id: "s1".into(),
            entries_before: 2,
            entries_after: 1,
        })
        .await
        .unwrap();
    let report = tb.pump(3).await.unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.failed, 0);
}

#[tokio::test]
async fn auto_prune_fires_once_per_outstanding_request() {
    let tb = TestBus::new().await.unwrap();
    let ext = Arc::new(MockExternalizer::new().with_externalized("a", "s1", 2));
    let worker = Worker::attach(
        tb.bus(),
        ext.clone(),
        Arc::new(MockTrash::new()),
        WorkerSettings {
            auto_prune_entry_threshold: Some(10),
        },
    );
    let requests = RecordingHandler::new();
    tb.bus().subscribe(MessageType::PruneRequest, requests.clone());

    let update = |count: u64| SessionUpdated {
        agent_id: "a".into(),
        session_id: "s1".into(),
        entry_count: count,
        last_entry_type: "message".into(),
    };

    tb.bus().publish(update(9)).await.unwrap();
    tb.pump(5).await.unwrap();
    assert_eq!(requests.count(), 0);
    assert_eq!(worker.activity().entry_count("a", "s1"), Some(9));

    tb.bus().publish(update(11)).await.unwrap();
    tb.bus().publish(update(12)).await.unwrap();
    tb.pump(5).await.unwrap();
    assert_eq!(requests.count(), 1);
    assert_eq!(requests.messages()[0].source, Source::Api);
    assert_eq!(ext.prune_calls().len(), 1);

    // The first request was answered, so the next growth asks again.
    tb.bus().publish(update(13)).await.unwrap();
    tb.pump(5).await.unwrap();
    assert_eq!(requests.count(), 2);
    assert_eq!(prune_responses(&tb.bus().get_unprocessed().await.unwrap()).len(), 2);
}

#[tokio::test]
async fn no_auto_prune_without_threshold() {
    let tb = TestBus::new().await.unwrap();
    let _worker = Worker::attach(
        tb.bus(),
        Arc::new(MockExternalizer::new()),
        Arc::new(MockTrash::new()),
        WorkerSettings::default(),
    );
    let requests = RecordingHandler::new();
    tb.bus().subscribe(MessageType::PruneRequest, requests.clone());

    tb.bus()
        .publish(SessionUpdated {
            agent_id: "a".into(),
            session_id: "s1".into(),
            entry_count: 10_000,
            last_entry_type: "message".into(),
        })
        .await
        .unwrap();
    tb.pump(5).await.unwrap();
    assert_eq!(requests.count(), 0);
}

#[tokio::test]
async fn detach_removes_every_handler() {
    let tb = TestBus::new().await.unwrap();
    let worker = Worker::attach(
        tb.bus(),
        Arc::new(MockExternalizer::new()),
        Arc::new(MockTrash::new()),
        WorkerSettings::default(),
    );
    assert_eq!(worker.subscriptions().len(), 4);
    assert_eq!(worker.detach(), 4);

    tb.bus().publish(restore("a", "s1", "t")).await.unwrap();
    let report = tb.pump(3).await.unwrap();
    assert_eq!(report.deferred, 1);
}

#[tokio::test]
async fn worker_serves_a_peer_process() {
    let tb = TestBus::new().await.unwrap();
    let ext = Arc::new(MockExternalizer::new().with_externalized("a", "s1", 4));
    let _worker = Worker::attach(
        tb.bus(),
        ext,
        Arc::new(MockTrash::new()),
        WorkerSettings::default(),
    );
    let extension = tb.open_peer(Source::Extension).await.unwrap();
    let seen = RecordingHandler::new();
    extension.subscribe(MessageType::PruneResponse, seen.clone());

    extension
        .publish(PruneRequest {
            agent_id: "a".into(),
            session_id: "s1".into(),
            threshold: None,
        })
        .await
        .unwrap();
    // The extension has no prune.request handler, so it leaves it alone.
    assert_eq!(extension.dispatch_once().await.unwrap().deferred, 1);

    tb.pump(5).await.unwrap();
    extension.dispatch_once().await.unwrap();

    let got = seen.messages();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].source, Source::Api);
    assert!(tb.bus().get_unprocessed().await.unwrap().is_empty());
}
