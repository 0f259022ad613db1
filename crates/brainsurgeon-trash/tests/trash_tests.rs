// SPDX-FileCopyrightText: 2026 BrainSurgeon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trash bin behavior against a real temporary directory.

use std::path::Path;

use chrono::{Duration, Utc};

use brainsurgeon_core::{BrainsurgeonError, TrashStore};
use brainsurgeon_trash::{TrashBin, TrashEntry};

async fn seed_extracted(bin: &TrashBin, agent: &str, session: &str, files: &[(&str, &str)]) {
    let dir = bin.extracted_dir(agent, session);
    tokio::fs::create_dir_all(&dir).await.unwrap();
    for (name, body) in files {
        tokio::fs::write(dir.join(name), body).await.unwrap();
    }
}

async fn read(path: &Path) -> String {
    tokio::fs::read_to_string(path).await.unwrap()
}

#[tokio::test]
async fn round_trip_preserves_contents() {
    let root = tempfile::tempdir().unwrap();
    let bin = TrashBin::new(root.path(), 14);
    seed_extracted(
        &bin,
        "main",
        "s1",
        &[("call_a.json", "\"big output a\""), ("call_b.json", "\"big output b\"")],
    )
    .await;

    assert!(bin.move_to_trash("main", "s1").await.unwrap());
    assert!(!bin.extracted_dir("main", "s1").exists());
    assert!(bin.entry_dir("main", "s1").is_dir());
    assert!(bin.meta_path("main", "s1").is_file());

    assert!(bin.restore_from_trash("main", "s1").await.unwrap());
    let restored = bin.extracted_dir("main", "s1");
    assert_eq!(read(&restored.join("call_a.json")).await, "\"big output a\"");
    assert_eq!(read(&restored.join("call_b.json")).await, "\"big output b\"");
    assert!(!bin.entry_dir("main", "s1").exists());
    assert!(!bin.meta_path("main", "s1").exists());
}

#[tokio::test]
async fn absent_session_is_false_not_error() {
    let root = tempfile::tempdir().unwrap();
    let bin = TrashBin::new(root.path(), 14);

    assert!(!bin.move_to_trash("main", "ghost").await.unwrap());
    assert!(!bin.restore_from_trash("main", "ghost").await.unwrap());
    assert!(!bin.delete_from_trash("main", "ghost").await.unwrap());
    assert!(bin.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn metadata_records_origin_and_expiry() {
    let root = tempfile::tempdir().unwrap();
    let bin = TrashBin::new(root.path(), 7);
    seed_extracted(&bin, "main", "s1", &[("t.json", "{}")]).await;

    let before = Utc::now();
    bin.move_to_trash("main", "s1").await.unwrap();

    let entries = bin.list().await.unwrap();
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.original_agent, "main");
    assert_eq!(entry.original_session_id, "s1");
    assert_eq!(
        Path::new(&entry.original_path),
        bin.extracted_dir("main", "s1").as_path()
    );
    assert!(entry.trashed_at >= before);
    assert_eq!(entry.expires_at - entry.trashed_at, Duration::days(7));
}

#[tokio::test]
async fn delete_removes_entry_and_metadata() {
    let root = tempfile::tempdir().unwrap();
    let bin = TrashBin::new(root.path(), 14);
    seed_extracted(&bin, "main", "s1", &[("t.json", "{}")]).await;
    bin.move_to_trash("main", "s1").await.unwrap();

    assert!(bin.delete_from_trash("main", "s1").await.unwrap());
    assert!(!bin.entry_dir("main", "s1").exists());
    assert!(!bin.delete_from_trash("main", "s1").await.unwrap());
    assert!(!bin.restore_from_trash("main", "s1").await.unwrap());
}

#[tokio::test]
async fn retrashing_replaces_previous_entry() {
    let root = tempfile::tempdir().unwrap();
    let bin = TrashBin::new(root.path(), 14);
    seed_extracted(&bin, "main", "s1", &[("old.json", "1")]).await;
    bin.move_to_trash("main", "s1").await.unwrap();
    seed_extracted(&bin, "main", "s1", &[("new.json", "2")]).await;
    bin.move_to_trash("main", "s1").await.unwrap();

    let trashed = bin.entry_dir("main", "s1");
    assert!(trashed.join("new.json").exists());
    assert!(!trashed.join("old.json").exists());
    assert_eq!(bin.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn restore_merges_into_existing_directory() {
    let root = tempfile::tempdir().unwrap();
    let bin = TrashBin::new(root.path(), 14);
    seed_extracted(&bin, "main", "s1", &[("a.json", "trashed")]).await;
    bin.move_to_trash("main", "s1").await.unwrap();
    // A prune after compaction recreated the directory.
    seed_extracted(&bin, "main", "s1", &[("b.json", "fresh")]).await;

    assert!(bin.restore_from_trash("main", "s1").await.unwrap());
    let dir = bin.extracted_dir("main", "s1");
    assert_eq!(read(&dir.join("a.json")).await, "trashed");
    assert_eq!(read(&dir.join("b.json")).await, "fresh");
}

#[tokio::test]
async fn underscored_ids_keep_separate_entries() {
    let root = tempfile::tempdir().unwrap();
    let bin = TrashBin::new(root.path(), 14);
    seed_extracted(&bin, "a_b", "c", &[("call_1.json", "\"from a_b/c\"")]).await;
    seed_extracted(&bin, "a", "b_c", &[("call_1.json", "\"from a/b_c\"")]).await;

    assert!(bin.move_to_trash("a_b", "c").await.unwrap());
    assert!(bin.move_to_trash("a", "b_c").await.unwrap());
    assert_ne!(bin.entry_dir("a_b", "c"), bin.entry_dir("a", "b_c"));
    assert_eq!(bin.list().await.unwrap().len(), 2);

    assert!(bin.restore_from_trash("a_b", "c").await.unwrap());
    assert_eq!(
        read(&bin.extracted_dir("a_b", "c").join("call_1.json")).await,
        "\"from a_b/c\""
    );
    assert!(!bin.extracted_dir("a", "b_c").exists());
    assert!(bin.entry_dir("a", "b_c").is_dir());
    assert!(bin.meta_path("a", "b_c").is_file());

    assert!(bin.restore_from_trash("a", "b_c").await.unwrap());
    assert_eq!(
        read(&bin.extracted_dir("a", "b_c").join("call_1.json")).await,
        "\"from a/b_c\""
    );
    assert!(bin.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn emptied_agent_directory_is_removed() {
    let root = tempfile::tempdir().unwrap();
    let bin = TrashBin::new(root.path(), 14);
    for session in ["s1", "s2"] {
        seed_extracted(&bin, "main", session, &[("t.json", "{}")]).await;
        bin.move_to_trash("main", session).await.unwrap();
    }

    bin.delete_from_trash("main", "s1").await.unwrap();
    assert!(bin.trash_dir().join("main").is_dir());
    bin.restore_from_trash("main", "s2").await.unwrap();
    assert!(!bin.trash_dir().join("main").exists());
}

#[tokio::test]
async fn bad_ids_are_rejected_before_touching_disk() {
    let root = tempfile::tempdir().unwrap();
    let bin = TrashBin::new(root.path(), 14);

    for (agent, session) in [("..", "s1"), ("main", "../s1"), ("a/b", "s1"), ("", "s1"), ("main", "")] {
        let err = bin.move_to_trash(agent, session).await.unwrap_err();
        assert!(matches!(err, BrainsurgeonError::Validation(_)), "{agent:?}/{session:?}");
        assert!(bin.restore_from_trash(agent, session).await.is_err());
        assert!(bin.delete_from_trash(agent, session).await.is_err());
    }
    assert!(!root.path().join("trash").exists());
}

#[tokio::test]
async fn list_is_newest_first_and_skips_corrupt_metadata() {
    let root = tempfile::tempdir().unwrap();
    let bin = TrashBin::new(root.path(), 14);
    for session in ["s1", "s2"] {
        seed_extracted(&bin, "main", session, &[("t.json", "{}")]).await;
        bin.move_to_trash("main", session).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    let broken = bin.trash_dir().join("broken");
    tokio::fs::create_dir_all(&broken).await.unwrap();
    tokio::fs::write(broken.join("x.meta.json"), "nope").await.unwrap();
    tokio::fs::write(bin.trash_dir().join("stray.meta.json"), "{}").await.unwrap();

    let sessions: Vec<_> = bin
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.original_session_id)
        .collect();
    assert_eq!(sessions, vec!["s2", "s1"]);
}

#[tokio::test]
async fn cleanup_deletes_only_expired_entries() {
    let root = tempfile::tempdir().unwrap();
    let bin = TrashBin::new(root.path(), 14);
    for session in ["old", "recent"] {
        seed_extracted(&bin, "main", session, &[("t.json", "{}")]).await;
        bin.move_to_trash("main", session).await.unwrap();
    }

    // Backdate one entry past its retention.
    let meta = bin.meta_path("main", "old");
    let mut entry: TrashEntry = serde_json::from_str(&read(&meta).await).unwrap();
    entry.trashed_at -= Duration::days(30);
    entry.expires_at = entry.trashed_at + Duration::days(14);
    tokio::fs::write(&meta, serde_json::to_vec(&entry).unwrap())
        .await
        .unwrap();

    let deleted = bin.cleanup_expired(Utc::now()).await.unwrap();
    assert_eq!(deleted, 1);
    let left: Vec<_> = bin
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.original_session_id)
        .collect();
    assert_eq!(left, vec!["recent"]);
    assert!(!bin.entry_dir("main", "old").exists());

    // Far future: everything is expired.
    assert_eq!(bin.cleanup_expired(Utc::now() + Duration::days(15)).await.unwrap(), 1);
    assert!(bin.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn cleanup_on_missing_trash_dir_is_zero() {
    let root = tempfile::tempdir().unwrap();
    let bin = TrashBin::new(root.path(), 14);
    assert_eq!(bin.cleanup_expired(Utc::now()).await.unwrap(), 0);
}

#[test]
fn from_config_uses_paths_and_retention() {
    let config = brainsurgeon_config::load_and_validate_str(
        "[paths]\nopenclaw_root = \"/srv/openclaw\"\n\n[trash]\nretention_days = 3\n",
    )
    .unwrap();
    let bin = TrashBin::from_config(&config);
    assert_eq!(bin.root(), Path::new("/srv/openclaw"));
    assert_eq!(
        bin.extracted_dir("main", "s1"),
        Path::new("/srv/openclaw/agents/main/sessions/extracted/s1")
    );
    assert_eq!(bin.trash_dir(), Path::new("/srv/openclaw/trash/extracted"));
}
