// SPDX-FileCopyrightText: 2026 BrainSurgeon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Filesystem-backed [`TrashStore`].

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use brainsurgeon_config::model::BrainsurgeonConfig;
use brainsurgeon_core::{BrainsurgeonError, TrashStore};

use crate::entry::TrashEntry;
use crate::ids::validate_id;

const META_SUFFIX: &str = ".meta.json";

/// Trash bin rooted at an OpenClaw data directory.
#[derive(Debug, Clone)]
pub struct TrashBin {
    root: PathBuf,
    retention: Duration,
}

impl TrashBin {
    pub fn new(root: impl Into<PathBuf>, retention_days: u32) -> Self {
        Self {
            root: root.into(),
            retention: Duration::days(i64::from(retention_days)),
        }
    }

    pub fn from_config(config: &BrainsurgeonConfig) -> Self {
        Self::new(config.paths.openclaw_root(), config.trash.retention_days)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where pruning keeps a session's externalized payloads.
    pub fn extracted_dir(&self, agent_id: &str, session_id: &str) -> PathBuf {
        self.root
            .join("agents")
            .join(agent_id)
            .join("sessions")
            .join("extracted")
            .join(session_id)
    }

    pub fn trash_dir(&self) -> PathBuf {
        self.root.join("trash").join("extracted")
    }

    fn agent_trash_dir(&self, agent_id: &str) -> PathBuf {
        self.trash_dir().join(agent_id)
    }

    /// Where a trashed session's payloads live.
    pub fn entry_dir(&self, agent_id: &str, session_id: &str) -> PathBuf {
        self.agent_trash_dir(agent_id).join(session_id)
    }

    /// Sidecar metadata for [`TrashBin::entry_dir`]. Ids never contain a
    /// dot, so it cannot collide with another session's directory.
    pub fn meta_path(&self, agent_id: &str, session_id: &str) -> PathBuf {
        self.agent_trash_dir(agent_id)
            .join(format!("{session_id}{META_SUFFIX}"))
    }

    /// Trashed sessions, most recently trashed first.
    ///
    /// Metadata files that cannot be read or parsed are skipped with a
    /// warning.
    pub async fn list(&self) -> Result<Vec<TrashEntry>, BrainsurgeonError> {
        let mut entries = Vec::new();
        for path in self.meta_files().await? {
            match TrashEntry::read(&path).await {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable trash metadata"),
            }
        }
        entries.sort_by(|a, b| b.trashed_at.cmp(&a.trashed_at));
        Ok(entries)
    }

    /// Permanently delete every entry whose retention has passed.
    pub async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<usize, BrainsurgeonError> {
        let mut deleted = 0;
        for entry in self.list().await? {
            if !entry.is_expired(now) {
                continue;
            }
            match self
                .delete_from_trash(&entry.original_agent, &entry.original_session_id)
                .await
            {
                Ok(true) => deleted += 1,
                Ok(false) => {}
                Err(e) => warn!(
                    agent_id = %entry.original_agent,
                    session_id = %entry.original_session_id,
                    error = %e,
                    "could not delete expired trash entry"
                ),
            }
        }
        info!(action = "cleanup_trash", deleted, "expired trash entries removed");
        Ok(deleted)
    }

    async fn meta_files(&self) -> Result<Vec<PathBuf>, BrainsurgeonError> {
        let mut files = Vec::new();
        for (agent_dir, is_dir) in list_dir(&self.trash_dir()).await? {
            if !is_dir {
                continue;
            }
            for (path, _) in list_dir(&agent_dir).await? {
                if path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(META_SUFFIX))
                {
                    files.push(path);
                }
            }
        }
        Ok(files)
    }

    /// Drop an agent's trash directory once its last session has left.
    async fn prune_agent_dir(&self, agent_id: &str) {
        let dir = self.agent_trash_dir(agent_id);
        if let Err(e) = tokio::fs::remove_dir(&dir).await {
            debug!(path = %dir.display(), error = %e, "agent trash directory kept");
        }
    }
}

#[async_trait]
impl TrashStore for TrashBin {
    async fn move_to_trash(
        &self,
        agent_id: &str,
        session_id: &str,
    ) -> Result<bool, BrainsurgeonError> {
        validate_id("agent id", agent_id)?;
        validate_id("session id", session_id)?;

        let source = self.extracted_dir(agent_id, session_id);
        if !exists(&source).await? {
            debug!(agent_id, session_id, "nothing extracted to trash");
            return Ok(false);
        }

        let agent_dir = self.agent_trash_dir(agent_id);
        tokio::fs::create_dir_all(&agent_dir)
            .await
            .map_err(|e| BrainsurgeonError::trash(format!("create {}", agent_dir.display()), e))?;

        let dest = self.entry_dir(agent_id, session_id);
        if exists(&dest).await? {
            // A later compaction supersedes whatever was trashed before.
            remove_dir(&dest).await?;
        }
        rename(&source, &dest).await?;

        let trashed_at = Utc::now();
        let entry = TrashEntry {
            original_agent: agent_id.to_string(),
            original_session_id: session_id.to_string(),
            original_path: source.to_string_lossy().into_owned(),
            trashed_at,
            expires_at: trashed_at + self.retention,
        };
        entry.write(&self.meta_path(agent_id, session_id)).await?;

        info!(
            action = "move_to_trash",
            agent_id,
            session_id,
            expires_at = %entry.expires_at,
            "extracted payloads moved to trash"
        );
        Ok(true)
    }

    async fn restore_from_trash(
        &self,
        agent_id: &str,
        session_id: &str,
    ) -> Result<bool, BrainsurgeonError> {
        validate_id("agent id", agent_id)?;
        validate_id("session id", session_id)?;

        let trashed = self.entry_dir(agent_id, session_id);
        if !exists(&trashed).await? {
            return Ok(false);
        }

        let meta_path = self.meta_path(agent_id, session_id);
        let computed = self.extracted_dir(agent_id, session_id);
        let target = match TrashEntry::read(&meta_path).await {
            // Only trust a recorded path that still lives under our root.
            Ok(entry) if Path::new(&entry.original_path).starts_with(&self.root) => {
                PathBuf::from(entry.original_path)
            }
            Ok(_) => computed,
            Err(e) => {
                warn!(agent_id, session_id, error = %e, "trash metadata unusable; restoring to default location");
                computed
            }
        };

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BrainsurgeonError::trash(format!("create {}", parent.display()), e))?;
        }

        if exists(&target).await? {
            merge_into(&trashed, &target).await?;
            remove_dir(&trashed).await?;
        } else {
            rename(&trashed, &target).await?;
        }
        remove_file_if_present(&meta_path).await?;
        self.prune_agent_dir(agent_id).await;

        info!(action = "restore_from_trash", agent_id, session_id, "extracted payloads restored");
        Ok(true)
    }

    async fn delete_from_trash(
        &self,
        agent_id: &str,
        session_id: &str,
    ) -> Result<bool, BrainsurgeonError> {
        validate_id("agent id", agent_id)?;
        validate_id("session id", session_id)?;

        let dir = self.entry_dir(agent_id, session_id);
        let meta_path = self.meta_path(agent_id, session_id);
        let had_dir = exists(&dir).await?;
        if had_dir {
            remove_dir(&dir).await?;
        }
        let had_meta = remove_file_if_present(&meta_path).await?;
        if !(had_dir || had_meta) {
            return Ok(false);
        }
        self.prune_agent_dir(agent_id).await;

        info!(action = "delete_from_trash", agent_id, session_id, "trash entry deleted");
        Ok(true)
    }
}

async fn exists(path: &Path) -> Result<bool, BrainsurgeonError> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|e| BrainsurgeonError::trash(format!("stat {}", path.display()), e))
}

/// Children of `dir` with whether each is a directory. A missing `dir` is
/// empty.
async fn list_dir(dir: &Path) -> Result<Vec<(PathBuf, bool)>, BrainsurgeonError> {
    let mut read_dir = match tokio::fs::read_dir(dir).await {
        Ok(rd) => rd,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(BrainsurgeonError::trash(format!("list {}", dir.display()), e)),
    };
    let mut children = Vec::new();
    while let Some(item) = read_dir
        .next_entry()
        .await
        .map_err(|e| BrainsurgeonError::trash(format!("list {}", dir.display()), e))?
    {
        let is_dir = item
            .file_type()
            .await
            .map_err(|e| BrainsurgeonError::trash(format!("stat {}", item.path().display()), e))?
            .is_dir();
        children.push((item.path(), is_dir));
    }
    Ok(children)
}

async fn rename(from: &Path, to: &Path) -> Result<(), BrainsurgeonError> {
    tokio::fs::rename(from, to).await.map_err(|e| {
        BrainsurgeonError::trash(format!("move {} to {}", from.display(), to.display()), e)
    })
}

async fn remove_dir(path: &Path) -> Result<(), BrainsurgeonError> {
    tokio::fs::remove_dir_all(path)
        .await
        .map_err(|e| BrainsurgeonError::trash(format!("remove {}", path.display()), e))
}

async fn remove_file_if_present(path: &Path) -> Result<bool, BrainsurgeonError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(BrainsurgeonError::trash(format!("remove {}", path.display()), e)),
    }
}

/// Move every child of `from` into `to`, replacing same-named files.
async fn merge_into(from: &Path, to: &Path) -> Result<(), BrainsurgeonError> {
    for (path, is_dir) in list_dir(from).await? {
        let Some(name) = path.file_name() else {
            continue;
        };
        let dest = to.join(name);
        if is_dir && exists(&dest).await? {
            remove_dir(&dest).await?;
        }
        rename(&path, &dest).await?;
    }
    Ok(())
}
