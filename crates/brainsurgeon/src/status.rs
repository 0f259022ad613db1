// SPDX-FileCopyrightText: 2026 BrainSurgeon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `brainsurgeon status` command implementation.
//!
//! Opens the store directly, so it works whether or not `serve` is running.

use std::collections::BTreeMap;
use std::io::IsTerminal;

use serde::Serialize;

use brainsurgeon_config::BrainsurgeonConfig;
use brainsurgeon_core::{BrainsurgeonError, HealthStatus, Message, MessageStore, PluginAdapter};
use brainsurgeon_storage::SqliteMessageStore;

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub healthy: bool,
    pub detail: Option<String>,
    pub database_path: String,
    pub backlog: usize,
    /// Unprocessed messages per type.
    pub backlog_by_type: BTreeMap<String, usize>,
    pub trashed_sessions: usize,
}

pub(crate) fn backlog_by_type(pending: &[Message]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for message in pending {
        *counts.entry(message.message_type().to_string()).or_insert(0) += 1;
    }
    counts
}

pub async fn run_status(
    config: &BrainsurgeonConfig,
    json: bool,
    plain: bool,
) -> Result<(), BrainsurgeonError> {
    let store = SqliteMessageStore::open(&config.storage).await?;
    let health = store.health_check().await?;
    let pending = store.list_unprocessed().await?;
    store.close().await?;

    // An unreadable trash dir should not hide the bus status.
    let trashed = brainsurgeon_trash::TrashBin::from_config(config)
        .list()
        .await
        .map(|entries| entries.len())
        .unwrap_or(0);

    let (healthy, detail) = match health {
        HealthStatus::Healthy => (true, None),
        HealthStatus::Degraded(d) => (true, Some(d)),
        HealthStatus::Unhealthy(d) => (false, Some(d)),
    };
    let status = StatusResponse {
        healthy,
        detail,
        database_path: config.storage.database_path.clone(),
        backlog: pending.len(),
        backlog_by_type: backlog_by_type(&pending),
        trashed_sessions: trashed,
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&status).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        let use_color = !plain && std::io::stdout().is_terminal();
        print_status(&status, use_color);
    }
    Ok(())
}

fn print_status(status: &StatusResponse, use_color: bool) {
    println!();
    println!("  brainsurgeon status");
    println!("  {}", "-".repeat(35));

    let state = if status.healthy { "healthy" } else { "unhealthy" };
    if use_color {
        use colored::Colorize;
        if status.healthy {
            println!("    Store:    {} {}", "✓".green(), state.green());
        } else {
            println!("    Store:    {} {}", "✗".red(), state.red());
        }
    } else if status.healthy {
        println!("    Store:    [OK] {state}");
    } else {
        println!("    Store:    [FAIL] {state}");
    }
    if let Some(detail) = &status.detail {
        println!("    Detail:   {detail}");
    }
    println!("    Database: {}", status.database_path);
    println!("    Backlog:  {}", status.backlog);
    for (kind, count) in &status.backlog_by_type {
        println!("      {kind:<18} {count}");
    }
    println!("    Trash:    {} session(s)", status.trashed_sessions);
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use brainsurgeon_core::{SessionUpdated, Source};

    #[test]
    fn status_response_serializes() {
        let resp = StatusResponse {
            healthy: true,
            detail: None,
            database_path: "/tmp/bus.db".to_string(),
            backlog: 2,
            backlog_by_type: BTreeMap::from([("prune.request".to_string(), 2)]),
            trashed_sessions: 0,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"healthy\":true"));
        assert!(json.contains("\"prune.request\":2"));
    }

    #[tokio::test]
    async fn backlog_is_grouped_by_type() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = BrainsurgeonConfig::default();
        config.storage.database_path = dir.path().join("bus.db").to_string_lossy().into_owned();
        config.paths.openclaw_root = dir.path().to_string_lossy().into_owned();

        let store = SqliteMessageStore::open(&config.storage).await.unwrap();
        for count in [1, 2] {
            store
                .append(
                    SessionUpdated {
                        agent_id: "main".into(),
                        session_id: "s1".into(),
                        entry_count: count,
                        last_entry_type: "message".into(),
                    }
                    .into(),
                    Source::Extension,
                )
                .await
                .unwrap();
        }
        let pending = store.list_unprocessed().await.unwrap();
        store.close().await.unwrap();

        let grouped = backlog_by_type(&pending);
        assert_eq!(grouped.get("session.updated"), Some(&2));
        run_status(&config, true, true).await.unwrap();
    }
}
