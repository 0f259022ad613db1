// SPDX-FileCopyrightText: 2026 BrainSurgeon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `brainsurgeon pending` and `brainsurgeon purge`.

use chrono::{Duration, Utc};

use brainsurgeon_config::BrainsurgeonConfig;
use brainsurgeon_core::{BrainsurgeonError, Message, MessageStore};
use brainsurgeon_storage::SqliteMessageStore;

/// One table row per message.
pub(crate) fn format_row(message: &Message) -> String {
    format!(
        "{:<36}  {:<17}  {:<9}  {}  {}/{}",
        message.id,
        message.message_type().to_string(),
        message.source.to_string(),
        message.timestamp.format("%Y-%m-%d %H:%M:%S"),
        message.payload.agent_id(),
        message.payload.session_id(),
    )
}

pub async fn run_pending(config: &BrainsurgeonConfig, json: bool) -> Result<(), BrainsurgeonError> {
    let store = SqliteMessageStore::open(&config.storage).await?;
    let pending = store.list_unprocessed().await?;
    store.close().await?;

    if json {
        let body = serde_json::to_string_pretty(&pending)
            .map_err(|e| BrainsurgeonError::Internal(format!("serialize messages: {e}")))?;
        println!("{body}");
        return Ok(());
    }

    if pending.is_empty() {
        println!("no unprocessed messages");
        return Ok(());
    }
    for message in &pending {
        println!("{}", format_row(message));
    }
    println!("\n{} unprocessed", pending.len());
    Ok(())
}

pub async fn run_purge(config: &BrainsurgeonConfig, older_than_days: u32) -> Result<(), BrainsurgeonError> {
    let cutoff = Utc::now() - Duration::days(i64::from(older_than_days));
    let store = SqliteMessageStore::open(&config.storage).await?;
    let purged = store.purge_processed_before(&cutoff).await?;
    store.close().await?;
    println!("purged {purged} processed message(s) older than {older_than_days} day(s)");
    Ok(())
}
