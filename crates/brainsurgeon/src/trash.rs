// SPDX-FileCopyrightText: 2026 BrainSurgeon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `brainsurgeon trash` subcommands.

use chrono::Utc;

use brainsurgeon_config::BrainsurgeonConfig;
use brainsurgeon_core::{BrainsurgeonError, TrashStore};
use brainsurgeon_trash::TrashBin;

pub async fn run_list(config: &BrainsurgeonConfig, json: bool) -> Result<(), BrainsurgeonError> {
    let entries = TrashBin::from_config(config).list().await?;
    if json {
        let body = serde_json::to_string_pretty(&entries)
            .map_err(|e| BrainsurgeonError::Internal(format!("serialize trash entries: {e}")))?;
        println!("{body}");
        return Ok(());
    }
    if entries.is_empty() {
        println!("trash is empty");
        return Ok(());
    }
    for entry in &entries {
        println!(
            "{}/{}  trashed {}  expires {}",
            entry.original_agent,
            entry.original_session_id,
            entry.trashed_at.format("%Y-%m-%d %H:%M"),
            entry.expires_at.format("%Y-%m-%d %H:%M"),
        );
    }
    Ok(())
}

pub async fn run_restore(
    config: &BrainsurgeonConfig,
    agent: &str,
    session: &str,
) -> Result<(), BrainsurgeonError> {
    if TrashBin::from_config(config)
        .restore_from_trash(agent, session)
        .await?
    {
        println!("restored {agent}/{session} from trash");
    } else {
        println!("{agent}/{session} is not in the trash");
    }
    Ok(())
}

pub async fn run_delete(
    config: &BrainsurgeonConfig,
    agent: &str,
    session: &str,
) -> Result<(), BrainsurgeonError> {
    if TrashBin::from_config(config)
        .delete_from_trash(agent, session)
        .await?
    {
        println!("deleted {agent}/{session} from trash");
    } else {
        println!("{agent}/{session} is not in the trash");
    }
    Ok(())
}

pub async fn run_cleanup(config: &BrainsurgeonConfig) -> Result<(), BrainsurgeonError> {
    let deleted = TrashBin::from_config(config).cleanup_expired(Utc::now()).await?;
    println!("removed {deleted} expired trash entr{}", if deleted == 1 { "y" } else { "ies" });
    Ok(())
}
