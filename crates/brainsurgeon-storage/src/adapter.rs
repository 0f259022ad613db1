// SPDX-FileCopyrightText: 2026 BrainSurgeon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of [`MessageStore`].

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use tracing::{debug, warn};

use brainsurgeon_config::model::StorageConfig;
use brainsurgeon_core::{
    BrainsurgeonError, HealthStatus, Message, MessageId, MessagePayload, MessageStore,
    PluginAdapter, Source,
};

use crate::database::Database;
use crate::queries::bus_messages::{self, MarkOutcome};

/// Message store backed by the shared SQLite file.
pub struct SqliteMessageStore {
    db: Database,
    /// Last timestamp handed out; new ones never go below it.
    last_ts: Mutex<DateTime<Utc>>,
}

impl SqliteMessageStore {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            last_ts: Mutex::new(DateTime::<Utc>::MIN_UTC),
        }
    }

    /// Open (and migrate) the configured database.
    pub async fn open(config: &StorageConfig) -> Result<Self, BrainsurgeonError> {
        Ok(Self::new(Database::open_with(config).await?))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Current time truncated to storage precision, clamped so it never
    /// precedes an earlier timestamp from this store.
    fn next_timestamp(&self) -> DateTime<Utc> {
        let now = Utc::now().trunc_subsecs(6);
        let mut last = self.last_ts.lock().unwrap_or_else(|p| p.into_inner());
        if now < *last {
            warn!(now = %now, last = %*last, "wall clock moved backwards; clamping");
        } else {
            *last = now;
        }
        *last
    }

    pub async fn count_unprocessed(&self) -> Result<u64, BrainsurgeonError> {
        bus_messages::count_unprocessed(&self.db).await
    }

    /// Delete processed rows older than `cutoff`. Never called by the bus.
    pub async fn purge_processed_before(
        &self,
        cutoff: &DateTime<Utc>,
    ) -> Result<u64, BrainsurgeonError> {
        let n = bus_messages::purge_processed_before(&self.db, cutoff).await?;
        debug!(purged = n, cutoff = %cutoff, "purged processed messages");
        Ok(n)
    }

    /// Checkpoint the WAL and close.
    pub async fn close(&self) -> Result<(), BrainsurgeonError> {
        self.db.close().await
    }
}

#[async_trait]
impl MessageStore for SqliteMessageStore {
    async fn append(
        &self,
        payload: MessagePayload,
        source: Source,
    ) -> Result<Message, BrainsurgeonError> {
        let id = MessageId::generate();
        let timestamp = self.next_timestamp();
        bus_messages::insert(&self.db, &id, &payload, &timestamp, source).await?;
        debug!(id = %id, kind = %payload.message_type(), source = %source, "appended message");
        Ok(Message {
            id,
            payload,
            timestamp,
            source,
            processed: false,
            processed_at: None,
        })
    }

    async fn list_unprocessed(&self) -> Result<Vec<Message>, BrainsurgeonError> {
        bus_messages::list_unprocessed(&self.db).await
    }

    async fn mark_processed(&self, id: &MessageId) -> Result<(), BrainsurgeonError> {
        let at = Utc::now().trunc_subsecs(6);
        match bus_messages::mark_processed(&self.db, id, &at).await? {
            MarkOutcome::Marked => Ok(()),
            MarkOutcome::AlreadyProcessed => {
                debug!(id = %id, "already processed");
                Ok(())
            }
            MarkOutcome::Missing => Err(BrainsurgeonError::NotFound { id: id.to_string() }),
        }
    }

    async fn get(&self, id: &MessageId) -> Result<Option<Message>, BrainsurgeonError> {
        bus_messages::get(&self.db, id).await
    }
}

#[async_trait]
impl PluginAdapter for SqliteMessageStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn health_check(&self) -> Result<HealthStatus, BrainsurgeonError> {
        let ok = self
            .db
            .connection()
            .call(|conn| -> Result<i64, rusqlite::Error> {
                conn.query_row("SELECT 1", [], |row| row.get(0))
            })
            .await;
        Ok(match ok {
            Ok(_) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Unhealthy(e.to_string()),
        })
    }

    async fn shutdown(&self) -> Result<(), BrainsurgeonError> {
        self.close().await
    }
}
