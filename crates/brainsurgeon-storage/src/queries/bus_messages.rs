// SPDX-FileCopyrightText: 2026 BrainSurgeon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Statements against the `bus_messages` table.

use brainsurgeon_core::{BrainsurgeonError, Message, MessageId, MessagePayload, MessageType, Source};
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};

/// Fixed-width RFC 3339 with microseconds, so text order is time order.
const TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

const COLUMNS: &str = "id, type, payload, timestamp, source, processed, processed_at";

pub(crate) fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.format(TS_FORMAT).to_string()
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, BrainsurgeonError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(BrainsurgeonError::storage)
}

/// A row as read from SQLite, before payload decoding.
struct RawRow {
    id: String,
    kind: String,
    payload: String,
    timestamp: String,
    source: String,
    processed: bool,
    processed_at: Option<String>,
}

impl RawRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            kind: row.get(1)?,
            payload: row.get(2)?,
            timestamp: row.get(3)?,
            source: row.get(4)?,
            processed: row.get(5)?,
            processed_at: row.get(6)?,
        })
    }

    /// A row that fails to decode is a corrupt medium, not a handler concern.
    fn decode(self) -> Result<Message, BrainsurgeonError> {
        let kind: MessageType = self.kind.parse().map_err(|_| {
            BrainsurgeonError::storage(format!(
                "row {} has unknown message type `{}`",
                self.id, self.kind
            ))
        })?;
        let source: Source = self.source.parse().map_err(|_| {
            BrainsurgeonError::storage(format!(
                "row {} has unknown source `{}`",
                self.id, self.source
            ))
        })?;
        Ok(Message {
            payload: MessagePayload::from_body(kind, &self.payload)
                .map_err(BrainsurgeonError::storage)?,
            timestamp: parse_ts(&self.timestamp)?,
            source,
            processed: self.processed,
            processed_at: self.processed_at.as_deref().map(parse_ts).transpose()?,
            id: MessageId(self.id),
        })
    }
}

/// Insert one unprocessed message. The caller supplies id and timestamp.
pub async fn insert(
    db: &Database,
    id: &MessageId,
    payload: &MessagePayload,
    timestamp: &DateTime<Utc>,
    source: Source,
) -> Result<(), BrainsurgeonError> {
    let id = id.as_str().to_string();
    let kind = payload.message_type().to_string();
    let body = payload.body_json().map_err(BrainsurgeonError::storage)?;
    let ts = format_ts(timestamp);
    let source = source.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO bus_messages (id, type, payload, timestamp, source, processed)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0)",
                params![id, kind, body, ts, source],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Every unprocessed message in `(timestamp, id)` order.
pub async fn list_unprocessed(db: &Database) -> Result<Vec<Message>, BrainsurgeonError> {
    let rows = db
        .connection()
        .call(|conn| -> Result<Vec<RawRow>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM bus_messages
                 WHERE processed = 0
                 ORDER BY timestamp ASC, id ASC"
            ))?;
            let rows = stmt.query_map([], RawRow::from_row)?.collect();
            rows
        })
        .await
        .map_err(map_tr_err)?;
    rows.into_iter().map(RawRow::decode).collect()
}

/// Fetch one message by id, processed or not.
pub async fn get(db: &Database, id: &MessageId) -> Result<Option<Message>, BrainsurgeonError> {
    let id = id.as_str().to_string();
    let row = db
        .connection()
        .call(move |conn| -> Result<Option<RawRow>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM bus_messages WHERE id = ?1"),
                params![id],
                RawRow::from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)?;
    row.map(RawRow::decode).transpose()
}

/// Outcome of [`mark_processed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    /// The row flipped from unprocessed to processed.
    Marked,
    /// The row was already processed; nothing changed.
    AlreadyProcessed,
    /// No row has this id.
    Missing,
}

/// Flip `processed` to 1 for an unprocessed row, inside one transaction so
/// the existence check sees the same snapshot as the update.
pub async fn mark_processed(
    db: &Database,
    id: &MessageId,
    processed_at: &DateTime<Utc>,
) -> Result<MarkOutcome, BrainsurgeonError> {
    let id = id.as_str().to_string();
    let at = format_ts(processed_at);
    db.connection()
        .call(move |conn| -> Result<MarkOutcome, rusqlite::Error> {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE bus_messages SET processed = 1, processed_at = ?2
                 WHERE id = ?1 AND processed = 0",
                params![id, at],
            )?;
            let outcome = if changed == 1 {
                MarkOutcome::Marked
            } else {
                let exists: bool = tx.query_row(
                    "SELECT EXISTS(SELECT 1 FROM bus_messages WHERE id = ?1)",
                    params![id],
                    |row| row.get(0),
                )?;
                if exists {
                    MarkOutcome::AlreadyProcessed
                } else {
                    MarkOutcome::Missing
                }
            };
            tx.commit()?;
            Ok(outcome)
        })
        .await
        .map_err(map_tr_err)
}

/// Number of rows still waiting for dispatch.
pub async fn count_unprocessed(db: &Database) -> Result<u64, BrainsurgeonError> {
    db.connection()
        .call(|conn| -> Result<u64, rusqlite::Error> {
            conn.query_row(
                "SELECT COUNT(*) FROM bus_messages WHERE processed = 0",
                [],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Delete processed rows whose `processed_at` is older than `cutoff`.
/// Unprocessed rows are never touched.
pub async fn purge_processed_before(
    db: &Database,
    cutoff: &DateTime<Utc>,
) -> Result<u64, BrainsurgeonError> {
    let cutoff = format_ts(cutoff);
    db.connection()
        .call(move |conn| -> Result<u64, rusqlite::Error> {
            let n = conn.execute(
                "DELETE FROM bus_messages WHERE processed = 1 AND processed_at < ?1",
                params![cutoff],
            )?;
            Ok(n as u64)
        })
        .await
        .map_err(map_tr_err)
}
