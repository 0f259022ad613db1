// SPDX-FileCopyrightText: 2026 BrainSurgeon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection lifecycle: PRAGMA setup, migrations, WAL checkpoint on close.
//!
//! All statements in this process run on tokio-rusqlite's single background
//! thread. Open one `Database` per process and share it.

use std::path::Path;
use std::time::Duration;

use brainsurgeon_config::model::StorageConfig;
use brainsurgeon_core::BrainsurgeonError;
use tracing::{debug, info};

/// Handle to the bus database.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open with default settings (WAL on, 5s busy timeout).
    pub async fn open(path: &str) -> Result<Self, BrainsurgeonError> {
        Self::open_with(&StorageConfig {
            database_path: path.to_string(),
            ..StorageConfig::default()
        })
        .await
    }

    /// Open the configured database file, creating parent directories,
    /// applying PRAGMAs and running pending migrations.
    pub async fn open_with(config: &StorageConfig) -> Result<Self, BrainsurgeonError> {
        let path = config.database_path.clone();
        if let Some(parent) = Path::new(&path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(BrainsurgeonError::storage)?;
        }

        let conn = tokio_rusqlite::Connection::open(&path)
            .await
            .map_err(BrainsurgeonError::storage)?;

        let wal = config.wal_mode;
        let busy = Duration::from_millis(config.busy_timeout_ms);
        conn.call(move |conn| -> Result<(), rusqlite::Error> {
            // Set before anything else so the journal switch itself can wait
            // on the other process.
            conn.busy_timeout(busy)?;
            let mode = if wal { "WAL" } else { "DELETE" };
            let _: String =
                conn.query_row(&format!("PRAGMA journal_mode={mode};"), [], |row| row.get(0))?;
            conn.execute_batch("PRAGMA synchronous=NORMAL;")?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        conn.call(|conn| crate::migrations::run_migrations(conn))
            .await
            .map_err(map_tr_err)?;

        info!(path = %path, wal, "bus database opened");
        Ok(Self { conn })
    }

    /// The underlying async connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoint the WAL and close the connection. Later calls on any clone
    /// of this handle fail with a storage error.
    pub async fn close(&self) -> Result<(), BrainsurgeonError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        self.conn
            .clone()
            .close()
            .await
            .map_err(BrainsurgeonError::storage)
    }
}

/// Convert a tokio-rusqlite error into [`BrainsurgeonError::Storage`].
pub(crate) fn map_tr_err<E>(e: tokio_rusqlite::Error<E>) -> BrainsurgeonError
where
    E: std::error::Error + Send + Sync + 'static,
{
    BrainsurgeonError::storage(e)
}
