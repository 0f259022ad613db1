// SPDX-FileCopyrightText: 2026 BrainSurgeon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A bus over a temporary SQLite database.
//!
//! Tests usually leave the bus stopped and drive it with
//! [`TestBus::pump`], which keeps dispatch deterministic.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use brainsurgeon_bus::{BusSettings, DispatchReport, MessageBus};
use brainsurgeon_config::model::StorageConfig;
use brainsurgeon_core::{BrainsurgeonError, Source};
use brainsurgeon_storage::SqliteMessageStore;

/// Builder for [`TestBus`].
pub struct TestBusBuilder {
    source: Source,
    settings: BusSettings,
}

impl TestBusBuilder {
    fn new() -> Self {
        Self {
            source: Source::Api,
            settings: BusSettings {
                poll_interval: Duration::from_millis(20),
                handler_timeout: Duration::from_secs(2),
            },
        }
    }

    pub fn with_source(mut self, source: Source) -> Self {
        self.source = source;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.settings.poll_interval = interval;
        self
    }

    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.settings.handler_timeout = timeout;
        self
    }

    pub async fn build(self) -> Result<TestBus, BrainsurgeonError> {
        let temp_dir = tempfile::TempDir::new().map_err(BrainsurgeonError::storage)?;
        let db_path = temp_dir.path().join("bus.db");
        let store = Arc::new(SqliteMessageStore::open(&storage_config(&db_path)).await?);
        let bus = Arc::new(MessageBus::new(store.clone(), self.source, self.settings));
        Ok(TestBus {
            bus,
            store,
            settings: self.settings,
            db_path,
            _temp_dir: temp_dir,
        })
    }
}

fn storage_config(path: &Path) -> StorageConfig {
    StorageConfig {
        database_path: path.to_string_lossy().into_owned(),
        ..StorageConfig::default()
    }
}

/// A [`MessageBus`] and its store, alive as long as the temp dir.
pub struct TestBus {
    bus: Arc<MessageBus>,
    store: Arc<SqliteMessageStore>,
    settings: BusSettings,
    db_path: PathBuf,
    _temp_dir: tempfile::TempDir,
}

impl TestBus {
    pub fn builder() -> TestBusBuilder {
        TestBusBuilder::new()
    }

    /// An API-side bus with test timings.
    pub async fn new() -> Result<Self, BrainsurgeonError> {
        Self::builder().build().await
    }

    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.bus
    }

    pub fn store(&self) -> &Arc<SqliteMessageStore> {
        &self.store
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// A second bus over the same file, as another process would open it.
    pub async fn open_peer(&self, source: Source) -> Result<Arc<MessageBus>, BrainsurgeonError> {
        let store = SqliteMessageStore::open(&storage_config(&self.db_path)).await?;
        Ok(Arc::new(MessageBus::new(Arc::new(store), source, self.settings)))
    }

    /// Dispatch until a pass neither processes nor fails anything, at most
    /// `max_passes` times. Returns the summed report.
    pub async fn pump(&self, max_passes: usize) -> Result<DispatchReport, BrainsurgeonError> {
        pump(&self.bus, max_passes).await
    }
}

/// [`TestBus::pump`] for any bus.
pub async fn pump(
    bus: &MessageBus,
    max_passes: usize,
) -> Result<DispatchReport, BrainsurgeonError> {
    let mut total = DispatchReport::default();
    for _ in 0..max_passes {
        let pass = bus.dispatch_once().await?;
        total.processed += pass.processed;
        total.failed += pass.failed;
        total.deferred = pass.deferred;
        if pass.is_idle() {
            break;
        }
    }
    Ok(total)
}
