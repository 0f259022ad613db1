// SPDX-FileCopyrightText: 2026 BrainSurgeon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `brainsurgeon serve`: the API process.
//!
//! Opens the store, attaches the worker handlers, replays the backlog and
//! dispatches until a shutdown signal arrives.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use brainsurgeon_bus::{BusSettings, MessageBus};
use brainsurgeon_config::BrainsurgeonConfig;
use brainsurgeon_core::{BrainsurgeonError, Source};
use brainsurgeon_storage::SqliteMessageStore;
use brainsurgeon_trash::TrashBin;
use brainsurgeon_worker::shutdown::install_signal_handler;
use brainsurgeon_worker::{JsonlExternalizer, Worker, WorkerSettings};

/// The identity `serve` publishes under. Only the API side runs the worker.
pub(crate) fn serve_source(config: &BrainsurgeonConfig) -> Result<Source, BrainsurgeonError> {
    let source: Source = config
        .bus
        .source
        .parse()
        .map_err(|_| BrainsurgeonError::Config(format!("unknown bus.source: {}", config.bus.source)))?;
    if source != Source::Api {
        return Err(BrainsurgeonError::Config(
            "serve runs the API worker; set bus.source = \"api\"".to_string(),
        ));
    }
    Ok(source)
}

pub async fn run_serve(config: BrainsurgeonConfig) -> Result<(), BrainsurgeonError> {
    let shutdown = install_signal_handler();
    serve_until(config, shutdown).await
}

/// Serve until `shutdown` is cancelled.
pub(crate) async fn serve_until(
    config: BrainsurgeonConfig,
    shutdown: CancellationToken,
) -> Result<(), BrainsurgeonError> {
    let source = serve_source(&config)?;
    info!(db = %config.storage.database_path, "starting brainsurgeon serve");
    brainsurgeon_bus::metrics::register_metrics();

    let store = Arc::new(SqliteMessageStore::open(&config.storage).await?);
    let bus = Arc::new(MessageBus::new(
        store.clone(),
        source,
        BusSettings::from(&config.bus),
    ));

    let worker = Worker::attach(
        &bus,
        Arc::new(JsonlExternalizer::from_config(&config)),
        Arc::new(TrashBin::from_config(&config)),
        WorkerSettings::from(&config.worker),
    );

    let replay = bus.start().await?;
    info!(
        replayed = replay.processed,
        failed = replay.failed,
        waiting_for_peer = replay.deferred,
        root = %config.paths.openclaw_root().display(),
        "brainsurgeon ready"
    );

    shutdown.cancelled().await;
    info!("shutting down");

    bus.stop().await;
    worker.detach();
    if let Err(e) = store.close().await {
        warn!(error = %e, "store did not close cleanly");
    }
    info!("brainsurgeon stopped");
    Ok(())
}
