// SPDX-FileCopyrightText: 2026 BrainSurgeon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The bus façade: publish, subscribe, and the dispatch loop lifecycle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span};

use brainsurgeon_config::model::BusConfig;
use brainsurgeon_core::{
    BrainsurgeonError, Message, MessageId, MessagePayload, MessageStore, MessageType, Source,
};

use crate::dispatcher::{DispatchReport, Dispatcher, Subscription};
use crate::handler::MessageHandler;
use crate::metrics;

/// Loop timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusSettings {
    /// Pause between passes when nothing wakes the loop earlier.
    pub poll_interval: Duration,
    /// Upper bound on one handler invocation.
    pub handler_timeout: Duration,
}

impl Default for BusSettings {
    fn default() -> Self {
        Self::from(&BusConfig::default())
    }
}

impl From<&BusConfig> for BusSettings {
    fn from(config: &BusConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            handler_timeout: config.handler_timeout(),
        }
    }
}

struct LoopHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Durable publish/subscribe over a [`MessageStore`].
///
/// Starts in the stopped state. `start` replays the backlog and spawns the
/// dispatch loop; `stop` lets the current pass finish and joins the loop.
/// `publish` and `subscribe` work in either state.
pub struct MessageBus {
    store: Arc<dyn MessageStore>,
    dispatcher: Arc<Dispatcher>,
    source: Source,
    settings: BusSettings,
    wake: Arc<Notify>,
    loop_handle: Mutex<Option<LoopHandle>>,
    running: AtomicBool,
}

impl MessageBus {
    pub fn new(store: Arc<dyn MessageStore>, source: Source, settings: BusSettings) -> Self {
        Self {
            dispatcher: Arc::new(Dispatcher::new(Arc::clone(&store), settings.handler_timeout)),
            store,
            source,
            settings,
            wake: Arc::new(Notify::new()),
            loop_handle: Mutex::new(None),
            running: AtomicBool::new(false),
        }
    }

    /// Identity stamped on everything this bus publishes.
    pub fn source(&self) -> Source {
        self.source
    }

    pub fn settings(&self) -> BusSettings {
        self.settings
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Replay every unprocessed message, then run the loop in the background.
    ///
    /// Returns once the replay pass is done. A store failure during replay
    /// is returned and the bus stays stopped. No-op when already running.
    pub async fn start(&self) -> Result<DispatchReport, BrainsurgeonError> {
        let mut slot = self.loop_handle.lock().await;
        if slot.is_some() {
            debug!(source = %self.source, "bus already running");
            return Ok(DispatchReport::default());
        }

        let replay = self.dispatcher.run_once().await?;
        info!(
            source = %self.source,
            processed = replay.processed,
            failed = replay.failed,
            deferred = replay.deferred,
            "bus started; backlog replayed"
        );

        let cancel = CancellationToken::new();
        let task = tokio::spawn(
            dispatch_loop(
                Arc::clone(&self.dispatcher),
                Arc::clone(&self.wake),
                cancel.clone(),
                self.settings.poll_interval,
            )
            .instrument(info_span!("bus_loop", source = %self.source)),
        );
        *slot = Some(LoopHandle { cancel, task });
        self.running.store(true, Ordering::Release);
        Ok(replay)
    }

    /// Stop the loop after its current pass and wait for it to exit.
    /// No-op when stopped.
    pub async fn stop(&self) {
        let mut slot = self.loop_handle.lock().await;
        let Some(handle) = slot.take() else {
            return;
        };
        handle.cancel.cancel();
        if let Err(e) = handle.task.await {
            error!(source = %self.source, error = %e, "dispatch loop ended abnormally");
        }
        self.running.store(false, Ordering::Release);
        info!(source = %self.source, "bus stopped");
    }

    /// Durably append a message. Never waits for it to be handled.
    pub async fn publish(
        &self,
        payload: impl Into<MessagePayload>,
    ) -> Result<Message, BrainsurgeonError> {
        let message = self.store.append(payload.into(), self.source).await?;
        metrics::record_published(message.message_type());
        debug!(
            id = %message.id,
            kind = %message.message_type(),
            agent = message.payload.agent_id(),
            session = message.payload.session_id(),
            "published"
        );
        self.wake.notify_one();
        Ok(message)
    }

    /// Register a handler for one message type.
    pub fn subscribe(
        &self,
        kind: MessageType,
        handler: impl MessageHandler + 'static,
    ) -> Subscription {
        self.subscribe_arc(kind, Arc::new(handler))
    }

    /// Register a shared handler, e.g. one instance for several types.
    pub fn subscribe_arc(&self, kind: MessageType, handler: Arc<dyn MessageHandler>) -> Subscription {
        let sub = self.dispatcher.subscribe(kind, handler);
        // Something may have been waiting for exactly this subscriber.
        self.wake.notify_one();
        sub
    }

    pub async fn get_unprocessed(&self) -> Result<Vec<Message>, BrainsurgeonError> {
        self.store.list_unprocessed().await
    }

    pub async fn mark_processed(&self, id: &MessageId) -> Result<(), BrainsurgeonError> {
        self.store.mark_processed(id).await
    }

    /// Run a single dispatch pass in the caller's task, regardless of state.
    pub async fn dispatch_once(&self) -> Result<DispatchReport, BrainsurgeonError> {
        self.dispatcher.run_once().await
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }
}

async fn dispatch_loop(
    dispatcher: Arc<Dispatcher>,
    wake: Arc<Notify>,
    cancel: CancellationToken,
    poll_interval: Duration,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = wake.notified() => {}
            _ = tokio::time::sleep(poll_interval) => {}
        }
        // A pass that started always runs to completion.
        if let Err(e) = dispatcher.run_once().await {
            error!(error = %e, "dispatch pass failed; retrying next interval");
        }
    }
    debug!("dispatch loop exited");
}

impl std::fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBus")
            .field("source", &self.source)
            .field("settings", &self.settings)
            .field("running", &self.is_running())
            .finish()
    }
}
