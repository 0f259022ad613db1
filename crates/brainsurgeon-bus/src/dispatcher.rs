// SPDX-FileCopyrightText: 2026 BrainSurgeon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fan-out from the message store to subscribed handlers.
//!
//! A pass lists every unprocessed message and, for each one that has
//! subscribers, runs its handlers in registration order. The message is
//! marked processed only when all of them succeed; anything else leaves it
//! for the next pass. Messages of a type nobody subscribes to are skipped,
//! which is how two processes share one table without stealing each other's
//! work.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures::FutureExt;
use tracing::{debug, error, warn};

use brainsurgeon_core::{BrainsurgeonError, Message, MessageStore, MessageType};

use crate::handler::MessageHandler;
use crate::metrics::{self, FailureReason};

type Entry = (u64, Arc<dyn MessageHandler>);

/// Per-type handler lists.
#[derive(Default)]
struct Registry {
    handlers: DashMap<MessageType, Vec<Entry>>,
    next_id: AtomicU64,
}

impl Registry {
    fn add(&self, kind: MessageType, handler: Arc<dyn MessageHandler>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers.entry(kind).or_default().push((id, handler));
        id
    }

    fn remove(&self, kind: MessageType, id: u64) -> bool {
        let Some(mut list) = self.handlers.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|(entry_id, _)| *entry_id != id);
        before != list.len()
    }

    /// Snapshot so no map lock is held across handler awaits.
    fn snapshot(&self, kind: MessageType) -> Vec<Arc<dyn MessageHandler>> {
        self.handlers
            .get(&kind)
            .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default()
    }
}

/// Handle returned by [`Dispatcher::subscribe`].
///
/// Dropping it does not unsubscribe; call [`Subscription::unsubscribe`].
#[derive(Debug)]
pub struct Subscription {
    registry: Weak<Registry>,
    kind: MessageType,
    id: u64,
}

impl Subscription {
    pub fn message_type(&self) -> MessageType {
        self.kind
    }

    /// Stop delivering to this handler. Returns `false` if it was already
    /// removed or the dispatcher is gone.
    pub fn unsubscribe(self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.remove(self.kind, self.id),
            None => false,
        }
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("types", &self.handlers.len())
            .finish()
    }
}

/// Outcome of one dispatch pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Messages whose handlers all succeeded and that are now marked.
    pub processed: usize,
    /// Messages left unprocessed because at least one handler failed.
    pub failed: usize,
    /// Messages skipped because no handler is subscribed to their type.
    pub deferred: usize,
}

impl DispatchReport {
    pub fn is_idle(&self) -> bool {
        self.processed == 0 && self.failed == 0
    }
}

/// Runs dispatch passes over a [`MessageStore`].
pub struct Dispatcher {
    store: Arc<dyn MessageStore>,
    registry: Arc<Registry>,
    handler_timeout: Duration,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn MessageStore>, handler_timeout: Duration) -> Self {
        Self {
            store,
            registry: Arc::new(Registry::default()),
            handler_timeout,
        }
    }

    /// Register `handler` for `kind`. Handlers of one type run in the order
    /// they were registered.
    pub fn subscribe(&self, kind: MessageType, handler: Arc<dyn MessageHandler>) -> Subscription {
        let name = handler.name().to_string();
        let id = self.registry.add(kind, handler);
        debug!(kind = %kind, handler = %name, "handler subscribed");
        Subscription {
            registry: Arc::downgrade(&self.registry),
            kind,
            id,
        }
    }

    pub fn handler_count(&self, kind: MessageType) -> usize {
        self.registry.handlers.get(&kind).map_or(0, |l| l.len())
    }

    /// One pass over the current backlog.
    ///
    /// Only store failures are returned; handler failures are logged,
    /// counted and reflected in the report.
    pub async fn run_once(&self) -> Result<DispatchReport, BrainsurgeonError> {
        let pending = self.store.list_unprocessed().await?;
        metrics::set_backlog(pending.len());

        let mut report = DispatchReport::default();
        for message in &pending {
            let kind = message.message_type();
            let handlers = self.registry.snapshot(kind);
            if handlers.is_empty() {
                report.deferred += 1;
                metrics::record_deferred(kind);
                continue;
            }

            let started = Instant::now();
            let mut all_ok = true;
            for handler in &handlers {
                if !self.invoke(handler.as_ref(), message).await {
                    all_ok = false;
                }
            }
            metrics::record_dispatch_latency(kind, started.elapsed().as_secs_f64());

            if !all_ok {
                report.failed += 1;
                continue;
            }

            match self.store.mark_processed(&message.id).await {
                Ok(()) => {
                    report.processed += 1;
                    metrics::record_processed(kind);
                }
                // Row removed by external retention while we were handling it.
                Err(BrainsurgeonError::NotFound { id }) => {
                    warn!(id = %id, "message vanished before it could be marked");
                }
                Err(e) => return Err(e),
            }
        }

        if !report.is_idle() {
            debug!(
                processed = report.processed,
                failed = report.failed,
                deferred = report.deferred,
                "dispatch pass complete"
            );
        }
        Ok(report)
    }

    /// Run one handler with timeout and panic isolation. `true` on success.
    async fn invoke(&self, handler: &dyn MessageHandler, message: &Message) -> bool {
        let kind = message.message_type();
        let name = handler.name();
        let guarded = AssertUnwindSafe(handler.handle(message)).catch_unwind();

        let reason = match tokio::time::timeout(self.handler_timeout, guarded).await {
            Ok(Ok(Ok(()))) => return true,
            Ok(Ok(Err(e))) => {
                warn!(id = %message.id, kind = %kind, handler = name, error = %e, "handler failed");
                FailureReason::Error
            }
            Ok(Err(panic)) => {
                error!(
                    id = %message.id,
                    kind = %kind,
                    handler = name,
                    panic = panic_message(panic.as_ref()),
                    "handler panicked"
                );
                FailureReason::Panic
            }
            Err(_) => {
                warn!(
                    id = %message.id,
                    kind = %kind,
                    handler = name,
                    timeout = ?self.handler_timeout,
                    "handler timed out"
                );
                FailureReason::Timeout
            }
        };
        metrics::record_handler_failure(kind, name, reason);
        false
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
