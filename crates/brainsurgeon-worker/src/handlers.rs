// SPDX-FileCopyrightText: 2026 BrainSurgeon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bus handlers run by the API process.
//!
//! Handlers publish their responses through a `Weak` reference to the bus
//! that dispatches to them, so the bus can be dropped while subscribed.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use tracing::{debug, info, warn};

use brainsurgeon_bus::{MessageBus, MessageHandler, PruneKey};
use brainsurgeon_core::{
    BrainsurgeonError, Externalizer, Message, MessagePayload, PruneRequest, PruneResponse,
    RestoreRequest, RestoreResponse, SessionCompacted, SessionUpdated, TrashStore,
};

/// Failure text for a restore whose payload exists nowhere.
pub const RESTORE_NOT_FOUND: &str = "externalized content not found";

fn upgrade(bus: &Weak<MessageBus>) -> Result<Arc<MessageBus>, BrainsurgeonError> {
    bus.upgrade()
        .ok_or_else(|| BrainsurgeonError::handler("message bus has been dropped"))
}

/// Sessions with an automatic prune request published but not yet handled.
pub type InFlightPrunes = Arc<DashSet<PruneKey>>;

/// Answers every `prune.request` with exactly one `prune.response`.
///
/// Externalizer failures become `success: false` responses. Only storage
/// faults, and failure to publish the response, fail the handler so the
/// request is retried.
pub struct PruneHandler {
    bus: Weak<MessageBus>,
    externalizer: Arc<dyn Externalizer>,
    in_flight: InFlightPrunes,
}

impl PruneHandler {
    pub fn new(
        bus: Weak<MessageBus>,
        externalizer: Arc<dyn Externalizer>,
        in_flight: InFlightPrunes,
    ) -> Self {
        Self {
            bus,
            externalizer,
            in_flight,
        }
    }

    async fn respond(&self, request: &PruneRequest) -> Result<PruneResponse, BrainsurgeonError> {
        match self
            .externalizer
            .externalize(&request.agent_id, &request.session_id, request.threshold)
            .await
        {
            Ok(count) => Ok(PruneResponse::succeeded(request, count)),
            Err(e) if e.is_storage() => Err(e),
            Err(e) => {
                warn!(
                    agent_id = %request.agent_id,
                    session_id = %request.session_id,
                    error = %e,
                    "prune failed"
                );
                Ok(PruneResponse::failed(request, e.to_string()))
            }
        }
    }
}

#[async_trait]
impl MessageHandler for PruneHandler {
    fn name(&self) -> &str {
        "prune"
    }

    async fn handle(&self, message: &Message) -> Result<(), BrainsurgeonError> {
        let MessagePayload::PruneRequest(request) = &message.payload else {
            return Ok(());
        };
        let bus = upgrade(&self.bus)?;
        let response = self.respond(request).await?;
        bus.publish(response).await?;
        self.in_flight.remove(&PruneKey::from(request));
        Ok(())
    }
}

/// Answers every `restore.request` with exactly one `restore.response`.
///
/// When the transcript still holds a placeholder for the call but its
/// payload is gone, the session's trash entry is restored and the lookup
/// retried once. Unknown call ids never touch the trash.
pub struct RestoreHandler {
    bus: Weak<MessageBus>,
    externalizer: Arc<dyn Externalizer>,
    trash: Arc<dyn TrashStore>,
}

impl RestoreHandler {
    pub fn new(
        bus: Weak<MessageBus>,
        externalizer: Arc<dyn Externalizer>,
        trash: Arc<dyn TrashStore>,
    ) -> Self {
        Self {
            bus,
            externalizer,
            trash,
        }
    }

    async fn attempt(&self, request: &RestoreRequest) -> Result<bool, BrainsurgeonError> {
        let (agent, session, call) = (
            request.agent_id.as_str(),
            request.session_id.as_str(),
            request.tool_call_id.as_str(),
        );
        if self.externalizer.restore(agent, session, call).await? {
            return Ok(true);
        }
        if !self.externalizer.is_externalized(agent, session, call).await? {
            return Ok(false);
        }
        if !self.trash.restore_from_trash(agent, session).await? {
            return Ok(false);
        }
        debug!(agent_id = agent, session_id = session, "payloads recovered from trash; retrying restore");
        self.externalizer.restore(agent, session, call).await
    }

    async fn respond(&self, request: &RestoreRequest) -> Result<RestoreResponse, BrainsurgeonError> {
        match self.attempt(request).await {
            Ok(true) => Ok(RestoreResponse::succeeded(request)),
            Ok(false) => Ok(RestoreResponse::failed(request, RESTORE_NOT_FOUND)),
            Err(e) if e.is_storage() => Err(e),
            Err(e) => {
                warn!(
                    agent_id = %request.agent_id,
                    session_id = %request.session_id,
                    tool_call_id = %request.tool_call_id,
                    error = %e,
                    "restore failed"
                );
                Ok(RestoreResponse::failed(request, e.to_string()))
            }
        }
    }
}

#[async_trait]
impl MessageHandler for RestoreHandler {
    fn name(&self) -> &str {
        "restore"
    }

    async fn handle(&self, message: &Message) -> Result<(), BrainsurgeonError> {
        let MessagePayload::RestoreRequest(request) = &message.payload else {
            return Ok(());
        };
        let bus = upgrade(&self.bus)?;
        let response = self.respond(request).await?;
        bus.publish(response).await?;
        Ok(())
    }
}

/// Reacts to the extension's session events.
///
/// `session.updated` records the entry count and, past the configured
/// threshold, asks for a prune. `session.compacted` trashes the session's
/// extracted payloads because their placeholders no longer exist, and
/// forgets the session's count until it reports again.
pub struct SessionActivityHandler {
    bus: Weak<MessageBus>,
    trash: Arc<dyn TrashStore>,
    auto_prune_threshold: Option<u64>,
    entry_counts: DashMap<PruneKey, u64>,
    in_flight: InFlightPrunes,
}

impl SessionActivityHandler {
    pub fn new(
        bus: Weak<MessageBus>,
        trash: Arc<dyn TrashStore>,
        auto_prune_threshold: Option<u64>,
        in_flight: InFlightPrunes,
    ) -> Self {
        Self {
            bus,
            trash,
            auto_prune_threshold,
            entry_counts: DashMap::new(),
            in_flight,
        }
    }

    /// Last entry count reported for a session since its last compaction.
    pub fn entry_count(&self, agent_id: &str, session_id: &str) -> Option<u64> {
        let key = PruneKey {
            agent_id: agent_id.to_string(),
            session_id: session_id.to_string(),
        };
        self.entry_counts.get(&key).map(|c| *c)
    }

    async fn on_updated(&self, event: &SessionUpdated) -> Result<(), BrainsurgeonError> {
        let key = PruneKey {
            agent_id: event.agent_id.clone(),
            session_id: event.session_id.clone(),
        };
        self.entry_counts.insert(key.clone(), event.entry_count);

        let Some(limit) = self.auto_prune_threshold else {
            return Ok(());
        };
        if event.entry_count <= limit || self.in_flight.contains(&key) {
            return Ok(());
        }

        let bus = upgrade(&self.bus)?;
        bus.publish(PruneRequest {
            agent_id: event.agent_id.clone(),
            session_id: event.session_id.clone(),
            threshold: None,
        })
        .await?;
        self.in_flight.insert(key);
        info!(
            agent_id = %event.agent_id,
            session_id = %event.session_id,
            entries = event.entry_count,
            limit,
            "auto-prune requested"
        );
        Ok(())
    }

    async fn on_compacted(&self, event: &SessionCompacted) -> Result<(), BrainsurgeonError> {
        // The next session.updated reports the post-compaction count.
        self.entry_counts.remove(&PruneKey {
            agent_id: event.agent_id.clone(),
            session_id: event.session_id.clone(),
        });

        match self
            .trash
            .move_to_trash(&event.agent_id, &event.session_id)
            .await
        {
            Ok(moved) => {
                debug!(
                    agent_id = %event.agent_id,
                    session_id = %event.session_id,
                    moved,
                    "compaction handled"
                );
                Ok(())
            }
            // Retrying cannot fix a malformed id.
            Err(BrainsurgeonError::Validation(reason)) => {
                warn!(
                    agent_id = %event.agent_id,
                    session_id = %event.session_id,
                    %reason,
                    "ignoring compaction for invalid session"
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl MessageHandler for SessionActivityHandler {
    fn name(&self) -> &str {
        "session-activity"
    }

    async fn handle(&self, message: &Message) -> Result<(), BrainsurgeonError> {
        match &message.payload {
            MessagePayload::SessionUpdated(event) => self.on_updated(event).await,
            MessagePayload::SessionCompacted(event) => self.on_compacted(event).await,
            _ => Ok(()),
        }
    }
}
