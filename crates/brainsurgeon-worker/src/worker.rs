// SPDX-FileCopyrightText: 2026 BrainSurgeon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wires the API-side handlers onto a bus.

use std::sync::Arc;

use dashmap::DashSet;
use tracing::info;

use brainsurgeon_bus::{MessageBus, Subscription};
use brainsurgeon_config::model::WorkerConfig;
use brainsurgeon_core::{Externalizer, MessageType, TrashStore};

use crate::handlers::{PruneHandler, RestoreHandler, SessionActivityHandler};

/// Tunables for the attached handlers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerSettings {
    /// Entry count above which a `session.updated` triggers a prune.
    pub auto_prune_entry_threshold: Option<u64>,
}

impl From<&WorkerConfig> for WorkerSettings {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            auto_prune_entry_threshold: config.auto_prune_entry_threshold,
        }
    }
}

/// Handle to the handlers registered by [`Worker::attach`].
pub struct Worker {
    subscriptions: Vec<Subscription>,
    activity: Arc<SessionActivityHandler>,
}

impl Worker {
    /// Subscribe the prune, restore and session-activity handlers.
    pub fn attach(
        bus: &Arc<MessageBus>,
        externalizer: Arc<dyn Externalizer>,
        trash: Arc<dyn TrashStore>,
        settings: WorkerSettings,
    ) -> Self {
        let in_flight = Arc::new(DashSet::new());
        let weak = Arc::downgrade(bus);

        let activity = Arc::new(SessionActivityHandler::new(
            weak.clone(),
            Arc::clone(&trash),
            settings.auto_prune_entry_threshold,
            Arc::clone(&in_flight),
        ));

        let subscriptions = vec![
            bus.subscribe(
                MessageType::PruneRequest,
                PruneHandler::new(weak.clone(), Arc::clone(&externalizer), in_flight),
            ),
            bus.subscribe(
                MessageType::RestoreRequest,
                RestoreHandler::new(weak, externalizer, trash),
            ),
            bus.subscribe_arc(MessageType::SessionUpdated, activity.clone()),
            bus.subscribe_arc(MessageType::SessionCompacted, activity.clone()),
        ];

        info!(
            handlers = subscriptions.len(),
            auto_prune = ?settings.auto_prune_entry_threshold,
            "worker attached"
        );
        Self {
            subscriptions,
            activity,
        }
    }

    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    pub fn activity(&self) -> &SessionActivityHandler {
        &self.activity
    }

    /// Unsubscribe every handler. Returns how many were still registered.
    pub fn detach(self) -> usize {
        self.subscriptions
            .into_iter()
            .map(Subscription::unsubscribe)
            .filter(|removed| *removed)
            .count()
    }
}
