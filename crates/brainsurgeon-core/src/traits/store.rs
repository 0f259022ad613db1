// SPDX-FileCopyrightText: 2026 BrainSurgeon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable message store behind the bus.

use async_trait::async_trait;

use crate::error::BrainsurgeonError;
use crate::types::{Message, MessageId, MessagePayload, Source};

/// Transactional append-and-mark-processed log of bus messages.
///
/// Implementations must survive process restarts: anything `append` returned
/// `Ok` for is visible to `list_unprocessed` in a later process until it is
/// marked processed.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Durably persist a new, unprocessed message.
    ///
    /// Atomic: after a crash the message is either fully present or absent.
    async fn append(
        &self,
        payload: MessagePayload,
        source: Source,
    ) -> Result<Message, BrainsurgeonError>;

    /// All unprocessed messages, ordered by `(timestamp, id)` ascending.
    async fn list_unprocessed(&self) -> Result<Vec<Message>, BrainsurgeonError>;

    /// Flip `processed` to true and stamp `processed_at`.
    ///
    /// Marking an already-processed message is a no-op. Unknown ids fail
    /// with [`BrainsurgeonError::NotFound`].
    async fn mark_processed(&self, id: &MessageId) -> Result<(), BrainsurgeonError>;

    /// Look up a single message regardless of its processed state.
    async fn get(&self, id: &MessageId) -> Result<Option<Message>, BrainsurgeonError>;
}
