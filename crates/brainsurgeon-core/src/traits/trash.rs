// SPDX-FileCopyrightText: 2026 BrainSurgeon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trash bin for a session's extracted-file payloads.

use async_trait::async_trait;

use crate::error::BrainsurgeonError;

/// Moves a session's extracted payloads to and from a staging area.
///
/// All three operations are idempotent: acting on something that is not
/// there returns `Ok(false)` rather than an error.
#[async_trait]
pub trait TrashStore: Send + Sync {
    /// Move the session's extracted payloads into the trash.
    async fn move_to_trash(
        &self,
        agent_id: &str,
        session_id: &str,
    ) -> Result<bool, BrainsurgeonError>;

    /// Move the session's payloads back out of the trash.
    async fn restore_from_trash(
        &self,
        agent_id: &str,
        session_id: &str,
    ) -> Result<bool, BrainsurgeonError>;

    /// Permanently delete the session's payloads from the trash.
    async fn delete_from_trash(
        &self,
        agent_id: &str,
        session_id: &str,
    ) -> Result<bool, BrainsurgeonError>;
}
