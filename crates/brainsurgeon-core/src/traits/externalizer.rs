// SPDX-FileCopyrightText: 2026 BrainSurgeon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transcript externalization: the work behind prune and restore requests.

use async_trait::async_trait;

use crate::error::BrainsurgeonError;

/// Removes large tool outputs from a transcript and puts them back on demand.
#[async_trait]
pub trait Externalizer: Send + Sync {
    /// Externalize tool outputs, keeping the most recent `threshold` inline.
    ///
    /// Returns the number of entries externalized by this call. Repeating
    /// the call is safe; already-externalized entries are not counted again.
    async fn externalize(
        &self,
        agent_id: &str,
        session_id: &str,
        threshold: Option<u32>,
    ) -> Result<u32, BrainsurgeonError>;

    /// Whether the transcript still holds a placeholder for `tool_call_id`.
    async fn is_externalized(
        &self,
        agent_id: &str,
        session_id: &str,
        tool_call_id: &str,
    ) -> Result<bool, BrainsurgeonError>;

    /// Restore one externalized tool output by its tool-call id.
    ///
    /// Returns `Ok(false)` when nothing is externalized under that id.
    async fn restore(
        &self,
        agent_id: &str,
        session_id: &str,
        tool_call_id: &str,
    ) -> Result<bool, BrainsurgeonError>;
}
