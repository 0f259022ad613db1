// SPDX-FileCopyrightText: 2026 BrainSurgeon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted [`Externalizer`] for handler tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use brainsurgeon_core::{BrainsurgeonError, Externalizer};

type SessionKey = (String, String);
type CallKey = (String, String, String);

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Returns configured counts per session and restores only tool calls
/// registered with [`MockExternalizer::add_restorable`].
///
/// [`MockExternalizer::add_placeholder`] models a call whose placeholder is
/// in the transcript while its payload is missing, as after compaction.
#[derive(Default)]
pub struct MockExternalizer {
    counts: Mutex<HashMap<SessionKey, u32>>,
    failures: Mutex<HashMap<SessionKey, String>>,
    restorable: Mutex<HashSet<CallKey>>,
    placeholders: Mutex<HashSet<CallKey>>,
    prune_calls: Mutex<Vec<(String, String, Option<u32>)>>,
    restore_calls: Mutex<Vec<CallKey>>,
}

impl MockExternalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `externalize` for the session return `count`.
    pub fn with_externalized(self, agent_id: &str, session_id: &str, count: u32) -> Self {
        lock(&self.counts).insert((agent_id.into(), session_id.into()), count);
        self
    }

    /// Make `externalize` for the session fail with a validation error.
    pub fn with_failure(self, agent_id: &str, session_id: &str, message: &str) -> Self {
        lock(&self.failures).insert((agent_id.into(), session_id.into()), message.into());
        self
    }

    pub fn add_restorable(&self, agent_id: &str, session_id: &str, tool_call_id: &str) {
        let key: CallKey = (agent_id.into(), session_id.into(), tool_call_id.into());
        lock(&self.placeholders).insert(key.clone());
        lock(&self.restorable).insert(key);
    }

    /// Placeholder without a payload. [`MockExternalizer::add_restorable`]
    /// later supplies the payload.
    pub fn add_placeholder(&self, agent_id: &str, session_id: &str, tool_call_id: &str) {
        lock(&self.placeholders).insert((agent_id.into(), session_id.into(), tool_call_id.into()));
    }

    pub fn prune_calls(&self) -> Vec<(String, String, Option<u32>)> {
        lock(&self.prune_calls).clone()
    }

    pub fn restore_calls(&self) -> Vec<CallKey> {
        lock(&self.restore_calls).clone()
    }
}

#[async_trait]
impl Externalizer for MockExternalizer {
    async fn externalize(
        &self,
        agent_id: &str,
        session_id: &str,
        threshold: Option<u32>,
    ) -> Result<u32, BrainsurgeonError> {
        lock(&self.prune_calls).push((agent_id.into(), session_id.into(), threshold));
        let key = (agent_id.to_string(), session_id.to_string());
        if let Some(message) = lock(&self.failures).get(&key) {
            return Err(BrainsurgeonError::Validation(message.clone()));
        }
        Ok(lock(&self.counts).get(&key).copied().unwrap_or(0))
    }

    async fn is_externalized(
        &self,
        agent_id: &str,
        session_id: &str,
        tool_call_id: &str,
    ) -> Result<bool, BrainsurgeonError> {
        let key = (agent_id.to_string(), session_id.to_string(), tool_call_id.to_string());
        Ok(lock(&self.placeholders).contains(&key))
    }

    async fn restore(
        &self,
        agent_id: &str,
        session_id: &str,
        tool_call_id: &str,
    ) -> Result<bool, BrainsurgeonError> {
        let key = (agent_id.to_string(), session_id.to_string(), tool_call_id.to_string());
        lock(&self.restore_calls).push(key.clone());
        if !lock(&self.restorable).remove(&key) {
            return Ok(false);
        }
        lock(&self.placeholders).remove(&key);
        Ok(true)
    }
}
