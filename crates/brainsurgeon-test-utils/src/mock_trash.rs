// SPDX-FileCopyrightText: 2026 BrainSurgeon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory [`TrashStore`].

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use brainsurgeon_core::{BrainsurgeonError, TrashStore};

type SessionKey = (String, String);

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Tracks which sessions have extracted payloads and which are trashed.
#[derive(Default)]
pub struct MockTrash {
    extracted: Mutex<HashSet<SessionKey>>,
    trashed: Mutex<HashSet<SessionKey>>,
    moves: Mutex<Vec<SessionKey>>,
}

impl MockTrash {
    pub fn new() -> Self {
        Self::default()
    }

    /// Give the session extracted payloads that `move_to_trash` can move.
    pub fn with_extracted(self, agent_id: &str, session_id: &str) -> Self {
        lock(&self.extracted).insert((agent_id.into(), session_id.into()));
        self
    }

    pub fn with_trashed(self, agent_id: &str, session_id: &str) -> Self {
        lock(&self.trashed).insert((agent_id.into(), session_id.into()));
        self
    }

    pub fn is_trashed(&self, agent_id: &str, session_id: &str) -> bool {
        lock(&self.trashed).contains(&(agent_id.to_string(), session_id.to_string()))
    }

    /// Every `move_to_trash` call, including ones that moved nothing.
    pub fn moves(&self) -> Vec<SessionKey> {
        lock(&self.moves).clone()
    }
}

#[async_trait]
impl TrashStore for MockTrash {
    async fn move_to_trash(
        &self,
        agent_id: &str,
        session_id: &str,
    ) -> Result<bool, BrainsurgeonError> {
        let key = (agent_id.to_string(), session_id.to_string());
        lock(&self.moves).push(key.clone());
        if !lock(&self.extracted).remove(&key) {
            return Ok(false);
        }
        lock(&self.trashed).insert(key);
        Ok(true)
    }

    async fn restore_from_trash(
        &self,
        agent_id: &str,
        session_id: &str,
    ) -> Result<bool, BrainsurgeonError> {
        let key = (agent_id.to_string(), session_id.to_string());
        if !lock(&self.trashed).remove(&key) {
            return Ok(false);
        }
        lock(&self.extracted).insert(key);
        Ok(true)
    }

    async fn delete_from_trash(
        &self,
        agent_id: &str,
        session_id: &str,
    ) -> Result<bool, BrainsurgeonError> {
        Ok(lock(&self.trashed).remove(&(agent_id.to_string(), session_id.to_string())))
    }
}
