// SPDX-FileCopyrightText: 2026 BrainSurgeon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A [`MessageHandler`] that remembers what it saw.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use brainsurgeon_bus::MessageHandler;
use brainsurgeon_core::{BrainsurgeonError, Message};

/// Records every delivery. Cloning shares the record, so a test can keep one
/// clone while the bus owns the other.
#[derive(Clone, Default)]
pub struct RecordingHandler {
    seen: Arc<Mutex<Vec<Message>>>,
    fail_first: Arc<AtomicUsize>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the first `n` deliveries (they are still recorded).
    pub fn failing_first(n: usize) -> Self {
        Self {
            seen: Arc::default(),
            fail_first: Arc::new(AtomicUsize::new(n)),
        }
    }

    pub fn messages(&self) -> Vec<Message> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl MessageHandler for RecordingHandler {
    fn name(&self) -> &str {
        "recording"
    }

    async fn handle(&self, message: &Message) -> Result<(), BrainsurgeonError> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.clone());
        let remaining = self
            .fail_first
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        if remaining.is_ok() {
            return Err(BrainsurgeonError::handler("scripted failure"));
        }
        Ok(())
    }
}
