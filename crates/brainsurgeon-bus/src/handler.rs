// SPDX-FileCopyrightText: 2026 BrainSurgeon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subscriber side of the bus.

use std::future::Future;

use async_trait::async_trait;
use brainsurgeon_core::{BrainsurgeonError, Message};

/// Something that reacts to bus messages of the types it is subscribed to.
///
/// Returning `Err` (or panicking, or running past the handler timeout) leaves
/// the message unprocessed so it is delivered again on a later pass.
/// Handlers therefore need to tolerate seeing the same message twice.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Name used in logs and metric labels.
    fn name(&self) -> &str;

    async fn handle(&self, message: &Message) -> Result<(), BrainsurgeonError>;
}

/// A [`MessageHandler`] built from an async closure.
pub struct FnHandler<F> {
    name: String,
    f: F,
}

/// Wrap an async closure as a handler. The closure receives its own copy of
/// the message.
///
/// ```ignore
/// bus.subscribe(MessageType::PruneResponse, handler_fn("log", |msg| async move {
///     tracing::info!(id = %msg.id, "prune answered");
///     Ok(())
/// }));
/// ```
pub fn handler_fn<F, Fut>(name: impl Into<String>, f: F) -> FnHandler<F>
where
    F: Fn(Message) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), BrainsurgeonError>> + Send,
{
    FnHandler {
        name: name.into(),
        f,
    }
}

#[async_trait]
impl<F, Fut> MessageHandler for FnHandler<F>
where
    F: Fn(Message) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), BrainsurgeonError>> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, message: &Message) -> Result<(), BrainsurgeonError> {
        (self.f)(message.clone()).await
    }
}
