// SPDX-FileCopyrightText: 2026 BrainSurgeon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the BrainSurgeon message bus.
//!
//! This crate provides the error type, the typed message model, and the
//! adapter traits (durable store, trash bin, transcript externalizer) shared
//! by every other crate in the workspace.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::BrainsurgeonError;
pub use types::{
    HealthStatus, Message, MessageId, MessagePayload, MessageType, PruneRequest, PruneResponse,
    RestoreRequest, RestoreResponse, SessionCompacted, SessionUpdated, Source,
};

pub use traits::{Externalizer, MessageStore, PluginAdapter, TrashStore};
