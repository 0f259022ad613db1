// SPDX-FileCopyrightText: 2026 BrainSurgeon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The API process's side of the bus.
//!
//! [`Worker::attach`] subscribes the prune, restore and session-activity
//! handlers to a [`MessageBus`](brainsurgeon_bus::MessageBus). Pruning itself
//! is done by an [`Externalizer`](brainsurgeon_core::Externalizer); the
//! [`JsonlExternalizer`] here works directly on OpenClaw transcripts.

pub mod handlers;
pub mod shutdown;
pub mod transcript;
pub mod worker;

pub use handlers::{PruneHandler, RestoreHandler, SessionActivityHandler};
pub use transcript::JsonlExternalizer;
pub use worker::{Worker, WorkerSettings};
