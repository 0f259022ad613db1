// SPDX-FileCopyrightText: 2026 BrainSurgeon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable message bus shared by the BrainSurgeon extension and API
//! processes.
//!
//! Publishing appends to a [`MessageStore`](brainsurgeon_core::MessageStore);
//! a dispatch loop delivers unprocessed messages to subscribed handlers at
//! least once and marks them processed when every handler succeeds.
//! [`protocol`] layers the prune/restore request-response convention on top.

pub mod bus;
pub mod dispatcher;
pub mod handler;
pub mod metrics;
pub mod protocol;

pub use bus::{BusSettings, MessageBus};
pub use dispatcher::{DispatchReport, Dispatcher, Subscription};
pub use handler::{FnHandler, MessageHandler, handler_fn};
pub use protocol::{Correlator, ProtocolClient, PruneKey, RestoreKey};
