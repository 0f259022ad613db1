// SPDX-FileCopyrightText: 2026 BrainSurgeon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for the bus and its collaborators.
//!
//! Every seam where a backend can be swapped (durable store, trash bin,
//! transcript externalizer) is an `#[async_trait]` trait so callers hold
//! `Arc<dyn Trait>` and tests substitute mocks.

pub mod adapter;
pub mod externalizer;
pub mod store;
pub mod trash;

pub use adapter::PluginAdapter;
pub use externalizer::Externalizer;
pub use store::MessageStore;
pub use trash::TrashStore;
