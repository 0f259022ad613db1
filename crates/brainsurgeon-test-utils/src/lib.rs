// SPDX-FileCopyrightText: 2026 BrainSurgeon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for BrainSurgeon integration tests.
//!
//! # Components
//!
//! - [`TestBus`] - a bus over a throwaway SQLite file, with manual pumping
//! - [`MockExternalizer`] - scripted prune/restore outcomes with call capture
//! - [`MockTrash`] - in-memory trash bin
//! - [`RecordingHandler`] - captures delivered messages, optionally failing first

pub mod harness;
pub mod mock_externalizer;
pub mod mock_trash;
pub mod recording;

pub use harness::{TestBus, TestBusBuilder};
pub use mock_externalizer::MockExternalizer;
pub use mock_trash::MockTrash;
pub use recording::RecordingHandler;
