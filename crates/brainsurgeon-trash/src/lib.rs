// SPDX-FileCopyrightText: 2026 BrainSurgeon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trash bin for a session's extracted-file payloads.
//!
//! Pruning writes large tool outputs under
//! `agents/<agent>/sessions/extracted/<session>/`. When a session is compacted
//! those files no longer match the transcript, so they are parked under
//! `trash/extracted/<agent>/<session>/` with a sidecar
//! `trash/extracted/<agent>/<session>.meta.json` recording where they came
//! from and when they expire.

pub mod trash_bin;
pub mod entry;
pub mod ids;

pub use trash_bin::TrashBin;
pub use entry::TrashEntry;
pub use ids::validate_id;
