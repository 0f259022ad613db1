// SPDX-FileCopyrightText: 2026 BrainSurgeon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for the BrainSurgeon bus.
//!
//! One `bus_messages` table in a WAL-mode database file shared by the
//! extension and API processes. Migrations are embedded and run on open;
//! every statement goes through a single `tokio-rusqlite` connection.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteMessageStore;
pub use database::Database;
