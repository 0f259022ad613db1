// SPDX-FileCopyrightText: 2026 BrainSurgeon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the BrainSurgeon message bus.

use thiserror::Error;

/// The primary error type used across the bus, its store, and its collaborators.
#[derive(Debug, Error)]
pub enum BrainsurgeonError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// The durable medium is unavailable, corrupt, or rejected a write.
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Operation on a message id that never existed.
    #[error("message not found: {id}")]
    NotFound { id: String },

    /// A subscriber failed while handling a message.
    ///
    /// Raised inside handlers and caught by the dispatcher; never surfaces
    /// to a publisher.
    #[error("handler error: {message}")]
    Handler {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Filesystem failure while moving extracted payloads in or out of trash.
    #[error("trash error: {message}")]
    Trash {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Rejected input (bad path component, missing transcript, etc.).
    #[error("validation error: {0}")]
    Validation(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl BrainsurgeonError {
    /// Wrap any error as a storage fault.
    pub fn storage(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Storage {
            source: source.into(),
        }
    }

    /// Build a handler failure with no underlying cause.
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an I/O failure raised by a trash operation.
    pub fn trash(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Trash {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns `true` for faults of the durable medium.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage { .. })
    }
}

