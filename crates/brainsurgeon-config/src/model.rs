// SPDX-FileCopyrightText: 2026 BrainSurgeon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level BrainSurgeon configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BrainsurgeonConfig {
    /// Log verbosity.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Message store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Dispatch loop settings.
    #[serde(default)]
    pub bus: BusConfig,

    /// Filesystem layout of the OpenClaw installation.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Trash retention settings.
    #[serde(default)]
    pub trash: TrashConfig,

    /// API-side maintenance worker settings.
    #[serde(default)]
    pub worker: WorkerConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Message store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file shared by both processes.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    /// How long a writer waits on the other process's lock before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("brainsurgeon").join("bus.db"))
        .unwrap_or_else(|| PathBuf::from("bus.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

/// Dispatch loop configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BusConfig {
    /// Identity stamped on messages this process publishes (`api` or `extension`).
    #[serde(default = "default_source")]
    pub source: String,

    /// Pause between dispatch passes.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Upper bound on a single handler invocation.
    #[serde(default = "default_handler_timeout_secs")]
    pub handler_timeout_secs: u64,
}

impl BusConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn handler_timeout(&self) -> Duration {
        Duration::from_secs(self.handler_timeout_secs)
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            poll_interval_ms: default_poll_interval_ms(),
            handler_timeout_secs: default_handler_timeout_secs(),
        }
    }
}

fn default_source() -> String {
    "api".to_string()
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_handler_timeout_secs() -> u64 {
    30
}

/// OpenClaw filesystem layout.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    /// Root of the OpenClaw installation (holds `agents/` and `trash/`).
    /// A leading `~` expands to the home directory.
    #[serde(default = "default_openclaw_root")]
    pub openclaw_root: String,
}

impl PathsConfig {
    /// The configured root with `~` expanded.
    pub fn openclaw_root(&self) -> PathBuf {
        expand_home(&self.openclaw_root)
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            openclaw_root: default_openclaw_root(),
        }
    }
}

fn default_openclaw_root() -> String {
    "~/.openclaw".to_string()
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~") {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest.trim_start_matches('/')),
            None => PathBuf::from(path),
        },
        None => PathBuf::from(path),
    }
}

/// Trash retention configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TrashConfig {
    /// Days a trashed payload is kept before `cleanup` deletes it.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl Default for TrashConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
        }
    }
}

fn default_retention_days() -> u32 {
    14
}

/// Maintenance worker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// Tool outputs kept inline when a prune request carries no threshold.
    #[serde(default = "default_keep_recent")]
    pub default_keep_recent: u32,

    /// Entry count above which a `session.updated` triggers a prune request.
    /// `None` disables auto-pruning.
    #[serde(default)]
    pub auto_prune_entry_threshold: Option<u64>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            default_keep_recent: default_keep_recent(),
            auto_prune_entry_threshold: None,
        }
    }
}

fn default_keep_recent() -> u32 {
    3
}
