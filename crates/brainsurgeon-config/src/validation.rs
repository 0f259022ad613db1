// SPDX-FileCopyrightText: 2026 BrainSurgeon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic checks that serde attributes cannot express.

use brainsurgeon_core::Source;

use crate::diagnostic::ConfigError;
use crate::model::BrainsurgeonConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration, collecting every failure.
pub fn validate_config(config: &BrainsurgeonConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    if config.bus.source.parse::<Source>().is_err() {
        fail(format!(
            "bus.source must be `api` or `extension`, got `{}`",
            config.bus.source
        ));
    }

    if config.bus.poll_interval_ms == 0 {
        fail("bus.poll_interval_ms must be greater than 0".to_string());
    }

    if config.bus.handler_timeout_secs == 0 {
        fail("bus.handler_timeout_secs must be greater than 0".to_string());
    }

    if config.paths.openclaw_root.trim().is_empty() {
        fail("paths.openclaw_root must not be empty".to_string());
    }

    if config.trash.retention_days == 0 {
        fail("trash.retention_days must be at least 1".to_string());
    }

    if config.worker.auto_prune_entry_threshold == Some(0) {
        fail("worker.auto_prune_entry_threshold must be greater than 0 when set".to_string());
    }

    // An EnvFilter directive like "brainsurgeon=debug" is also accepted.
    let level = config.logging.log_level.trim();
    if level.is_empty()
        || (!level.contains('=') && !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()))
    {
        fail(format!(
            "logging.log_level `{level}` is not one of {}",
            LOG_LEVELS.join(", ")
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
