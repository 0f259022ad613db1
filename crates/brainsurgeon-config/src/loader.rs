// SPDX-FileCopyrightText: 2026 BrainSurgeon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading.
//!
//! Files are read from `/etc/brainsurgeon/brainsurgeon.toml`, then
//! `~/.config/brainsurgeon/brainsurgeon.toml`, then `./brainsurgeon.toml`;
//! `BRAINSURGEON_*` environment variables win over all of them.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::BrainsurgeonConfig;

/// Top-level sections; env keys are split after the first matching prefix.
const SECTIONS: &[&str] = &["logging", "storage", "bus", "paths", "trash", "worker"];

pub(crate) const SYSTEM_CONFIG: &str = "/etc/brainsurgeon/brainsurgeon.toml";
pub(crate) const LOCAL_CONFIG: &str = "brainsurgeon.toml";

pub(crate) fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("brainsurgeon").join("brainsurgeon.toml"))
}

/// Load the merged configuration from every layer.
pub fn load_config() -> Result<BrainsurgeonConfig, figment::Error> {
    build_figment().extract()
}

/// Parse a TOML string over compiled defaults. No files, no env.
pub fn load_config_from_str(toml_content: &str) -> Result<BrainsurgeonConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(BrainsurgeonConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load one explicit file (e.g. `--config`) plus env overrides.
pub fn load_config_from_path(path: &Path) -> Result<BrainsurgeonConfig, figment::Error> {
    tracing::debug!(path = %path.display(), "loading config file");
    Figment::new()
        .merge(Serialized::defaults(BrainsurgeonConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The full layered figment, before extraction.
pub fn build_figment() -> Figment {
    let mut figment = Figment::new()
        .merge(Serialized::defaults(BrainsurgeonConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG));
    if let Some(user) = user_config_path() {
        figment = figment.merge(Toml::file(user));
    }
    figment.merge(Toml::file(LOCAL_CONFIG)).merge(env_provider())
}

/// Env provider mapping `BRAINSURGEON_STORAGE_DATABASE_PATH` to
/// `storage.database_path`.
///
/// Only the section boundary becomes a dot; field names keep their
/// underscores, which `Env::split("_")` would not.
pub(crate) fn env_provider() -> Env {
    Env::prefixed("BRAINSURGEON_").map(|key| map_env_key(key.as_str()).into())
}

pub(crate) fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_split_at_section_only() {
        assert_eq!(
            map_env_key("storage_database_path"),
            "storage.database_path"
        );
        assert_eq!(map_env_key("bus_poll_interval_ms"), "bus.poll_interval_ms");
        assert_eq!(
            map_env_key("worker_auto_prune_entry_threshold"),
            "worker.auto_prune_entry_threshold"
        );
    }

    #[test]
    fn unknown_prefix_passes_through() {
        assert_eq!(map_env_key("verbose"), "verbose");
    }
}
