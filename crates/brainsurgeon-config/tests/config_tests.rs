// SPDX-FileCopyrightText: 2026 BrainSurgeon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for configuration loading and diagnostics.

use brainsurgeon_config::diagnostic::ConfigError;
use brainsurgeon_config::model::BrainsurgeonConfig;
use brainsurgeon_config::{load_and_validate_str, load_config_from_path, load_config_from_str};

#[test]
fn full_toml_deserializes() {
    let toml = r#"
[logging]
log_level = "debug"

[storage]
database_path = "/tmp/bus.db"
wal_mode = false
busy_timeout_ms = 1000

[bus]
source = "extension"
poll_interval_ms = 100
handler_timeout_secs = 5

[paths]
openclaw_root = "/srv/openclaw"

[trash]
retention_days = 7

[worker]
default_keep_recent = 5
auto_prune_entry_threshold = 400
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.logging.log_level, "debug");
    assert_eq!(config.storage.database_path, "/tmp/bus.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.storage.busy_timeout_ms, 1000);
    assert_eq!(config.bus.source, "extension");
    assert_eq!(config.bus.poll_interval_ms, 100);
    assert_eq!(config.bus.handler_timeout_secs, 5);
    assert_eq!(config.paths.openclaw_root, "/srv/openclaw");
    assert_eq!(config.trash.retention_days, 7);
    assert_eq!(config.worker.default_keep_recent, 5);
    assert_eq!(config.worker.auto_prune_entry_threshold, Some(400));
}

#[test]
fn empty_toml_yields_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");
    assert_eq!(config.logging.log_level, "info");
    assert!(config.storage.database_path.ends_with("bus.db"));
    assert!(config.storage.wal_mode);
    assert_eq!(config.storage.busy_timeout_ms, 5000);
    assert_eq!(config.bus.source, "api");
    assert_eq!(config.bus.poll_interval_ms, 500);
    assert_eq!(config.bus.handler_timeout_secs, 30);
    assert_eq!(config.paths.openclaw_root, "~/.openclaw");
    assert_eq!(config.trash.retention_days, 14);
    assert_eq!(config.worker.default_keep_recent, 3);
    assert!(config.worker.auto_prune_entry_threshold.is_none());
}

#[test]
fn unknown_top_level_section_is_rejected() {
    let err = load_config_from_str("[telemetry]\nenabled = true\n")
        .expect_err("unknown section should be rejected");
    let msg = err.to_string();
    assert!(
        msg.contains("unknown field") || msg.contains("telemetry"),
        "got: {msg}"
    );
}

#[test]
fn unknown_key_gets_suggestion_and_valid_keys() {
    let toml = r#"
[trash]
retension_days = 3
"#;
    let errors = load_and_validate_str(toml).expect_err("should produce errors");
    let found = errors.iter().any(|e| {
        matches!(e, ConfigError::UnknownKey { key, suggestion, valid_keys, .. }
            if key == "retension_days"
                && suggestion.as_deref() == Some("retention_days")
                && valid_keys.contains("retention_days"))
    });
    assert!(found, "got: {errors:?}");
}

#[test]
fn wrong_type_is_reported() {
    let toml = r#"
[bus]
poll_interval_ms = "fast"
"#;
    let errors = load_and_validate_str(toml).expect_err("should reject invalid type");
    assert!(
        errors.iter().any(|e| matches!(e, ConfigError::InvalidType { .. })
            || e.to_string().contains("invalid type")),
        "got: {errors:?}"
    );
}

#[test]
fn validation_runs_after_parse() {
    let toml = r#"
[bus]
source = "gateway"
"#;
    let errors = load_and_validate_str(toml).expect_err("bad source should fail");
    assert!(errors.iter().any(|e| {
        matches!(e, ConfigError::Validation { message } if message.contains("bus.source"))
    }));
}

#[test]
fn env_overrides_file_values() {
    figment::Jail::expect_with(|jail| {
        jail.create_file(
            "explicit.toml",
            r#"
[storage]
database_path = "from-file.db"

[worker]
default_keep_recent = 2
"#,
        )?;
        jail.set_env("BRAINSURGEON_STORAGE_DATABASE_PATH", "from-env.db");
        jail.set_env("BRAINSURGEON_WORKER_AUTO_PRUNE_ENTRY_THRESHOLD", "250");

        let config = load_config_from_path(std::path::Path::new("explicit.toml"))?;
        assert_eq!(config.storage.database_path, "from-env.db");
        assert_eq!(config.worker.default_keep_recent, 2);
        assert_eq!(config.worker.auto_prune_entry_threshold, Some(250));
        Ok(())
    });
}

#[test]
fn local_file_is_picked_up_by_layered_load() {
    figment::Jail::expect_with(|jail| {
        jail.create_file("brainsurgeon.toml", "[trash]\nretention_days = 30\n")?;
        let config = brainsurgeon_config::load_config()?;
        assert_eq!(config.trash.retention_days, 30);
        Ok(())
    });
}

#[test]
fn missing_explicit_file_falls_back_to_defaults() {
    let config: BrainsurgeonConfig =
        load_config_from_path(std::path::Path::new("/nonexistent/brainsurgeon.toml"))
            .expect("missing file is skipped");
    assert_eq!(config.trash.retention_days, 14);
}

#[test]
fn diagnostics_render_with_miette() {
    let error = ConfigError::UnknownKey {
        key: "sorce".to_string(),
        suggestion: Some("source".to_string()),
        valid_keys: "source, poll_interval_ms, handler_timeout_secs".to_string(),
        span: None,
        src: None,
    };
    let mut buf = String::new();
    miette::GraphicalReportHandler::new()
        .render_report(&mut buf, &error)
        .expect("should render");
    assert!(buf.contains("sorce"));
    assert!(buf.contains("did you mean `source`"));
}
