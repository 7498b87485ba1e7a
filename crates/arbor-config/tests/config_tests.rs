// SPDX-FileCopyrightText: 2026 Arbor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Arbor configuration system.

use arbor_config::diagnostic::ConfigError;
use arbor_config::model::{ArborConfig, FusionStrategy};
use arbor_config::{load_and_validate_path, load_and_validate_str, load_config_from_str};

/// Valid TOML with all known sections deserializes successfully.
#[test]
fn valid_toml_deserializes_into_arbor_config() {
    let toml = r#"
[app]
log_level = "debug"
default_model = "gpt-4o-mini"
temperature = 0.2

[storage]
database_path = "/tmp/arbor-test.db"
data_dir = "/tmp/arbor-data"
wal_mode = false

[embedding]
base_url = "http://embed.local:11434"
model = "nomic-embed-text"
dimensions = 384

[search]
default_limit = 25
fusion = "reciprocal_rank"

[providers.openai]
api_key = "sk-test"

[catalog]
ttl_secs = 30

[summaries]
enabled = true
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.app.log_level, "debug");
    assert_eq!(config.app.default_model, "gpt-4o-mini");
    assert_eq!(config.app.temperature, 0.2);
    assert_eq!(config.storage.database_path, "/tmp/arbor-test.db");
    assert_eq!(config.storage.data_dir, "/tmp/arbor-data");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.embedding.base_url, "http://embed.local:11434");
    assert_eq!(config.embedding.dimensions, 384);
    assert_eq!(config.search.default_limit, 25);
    assert_eq!(config.search.fusion, FusionStrategy::ReciprocalRank);
    assert_eq!(config.providers.openai.api_key.as_deref(), Some("sk-test"));
    assert!(config.providers.anthropic.api_key.is_none());
    assert_eq!(config.catalog.ttl_secs, 30);
    assert!(config.summaries.enabled);
}

#[test]
fn missing_sections_use_defaults() {
    let config = load_config_from_str("").expect("empty config is valid");
    assert_eq!(config.app.log_level, "info");
    assert_eq!(config.app.default_model, "llama3.2");
    assert_eq!(config.embedding.model, "nomic-embed-text");
    assert_eq!(config.search.default_limit, 10);
    assert_eq!(config.search.candidate_multiplier, 2);
    assert_eq!(config.search.fusion, FusionStrategy::MaxNormalized);
    assert!(!config.summaries.enabled);
    assert_eq!(config.summaries.max_tokens, 256);
}

#[test]
fn unknown_field_in_storage_is_rejected() {
    let toml = r#"
[storage]
databse_path = "/tmp/x.db"
"#;
    let err = load_config_from_str(toml).expect_err("should reject unknown field");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("databse_path"),
        "error should mention the bad key, got: {err_str}"
    );
}

#[test]
fn deny_unknown_fields_at_top_level() {
    let err = load_config_from_str("[telemetry]\nenabled = true\n").unwrap_err();
    assert!(format!("{err}").contains("telemetry"));
}

#[test]
fn diagnostic_suggests_close_key() {
    let toml = r#"
[storage]
databse_path = "/tmp/x.db"
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    let suggestion = errors.iter().find_map(|e| match e {
        ConfigError::UnknownKey { suggestion, .. } => suggestion.clone(),
        _ => None,
    });
    assert_eq!(suggestion.as_deref(), Some("database_path"));
}

#[test]
fn diagnostic_flags_misspelled_section() {
    let errors = load_and_validate_str("[serach]\ndefault_limit = 3\n").unwrap_err();
    let suggestion = errors.iter().find_map(|e| match e {
        ConfigError::UnknownSection { suggestion, .. } => suggestion.clone(),
        _ => None,
    });
    assert_eq!(suggestion.as_deref(), Some("search"));
}

#[test]
fn diagnostic_invalid_type_message() {
    let toml = r#"
[search]
default_limit = "lots"
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { key, .. } if key.contains("default_limit"))),
        "expected InvalidType for default_limit, got {errors:?}"
    );
}

#[test]
fn diagnostic_invalid_fusion_variant() {
    let toml = r#"
[search]
fusion = "borda"
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert!(errors.iter().any(|e| {
        let msg = e.to_string();
        msg.contains("borda") || msg.contains("fusion")
    }));
}

#[test]
fn config_error_renders_with_miette() {
    use miette::{Diagnostic, GraphicalReportHandler};

    let errors = load_and_validate_str("[app]\nlog_levle = \"info\"\n").unwrap_err();
    let handler = GraphicalReportHandler::new();
    let mut buf = String::new();
    let diagnostic: &dyn Diagnostic = &errors[0];
    handler.render_report(&mut buf, diagnostic).unwrap();
    assert!(buf.contains("log_levle"));
}

#[test]
fn validation_runs_after_deserialization() {
    let toml = r#"
[app]
default_model = "not-a-model"
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert!(errors
        .iter()
        .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("not-a-model"))));
}

#[test]
fn serialized_defaults_round_trip_through_toml() {
    let defaults = ArborConfig::default();
    let rendered = toml::to_string(&defaults).expect("defaults serialize");
    let parsed = load_and_validate_str(&rendered).expect("rendered defaults are valid");
    assert_eq!(parsed.search.default_limit, defaults.search.default_limit);
    assert_eq!(parsed.storage.database_path, defaults.storage.database_path);
}

#[test]
fn load_from_explicit_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("arbor.toml");
    std::fs::write(&path, "[search]\ndefault_limit = 7\n").unwrap();

    let config = load_and_validate_path(&path).unwrap();
    assert_eq!(config.search.default_limit, 7);
}

#[test]
fn env_vars_override_file_values() {
    figment::Jail::expect_with(|jail| {
        jail.create_file("arbor.toml", "[app]\nlog_level = \"warn\"\n")?;
        jail.set_env("ARBOR_APP_LOG_LEVEL", "debug");
        jail.set_env("ARBOR_PROVIDERS_ANTHROPIC_API_KEY", "sk-ant-env");
        jail.set_env("ARBOR_SEARCH_DEFAULT_LIMIT", "3");

        let config = arbor_config::load_config().expect("config loads");
        assert_eq!(config.app.log_level, "debug");
        assert_eq!(
            config.providers.anthropic.api_key.as_deref(),
            Some("sk-ant-env")
        );
        assert_eq!(config.search.default_limit, 3);
        Ok(())
    });
}
