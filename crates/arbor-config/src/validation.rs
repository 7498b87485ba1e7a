// SPDX-FileCopyrightText: 2026 Arbor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes: non-empty paths, value ranges, known models and URLs.

use arbor_core::Provider;

use crate::diagnostic::ConfigError;
use crate::model::ArborConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &ArborConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }
    if config.storage.data_dir.trim().is_empty() {
        fail("storage.data_dir must not be empty".to_string());
    }

    const LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
    if !LEVELS.contains(&config.app.log_level.as_str()) {
        fail(format!(
            "app.log_level `{}` must be one of: {}",
            config.app.log_level,
            LEVELS.join(", ")
        ));
    }

    if Provider::for_model(&config.app.default_model).is_none() {
        fail(format!(
            "app.default_model `{}` is not a known model (see `arbor models`)",
            config.app.default_model
        ));
    }

    if !(0.0..=2.0).contains(&config.app.temperature) {
        fail(format!(
            "app.temperature must be between 0.0 and 2.0, got {}",
            config.app.temperature
        ));
    }
    if !(config.app.top_p > 0.0 && config.app.top_p <= 1.0) {
        fail(format!(
            "app.top_p must be in (0.0, 1.0], got {}",
            config.app.top_p
        ));
    }

    if config.attachments.max_bytes == 0 {
        fail("attachments.max_bytes must be greater than 0".to_string());
    }

    if config.embedding.dimensions == 0 {
        fail("embedding.dimensions must be greater than 0".to_string());
    }
    if config.embedding.model.trim().is_empty() {
        fail("embedding.model must not be empty".to_string());
    }

    for (key, url) in [
        ("embedding.base_url", config.embedding.base_url.as_str()),
        ("providers.ollama.base_url", config.providers.ollama.base_url.as_str()),
    ] {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            fail(format!("{key} `{url}` must start with http:// or https://"));
        }
    }

    if config.search.default_limit == 0 {
        fail("search.default_limit must be greater than 0".to_string());
    }
    if config.search.candidate_multiplier == 0 {
        fail("search.candidate_multiplier must be greater than 0".to_string());
    }
    if config.search.rrf_k <= 0.0 {
        fail(format!(
            "search.rrf_k must be positive, got {}",
            config.search.rrf_k
        ));
    }

    if let Some(model) = &config.summaries.model {
        if Provider::for_model(model).is_none() {
            fail(format!("summaries.model `{model}` is not a known model"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_error(errors: &[ConfigError], needle: &str) -> bool {
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains(needle)))
    }

    #[test]
    fn default_config_validates() {
        let config = ArborConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = ArborConfig::default();
        config.storage.database_path = "".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "database_path"));
    }

    #[test]
    fn unknown_default_model_fails_validation() {
        let mut config = ArborConfig::default();
        config.app.default_model = "gpt-17".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "gpt-17"));
    }

    #[test]
    fn all_errors_are_collected() {
        let mut config = ArborConfig::default();
        config.search.default_limit = 0;
        config.embedding.dimensions = 0;
        config.app.top_p = 3.0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(has_error(&errors, "default_limit"));
        assert!(has_error(&errors, "dimensions"));
        assert!(has_error(&errors, "top_p"));
    }

    #[test]
    fn bad_base_url_fails_validation() {
        let mut config = ArborConfig::default();
        config.embedding.base_url = "localhost:11434".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "embedding.base_url"));
    }
}
