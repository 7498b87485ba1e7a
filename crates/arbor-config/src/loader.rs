// SPDX-FileCopyrightText: 2026 Arbor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./arbor.toml` > `~/.config/arbor/arbor.toml` > `/etc/arbor/arbor.toml`
//! with environment variable overrides via `ARBOR_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::ArborConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/arbor/arbor.toml` (system-wide)
/// 3. `~/.config/arbor/arbor.toml` (user XDG config)
/// 4. `./arbor.toml` (local directory)
/// 5. `ARBOR_*` environment variables
pub fn load_config() -> Result<ArborConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string over the defaults (no XDG lookup).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<ArborConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ArborConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ArborConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ArborConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading.
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(ArborConfig::default()))
        .merge(Toml::file("/etc/arbor/arbor.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("arbor/arbor.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("arbor.toml"))
        .merge(env_provider())
}

/// Map a lowercased, prefix-stripped env var name to a dotted config key.
///
/// Uses an explicit section table rather than splitting on `_`, since keys
/// like `database_path` contain underscores themselves.
pub(crate) fn env_key_to_path(key: &str) -> String {
    const NESTED: &[&str] = &[
        "providers_ollama_",
        "providers_openai_",
        "providers_anthropic_",
        "providers_google_",
    ];
    const SECTIONS: &[&str] = &[
        "app_",
        "storage_",
        "attachments_",
        "embedding_",
        "search_",
        "catalog_",
        "summaries_",
    ];

    for prefix in NESTED {
        if let Some(rest) = key.strip_prefix(prefix) {
            let section = prefix.trim_end_matches('_').replacen('_', ".", 1);
            return format!("{section}.{rest}");
        }
    }
    for prefix in SECTIONS {
        if let Some(rest) = key.strip_prefix(prefix) {
            return format!("{}.{rest}", prefix.trim_end_matches('_'));
        }
    }
    key.to_string()
}

/// Create the environment variable provider.
///
/// Example: `ARBOR_PROVIDERS_OPENAI_API_KEY` maps to `providers.openai.api_key`.
/// Figment hands `map` the key in its original case.
fn env_provider() -> Env {
    Env::prefixed("ARBOR_")
        .map(|key| env_key_to_path(&key.as_str().to_ascii_lowercase()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_sections() {
        assert_eq!(env_key_to_path("app_log_level"), "app.log_level");
        assert_eq!(env_key_to_path("storage_database_path"), "storage.database_path");
        assert_eq!(env_key_to_path("search_default_limit"), "search.default_limit");
        assert_eq!(env_key_to_path("embedding_base_url"), "embedding.base_url");
    }

    #[test]
    fn env_keys_map_to_nested_provider_sections() {
        assert_eq!(
            env_key_to_path("providers_openai_api_key"),
            "providers.openai.api_key"
        );
        assert_eq!(
            env_key_to_path("providers_ollama_base_url"),
            "providers.ollama.base_url"
        );
    }

    #[test]
    fn uppercase_env_vars_land_in_their_sections() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("ARBOR_SEARCH_DEFAULT_LIMIT", "7");
            jail.set_env("ARBOR_PROVIDERS_OLLAMA_BASE_URL", "http://gpu-box:11434");

            let config: ArborConfig = Figment::new()
                .merge(Serialized::defaults(ArborConfig::default()))
                .merge(env_provider())
                .extract()?;
            assert_eq!(config.search.default_limit, 7);
            assert_eq!(config.providers.ollama.base_url, "http://gpu-box:11434");
            Ok(())
        });
    }

    #[test]
    fn unknown_env_key_passes_through() {
        assert_eq!(env_key_to_path("mystery"), "mystery");
    }
}
