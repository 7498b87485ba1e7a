// SPDX-FileCopyrightText: 2026 Arbor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for Arbor.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Arbor configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ArborConfig {
    /// General application settings.
    #[serde(default)]
    pub app: AppConfig,

    /// Database location and mode.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Attachment limits.
    #[serde(default)]
    pub attachments: AttachmentConfig,

    /// Embedding gateway settings.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Hybrid search settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Per-provider completion settings.
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Model availability cache.
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Background summary generation.
    #[serde(default)]
    pub summaries: SummaryConfig,
}

/// General application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Model used when a turn does not name one.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default system prompt for new turns.
    #[serde(default)]
    pub system_prompt: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_top_p")]
    pub top_p: f64,

    /// Upper bound on generated tokens. `None` leaves it to the provider.
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            default_model: default_model(),
            system_prompt: None,
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_tokens: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_model() -> String {
    "llama3.2".to_string()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_top_p() -> f64 {
    1.0
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Root directory for attachment files. Pointers such as
    /// `attachments/<id>` are resolved relative to it.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            data_dir: default_data_dir(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_data_dir() -> String {
    dirs::data_dir()
        .map(|p| p.join("arbor"))
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .to_string_lossy()
        .into_owned()
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("arbor").join("arbor.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("arbor.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Attachment configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AttachmentConfig {
    /// Largest accepted attachment payload, in bytes.
    #[serde(default = "default_max_attachment_bytes")]
    pub max_bytes: usize,
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_attachment_bytes(),
        }
    }
}

fn default_max_attachment_bytes() -> usize {
    20 * 1024 * 1024
}

/// Embedding gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EmbeddingConfig {
    /// Compute embeddings when turns are written. When false, turns are
    /// stored without vectors and only lexical search finds them.
    #[serde(default = "default_embedding_enabled")]
    pub enabled: bool,

    /// Base URL of the embedding service (Ollama-compatible).
    #[serde(default = "default_ollama_url")]
    pub base_url: String,

    /// Embedding model name.
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Expected vector dimensionality.
    #[serde(default = "default_embedding_dimensions")]
    pub dimensions: usize,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            enabled: default_embedding_enabled(),
            base_url: default_ollama_url(),
            model: default_embedding_model(),
            dimensions: default_embedding_dimensions(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_enabled() -> bool {
    true
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_embedding_dimensions() -> usize {
    768
}

fn default_timeout_secs() -> u64 {
    60
}

/// How the vector and lexical result lists are merged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionStrategy {
    /// Normalize each list by its maximum score and merge-sort.
    #[default]
    MaxNormalized,
    /// Reciprocal rank fusion.
    ReciprocalRank,
}

/// Hybrid search configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SearchConfig {
    /// Page size when the caller does not pass one.
    #[serde(default = "default_search_limit")]
    pub default_limit: usize,

    /// Each branch fetches `candidate_multiplier * limit` candidates.
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: usize,

    #[serde(default)]
    pub fusion: FusionStrategy,

    /// Constant `k` for reciprocal rank fusion.
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_search_limit(),
            candidate_multiplier: default_candidate_multiplier(),
            fusion: FusionStrategy::default(),
            rrf_k: default_rrf_k(),
        }
    }
}

fn default_search_limit() -> usize {
    10
}

fn default_candidate_multiplier() -> usize {
    2
}

fn default_rrf_k() -> f64 {
    60.0
}

/// Completion provider configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub ollama: OllamaConfig,

    #[serde(default)]
    pub openai: RemoteProviderConfig,

    #[serde(default)]
    pub anthropic: RemoteProviderConfig,

    #[serde(default)]
    pub google: RemoteProviderConfig,
}

/// Local Ollama server settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_url")]
    pub base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Hosted provider settings. A provider without an API key is unavailable.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteProviderConfig {
    #[serde(default)]
    pub api_key: Option<String>,

    /// Override for the provider's API base URL.
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Model availability cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogConfig {
    /// Seconds before a cached availability probe is refreshed.
    #[serde(default = "default_catalog_ttl")]
    pub ttl_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_catalog_ttl(),
        }
    }
}

fn default_catalog_ttl() -> u64 {
    300
}

/// Summary generation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SummaryConfig {
    /// Generate a short summary after each turn.
    #[serde(default)]
    pub enabled: bool,

    /// Model used for summaries. Defaults to the turn's own model.
    #[serde(default)]
    pub model: Option<String>,

    #[serde(default = "default_summary_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_summary_temperature")]
    pub temperature: f64,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model: None,
            max_tokens: default_summary_max_tokens(),
            temperature: default_summary_temperature(),
        }
    }
}

fn default_summary_max_tokens() -> u32 {
    256
}

fn default_summary_temperature() -> f64 {
    0.9
}
