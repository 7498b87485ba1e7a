// SPDX-FileCopyrightText: 2026 Arbor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Static model catalog: which provider serves which model.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Model providers Arbor can dispatch completions to.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Ollama,
    #[strum(serialize = "openai")]
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
    Google,
}

impl Provider {
    /// Whether this provider runs locally and needs no API key.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Ollama)
    }

    /// Look up the provider that serves `model`, if the model is known.
    pub fn for_model(model: &str) -> Option<Provider> {
        MODEL_TABLE
            .iter()
            .find(|m| m.id == model)
            .map(|m| m.provider)
    }
}

/// A known model and the provider that serves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelInfo {
    pub id: &'static str,
    pub provider: Provider,
    pub label: &'static str,
}

/// Embedding model used for both indexing and querying.
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";

/// Every model Arbor knows how to route.
pub const MODEL_TABLE: &[ModelInfo] = &[
    ModelInfo { id: "llama3.2", provider: Provider::Ollama, label: "Llama 3.2" },
    ModelInfo { id: "hermes3", provider: Provider::Ollama, label: "Hermes 3" },
    ModelInfo { id: "qwen2.5", provider: Provider::Ollama, label: "Qwen 2.5" },
    ModelInfo { id: "gemma2", provider: Provider::Ollama, label: "Gemma 2" },
    ModelInfo { id: "mistral", provider: Provider::Ollama, label: "Mistral" },
    ModelInfo {
        id: "gemini-1.5-flash-latest",
        provider: Provider::Google,
        label: "Gemini 1.5 Flash",
    },
    ModelInfo {
        id: "gemini-1.5-pro-latest",
        provider: Provider::Google,
        label: "Gemini 1.5 Pro",
    },
    ModelInfo {
        id: "claude-3-5-sonnet-20240620",
        provider: Provider::Anthropic,
        label: "Claude 3.5 Sonnet (June)",
    },
    ModelInfo {
        id: "claude-3-5-sonnet-20241022",
        provider: Provider::Anthropic,
        label: "Claude 3.5 Sonnet (October)",
    },
    ModelInfo {
        id: "claude-3-5-haiku-20241022",
        provider: Provider::Anthropic,
        label: "Claude 3.5 Haiku",
    },
    ModelInfo { id: "gpt-4o", provider: Provider::OpenAi, label: "GPT-4o" },
    ModelInfo { id: "gpt-4o-mini", provider: Provider::OpenAi, label: "GPT-4o mini" },
    ModelInfo { id: "o1-preview", provider: Provider::OpenAi, label: "o1 preview" },
    ModelInfo { id: "o1-mini", provider: Provider::OpenAi, label: "o1 mini" },
];

/// Models served by `provider`, in table order.
pub fn models_for(provider: Provider) -> impl Iterator<Item = &'static ModelInfo> {
    MODEL_TABLE.iter().filter(move |m| m.provider == provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn known_models_resolve_to_their_provider() {
        assert_eq!(Provider::for_model("llama3.2"), Some(Provider::Ollama));
        assert_eq!(Provider::for_model("gpt-4o-mini"), Some(Provider::OpenAi));
        assert_eq!(
            Provider::for_model("claude-3-5-haiku-20241022"),
            Some(Provider::Anthropic)
        );
        assert_eq!(
            Provider::for_model("gemini-1.5-pro-latest"),
            Some(Provider::Google)
        );
        assert_eq!(Provider::for_model("no-such-model"), None);
    }

    #[test]
    fn provider_string_forms_round_trip() {
        for p in Provider::iter() {
            let s = p.to_string();
            assert_eq!(Provider::from_str(&s).unwrap(), p);
        }
        assert_eq!(Provider::OpenAi.to_string(), "openai");
        let json = serde_json::to_string(&Provider::OpenAi).unwrap();
        assert_eq!(json, "\"openai\"");
    }

    #[test]
    fn every_provider_has_at_least_one_model() {
        for p in Provider::iter() {
            assert!(models_for(p).next().is_some(), "{p} has no models");
        }
    }

    #[test]
    fn model_ids_are_unique() {
        let mut ids: Vec<_> = MODEL_TABLE.iter().map(|m| m.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), MODEL_TABLE.len());
    }
}
