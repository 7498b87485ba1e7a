// SPDX-FileCopyrightText: 2026 Arbor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Which models can be used right now.
//!
//! Availability is probed from configuration (hosted providers need an API
//! key) and from the local gateway (installed models). Probes are cached
//! for a TTL and can be dropped explicitly with [`ModelCatalog::invalidate`].

use std::sync::Arc;
use std::time::Duration;

use arbor_config::model::ProvidersConfig;
use arbor_core::models::{MODEL_TABLE, Provider};
use arbor_core::{ArborError, CompletionAdapter};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

/// A model and whether it can be used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelAvailability {
    pub id: String,
    pub provider: Provider,
    pub label: String,
    pub available: bool,
}

struct CachedProbe {
    at: Instant,
    models: Vec<ModelAvailability>,
}

/// TTL cache over model availability, owned by the service.
pub struct ModelCatalog {
    providers: ProvidersConfig,
    local: Option<Arc<dyn CompletionAdapter>>,
    ttl: Duration,
    cache: Mutex<Option<CachedProbe>>,
}

impl ModelCatalog {
    pub fn new(
        providers: ProvidersConfig,
        local: Option<Arc<dyn CompletionAdapter>>,
        ttl: Duration,
    ) -> Self {
        Self {
            providers,
            local,
            ttl,
            cache: Mutex::new(None),
        }
    }

    fn has_key(&self, provider: Provider) -> bool {
        let remote = match provider {
            Provider::Ollama => return true,
            Provider::OpenAi => &self.providers.openai,
            Provider::Anthropic => &self.providers.anthropic,
            Provider::Google => &self.providers.google,
        };
        remote
            .api_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty())
    }

    /// Installed local model names without the `:tag` suffix, or `None`
    /// when the gateway cannot tell.
    async fn installed_local(&self) -> Option<Vec<String>> {
        let local = self.local.as_ref()?;
        match local.installed_models().await {
            Ok(Some(names)) => Some(
                names
                    .into_iter()
                    .map(|n| match n.split_once(':') {
                        Some((base, _)) => base.to_string(),
                        None => n,
                    })
                    .collect(),
            ),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "local model probe failed");
                Some(Vec::new())
            }
        }
    }

    async fn probe(&self) -> Vec<ModelAvailability> {
        let installed = self.installed_local().await;
        let local_gateway = self.local.is_some();

        MODEL_TABLE
            .iter()
            .map(|m| {
                let available = if m.provider.is_local() {
                    match &installed {
                        Some(names) => names.iter().any(|n| n == m.id),
                        None => local_gateway,
                    }
                } else {
                    self.has_key(m.provider)
                };
                ModelAvailability {
                    id: m.id.to_string(),
                    provider: m.provider,
                    label: m.label.to_string(),
                    available,
                }
            })
            .collect()
    }

    /// All known models with their availability, probing if the cache is
    /// empty or older than the TTL.
    pub async fn available_models(&self) -> Result<Vec<ModelAvailability>, ArborError> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            if cached.at.elapsed() < self.ttl {
                return Ok(cached.models.clone());
            }
        }

        let models = self.probe().await;
        debug!(
            available = models.iter().filter(|m| m.available).count(),
            total = models.len(),
            "model catalog refreshed"
        );
        *cache = Some(CachedProbe {
            at: Instant::now(),
            models: models.clone(),
        });
        Ok(models)
    }

    /// Drop the cached probe so the next call refreshes.
    pub async fn invalidate(&self) {
        *self.cache.lock().await = None;
    }
}
