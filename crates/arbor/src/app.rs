// SPDX-FileCopyrightText: 2026 Arbor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wiring of storage, gateways and the conversation service.

use std::sync::Arc;

use arbor_config::ArborConfig;
use arbor_conversation::ConversationService;
use arbor_core::models::Provider;
use arbor_core::{ArborError, CompletionAdapter, EmbeddingAdapter, StorageAdapter};
use arbor_ollama::{OllamaChat, OllamaEmbedder};
use arbor_storage::SqliteStorage;
use tracing::debug;

/// Everything a command needs, opened once per invocation.
pub struct App {
    pub service: ConversationService,
    storage: Arc<SqliteStorage>,
    chat: Arc<OllamaChat>,
}

impl App {
    pub async fn open(config: ArborConfig) -> Result<Self, ArborError> {
        let storage = Arc::new(SqliteStorage::new(config.storage.clone()));
        storage.initialize().await?;

        let embedder: Arc<dyn EmbeddingAdapter> = Arc::new(OllamaEmbedder::new(&config.embedding)?);
        let chat = Arc::new(OllamaChat::new(&config.providers.ollama)?);

        let service = ConversationService::new(
            config,
            Arc::clone(&storage) as Arc<dyn StorageAdapter>,
            storage.attachments().clone(),
            embedder,
            Some(Arc::clone(&chat) as Arc<dyn CompletionAdapter>),
        );
        debug!("application wired");
        Ok(Self {
            service,
            storage,
            chat,
        })
    }

    /// The completion gateway for `provider`.
    ///
    /// Only the local gateway ships with this build; hosted providers are
    /// listed by the catalog but cannot be called.
    pub fn completion_for(&self, provider: Provider) -> Result<&dyn CompletionAdapter, ArborError> {
        if provider.is_local() {
            Ok(self.chat.as_ref())
        } else {
            Err(ArborError::Config(format!(
                "provider `{provider}` is not supported by this build"
            )))
        }
    }

    /// Flush and close the database.
    pub async fn close(&self) -> Result<(), ArborError> {
        self.storage.close().await
    }
}
