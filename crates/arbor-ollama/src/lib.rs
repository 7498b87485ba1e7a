// SPDX-FileCopyrightText: 2026 Arbor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ollama gateways for Arbor.
//!
//! [`OllamaEmbedder`] implements [`EmbeddingAdapter`] over `/api/embed` and
//! [`OllamaChat`] implements [`CompletionAdapter`] over `/api/chat`.

pub mod client;
pub mod ndjson;
pub mod types;

use std::time::Duration;

use arbor_config::model::{EmbeddingConfig, OllamaConfig};
use arbor_core::types::{
    AdapterType, ChatMessage, CompletionEvent, CompletionRequest, CompletionResponse,
    EmbeddingInput, EmbeddingOutput, HealthStatus, MessageRole,
};
use arbor_core::{ArborError, CompletionAdapter, CompletionStream, EmbeddingAdapter, PluginAdapter};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::{debug, info};

use crate::client::OllamaClient;
use crate::types::{ChatChunk, ChatOptions, ChatRequest, EmbedRequest, OllamaMessage};

// --- Embeddings ---

/// Embedding gateway backed by an Ollama embedding model.
pub struct OllamaEmbedder {
    client: OllamaClient,
    model: String,
    dimensions: usize,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, ArborError> {
        let client = OllamaClient::new(&config.base_url, Duration::from_secs(config.timeout_secs))?;
        info!(
            base_url = %client.base_url(),
            model = %config.model,
            dimensions = config.dimensions,
            "Ollama embedder initialized"
        );
        Ok(Self {
            client,
            model: config.model.clone(),
            dimensions: config.dimensions,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl PluginAdapter for OllamaEmbedder {
    fn name(&self) -> &str {
        "ollama-embed"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, ArborError> {
        health_from_tags(&self.client, &self.model).await
    }

    async fn shutdown(&self) -> Result<(), ArborError> {
        Ok(())
    }
}

#[async_trait]
impl EmbeddingAdapter for OllamaEmbedder {
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, ArborError> {
        if input.texts.is_empty() {
            return Ok(EmbeddingOutput {
                embeddings: Vec::new(),
                dimensions: self.dimensions,
                model: self.model.clone(),
            });
        }
        let expected = input.texts.len();
        let response = self
            .client
            .embed(&EmbedRequest {
                model: self.model.clone(),
                input: input.texts,
            })
            .await?;

        if response.embeddings.len() != expected {
            return Err(ArborError::gateway(format!(
                "embedding count mismatch: sent {expected} texts, got {} vectors",
                response.embeddings.len()
            )));
        }
        if let Some(bad) = response
            .embeddings
            .iter()
            .find(|v| v.len() != self.dimensions)
        {
            return Err(ArborError::gateway(format!(
                "embedding model {} returned {} dimensions, configured for {}",
                self.model,
                bad.len(),
                self.dimensions
            )));
        }

        debug!(count = expected, model = %self.model, "texts embedded");
        Ok(EmbeddingOutput {
            embeddings: response.embeddings,
            dimensions: self.dimensions,
            model: self.model.clone(),
        })
    }
}

// --- Chat ---

/// Completion gateway for locally served Ollama chat models.
pub struct OllamaChat {
    client: OllamaClient,
}

impl OllamaChat {
    pub fn new(config: &OllamaConfig) -> Result<Self, ArborError> {
        let client = OllamaClient::new(&config.base_url, Duration::from_secs(config.timeout_secs))?;
        info!(base_url = %client.base_url(), "Ollama chat initialized");
        Ok(Self { client })
    }

    fn to_chat_request(request: &CompletionRequest) -> ChatRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = request.system.as_deref().filter(|s| !s.trim().is_empty()) {
            messages.push(OllamaMessage {
                role: MessageRole::System.to_string(),
                content: system.to_string(),
                images: Vec::new(),
            });
        }
        messages.extend(request.messages.iter().map(convert_message));

        ChatRequest {
            model: request.model.clone(),
            messages,
            stream: true,
            options: ChatOptions {
                temperature: request.temperature,
                top_p: request.top_p,
                num_predict: request.max_tokens,
            },
        }
    }
}

/// Ollama takes images as bare base64; strip the `data:...;base64,` prefix.
fn convert_message(message: &ChatMessage) -> OllamaMessage {
    OllamaMessage {
        role: message.role.to_string(),
        content: message.content.clone(),
        images: message
            .attachments
            .iter()
            .map(|a| match a.data_uri.split_once(";base64,") {
                Some((_, payload)) => payload.to_string(),
                None => a.data_uri.clone(),
            })
            .collect(),
    }
}

/// Map one wire chunk to zero or more completion events.
fn chunk_events(chunk: Result<ChatChunk, ArborError>) -> Vec<Result<CompletionEvent, ArborError>> {
    let chunk = match chunk {
        Ok(c) => c,
        Err(e) => return vec![Err(e)],
    };
    if let Some(error) = chunk.error {
        return vec![Err(ArborError::gateway(format!("Ollama error: {error}")))];
    }
    let mut events = Vec::new();
    let text = chunk.message.map(|m| m.content).unwrap_or_default();
    if !text.is_empty() {
        events.push(Ok(CompletionEvent::TextDelta(text)));
    }
    if chunk.done {
        events.push(Ok(CompletionEvent::Done));
    }
    events
}

#[async_trait]
impl PluginAdapter for OllamaChat {
    fn name(&self) -> &str {
        "ollama"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Completion
    }

    async fn health_check(&self) -> Result<HealthStatus, ArborError> {
        match self.client.list_models().await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), ArborError> {
        debug!("Ollama chat shutting down");
        Ok(())
    }
}

#[async_trait]
impl CompletionAdapter for OllamaChat {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ArborError> {
        let chat = Self::to_chat_request(&request);
        let reply = self.client.chat(&chat).await?;
        Ok(CompletionResponse {
            text: reply.text().to_string(),
            model: reply.model.unwrap_or(request.model),
        })
    }

    async fn stream(&self, request: CompletionRequest) -> Result<CompletionStream, ArborError> {
        let chat = Self::to_chat_request(&request);
        let chunks = self.client.chat_stream(&chat).await?;
        Ok(Box::pin(chunks.flat_map(|c| stream::iter(chunk_events(c)))))
    }

    async fn installed_models(&self) -> Result<Option<Vec<String>>, ArborError> {
        self.client.list_models().await.map(Some)
    }
}

async fn health_from_tags(client: &OllamaClient, model: &str) -> Result<HealthStatus, ArborError> {
    match client.list_models().await {
        Ok(models) => {
            let installed = models
                .iter()
                .any(|m| m == model || m.split(':').next() == Some(model));
            if installed {
                Ok(HealthStatus::Healthy)
            } else {
                Ok(HealthStatus::Degraded(format!("model {model} is not installed")))
            }
        }
        Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_core::Provider;
    use arbor_core::types::InlineAttachment;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn embed_config(base_url: &str, dimensions: usize) -> EmbeddingConfig {
        EmbeddingConfig {
            base_url: base_url.to_string(),
            dimensions,
            ..EmbeddingConfig::default()
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            provider: Provider::Ollama,
            model: "llama3.2".into(),
            system: Some("be brief".into()),
            messages: vec![ChatMessage {
                attachments: vec![InlineAttachment {
                    id: "a1".into(),
                    media_type: "image/png".into(),
                    data_uri: "data:image/png;base64,AAAA".into(),
                }],
                ..ChatMessage::user("what is this?")
            }],
            temperature: 0.5,
            top_p: 0.9,
            max_tokens: Some(64),
        }
    }

    #[test]
    fn chat_request_carries_system_images_and_options() {
        let chat = OllamaChat::to_chat_request(&request());
        assert_eq!(chat.messages.len(), 2);
        assert_eq!(chat.messages[0].role, "system");
        assert_eq!(chat.messages[1].role, "user");
        assert_eq!(chat.messages[1].images, vec!["AAAA".to_string()]);
        assert_eq!(chat.options.num_predict, Some(64));
    }

    #[tokio::test]
    async fn embed_returns_vectors_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embeddings": [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]
            })))
            .mount(&server)
            .await;

        let embedder = OllamaEmbedder::new(&embed_config(&server.uri(), 3)).unwrap();
        let out = embedder
            .embed(EmbeddingInput {
                texts: vec!["p".into(), "r".into()],
            })
            .await
            .unwrap();
        assert_eq!(out.embeddings.len(), 2);
        assert_eq!(out.embeddings[1], vec![0.0, 1.0, 0.0]);
        assert_eq!(out.dimensions, 3);
        assert_eq!(out.model, "nomic-embed-text");
    }

    #[tokio::test]
    async fn embed_count_mismatch_is_gateway_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embeddings": [[1.0, 0.0, 0.0]]
            })))
            .mount(&server)
            .await;

        let embedder = OllamaEmbedder::new(&embed_config(&server.uri(), 3)).unwrap();
        let err = embedder
            .embed(EmbeddingInput {
                texts: vec!["p".into(), "r".into()],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ArborError::Gateway { .. }));
        assert!(err.to_string().contains("mismatch"));
    }

    #[tokio::test]
    async fn embed_dimension_mismatch_is_gateway_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embeddings": [[1.0, 0.0]]
            })))
            .mount(&server)
            .await;

        let embedder = OllamaEmbedder::new(&embed_config(&server.uri(), 768)).unwrap();
        let err = embedder
            .embed(EmbeddingInput {
                texts: vec!["p".into()],
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("768"));
    }

    #[tokio::test]
    async fn stream_maps_chunks_to_events() {
        let server = MockServer::start().await;
        let body = concat!(
            "{\"message\":{\"content\":\"Hel\"},\"done\":false}\n",
            "{\"message\":{\"content\":\"lo\"},\"done\":false}\n",
            "{\"message\":{\"content\":\"\"},\"done\":true}\n",
        );
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(serde_json::json!({
                "model": "llama3.2",
                "options": {"temperature": 0.5, "top_p": 0.9}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let chat = OllamaChat::new(&OllamaConfig {
            base_url: server.uri(),
            ..OllamaConfig::default()
        })
        .unwrap();
        let events: Vec<_> = chat
            .stream(request())
            .await
            .unwrap()
            .map(|e| e.unwrap())
            .collect()
            .await;
        assert_eq!(
            events,
            vec![
                CompletionEvent::TextDelta("Hel".into()),
                CompletionEvent::TextDelta("lo".into()),
                CompletionEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn mid_stream_error_surfaces() {
        let server = MockServer::start().await;
        let body = concat!(
            "{\"message\":{\"content\":\"par\"},\"done\":false}\n",
            "{\"error\":\"model crashed\"}\n",
        );
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let chat = OllamaChat::new(&OllamaConfig {
            base_url: server.uri(),
            ..OllamaConfig::default()
        })
        .unwrap();
        let events: Vec<_> = chat.stream(request()).await.unwrap().collect().await;
        assert!(matches!(events[0], Ok(CompletionEvent::TextDelta(_))));
        assert!(matches!(events[1], Err(ArborError::Gateway { .. })));
    }

    #[tokio::test]
    async fn embedder_health_reports_missing_model() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "models": [{"name": "llama3.2:latest"}]
            })))
            .mount(&server)
            .await;

        let embedder = OllamaEmbedder::new(&embed_config(&server.uri(), 768)).unwrap();
        assert!(matches!(
            embedder.health_check().await.unwrap(),
            HealthStatus::Degraded(_)
        ));
    }
}
