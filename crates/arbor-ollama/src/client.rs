// SPDX-FileCopyrightText: 2026 Arbor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Ollama API.
//!
//! Provides [`OllamaClient`] which handles request construction, NDJSON
//! streaming and a single retry on transient errors.

use std::time::Duration;

use arbor_core::ArborError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::ndjson::{self, ChunkStream};
use crate::types::{ApiErrorResponse, ChatChunk, ChatRequest, EmbedRequest, EmbedResponse, TagsResponse};

/// HTTP client for one Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    max_retries: u32,
}

impl OllamaClient {
    /// Creates a client for `base_url` (e.g. `http://localhost:11434`).
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ArborError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ArborError::Gateway {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries: 1,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// POST a JSON body, retrying once on 429/500/503.
    async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<reqwest::Response, ArborError> {
        let url = self.url(path);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, path, "retrying request after transient error");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }

            let response = self
                .client
                .post(&url)
                .json(body)
                .send()
                .await
                .map_err(|e| ArborError::Gateway {
                    message: format!("HTTP request to {path} failed: {e}"),
                    source: Some(Box::new(e)),
                })?;

            let status = response.status();
            debug!(status = %status, attempt, path, "response received");

            if status.is_success() {
                return Ok(response);
            }

            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
                Ok(api_err) => format!("Ollama error ({status}): {}", api_err.error),
                Err(_) => format!("Ollama returned {status}: {body}"),
            };

            if is_transient_error(status) && attempt < self.max_retries {
                warn!(status = %status, body = %body, "transient error, will retry");
                last_error = Some(ArborError::gateway(message));
                continue;
            }
            return Err(ArborError::gateway(message));
        }

        Err(last_error.unwrap_or_else(|| ArborError::gateway("request failed after retries")))
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ArborError> {
        let body = response.text().await.map_err(|e| ArborError::Gateway {
            message: format!("failed to read response body: {e}"),
            source: Some(Box::new(e)),
        })?;
        serde_json::from_str(&body).map_err(|e| ArborError::Gateway {
            message: format!("failed to parse Ollama response: {e}"),
            source: Some(Box::new(e)),
        })
    }

    /// `POST /api/embed`.
    pub async fn embed(&self, request: &EmbedRequest) -> Result<EmbedResponse, ArborError> {
        let response = self.post("/api/embed", request).await?;
        Self::read_json(response).await
    }

    /// `POST /api/chat` with streaming on; yields NDJSON chunks.
    pub async fn chat_stream(&self, request: &ChatRequest) -> Result<ChunkStream, ArborError> {
        let mut req = request.clone();
        req.stream = true;
        let response = self.post("/api/chat", &req).await?;
        Ok(ndjson::parse_ndjson_stream(response.bytes_stream()))
    }

    /// `POST /api/chat` with streaming off.
    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatChunk, ArborError> {
        let mut req = request.clone();
        req.stream = false;
        let response = self.post("/api/chat", &req).await?;
        let reply: ChatChunk = Self::read_json(response).await?;
        match reply.error {
            Some(error) => Err(ArborError::gateway(format!("Ollama error: {error}"))),
            None => Ok(reply),
        }
    }

    /// `GET /api/tags`: names of locally installed models.
    pub async fn list_models(&self) -> Result<Vec<String>, ArborError> {
        let response = self
            .client
            .get(self.url("/api/tags"))
            .send()
            .await
            .map_err(|e| ArborError::Gateway {
                message: format!("HTTP request to /api/tags failed: {e}"),
                source: Some(Box::new(e)),
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(ArborError::gateway(format!("Ollama returned {status} for /api/tags")));
        }
        let tags: TagsResponse = Self::read_json(response).await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

/// Returns true for HTTP status codes that indicate transient errors worth retrying.
fn is_transient_error(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 503)
}
