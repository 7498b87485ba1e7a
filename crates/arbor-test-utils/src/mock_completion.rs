// SPDX-FileCopyrightText: 2026 Arbor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock completion adapter for deterministic testing.
//!
//! Replies are popped from a FIFO queue. When the queue is empty, a default
//! "mock response" text is returned. Every request is recorded so tests
//! can assert on the messages a turn actually sent.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future;
use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;

use arbor_core::traits::adapter::PluginAdapter;
use arbor_core::traits::completion::{CompletionAdapter, CompletionStream};
use arbor_core::types::{
    AdapterType, CompletionEvent, CompletionRequest, CompletionResponse, HealthStatus,
};
use arbor_core::ArborError;

/// How the mock answers one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    /// Stream the text word by word, then `Done`.
    Text(String),
    /// Stream the text, then never finish.
    Hang(String),
    /// Stream the text, then end without `Done`.
    Truncated(String),
    /// Fail the call with a gateway error.
    Fail(String),
    /// Never answer the call at all.
    Stall,
}

impl MockReply {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }
}

/// A mock completion gateway with queued replies.
pub struct MockCompletion {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
    installed: Option<Vec<String>>,
}

impl MockCompletion {
    pub fn new() -> Self {
        Self::with_replies(Vec::new())
    }

    pub fn with_replies(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::from(replies))),
            requests: Arc::new(Mutex::new(Vec::new())),
            installed: None,
        }
    }

    /// Report these names from `installed_models`.
    pub fn with_installed(mut self, models: Vec<String>) -> Self {
        self.installed = Some(models);
        self
    }

    pub async fn push_reply(&self, reply: MockReply) {
        self.replies.lock().await.push_back(reply);
    }

    /// Every request received so far, oldest first.
    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }

    async fn next_reply(&self, request: &CompletionRequest) -> MockReply {
        self.requests.lock().await.push(request.clone());
        self.replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| MockReply::text("mock response"))
    }
}

impl Default for MockCompletion {
    fn default() -> Self {
        Self::new()
    }
}

/// Split `text` into deltas that concatenate back to it.
fn deltas(text: &str) -> Vec<Result<CompletionEvent, ArborError>> {
    text.split_inclusive(' ')
        .map(|w| Ok(CompletionEvent::TextDelta(w.to_string())))
        .collect()
}

#[async_trait]
impl PluginAdapter for MockCompletion {
    fn name(&self) -> &str {
        "mock-completion"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Completion
    }

    async fn health_check(&self) -> Result<HealthStatus, ArborError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ArborError> {
        Ok(())
    }
}

#[async_trait]
impl CompletionAdapter for MockCompletion {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ArborError> {
        let model = request.model.clone();
        match self.next_reply(&request).await {
            MockReply::Text(text) | MockReply::Hang(text) | MockReply::Truncated(text) => {
                Ok(CompletionResponse { text, model })
            }
            MockReply::Fail(message) => Err(ArborError::gateway(message)),
            MockReply::Stall => future::pending().await,
        }
    }

    async fn stream(&self, request: CompletionRequest) -> Result<CompletionStream, ArborError> {
        let stream: CompletionStream = match self.next_reply(&request).await {
            MockReply::Text(text) => {
                let mut events = deltas(&text);
                events.push(Ok(CompletionEvent::Done));
                Box::pin(stream::iter(events))
            }
            MockReply::Hang(text) => Box::pin(stream::iter(deltas(&text)).chain(stream::pending())),
            MockReply::Truncated(text) => Box::pin(stream::iter(deltas(&text))),
            MockReply::Fail(message) => return Err(ArborError::gateway(message)),
            MockReply::Stall => return future::pending().await,
        };
        Ok(stream)
    }

    async fn installed_models(&self) -> Result<Option<Vec<String>>, ArborError> {
        Ok(self.installed.clone())
    }
}
