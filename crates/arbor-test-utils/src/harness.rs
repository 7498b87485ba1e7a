// SPDX-FileCopyrightText: 2026 Arbor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles a complete Arbor stack with mock gateways and a
//! temp SQLite database, and provides `ask()`/`reply()` to drive turns
//! through the real service.

use std::sync::Arc;

use arbor_config::ArborConfig;
use arbor_conversation::{ConversationService, TurnEvent, TurnOutcome, TurnRequest};
use arbor_core::types::Response;
use arbor_core::{ArborError, CompletionAdapter, EmbeddingAdapter, StorageAdapter};
use arbor_storage::{AttachmentStore, SqliteStorage};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::mock_completion::{MockCompletion, MockReply};
use crate::mock_embedder::MockEmbedder;

/// Vector size used by the mock embedder unless overridden.
pub const TEST_DIMENSIONS: usize = 32;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    replies: Vec<MockReply>,
    dimensions: usize,
    embeddings_enabled: bool,
    summaries_enabled: bool,
    installed: Option<Vec<String>>,
    configure: Option<Box<dyn FnOnce(&mut ArborConfig) + Send>>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            replies: Vec::new(),
            dimensions: TEST_DIMENSIONS,
            embeddings_enabled: true,
            summaries_enabled: false,
            installed: None,
            configure: None,
        }
    }

    /// Queue replies for the mock completion gateway.
    pub fn with_replies(mut self, replies: Vec<MockReply>) -> Self {
        self.replies = replies;
        self
    }

    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }

    /// Store turns without computing embeddings.
    pub fn without_embeddings(mut self) -> Self {
        self.embeddings_enabled = false;
        self
    }

    pub fn with_summaries(mut self) -> Self {
        self.summaries_enabled = true;
        self
    }

    /// Local models reported by the mock gateway.
    pub fn with_installed_models(mut self, models: Vec<String>) -> Self {
        self.installed = Some(models);
        self
    }

    /// Adjust the config after the harness defaults are applied.
    pub fn configure(mut self, f: impl FnOnce(&mut ArborConfig) + Send + 'static) -> Self {
        self.configure = Some(Box::new(f));
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, ArborError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| ArborError::Storage { source: e.into() })?;

        let mut config = ArborConfig::default();
        config.storage.database_path = temp_dir.path().join("test.db").to_string_lossy().into_owned();
        config.storage.data_dir = temp_dir.path().to_string_lossy().into_owned();
        config.embedding.enabled = self.embeddings_enabled;
        config.embedding.dimensions = self.dimensions;
        config.summaries.enabled = self.summaries_enabled;
        if let Some(f) = self.configure {
            f(&mut config);
        }

        let sqlite = SqliteStorage::new(config.storage.clone());
        sqlite.initialize().await?;
        let attachments = sqlite.attachments().clone();
        let storage: Arc<dyn StorageAdapter> = Arc::new(sqlite);

        let embedder = Arc::new(MockEmbedder::new(self.dimensions));
        let mut completion = MockCompletion::with_replies(self.replies);
        if let Some(models) = self.installed {
            completion = completion.with_installed(models);
        }
        let completion = Arc::new(completion);

        let service = ConversationService::new(
            config.clone(),
            Arc::clone(&storage),
            attachments.clone(),
            Arc::clone(&embedder) as Arc<dyn EmbeddingAdapter>,
            Some(Arc::clone(&completion) as Arc<dyn CompletionAdapter>),
        );

        Ok(TestHarness {
            service,
            storage,
            attachments,
            embedder,
            completion,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with mock gateways and temp storage.
pub struct TestHarness {
    /// The service under test.
    pub service: ConversationService,
    /// SQLite storage adapter (temp DB, cleaned up on drop).
    pub storage: Arc<dyn StorageAdapter>,
    pub attachments: AttachmentStore,
    pub embedder: Arc<MockEmbedder>,
    pub completion: Arc<MockCompletion>,
    pub config: ArborConfig,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// A harness with all defaults.
    pub async fn new() -> Result<Self, ArborError> {
        Self::builder().build().await
    }

    /// Run a turn to completion and return its outcome plus every event
    /// it emitted.
    pub async fn run(
        &self,
        request: TurnRequest,
    ) -> Result<(TurnOutcome, Vec<TurnEvent>), ArborError> {
        self.run_with_cancel(request, CancellationToken::new()).await
    }

    pub async fn run_with_cancel(
        &self,
        request: TurnRequest,
        cancel: CancellationToken,
    ) -> Result<(TurnOutcome, Vec<TurnEvent>), ArborError> {
        let (tx, mut rx) = mpsc::channel(1024);
        let outcome = self
            .service
            .run_turn(request, self.completion.as_ref(), tx, cancel)
            .await?;
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        Ok((outcome, events))
    }

    async fn completed(&self, request: TurnRequest) -> Result<Response, ArborError> {
        match self.run(request).await?.0 {
            TurnOutcome::Completed(response) => Ok(response),
            TurnOutcome::Cancelled => Err(ArborError::Internal("turn was cancelled".into())),
        }
    }

    /// Start a new conversation with `prompt`.
    pub async fn ask(&self, prompt: &str) -> Result<Response, ArborError> {
        self.completed(TurnRequest::new(prompt)).await
    }

    /// Continue from `parent` with `prompt`.
    pub async fn reply(&self, parent: &Response, prompt: &str) -> Result<Response, ArborError> {
        self.completed(TurnRequest {
            parent_id: Some(parent.id.clone()),
            ..TurnRequest::new(prompt)
        })
        .await
    }

    /// Absolute path of a stored attachment pointer.
    pub fn attachment_path(&self, pointer: &str) -> Result<std::path::PathBuf, ArborError> {
        self.attachments.resolve(pointer)
    }
}
