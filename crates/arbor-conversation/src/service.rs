// SPDX-FileCopyrightText: 2026 Arbor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The query surface over stored conversations.
//!
//! [`ConversationService`] ties the store, the ranker, the enrichment side
//! channel and the model catalog together. Gateway calls are always made
//! outside storage transactions: a turn streams first and is persisted in
//! one write only once the reply is complete.

use std::sync::Arc;
use std::time::{Duration, Instant};

use arbor_config::ArborConfig;
use arbor_core::models::Provider;
use arbor_core::types::{
    ChatMessage, CompletionEvent, CompletionRequest, Conversation, InlineAttachment, NewTurn,
    Response, SearchMode, SimilarResponse, StoredAttachment, Summary,
};
use arbor_core::{ArborError, CompletionAdapter, EmbeddingAdapter, StorageAdapter};
use arbor_search::HybridRanker;
use arbor_storage::AttachmentStore;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::catalog::{ModelAvailability, ModelCatalog};
use crate::enrichment::{BackfillReport, Enricher};
use crate::tree;
use crate::turn::{
    TurnEvent, TurnOutcome, TurnRequest, decode_attachments, title_from_prompt, validate_sampling,
};

/// Where a new turn lands in the tree.
struct Placement {
    conversation_id: String,
    new_conversation: Option<Conversation>,
    history: Vec<ChatMessage>,
}

/// Entry point for listing, searching, deleting and extending conversations.
pub struct ConversationService {
    config: ArborConfig,
    storage: Arc<dyn StorageAdapter>,
    attachments: AttachmentStore,
    ranker: HybridRanker,
    enricher: Enricher,
    catalog: ModelCatalog,
}

impl ConversationService {
    /// Assemble the service.
    ///
    /// `embedder` always serves query embedding for search; turns are only
    /// embedded on write when `embedding.enabled` is set. `local` is the
    /// gateway whose installed models feed the catalog.
    pub fn new(
        config: ArborConfig,
        storage: Arc<dyn StorageAdapter>,
        attachments: AttachmentStore,
        embedder: Arc<dyn EmbeddingAdapter>,
        local: Option<Arc<dyn CompletionAdapter>>,
    ) -> Self {
        let ranker = HybridRanker::new(
            Arc::clone(&storage),
            Arc::clone(&embedder),
            config.search.clone(),
        );
        let enricher = Enricher::new(
            Arc::clone(&storage),
            config.embedding.enabled.then_some(embedder),
            config.summaries.clone(),
        );
        let catalog = ModelCatalog::new(
            config.providers.clone(),
            local,
            Duration::from_secs(config.catalog.ttl_secs),
        );
        Self {
            config,
            storage,
            attachments,
            ranker,
            enricher,
            catalog,
        }
    }

    pub fn config(&self) -> &ArborConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<dyn StorageAdapter> {
        &self.storage
    }

    pub fn attachments(&self) -> &AttachmentStore {
        &self.attachments
    }

    // --- Reads ---

    pub async fn list_conversations(&self) -> Result<Vec<Conversation>, ArborError> {
        self.storage.list_conversations().await
    }

    /// All nodes of a conversation, oldest first, attachments inlined.
    pub async fn list_responses(&self, conversation_id: &str) -> Result<Vec<Response>, ArborError> {
        self.require_conversation(conversation_id).await?;
        self.storage.list_responses(conversation_id).await
    }

    /// Message sequence from the root of the conversation to `response_id`.
    pub async fn chain(
        &self,
        conversation_id: &str,
        response_id: &str,
    ) -> Result<Vec<ChatMessage>, ArborError> {
        let responses = self.list_responses(conversation_id).await?;
        tree::build_chain(&responses, response_id)
    }

    /// Check the tree invariant over one conversation.
    pub async fn validate_conversation(&self, conversation_id: &str) -> Result<(), ArborError> {
        let responses = self.list_responses(conversation_id).await?;
        tree::validate_tree(&responses)
    }

    pub async fn list_summaries(&self, conversation_id: &str) -> Result<Vec<Summary>, ArborError> {
        self.require_conversation(conversation_id).await?;
        self.storage.list_summaries(conversation_id).await
    }

    /// One page of search results. `limit` falls back to the configured
    /// default page size.
    pub async fn search(
        &self,
        query: &str,
        limit: Option<usize>,
        offset: usize,
        mode: SearchMode,
    ) -> Result<Vec<SimilarResponse>, ArborError> {
        let limit = limit.unwrap_or(self.config.search.default_limit);
        self.ranker.search(query, limit, offset, mode).await
    }

    pub async fn available_models(&self) -> Result<Vec<ModelAvailability>, ArborError> {
        self.catalog.available_models().await
    }

    pub async fn invalidate_models(&self) {
        self.catalog.invalidate().await;
    }

    async fn require_conversation(&self, conversation_id: &str) -> Result<Conversation, ArborError> {
        self.storage
            .get_conversation(conversation_id)
            .await?
            .ok_or_else(|| ArborError::NotFound {
                entity: "conversation",
                id: conversation_id.to_string(),
            })
    }

    // --- Deletion ---

    pub async fn delete_conversation(&self, conversation_id: &str) -> Result<(), ArborError> {
        self.storage.delete_conversation(conversation_id).await
    }

    /// Delete one node. Its children keep their (now dangling) parent id.
    pub async fn delete_response(
        &self,
        conversation_id: &str,
        response_id: &str,
    ) -> Result<(), ArborError> {
        self.storage
            .delete_response(conversation_id, response_id)
            .await
    }

    /// Delete `root_id` and every descendant, leaves first. Returns the
    /// number of nodes removed.
    pub async fn delete_subtree(
        &self,
        conversation_id: &str,
        root_id: &str,
    ) -> Result<usize, ArborError> {
        let responses = self.list_responses(conversation_id).await?;
        let ids: Vec<String> = tree::collect_subtree(&responses, root_id)?
            .into_iter()
            .map(|r| r.id.clone())
            .collect();

        // Breadth-first order puts every node after its parent.
        for id in ids.iter().rev() {
            self.storage.delete_response(conversation_id, id).await?;
        }
        info!(conversation_id, root_id, deleted = ids.len(), "subtree deleted");
        Ok(ids.len())
    }

    // --- Maintenance ---

    pub async fn backfill_embeddings(&self, batch_size: usize) -> Result<BackfillReport, ArborError> {
        self.enricher.backfill(batch_size).await
    }

    pub async fn rebuild_lexical_index(&self) -> Result<(), ArborError> {
        self.storage.rebuild_lexical_index().await
    }

    // --- Branching ---

    async fn node(
        &self,
        conversation_id: &str,
        response_id: &str,
    ) -> Result<(Vec<Response>, Response), ArborError> {
        let responses = self.list_responses(conversation_id).await?;
        let node = responses
            .iter()
            .find(|r| r.id == response_id)
            .cloned()
            .ok_or_else(|| ArborError::NotFound {
                entity: "response",
                id: response_id.to_string(),
            })?;
        Ok((responses, node))
    }

    fn request_like(
        node: &Response,
        parent_id: Option<String>,
        prompt: String,
        attachments: Vec<InlineAttachment>,
    ) -> TurnRequest {
        TurnRequest {
            conversation_id: Some(node.conversation_id.clone()),
            parent_id,
            prompt,
            model: Some(node.model.clone()),
            system_prompt: node.system_prompt.clone(),
            temperature: Some(node.temperature),
            top_p: Some(node.top_p),
            max_tokens: node.max_tokens.and_then(|t| u32::try_from(t).ok()),
            attachments: attachments.into_iter().map(|a| a.data_uri).collect(),
        }
    }

    /// A turn that re-asks `response_id`'s prompt as a sibling of it.
    pub async fn regenerate_request(
        &self,
        conversation_id: &str,
        response_id: &str,
    ) -> Result<TurnRequest, ArborError> {
        let (responses, node) = self.node(conversation_id, response_id).await?;
        let ctx = tree::regeneration_context(&responses, response_id)?;
        Ok(Self::request_like(&node, ctx.parent_id, ctx.prompt, ctx.attachments))
    }

    /// A turn that asks `new_prompt` in place of `response_id`'s prompt.
    pub async fn edit_request(
        &self,
        conversation_id: &str,
        response_id: &str,
        new_prompt: &str,
    ) -> Result<TurnRequest, ArborError> {
        let (responses, node) = self.node(conversation_id, response_id).await?;
        let ctx = tree::edit_context(&responses, response_id, new_prompt)?;
        Ok(Self::request_like(&node, ctx.parent_id, ctx.prompt, ctx.attachments))
    }

    // --- Turns ---

    async fn place(&self, request: &TurnRequest) -> Result<Placement, ArborError> {
        if let Some(parent_id) = request.parent_id.as_deref() {
            let parent = self
                .storage
                .get_response(parent_id)
                .await?
                .ok_or_else(|| ArborError::NotFound {
                    entity: "response",
                    id: parent_id.to_string(),
                })?;
            if let Some(conversation_id) = request.conversation_id.as_deref() {
                if conversation_id != parent.conversation_id {
                    return Err(ArborError::Validation(format!(
                        "parent {parent_id} belongs to conversation {}, not {conversation_id}",
                        parent.conversation_id
                    )));
                }
            }
            let responses = self.storage.list_responses(&parent.conversation_id).await?;
            let history = tree::build_chain(&responses, parent_id)?;
            return Ok(Placement {
                conversation_id: parent.conversation_id,
                new_conversation: None,
                history,
            });
        }

        if let Some(conversation_id) = request.conversation_id.as_deref() {
            let conversation = self.require_conversation(conversation_id).await?;
            return Ok(Placement {
                conversation_id: conversation.id,
                new_conversation: None,
                history: Vec::new(),
            });
        }

        let conversation = Conversation {
            id: uuid::Uuid::new_v4().to_string(),
            title: title_from_prompt(&request.prompt),
            created_at: arbor_core::now_utc(),
        };
        Ok(Placement {
            conversation_id: conversation.id.clone(),
            new_conversation: Some(conversation),
            history: Vec::new(),
        })
    }

    /// Send a prompt, stream the reply to `events`, and store the finished
    /// turn.
    ///
    /// Input is validated before anything else happens. If `cancel` fires
    /// while streaming, nothing is written and [`TurnOutcome::Cancelled`]
    /// is returned. Embeddings and summaries are best-effort; the turn is
    /// stored even when they fail.
    pub async fn run_turn(
        &self,
        request: TurnRequest,
        completion: &dyn CompletionAdapter,
        events: mpsc::Sender<TurnEvent>,
        cancel: CancellationToken,
    ) -> Result<TurnOutcome, ArborError> {
        if request.prompt.trim().is_empty() {
            return Err(ArborError::Validation("prompt must not be empty".into()));
        }
        let app = &self.config.app;
        let model = request
            .model
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| app.default_model.clone());
        let provider = Provider::for_model(&model).unwrap_or(Provider::Ollama);
        let temperature = request.temperature.unwrap_or(app.temperature);
        let top_p = request.top_p.unwrap_or(app.top_p);
        let max_tokens = request.max_tokens.or(app.max_tokens);
        let system_prompt = request
            .system_prompt
            .clone()
            .or_else(|| app.system_prompt.clone());
        validate_sampling(temperature, top_p)?;
        let decoded = decode_attachments(&request.attachments, self.config.attachments.max_bytes)?;

        let placement = self.place(&request).await?;
        let response_id = uuid::Uuid::new_v4().to_string();

        let mut messages = placement.history;
        messages.push(ChatMessage {
            attachments: decoded
                .iter()
                .map(|(a, uri)| InlineAttachment {
                    // Not stored yet.
                    id: String::new(),
                    media_type: a.media_type.clone(),
                    data_uri: uri.clone(),
                })
                .collect(),
            ..ChatMessage::user(request.prompt.clone())
        });
        let completion_request = CompletionRequest {
            provider,
            model: model.clone(),
            system: system_prompt.clone(),
            messages,
            temperature,
            top_p,
            max_tokens,
        };

        let started_event = TurnEvent::Started {
            conversation_id: placement.conversation_id.clone(),
            response_id: response_id.clone(),
        };
        if !emit(&events, &cancel, started_event).await {
            return Ok(TurnOutcome::Cancelled);
        }

        let started = Instant::now();
        let mut stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(response_id = %response_id, "turn cancelled before the reply started");
                return Ok(TurnOutcome::Cancelled);
            }
            opened = completion.stream(completion_request) => opened?,
        };
        let mut text = String::new();
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(response_id = %response_id, "turn cancelled, nothing stored");
                    return Ok(TurnOutcome::Cancelled);
                }
                next = stream.next() => match next {
                    Some(Ok(CompletionEvent::TextDelta(delta))) => {
                        text.push_str(&delta);
                        if !emit(&events, &cancel, TurnEvent::Delta(delta)).await {
                            info!(response_id = %response_id, "turn cancelled, nothing stored");
                            return Ok(TurnOutcome::Cancelled);
                        }
                    }
                    Some(Ok(CompletionEvent::Done)) => break,
                    Some(Err(e)) => return Err(e),
                    None => {
                        return Err(ArborError::gateway(
                            "completion stream ended before it finished",
                        ));
                    }
                },
            }
        }
        drop(stream);
        let duration_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);
        debug!(response_id = %response_id, chars = text.len(), duration_ms, "reply complete");

        let embeddings = self.enricher.embed_turn(&request.prompt, &text).await;

        let mut stored: Vec<StoredAttachment> = Vec::with_capacity(decoded.len());
        for (attachment, _) in &decoded {
            match self
                .attachments
                .store(&attachment.data, &attachment.media_type)
                .await
            {
                Ok(s) => stored.push(s),
                Err(e) => {
                    self.discard_files(&stored).await;
                    return Err(e);
                }
            }
        }

        let response = Response {
            id: response_id,
            conversation_id: placement.conversation_id,
            parent_id: request.parent_id.clone(),
            model,
            provider: provider.to_string(),
            prompt: request.prompt,
            system_prompt,
            response_text: text,
            temperature,
            top_p,
            max_tokens: max_tokens.map(i64::from),
            duration_ms,
            datetime_utc: arbor_core::now_utc(),
            attachments: Vec::new(),
        };
        let turn = NewTurn {
            conversation: placement.new_conversation,
            response,
            embeddings,
            attachments: stored,
        };
        if let Err(e) = self.storage.insert_turn(&turn).await {
            self.discard_files(&turn.attachments).await;
            return Err(e);
        }

        let NewTurn {
            mut response,
            attachments: stored,
            ..
        } = turn;
        response.attachments = stored
            .into_iter()
            .zip(decoded)
            .map(|(s, (_, uri))| InlineAttachment {
                id: s.id,
                media_type: s.media_type,
                data_uri: uri,
            })
            .collect();
        info!(
            response_id = %response.id,
            conversation_id = %response.conversation_id,
            model = %response.model,
            "turn stored"
        );

        if self.enricher.summaries_enabled() {
            self.enricher.summarize(&response, completion).await;
        }
        Ok(TurnOutcome::Completed(response))
    }

    async fn discard_files(&self, stored: &[StoredAttachment]) {
        for s in stored {
            if let Err(e) = self.attachments.delete(&s.file_path).await {
                warn!(file_path = %s.file_path, error = %e, "failed to remove attachment file");
            }
        }
    }
}

/// Send `event` unless the turn is cancelled first.
///
/// Returns `false` on cancellation. A dropped receiver is not an error; the
/// turn keeps running without a listener.
async fn emit(
    events: &mpsc::Sender<TurnEvent>,
    cancel: &CancellationToken,
    event: TurnEvent,
) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = events.send(event) => true,
    }
}
