// SPDX-FileCopyrightText: 2026 Arbor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Best-effort enrichment of stored responses.
//!
//! Embeddings and summaries are nice to have: a gateway failure here is
//! logged and the turn still persists. The backfill pass repairs responses
//! that were written without vectors.

use std::sync::Arc;

use arbor_config::model::SummaryConfig;
use arbor_core::models::Provider;
use arbor_core::types::{
    ChatMessage, CompletionRequest, EmbeddingInput, Response, Summary, TurnEmbeddings,
};
use arbor_core::{ArborError, CompletionAdapter, EmbeddingAdapter, StorageAdapter};
use arbor_storage::is_zero_norm;
use tracing::{debug, info, warn};

/// Instruction sent with the text to summarize.
const SUMMARY_INSTRUCTION: &str =
    "Summarize the following exchange in one or two sentences. Reply with the summary only.";

/// Result of one backfill pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillReport {
    /// Responses found without embeddings.
    pub scanned: usize,
    pub embedded: usize,
    pub failed: usize,
}

/// Computes embeddings and summaries outside the write transaction.
pub struct Enricher {
    storage: Arc<dyn StorageAdapter>,
    embedder: Option<Arc<dyn EmbeddingAdapter>>,
    summaries: SummaryConfig,
}

impl Enricher {
    /// `embedder` is `None` when embeddings are disabled.
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        embedder: Option<Arc<dyn EmbeddingAdapter>>,
        summaries: SummaryConfig,
    ) -> Self {
        Self {
            storage,
            embedder,
            summaries,
        }
    }

    pub fn embeddings_enabled(&self) -> bool {
        self.embedder.is_some()
    }

    async fn embed_pair(
        embedder: &dyn EmbeddingAdapter,
        prompt: &str,
        response: &str,
    ) -> Result<TurnEmbeddings, ArborError> {
        let output = embedder
            .embed(EmbeddingInput {
                texts: vec![prompt.to_string(), response.to_string()],
            })
            .await?;
        let mut vectors = output.embeddings.into_iter();
        match (vectors.next(), vectors.next(), vectors.next()) {
            (Some(p), Some(r), None) => {
                if is_zero_norm(&p) || is_zero_norm(&r) {
                    return Err(ArborError::gateway(
                        "embedding gateway returned a zero vector",
                    ));
                }
                Ok(TurnEmbeddings {
                    model: output.model,
                    prompt: Some(p),
                    response: Some(r),
                })
            }
            _ => Err(ArborError::gateway(
                "embedding gateway returned the wrong number of vectors",
            )),
        }
    }

    /// Embeddings for a turn's prompt and reply, or `None` if they cannot
    /// be computed right now.
    pub async fn embed_turn(&self, prompt: &str, response: &str) -> Option<TurnEmbeddings> {
        let embedder = self.embedder.as_deref()?;
        match Self::embed_pair(embedder, prompt, response).await {
            Ok(embeddings) => Some(embeddings),
            Err(e) => {
                warn!(error = %e, "embedding failed, storing turn without vectors");
                None
            }
        }
    }

    /// Embed up to `batch_size` responses that have no vectors.
    ///
    /// A failing response is logged and skipped; the pass continues with
    /// the next one. Storage errors still abort the pass.
    pub async fn backfill(&self, batch_size: usize) -> Result<BackfillReport, ArborError> {
        let embedder = self
            .embedder
            .as_deref()
            .ok_or_else(|| ArborError::Config("embeddings are disabled".into()))?;

        let pending = self.storage.responses_missing_embeddings(batch_size).await?;
        let mut report = BackfillReport {
            scanned: pending.len(),
            ..Default::default()
        };

        for response in &pending {
            match Self::embed_pair(embedder, &response.prompt, &response.response_text).await {
                Ok(embeddings) => {
                    self.storage
                        .upsert_embeddings(&response.id, &embeddings)
                        .await?;
                    report.embedded += 1;
                }
                Err(e) => {
                    warn!(response_id = %response.id, error = %e, "backfill failed for response");
                    report.failed += 1;
                }
            }
        }

        info!(
            scanned = report.scanned,
            embedded = report.embedded,
            failed = report.failed,
            "embedding backfill pass finished"
        );
        Ok(report)
    }

    pub fn summaries_enabled(&self) -> bool {
        self.summaries.enabled
    }

    /// Generate and store a short summary of `response`.
    ///
    /// Returns `None` when summaries are disabled or any step fails.
    pub async fn summarize(
        &self,
        response: &Response,
        completion: &dyn CompletionAdapter,
    ) -> Option<Summary> {
        if !self.summaries.enabled {
            return None;
        }
        let model = self
            .summaries
            .model
            .clone()
            .unwrap_or_else(|| response.model.clone());
        let provider = Provider::for_model(&model).unwrap_or(Provider::Ollama);
        let request = CompletionRequest {
            provider,
            model,
            system: Some(SUMMARY_INSTRUCTION.to_string()),
            messages: vec![ChatMessage::user(format!(
                "User: {}\n\nAssistant: {}",
                response.prompt, response.response_text
            ))],
            temperature: self.summaries.temperature,
            top_p: 1.0,
            max_tokens: Some(self.summaries.max_tokens),
        };

        let text = match completion.complete(request).await {
            Ok(reply) => reply.text.trim().to_string(),
            Err(e) => {
                warn!(response_id = %response.id, error = %e, "summary generation failed");
                return None;
            }
        };
        if text.is_empty() {
            debug!(response_id = %response.id, "empty summary, skipping");
            return None;
        }

        let summary = Summary {
            id: uuid::Uuid::new_v4().to_string(),
            response_id: response.id.clone(),
            conversation_id: response.conversation_id.clone(),
            summary: text,
            kind: "short".to_string(),
            created_at: arbor_core::now_utc(),
        };
        match self.storage.insert_summary(&summary).await {
            Ok(()) => Some(summary),
            Err(e) => {
                warn!(response_id = %response.id, error = %e, "failed to store summary");
                None
            }
        }
    }
}
