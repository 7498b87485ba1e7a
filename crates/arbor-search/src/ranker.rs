// SPDX-FileCopyrightText: 2026 Arbor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hybrid ranker combining vector similarity and FTS5 bm25.
//!
//! The ranker embeds the query once, pulls a candidate pool from each
//! index, fuses the two lists and returns one page of unique responses.

use std::sync::Arc;

use arbor_config::model::{FusionStrategy, SearchConfig};
use arbor_core::types::{EmbeddingInput, SearchMode, SimilarResponse};
use arbor_core::{ArborError, EmbeddingAdapter, StorageAdapter};
use tracing::debug;

use crate::fusion;

/// Retrieves past responses by meaning, by literal text, or both.
pub struct HybridRanker {
    storage: Arc<dyn StorageAdapter>,
    embedder: Arc<dyn EmbeddingAdapter>,
    config: SearchConfig,
}

impl HybridRanker {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        embedder: Arc<dyn EmbeddingAdapter>,
        config: SearchConfig,
    ) -> Self {
        Self {
            storage,
            embedder,
            config,
        }
    }

    /// Candidates fetched from each index for a page of `limit`.
    ///
    /// The pool depends on `limit` only, so consecutive pages of the same
    /// size slice one stable ranking. Offsets past the pool yield nothing.
    fn pool_size(&self, limit: usize) -> usize {
        limit.saturating_mul(self.config.candidate_multiplier)
    }

    /// Run a search and return the `offset..offset + limit` page.
    ///
    /// A blank query or a zero limit returns an empty page without calling
    /// the embedder or the store. Failing to embed the query fails the
    /// whole search in `vector` and `combined` mode.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        offset: usize,
        mode: SearchMode,
    ) -> Result<Vec<SimilarResponse>, ArborError> {
        if query.trim().is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let pool = self.pool_size(limit);

        let ranked = match mode {
            SearchMode::Vector => {
                let vector = self.embed_query(query).await?;
                fusion::raw(self.storage.search_vector(&vector, pool).await?)
            }
            SearchMode::Text => fusion::raw(self.storage.search_text(query, pool).await?),
            SearchMode::Combined => {
                let vector = self.embed_query(query).await?;
                let (vector_hits, text_hits) = tokio::try_join!(
                    self.storage.search_vector(&vector, pool),
                    self.storage.search_text(query, pool),
                )?;
                debug!(
                    vector_hits = vector_hits.len(),
                    text_hits = text_hits.len(),
                    fusion = ?self.config.fusion,
                    "fusing candidate lists"
                );
                match self.config.fusion {
                    FusionStrategy::MaxNormalized => fusion::max_normalized(vector_hits, text_hits),
                    FusionStrategy::ReciprocalRank => {
                        fusion::reciprocal_rank(vector_hits, text_hits, self.config.rrf_k)
                    }
                }
            }
        };

        let total = ranked.len();
        let page = fusion::paginate(ranked, offset, limit);
        debug!(%mode, limit, offset, total, returned = page.len(), "search complete");
        Ok(page)
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, ArborError> {
        let output = self
            .embedder
            .embed(EmbeddingInput {
                texts: vec![query.to_string()],
            })
            .await
            .map_err(|e| match e {
                gateway @ ArborError::Gateway { .. } => gateway,
                other => ArborError::Gateway {
                    message: "failed to embed search query".to_string(),
                    source: Some(Box::new(other)),
                },
            })?;
        output
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| ArborError::gateway("embedding service returned no vector for the query"))
    }
}
