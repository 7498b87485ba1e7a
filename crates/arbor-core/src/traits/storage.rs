// SPDX-FileCopyrightText: 2026 Arbor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for the conversation store.

use async_trait::async_trait;

use crate::error::ArborError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    Conversation, Embedding, FieldKind, IndexHit, NewTurn, Response, Summary, TurnEmbeddings,
};

/// Adapter for the persistent conversation store.
///
/// Every mutating operation is a single transaction: it either fully
/// applies or leaves no trace.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection).
    async fn initialize(&self) -> Result<(), ArborError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), ArborError>;

    // --- Conversations and responses ---

    /// Atomically writes a turn: optional new conversation, the response,
    /// its embeddings and its attachment rows.
    async fn insert_turn(&self, turn: &NewTurn) -> Result<(), ArborError>;

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, ArborError>;

    /// All conversations, newest first.
    async fn list_conversations(&self) -> Result<Vec<Conversation>, ArborError>;

    async fn get_response(&self, id: &str) -> Result<Option<Response>, ArborError>;

    /// All responses of a conversation in ascending time order, with
    /// attachments inlined.
    async fn list_responses(&self, conversation_id: &str) -> Result<Vec<Response>, ArborError>;

    /// Deletes a single response node (not its descendants).
    async fn delete_response(
        &self,
        conversation_id: &str,
        response_id: &str,
    ) -> Result<(), ArborError>;

    /// Deletes a conversation and everything that belongs to it.
    async fn delete_conversation(&self, conversation_id: &str) -> Result<(), ArborError>;

    // --- Embeddings and search ---

    /// Inserts or replaces the embeddings of a response.
    async fn upsert_embeddings(
        &self,
        response_id: &str,
        embeddings: &TurnEmbeddings,
    ) -> Result<(), ArborError>;

    async fn get_embedding(
        &self,
        response_id: &str,
        kind: FieldKind,
    ) -> Result<Option<Embedding>, ArborError>;

    /// Responses that have no embedding rows at all.
    async fn responses_missing_embeddings(&self, limit: usize)
    -> Result<Vec<Response>, ArborError>;

    /// Lexical search ordered by bm25 (ascending).
    async fn search_text(&self, query: &str, limit: usize) -> Result<Vec<IndexHit>, ArborError>;

    /// Vector search ordered by cosine distance (ascending).
    async fn search_vector(
        &self,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<IndexHit>, ArborError>;

    /// Rebuilds the lexical index from the responses table.
    async fn rebuild_lexical_index(&self) -> Result<(), ArborError>;

    // --- Summaries ---

    async fn insert_summary(&self, summary: &Summary) -> Result<(), ArborError>;

    async fn list_summaries(&self, conversation_id: &str) -> Result<Vec<Summary>, ArborError>;
}
