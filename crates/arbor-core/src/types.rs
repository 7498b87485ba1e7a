// SPDX-FileCopyrightText: 2026 Arbor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across adapter traits and the Arbor crates.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::models::Provider;

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    Embedding,
    Completion,
}

// --- Conversation tree ---

/// A thread of responses. Created together with its first response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub created_at: String,
}

/// One node in a conversation tree: a prompt and the model's reply.
///
/// A `parent_id` of `None` marks a root turn. Several responses may share
/// a parent, which is how branches, regenerations and edits are recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    pub conversation_id: String,
    pub parent_id: Option<String>,
    pub model: String,
    pub provider: String,
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub response_text: String,
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: Option<i64>,
    pub duration_ms: i64,
    /// RFC 3339 UTC timestamp with millisecond precision.
    pub datetime_utc: String,
    /// Attachments resolved to `data:` URIs. Only populated by listing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<InlineAttachment>,
}

/// An attachment payload inlined as a `data:` URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineAttachment {
    pub id: String,
    pub media_type: String,
    pub data_uri: String,
}

/// Which text field of a response an embedding or a search hit refers to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Prompt,
    Response,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prompt => "prompt",
            Self::Response => "response",
        }
    }
}

/// A stored embedding vector for one field of one response.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub response_id: String,
    pub kind: FieldKind,
    pub vector: Vec<f32>,
    pub embedding_model: String,
}

/// The (up to) two embeddings written alongside a turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnEmbeddings {
    pub model: String,
    pub prompt: Option<Vec<f32>>,
    pub response: Option<Vec<f32>>,
}

impl TurnEmbeddings {
    pub fn is_empty(&self) -> bool {
        self.prompt.is_none() && self.response.is_none()
    }

    /// Iterate the present vectors together with the field they embed.
    pub fn iter(&self) -> impl Iterator<Item = (FieldKind, &Vec<f32>)> {
        self.prompt
            .iter()
            .map(|v| (FieldKind::Prompt, v))
            .chain(self.response.iter().map(|v| (FieldKind::Response, v)))
    }
}

/// Raw attachment bytes supplied with a new turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAttachment {
    pub media_type: String,
    pub data: Vec<u8>,
}

/// An attachment already written to the attachment store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAttachment {
    pub id: String,
    /// Relative pointer into the attachment store, e.g. `attachments/<id>`.
    pub file_path: String,
    pub media_type: String,
}

/// An attachment row as persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRecord {
    pub id: String,
    pub response_id: String,
    pub file_path: String,
    pub media_type: String,
    pub created_at: String,
}

/// Everything written by one turn, in one transaction.
#[derive(Debug, Clone)]
pub struct NewTurn {
    /// Set when the turn starts a new conversation.
    pub conversation: Option<Conversation>,
    pub response: Response,
    pub embeddings: Option<TurnEmbeddings>,
    pub attachments: Vec<StoredAttachment>,
}

/// A short auxiliary summary of a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub id: String,
    pub response_id: String,
    pub conversation_id: String,
    pub summary: String,
    pub kind: String,
    pub created_at: String,
}

// --- Messages ---

/// Role of a message sent to a completion gateway.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// Provenance attached to each message reconstructed from a response node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageAnnotations {
    pub response_id: String,
    pub conversation_id: String,
    pub parent_id: Option<String>,
    pub provider: String,
    pub model: String,
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: Option<i64>,
}

/// A single message in a chat sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<InlineAttachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<MessageAnnotations>,
}

impl ChatMessage {
    /// A plain user message without provenance.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            attachments: Vec::new(),
            annotations: None,
        }
    }
}

// --- Search ---

/// Which retrieval branches a search uses.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Vector,
    Text,
    #[default]
    Combined,
}

/// A raw hit from one index, before fusion.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    pub response: Response,
    pub matched_field: FieldKind,
    /// Cosine distance (vector index) or bm25 score (lexical index).
    /// Lower is more relevant in both cases.
    pub score: f64,
}

/// One ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarResponse {
    pub response_id: String,
    pub conversation_id: String,
    pub matched_field: FieldKind,
    pub prompt: String,
    pub response_text: String,
    pub model: String,
    pub provider: String,
    pub datetime_utc: String,
    pub distance: f64,
}

impl SimilarResponse {
    pub fn from_hit(hit: IndexHit, distance: f64) -> Self {
        let r = hit.response;
        Self {
            response_id: r.id,
            conversation_id: r.conversation_id,
            matched_field: hit.matched_field,
            prompt: r.prompt,
            response_text: r.response_text,
            model: r.model,
            provider: r.provider,
            datetime_utc: r.datetime_utc,
            distance,
        }
    }
}

// --- Gateways ---

/// Input for an embedding adapter: one vector is produced per text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingInput {
    pub texts: Vec<String>,
}

/// Output from an embedding adapter, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingOutput {
    pub embeddings: Vec<Vec<f32>>,
    pub dimensions: usize,
    pub model: String,
}

/// A request to a completion gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub provider: Provider,
    pub model: String,
    pub system: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: Option<u32>,
}

/// A full, non-streamed completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResponse {
    pub text: String,
    pub model: String,
}

/// One event from a streaming completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionEvent {
    /// A fragment of assistant text.
    TextDelta(String),
    /// The stream finished normally.
    Done,
}
