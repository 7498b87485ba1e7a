// SPDX-FileCopyrightText: 2026 Arbor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for Arbor conversation trees.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, an FTS5 lexical index, a
//! sqlite-vec backed vector index and a filesystem attachment store.

pub mod adapter;
pub mod attachments;
pub mod database;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteStorage;
pub use attachments::{AttachmentStore, decode_data_uri, encode_data_uri};
pub use database::Database;
pub use queries::lexical::sanitize_query;
pub use queries::vector::{blob_to_vec, ensure_searchable, is_zero_norm, vec_to_blob};

#[cfg(test)]
pub(crate) mod test_support {
    use arbor_core::types::{Conversation, NewTurn, Response, TurnEmbeddings};
    use tempfile::TempDir;

    use crate::attachments::AttachmentStore;
    use crate::database::Database;

    pub async fn open_test_db() -> (Database, AttachmentStore, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        let store = AttachmentStore::new(dir.path());
        (db, store, dir)
    }

    pub fn make_response(id: &str, conversation_id: &str, parent_id: Option<&str>) -> Response {
        Response {
            id: id.to_string(),
            conversation_id: conversation_id.to_string(),
            parent_id: parent_id.map(str::to_string),
            model: "llama3.2".to_string(),
            provider: "ollama".to_string(),
            prompt: format!("prompt {id}"),
            system_prompt: None,
            response_text: format!("response {id}"),
            temperature: 0.7,
            top_p: 1.0,
            max_tokens: None,
            duration_ms: 10,
            datetime_utc: arbor_core::now_utc(),
            attachments: Vec::new(),
        }
    }

    /// A turn with 3-dimensional prompt and response embeddings.
    pub fn make_turn(response: Response, new_conversation: bool) -> NewTurn {
        let conversation = new_conversation.then(|| Conversation {
            id: response.conversation_id.clone(),
            title: response.prompt.clone(),
            created_at: response.datetime_utc.clone(),
        });
        NewTurn {
            conversation,
            response,
            embeddings: Some(TurnEmbeddings {
                model: "nomic-embed-text".to_string(),
                prompt: Some(vec![1.0, 0.0, 0.0]),
                response: Some(vec![0.0, 1.0, 0.0]),
            }),
            attachments: Vec::new(),
        }
    }
}
