// SPDX-FileCopyrightText: 2026 Arbor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use arbor_config::model::StorageConfig;
use arbor_core::types::{
    Conversation, Embedding, FieldKind, IndexHit, NewTurn, Response, Summary, TurnEmbeddings,
};
use arbor_core::{AdapterType, ArborError, HealthStatus, PluginAdapter, StorageAdapter};

use crate::attachments::AttachmentStore;
use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed conversation store.
///
/// Wraps a [`Database`] handle plus the attachment directory and delegates
/// to the typed query modules. The database is opened lazily by
/// [`StorageAdapter::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    attachments: AttachmentStore,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given configuration.
    ///
    /// The database connection is not opened until [`initialize`] is called.
    pub fn new(config: StorageConfig) -> Self {
        let attachments = AttachmentStore::new(&config.data_dir);
        Self {
            config,
            attachments,
            db: OnceCell::new(),
        }
    }

    /// The attachment store rooted at the configured data directory.
    pub fn attachments(&self) -> &AttachmentStore {
        &self.attachments
    }

    /// Returns a reference to the underlying Database, or an error if not initialized.
    fn db(&self) -> Result<&Database, ArborError> {
        self.db
            .get()
            .ok_or_else(|| ArborError::storage("storage not initialized -- call initialize() first"))
    }

    async fn checkpoint(&self, db: &Database) -> Result<(), ArborError> {
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, ArborError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ArborError> {
        if let Some(db) = self.db.get() {
            self.checkpoint(db).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), ArborError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db
            .set(db)
            .map_err(|_| ArborError::storage("storage already initialized"))?;
        debug!(
            path = %self.config.database_path,
            data_dir = %self.config.data_dir,
            "SQLite storage initialized"
        );
        Ok(())
    }

    async fn close(&self) -> Result<(), ArborError> {
        let db = self.db()?;
        self.checkpoint(db).await
    }

    // --- Conversations and responses ---

    async fn insert_turn(&self, turn: &NewTurn) -> Result<(), ArborError> {
        queries::turns::insert_turn(self.db()?, turn).await
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, ArborError> {
        queries::conversations::get_conversation(self.db()?, id).await
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, ArborError> {
        queries::conversations::list_conversations(self.db()?).await
    }

    async fn get_response(&self, id: &str) -> Result<Option<Response>, ArborError> {
        queries::responses::get_response(self.db()?, id).await
    }

    async fn list_responses(&self, conversation_id: &str) -> Result<Vec<Response>, ArborError> {
        queries::responses::list_responses(self.db()?, &self.attachments, conversation_id).await
    }

    async fn delete_response(
        &self,
        conversation_id: &str,
        response_id: &str,
    ) -> Result<(), ArborError> {
        queries::responses::delete_response(
            self.db()?,
            &self.attachments,
            conversation_id,
            response_id,
        )
        .await
    }

    async fn delete_conversation(&self, conversation_id: &str) -> Result<(), ArborError> {
        queries::conversations::delete_conversation(self.db()?, &self.attachments, conversation_id)
            .await
    }

    // --- Embeddings and search ---

    async fn upsert_embeddings(
        &self,
        response_id: &str,
        embeddings: &TurnEmbeddings,
    ) -> Result<(), ArborError> {
        queries::embeddings::upsert_embeddings(self.db()?, response_id, embeddings).await
    }

    async fn get_embedding(
        &self,
        response_id: &str,
        kind: FieldKind,
    ) -> Result<Option<Embedding>, ArborError> {
        queries::embeddings::get_embedding(self.db()?, response_id, kind).await
    }

    async fn responses_missing_embeddings(
        &self,
        limit: usize,
    ) -> Result<Vec<Response>, ArborError> {
        queries::responses::responses_missing_embeddings(self.db()?, limit).await
    }

    async fn search_text(&self, query: &str, limit: usize) -> Result<Vec<IndexHit>, ArborError> {
        queries::lexical::search_text(self.db()?, query, limit).await
    }

    async fn search_vector(
        &self,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<IndexHit>, ArborError> {
        queries::vector::search_vector(self.db()?, vector, limit).await
    }

    async fn rebuild_lexical_index(&self) -> Result<(), ArborError> {
        queries::lexical::rebuild_lexical_index(self.db()?).await
    }

    // --- Summaries ---

    async fn insert_summary(&self, summary: &Summary) -> Result<(), ArborError> {
        queries::summaries::insert_summary(self.db()?, summary).await
    }

    async fn list_summaries(&self, conversation_id: &str) -> Result<Vec<Summary>, ArborError> {
        queries::summaries::list_summaries(self.db()?, conversation_id).await
    }
}
