// SPDX-FileCopyrightText: 2026 Arbor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation queries, including the cascading delete.

use arbor_core::ArborError;
use arbor_core::types::Conversation;
use rusqlite::{OptionalExtension, params};
use tracing::info;

use crate::attachments::AttachmentStore;
use crate::database::{Database, map_tr_err};
use crate::queries::attachments::unlink_best_effort;

pub(crate) fn insert_conversation_row(
    conn: &rusqlite::Connection,
    c: &Conversation,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO conversations (id, title, created_at) VALUES (?1, ?2, ?3)",
        params![c.id, c.title, c.created_at],
    )?;
    Ok(())
}

pub(crate) fn conversation_exists(
    conn: &rusqlite::Connection,
    id: &str,
) -> rusqlite::Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM conversations WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn conversation_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        title: row.get(1)?,
        created_at: row.get(2)?,
    })
}

/// Get a conversation by id.
pub async fn get_conversation(
    db: &Database,
    id: &str,
) -> Result<Option<Conversation>, ArborError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<_, rusqlite::Error> {
            conn.query_row(
                "SELECT id, title, created_at FROM conversations WHERE id = ?1",
                params![id],
                conversation_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// All conversations, newest first. Ties keep reverse insertion order.
pub async fn list_conversations(db: &Database) -> Result<Vec<Conversation>, ArborError> {
    db.connection()
        .call(|conn| -> Result<_, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT id, title, created_at FROM conversations
                 ORDER BY created_at DESC, rowid DESC",
            )?;
            let rows = stmt.query_map([], conversation_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Delete a conversation and everything that hangs off it, in one transaction.
///
/// Order: collect attachment pointers, unlink files (failures are logged),
/// then delete embeddings, attachment rows, summaries, responses and finally
/// the conversation row.
pub async fn delete_conversation(
    db: &Database,
    store: &AttachmentStore,
    conversation_id: &str,
) -> Result<(), ArborError> {
    let id = conversation_id.to_string();
    let store = store.clone();
    db.connection()
        .call(move |conn| -> Result<Result<(), ArborError>, rusqlite::Error> {
            let tx = conn.transaction()?;

            if !conversation_exists(&tx, &id)? {
                return Ok(Err(ArborError::NotFound {
                    entity: "conversation",
                    id,
                }));
            }

            let file_paths: Vec<String> = {
                let mut stmt = tx.prepare(
                    "SELECT file_path FROM attachments
                     WHERE response_id IN (SELECT id FROM responses WHERE conversation_id = ?1)",
                )?;
                let rows = stmt.query_map(params![id], |row| row.get(0))?;
                rows.collect::<Result<_, _>>()?
            };
            let removed = unlink_best_effort(&store, &file_paths);

            tx.execute(
                "DELETE FROM embeddings
                 WHERE response_id IN (SELECT id FROM responses WHERE conversation_id = ?1)",
                params![id],
            )?;
            tx.execute(
                "DELETE FROM attachments
                 WHERE response_id IN (SELECT id FROM responses WHERE conversation_id = ?1)",
                params![id],
            )?;
            tx.execute(
                "DELETE FROM summaries WHERE conversation_id = ?1",
                params![id],
            )?;
            let responses = tx.execute(
                "DELETE FROM responses WHERE conversation_id = ?1",
                params![id],
            )?;
            tx.execute("DELETE FROM conversations WHERE id = ?1", params![id])?;
            tx.commit()?;

            info!(
                conversation_id = %id,
                responses,
                files_removed = removed,
                files_listed = file_paths.len(),
                "conversation deleted"
            );
            Ok(Ok(()))
        })
        .await
        .map_err(map_tr_err)?
}
