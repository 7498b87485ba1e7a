// SPDX-FileCopyrightText: 2026 Arbor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Response node queries.

use std::collections::HashMap;

use arbor_core::ArborError;
use arbor_core::types::{AttachmentRecord, Response};
use rusqlite::{OptionalExtension, params};
use tracing::{debug, warn};

use crate::attachments::AttachmentStore;
use crate::database::{Database, map_tr_err};
use crate::queries::attachments::{attachment_rows_for_conversation, unlink_best_effort};

/// Column list matching [`response_from_row`]; the table alias must be `r`.
pub(crate) const RESPONSE_COLUMNS: &str = "r.id, r.conversation_id, r.parent_id, r.model, \
     r.provider, r.prompt, r.system, r.response, r.temperature, r.top_p, r.max_tokens, \
     r.duration_ms, r.datetime_utc";

/// Number of columns in [`RESPONSE_COLUMNS`]; extra selected columns start here.
pub(crate) const RESPONSE_COLUMN_COUNT: usize = 13;

pub(crate) fn response_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Response> {
    Ok(Response {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        parent_id: row.get(2)?,
        model: row.get(3)?,
        provider: row.get(4)?,
        prompt: row.get(5)?,
        system_prompt: row.get(6)?,
        response_text: row.get(7)?,
        temperature: row.get(8)?,
        top_p: row.get(9)?,
        max_tokens: row.get(10)?,
        duration_ms: row.get(11)?,
        datetime_utc: row.get(12)?,
        attachments: Vec::new(),
    })
}

pub(crate) fn insert_response_row(
    conn: &rusqlite::Connection,
    r: &Response,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO responses (id, conversation_id, parent_id, model, provider, prompt,
                                system, response, temperature, top_p, max_tokens,
                                duration_ms, datetime_utc)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            r.id,
            r.conversation_id,
            r.parent_id,
            r.model,
            r.provider,
            r.prompt,
            r.system_prompt,
            r.response_text,
            r.temperature,
            r.top_p,
            r.max_tokens,
            r.duration_ms,
            r.datetime_utc,
        ],
    )?;
    Ok(())
}

/// Conversation id of a response, if the response exists.
pub(crate) fn response_conversation(
    conn: &rusqlite::Connection,
    response_id: &str,
) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT conversation_id FROM responses WHERE id = ?1",
        params![response_id],
        |row| row.get(0),
    )
    .optional()
}

/// Get a single response by id (attachments are not resolved).
pub async fn get_response(db: &Database, id: &str) -> Result<Option<Response>, ArborError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<_, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {RESPONSE_COLUMNS} FROM responses r WHERE r.id = ?1"),
                params![id],
                response_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// All responses of a conversation, oldest first, with attachments inlined.
///
/// An attachment whose file cannot be read is logged and left out.
pub async fn list_responses(
    db: &Database,
    store: &AttachmentStore,
    conversation_id: &str,
) -> Result<Vec<Response>, ArborError> {
    let conv = conversation_id.to_string();
    let (mut responses, attachments) = db
        .connection()
        .call(move |conn| -> Result<_, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RESPONSE_COLUMNS} FROM responses r
                 WHERE r.conversation_id = ?1
                 ORDER BY r.datetime_utc ASC, r.seq ASC"
            ))?;
            let responses = stmt
                .query_map(params![conv], response_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            let attachments = attachment_rows_for_conversation(conn, &conv)?;
            Ok((responses, attachments))
        })
        .await
        .map_err(map_tr_err)?;

    let mut by_response: HashMap<String, Vec<AttachmentRecord>> = HashMap::new();
    for record in attachments {
        by_response
            .entry(record.response_id.clone())
            .or_default()
            .push(record);
    }

    for response in &mut responses {
        let Some(records) = by_response.remove(&response.id) else {
            continue;
        };
        for record in records {
            match store.read_inline(&record).await {
                Ok(inline) => response.attachments.push(inline),
                Err(e) => warn!(
                    response_id = %response.id,
                    file_path = %record.file_path,
                    error = %e,
                    "attachment unreadable, omitting from listing"
                ),
            }
        }
    }

    Ok(responses)
}

/// Delete exactly one response node, scoped to its conversation.
///
/// Children are left in place; their `parent_id` then dangles. The node's
/// embeddings, summaries and attachment rows go in the same transaction and
/// its attachment files are unlinked best-effort.
pub async fn delete_response(
    db: &Database,
    store: &AttachmentStore,
    conversation_id: &str,
    response_id: &str,
) -> Result<(), ArborError> {
    let conv = conversation_id.to_string();
    let id = response_id.to_string();
    let store = store.clone();
    db.connection()
        .call(move |conn| -> Result<Result<(), ArborError>, rusqlite::Error> {
            let tx = conn.transaction()?;

            let exists: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM responses WHERE id = ?1 AND conversation_id = ?2",
                    params![id, conv],
                    |row| row.get(0),
                )
                .optional()?;
            if exists.is_none() {
                return Ok(Err(ArborError::NotFound {
                    entity: "response",
                    id,
                }));
            }

            let file_paths: Vec<String> = {
                let mut stmt =
                    tx.prepare("SELECT file_path FROM attachments WHERE response_id = ?1")?;
                let rows = stmt.query_map(params![id], |row| row.get(0))?;
                rows.collect::<Result<_, _>>()?
            };
            unlink_best_effort(&store, &file_paths);

            tx.execute("DELETE FROM embeddings WHERE response_id = ?1", params![id])?;
            tx.execute("DELETE FROM attachments WHERE response_id = ?1", params![id])?;
            tx.execute("DELETE FROM summaries WHERE response_id = ?1", params![id])?;
            tx.execute(
                "DELETE FROM responses WHERE id = ?1 AND conversation_id = ?2",
                params![id, conv],
            )?;
            tx.commit()?;

            debug!(response_id = %id, conversation_id = %conv, "response deleted");
            Ok(Ok(()))
        })
        .await
        .map_err(map_tr_err)?
}

/// Responses with fewer than two embedding rows, oldest first.
pub async fn responses_missing_embeddings(
    db: &Database,
    limit: usize,
) -> Result<Vec<Response>, ArborError> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    db.connection()
        .call(move |conn| -> Result<_, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RESPONSE_COLUMNS} FROM responses r
                 WHERE (SELECT COUNT(*) FROM embeddings e WHERE e.response_id = r.id) < 2
                 ORDER BY r.datetime_utc ASC, r.seq ASC
                 LIMIT ?1"
            ))?;
            let rows = stmt.query_map(params![limit], response_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
