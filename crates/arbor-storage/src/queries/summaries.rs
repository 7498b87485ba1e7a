// SPDX-FileCopyrightText: 2026 Arbor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use arbor_core::ArborError;
use arbor_core::types::Summary;
use rusqlite::params;

use crate::database::{Database, map_tr_err};

pub async fn insert_summary(db: &Database, summary: &Summary) -> Result<(), ArborError> {
    let s = summary.clone();
    db.connection()
        .call(move |conn| -> Result<_, rusqlite::Error> {
            conn.execute(
                "INSERT INTO summaries (id, response_id, conversation_id, summary, type, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    s.id,
                    s.response_id,
                    s.conversation_id,
                    s.summary,
                    s.kind,
                    s.created_at
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Summaries of a conversation, oldest first.
pub async fn list_summaries(
    db: &Database,
    conversation_id: &str,
) -> Result<Vec<Summary>, ArborError> {
    let conv = conversation_id.to_string();
    db.connection()
        .call(move |conn| -> Result<_, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT id, response_id, conversation_id, summary, type, created_at
                 FROM summaries WHERE conversation_id = ?1
                 ORDER BY created_at ASC, rowid ASC",
            )?;
            let rows = stmt.query_map(params![conv], |row| {
                Ok(Summary {
                    id: row.get(0)?,
                    response_id: row.get(1)?,
                    conversation_id: row.get(2)?,
                    summary: row.get(3)?,
                    kind: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
