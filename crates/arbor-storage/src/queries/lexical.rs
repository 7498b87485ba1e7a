// SPDX-FileCopyrightText: 2026 Arbor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lexical index: FTS5 full-text search over prompts and responses.
//!
//! The `responses_fts` table is external-content and kept in sync by
//! triggers; nothing here writes to it except [`rebuild_lexical_index`].

use arbor_core::ArborError;
use arbor_core::types::{FieldKind, IndexHit};
use rusqlite::params;
use tracing::info;

use crate::database::{Database, map_tr_err};
use crate::queries::responses::{RESPONSE_COLUMNS, RESPONSE_COLUMN_COUNT, response_from_row};

/// Turn free text into a safe FTS5 MATCH expression.
///
/// Every character other than alphanumerics, `_` and whitespace is dropped;
/// each remaining token is quoted, so tokens are ANDed. Returns `None` when
/// nothing searchable is left.
pub fn sanitize_query(query: &str) -> Option<String> {
    let cleaned: String = query
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();
    let tokens: Vec<String> = cleaned
        .split_whitespace()
        .map(|t| format!("\"{t}\""))
        .collect();
    if tokens.is_empty() {
        None
    } else {
        Some(tokens.join(" "))
    }
}

/// Best bm25 matches, most relevant (lowest score) first.
///
/// `matched_field` is whichever column scores better on its own; ties go
/// to the prompt.
pub async fn search_text(
    db: &Database,
    query: &str,
    limit: usize,
) -> Result<Vec<IndexHit>, ArborError> {
    let Some(expr) = sanitize_query(query) else {
        return Ok(Vec::new());
    };
    if limit == 0 {
        return Ok(Vec::new());
    }
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);

    db.connection()
        .call(move |conn| -> Result<_, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RESPONSE_COLUMNS},
                        bm25(responses_fts) AS score,
                        bm25(responses_fts, 1.0, 0.0) AS prompt_score,
                        bm25(responses_fts, 0.0, 1.0) AS response_score
                 FROM responses_fts
                 JOIN responses r ON r.seq = responses_fts.rowid
                 WHERE responses_fts MATCH ?1
                 ORDER BY score ASC, r.seq ASC
                 LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![expr, limit], |row| {
                let score: f64 = row.get(RESPONSE_COLUMN_COUNT)?;
                let prompt_score: f64 = row.get(RESPONSE_COLUMN_COUNT + 1)?;
                let response_score: f64 = row.get(RESPONSE_COLUMN_COUNT + 2)?;
                let matched_field = if response_score < prompt_score {
                    FieldKind::Response
                } else {
                    FieldKind::Prompt
                };
                Ok(IndexHit {
                    response: response_from_row(row)?,
                    matched_field,
                    score,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Rebuild the lexical index from the responses table.
pub async fn rebuild_lexical_index(db: &Database) -> Result<(), ArborError> {
    db.connection()
        .call(|conn| -> Result<_, rusqlite::Error> {
            conn.execute(
                "INSERT INTO responses_fts(responses_fts) VALUES ('rebuild')",
                [],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;
    info!("lexical index rebuilt");
    Ok(())
}
