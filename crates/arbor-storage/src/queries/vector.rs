// SPDX-FileCopyrightText: 2026 Arbor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vector index: embedding BLOB codec and cosine nearest-neighbour search.

use arbor_core::ArborError;
use arbor_core::types::{FieldKind, IndexHit};
use rusqlite::params;
use std::str::FromStr;

use crate::database::{Database, map_tr_err};
use crate::queries::responses::{RESPONSE_COLUMNS, RESPONSE_COLUMN_COUNT, response_from_row};

/// Encode a vector as a little-endian f32 BLOB.
pub fn vec_to_blob(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode a little-endian f32 BLOB. Trailing bytes that do not form a
/// whole f32 are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// True when every component is zero. Cosine distance is undefined for
/// such vectors.
pub fn is_zero_norm(vector: &[f32]) -> bool {
    vector.iter().all(|v| *v == 0.0)
}

/// Reject vectors that cannot take part in cosine search.
pub fn ensure_searchable(kind: FieldKind, vector: &[f32]) -> Result<(), ArborError> {
    if vector.is_empty() {
        return Err(ArborError::Validation(format!(
            "{} embedding has no components",
            kind.as_str()
        )));
    }
    if is_zero_norm(vector) {
        return Err(ArborError::Validation(format!(
            "{} embedding of {} dimensions has zero norm",
            kind.as_str(),
            vector.len()
        )));
    }
    Ok(())
}

/// Nearest stored embeddings by cosine distance, ascending.
///
/// Only embeddings with the query's dimensionality take part. One response
/// may appear twice (prompt and response field); fusion dedupes. Rows whose
/// distance is undefined (zero-norm vectors) are skipped.
pub async fn search_vector(
    db: &Database,
    query: &[f32],
    limit: usize,
) -> Result<Vec<IndexHit>, ArborError> {
    if limit == 0 || is_zero_norm(query) {
        return Ok(Vec::new());
    }
    let blob = vec_to_blob(query);
    let byte_len = i64::try_from(blob.len()).unwrap_or(i64::MAX);
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);

    db.connection()
        .call(move |conn| -> Result<_, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT * FROM (
                     SELECT {RESPONSE_COLUMNS}, e.type,
                            vec_distance_cosine(e.embedding, ?1) AS distance,
                            e.id AS embedding_id
                     FROM embeddings e
                     JOIN responses r ON r.id = e.response_id
                     WHERE length(e.embedding) = ?2
                 )
                 WHERE distance IS NOT NULL
                 ORDER BY distance ASC, embedding_id ASC
                 LIMIT ?3"
            ))?;
            let rows = stmt.query_map(params![blob, byte_len, limit], |row| {
                let response = response_from_row(row)?;
                let kind: String = row.get(RESPONSE_COLUMN_COUNT)?;
                let matched_field = FieldKind::from_str(&kind).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        RESPONSE_COLUMN_COUNT,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;
                Ok(IndexHit {
                    response,
                    matched_field,
                    score: row.get(RESPONSE_COLUMN_COUNT + 1)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
