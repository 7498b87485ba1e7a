// SPDX-FileCopyrightText: 2026 Arbor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding row queries.

use std::str::FromStr;

use arbor_core::ArborError;
use arbor_core::types::{Embedding, FieldKind, TurnEmbeddings};
use rusqlite::{OptionalExtension, params};
use tracing::debug;

use crate::database::{Database, map_tr_err};
use crate::queries::responses::response_conversation;
use crate::queries::vector::{blob_to_vec, ensure_searchable, vec_to_blob};

/// Insert or replace the embedding of one field of a response.
pub(crate) fn insert_embedding_row(
    conn: &rusqlite::Connection,
    response_id: &str,
    kind: FieldKind,
    vector: &[f32],
    model: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO embeddings (response_id, type, embedding, embedding_model)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (response_id, type) DO UPDATE SET
             embedding = excluded.embedding,
             embedding_model = excluded.embedding_model",
        params![response_id, kind.as_str(), vec_to_blob(vector), model],
    )?;
    Ok(())
}

/// Check every present vector before it is written.
pub(crate) fn validate_embeddings(embeddings: &TurnEmbeddings) -> Result<(), ArborError> {
    embeddings
        .iter()
        .try_for_each(|(kind, vector)| ensure_searchable(kind, vector))
}

/// Upsert every present vector of `embeddings` for an existing response.
pub async fn upsert_embeddings(
    db: &Database,
    response_id: &str,
    embeddings: &TurnEmbeddings,
) -> Result<(), ArborError> {
    if embeddings.is_empty() {
        return Ok(());
    }
    validate_embeddings(embeddings)?;
    let id = response_id.to_string();
    let embeddings = embeddings.clone();
    db.connection()
        .call(move |conn| -> Result<Result<(), ArborError>, rusqlite::Error> {
            let tx = conn.transaction()?;
            if response_conversation(&tx, &id)?.is_none() {
                return Ok(Err(ArborError::NotFound {
                    entity: "response",
                    id,
                }));
            }
            for (kind, vector) in embeddings.iter() {
                insert_embedding_row(&tx, &id, kind, vector, &embeddings.model)?;
            }
            tx.commit()?;
            debug!(response_id = %id, model = %embeddings.model, "embeddings upserted");
            Ok(Ok(()))
        })
        .await
        .map_err(map_tr_err)?
}

/// The stored embedding of one field, if any.
pub async fn get_embedding(
    db: &Database,
    response_id: &str,
    kind: FieldKind,
) -> Result<Option<Embedding>, ArborError> {
    let id = response_id.to_string();
    db.connection()
        .call(move |conn| -> Result<_, rusqlite::Error> {
            conn.query_row(
                "SELECT response_id, type, embedding, embedding_model
                 FROM embeddings WHERE response_id = ?1 AND type = ?2",
                params![id, kind.as_str()],
                |row| {
                    let kind: String = row.get(1)?;
                    let blob: Vec<u8> = row.get(2)?;
                    Ok(Embedding {
                        response_id: row.get(0)?,
                        kind: FieldKind::from_str(&kind).map_err(|e| {
                            rusqlite::Error::FromSqlConversionFailure(
                                1,
                                rusqlite::types::Type::Text,
                                Box::new(e),
                            )
                        })?,
                        vector: blob_to_vec(&blob),
                        embedding_model: row.get(3)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::turns::insert_turn;
    use crate::test_support::{make_response, make_turn, open_test_db};

    #[tokio::test]
    async fn stored_vectors_read_back_bit_identical() {
        let (db, _store, _dir) = open_test_db().await;
        let v = vec![0.1_f32, -3.5e-8, f32::MAX, 1.0 / 3.0];
        let mut turn = make_turn(make_response("a", "c1", None), true);
        turn.embeddings = Some(TurnEmbeddings {
            model: "nomic-embed-text".into(),
            prompt: Some(v.clone()),
            response: None,
        });
        insert_turn(&db, &turn).await.unwrap();

        let got = get_embedding(&db, "a", FieldKind::Prompt)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got.kind, FieldKind::Prompt);
        assert_eq!(got.embedding_model, "nomic-embed-text");
        let bits: Vec<u32> = got.vector.iter().map(|f| f.to_bits()).collect();
        let want: Vec<u32> = v.iter().map(|f| f.to_bits()).collect();
        assert_eq!(bits, want);
        assert!(get_embedding(&db, "a", FieldKind::Response)
            .await
            .unwrap()
            .is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn upsert_replaces_instead_of_duplicating() {
        let (db, _store, _dir) = open_test_db().await;
        insert_turn(&db, &make_turn(make_response("a", "c1", None), true))
            .await
            .unwrap();

        let fresh = TurnEmbeddings {
            model: "other".into(),
            prompt: Some(vec![9.0, 9.0, 9.0]),
            response: Some(vec![8.0, 8.0, 8.0]),
        };
        upsert_embeddings(&db, "a", &fresh).await.unwrap();

        let count: i64 = db
            .connection()
            .call(|conn| -> Result<_, rusqlite::Error> {
                conn.query_row("SELECT COUNT(*) FROM embeddings", [], |r| r.get(0))
            })
            .await
            .unwrap();
        assert_eq!(count, 2);
        let got = get_embedding(&db, "a", FieldKind::Response)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got.vector, vec![8.0, 8.0, 8.0]);
        assert_eq!(got.embedding_model, "other");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn upsert_for_unknown_response_is_not_found() {
        let (db, _store, _dir) = open_test_db().await;
        let e = TurnEmbeddings {
            model: "m".into(),
            prompt: Some(vec![1.0]),
            response: None,
        };
        let err = upsert_embeddings(&db, "ghost", &e).await.unwrap_err();
        assert!(matches!(err, ArborError::NotFound { entity: "response", .. }));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn zero_norm_upsert_is_rejected_and_keeps_old_vectors() {
        let (db, _store, _dir) = open_test_db().await;
        insert_turn(&db, &make_turn(make_response("a", "c1", None), true))
            .await
            .unwrap();

        let zero = TurnEmbeddings {
            model: "m".into(),
            prompt: Some(vec![2.0, 0.0, 0.0]),
            response: Some(vec![0.0, 0.0, 0.0]),
        };
        let err = upsert_embeddings(&db, "a", &zero).await.unwrap_err();
        assert!(matches!(err, ArborError::Validation(_)));

        let prompt = get_embedding(&db, "a", FieldKind::Prompt)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(prompt.vector, vec![1.0, 0.0, 0.0]);
        db.close().await.unwrap();
    }
}
