// SPDX-FileCopyrightText: 2026 Arbor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The atomic turn write: conversation, response, embeddings, attachments.

use arbor_core::types::NewTurn;
use arbor_core::{ArborError, now_utc};
use tracing::debug;

use crate::database::{Database, map_tr_err};
use crate::queries::attachments::insert_attachment_row;
use crate::queries::conversations::{conversation_exists, insert_conversation_row};
use crate::queries::embeddings::{insert_embedding_row, validate_embeddings};
use crate::queries::responses::{insert_response_row, response_conversation};

/// Write one turn in a single transaction.
///
/// The parent, when given, must already exist in the same conversation.
/// Any failure rolls the whole turn back.
pub async fn insert_turn(db: &Database, turn: &NewTurn) -> Result<(), ArborError> {
    if let Some(conv) = &turn.conversation {
        if conv.id != turn.response.conversation_id {
            return Err(ArborError::Validation(format!(
                "response {} belongs to conversation {}, not {}",
                turn.response.id, turn.response.conversation_id, conv.id
            )));
        }
    }
    if turn.response.parent_id.as_deref() == Some(turn.response.id.as_str()) {
        return Err(ArborError::Validation(format!(
            "response {} cannot be its own parent",
            turn.response.id
        )));
    }
    if let Some(embeddings) = &turn.embeddings {
        validate_embeddings(embeddings)?;
    }

    let turn = turn.clone();
    db.connection()
        .call(move |conn| -> Result<Result<(), ArborError>, rusqlite::Error> {
            let tx = conn.transaction()?;
            let response = &turn.response;

            match &turn.conversation {
                Some(conv) => insert_conversation_row(&tx, conv)?,
                None => {
                    if !conversation_exists(&tx, &response.conversation_id)? {
                        return Ok(Err(ArborError::NotFound {
                            entity: "conversation",
                            id: response.conversation_id.clone(),
                        }));
                    }
                }
            }

            if let Some(parent_id) = &response.parent_id {
                match response_conversation(&tx, parent_id)? {
                    Some(conv) if conv == response.conversation_id => {}
                    Some(conv) => {
                        return Ok(Err(ArborError::Validation(format!(
                            "parent {parent_id} belongs to conversation {conv}, not {}",
                            response.conversation_id
                        ))));
                    }
                    None => {
                        return Ok(Err(ArborError::Validation(format!(
                            "parent {parent_id} does not exist"
                        ))));
                    }
                }
            }

            insert_response_row(&tx, response)?;

            let mut embedded = 0usize;
            if let Some(embeddings) = &turn.embeddings {
                for (kind, vector) in embeddings.iter() {
                    insert_embedding_row(&tx, &response.id, kind, vector, &embeddings.model)?;
                    embedded += 1;
                }
            }

            let created_at = now_utc();
            for attachment in &turn.attachments {
                insert_attachment_row(&tx, &response.id, attachment, &created_at)?;
            }

            tx.commit()?;
            debug!(
                response_id = %response.id,
                conversation_id = %response.conversation_id,
                new_conversation = turn.conversation.is_some(),
                embeddings = embedded,
                attachments = turn.attachments.len(),
                "turn persisted"
            );
            Ok(Ok(()))
        })
        .await
        .map_err(map_tr_err)?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::conversations::get_conversation;
    use crate::queries::responses::get_response;
    use crate::test_support::{make_response, make_turn, open_test_db};
    use arbor_core::types::StoredAttachment;

    async fn count(db: &Database, table: &'static str) -> i64 {
        db.connection()
            .call(move |conn| -> Result<_, rusqlite::Error> {
                conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn new_conversation_turn_writes_everything() {
        let (db, _store, _dir) = open_test_db().await;
        let mut turn = make_turn(make_response("a", "c1", None), true);
        turn.attachments = vec![StoredAttachment {
            id: "att1".into(),
            file_path: "attachments/att1".into(),
            media_type: "image/png".into(),
        }];

        insert_turn(&db, &turn).await.unwrap();

        assert!(get_conversation(&db, "c1").await.unwrap().is_some());
        assert!(get_response(&db, "a").await.unwrap().is_some());
        assert_eq!(count(&db, "embeddings").await, 2);
        assert_eq!(count(&db, "attachments").await, 1);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn parent_in_other_conversation_is_rejected_without_writes() {
        let (db, _store, _dir) = open_test_db().await;
        insert_turn(&db, &make_turn(make_response("a", "c1", None), true))
            .await
            .unwrap();
        insert_turn(&db, &make_turn(make_response("x", "c2", None), true))
            .await
            .unwrap();

        let bad = make_turn(make_response("b", "c2", Some("a")), false);
        let err = insert_turn(&db, &bad).await.unwrap_err();
        assert!(matches!(err, ArborError::Validation(_)));
        assert!(get_response(&db, "b").await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn missing_parent_is_rejected() {
        let (db, _store, _dir) = open_test_db().await;
        let err = insert_turn(&db, &make_turn(make_response("b", "c1", Some("ghost")), true))
            .await
            .unwrap_err();
        assert!(matches!(err, ArborError::Validation(_)));
        // The conversation row was rolled back with the rest of the turn.
        assert!(get_conversation(&db, "c1").await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_response_id_rolls_back_the_turn() {
        let (db, _store, _dir) = open_test_db().await;
        insert_turn(&db, &make_turn(make_response("a", "c1", None), true))
            .await
            .unwrap();

        let dup = make_turn(make_response("a", "c2", None), true);
        let err = insert_turn(&db, &dup).await.unwrap_err();
        assert!(matches!(err, ArborError::Storage { .. }));
        assert!(get_conversation(&db, "c2").await.unwrap().is_none());
        assert_eq!(count(&db, "embeddings").await, 2);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn unknown_existing_conversation_is_not_found() {
        let (db, _store, _dir) = open_test_db().await;
        let err = insert_turn(&db, &make_turn(make_response("a", "nope", None), false))
            .await
            .unwrap_err();
        assert!(matches!(err, ArborError::NotFound { entity: "conversation", .. }));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn mismatched_conversation_ids_fail_validation() {
        let (db, _store, _dir) = open_test_db().await;
        let mut turn = make_turn(make_response("a", "c1", None), true);
        if let Some(c) = turn.conversation.as_mut() {
            c.id = "c9".into();
        }
        let err = insert_turn(&db, &turn).await.unwrap_err();
        assert!(matches!(err, ArborError::Validation(_)));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn zero_norm_embedding_rejects_the_turn() {
        let (db, _store, _dir) = open_test_db().await;
        let mut turn = make_turn(make_response("a", "c1", None), true);
        if let Some(e) = turn.embeddings.as_mut() {
            e.response = Some(vec![0.0, 0.0, 0.0]);
        }
        let err = insert_turn(&db, &turn).await.unwrap_err();
        assert!(matches!(err, ArborError::Validation(_)));
        assert!(get_response(&db, "a").await.unwrap().is_none());
        assert_eq!(count(&db, "embeddings").await, 0);
        db.close().await.unwrap();
    }
}
