// SPDX-FileCopyrightText: 2026 Arbor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for a full branching session.
//!
//! Each test builds an isolated TestHarness with temp SQLite and mock
//! gateways, then drives it the way the CLI does.

use arbor_conversation::{TurnOutcome, TurnRequest};
use arbor_core::types::{FieldKind, SearchMode};
use arbor_test_utils::{MockReply, TestHarness};
use serial_test::serial;

const IMAGE_URI: &str = "data:image/png;base64,iVBORw0KGgo=";

// ---- Branching session ----

#[tokio::test]
async fn branching_session_end_to_end() {
    let harness = TestHarness::builder()
        .with_replies(vec![
            MockReply::text("rust is a systems language"),
            MockReply::text("ownership moves values"),
            MockReply::text("borrowing lends references"),
        ])
        .build()
        .await
        .unwrap();

    let root = harness.ask("tell me about rust").await.unwrap();
    let second = harness.reply(&root, "and ownership?").await.unwrap();

    let request = harness
        .service
        .regenerate_request(&root.conversation_id, &second.id)
        .await
        .unwrap();
    let (outcome, _) = harness.run(request).await.unwrap();
    let TurnOutcome::Completed(sibling) = outcome else {
        panic!("regeneration was cancelled");
    };
    assert_eq!(sibling.parent_id.as_deref(), Some(root.id.as_str()));
    assert_eq!(sibling.prompt, "and ownership?");

    let responses = harness
        .service
        .list_responses(&root.conversation_id)
        .await
        .unwrap();
    assert_eq!(responses.len(), 3);
    harness
        .service
        .validate_conversation(&root.conversation_id)
        .await
        .unwrap();

    let chain = harness
        .service
        .chain(&root.conversation_id, &sibling.id)
        .await
        .unwrap();
    assert_eq!(chain.len(), 4);
    assert_eq!(chain[3].content, "borrowing lends references");
    assert!(chain.iter().all(|m| m.content != "ownership moves values"));

    let hits = harness
        .service
        .search("ownership", Some(10), 0, SearchMode::Text)
        .await
        .unwrap();
    assert!(hits.iter().any(|h| h.response_id == second.id));
    assert!(
        hits.iter()
            .any(|h| h.response_id == sibling.id && h.matched_field == FieldKind::Prompt)
    );

    harness
        .service
        .delete_conversation(&root.conversation_id)
        .await
        .unwrap();
    assert!(harness.service.list_conversations().await.unwrap().is_empty());
}

#[tokio::test]
async fn image_turn_round_trips_through_storage() {
    let harness = TestHarness::new().await.unwrap();

    let request = TurnRequest {
        attachments: vec![IMAGE_URI.to_string()],
        ..TurnRequest::new("what is in this picture?")
    };
    let (outcome, _) = harness.run(request).await.unwrap();
    let TurnOutcome::Completed(response) = outcome else {
        panic!("turn was cancelled");
    };
    assert_eq!(response.attachments.len(), 1);
    assert_eq!(response.attachments[0].media_type, "image/png");
    assert_eq!(response.attachments[0].data_uri, IMAGE_URI);

    let stored = harness
        .service
        .list_responses(&response.conversation_id)
        .await
        .unwrap();
    assert_eq!(stored[0].attachments.len(), 1);
    assert_eq!(stored[0].attachments[0].data_uri, IMAGE_URI);

    // The follow-up replays the image with the first user message.
    harness.reply(&response, "and the colors?").await.unwrap();
    let requests = harness.completion.requests().await;
    let replayed = &requests[1].messages[0];
    assert_eq!(replayed.attachments.len(), 1);
}

#[tokio::test]
async fn hybrid_search_finds_semantic_and_lexical_matches() {
    let harness = TestHarness::builder()
        .with_replies(vec![
            MockReply::text("tomatoes need full sun"),
            MockReply::text("the borrow checker rejects aliasing"),
        ])
        .build()
        .await
        .unwrap();
    harness.ask("how do I grow tomatoes").await.unwrap();
    let rust = harness.ask("why does the borrow checker complain").await.unwrap();

    let hits = harness
        .service
        .search("borrow checker", None, 0, SearchMode::Combined)
        .await
        .unwrap();
    assert!(!hits.is_empty());
    assert_eq!(hits[0].response_id, rust.id);
}

// ---- Configuration ----

#[test]
#[serial]
fn config_file_and_env_overrides_combine() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("arbor.toml");
    std::fs::write(
        &path,
        "[app]\nlog_level = \"debug\"\n\n[search]\ndefault_limit = 5\n",
    )
    .unwrap();

    // SAFETY: serialized with every other test touching the environment.
    unsafe { std::env::set_var("ARBOR_SEARCH_DEFAULT_LIMIT", "7") };
    let loaded = arbor_config::load_and_validate_path(&path);
    unsafe { std::env::remove_var("ARBOR_SEARCH_DEFAULT_LIMIT") };

    let config = loaded.unwrap();
    assert_eq!(config.app.log_level, "debug");
    assert_eq!(config.search.default_limit, 7);
}

#[test]
#[serial]
fn invalid_config_file_reports_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("arbor.toml");
    std::fs::write(&path, "[app]\ndefault_model = \"not-a-model\"\n").unwrap();

    let errors = arbor_config::load_and_validate_path(&path).unwrap_err();
    assert!(!errors.is_empty());
}
