// SPDX-FileCopyrightText: 2026 Arbor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hybrid ranker against a real SQLite store.

use std::collections::HashSet;
use std::sync::Arc;

use arbor_config::model::{FusionStrategy, SearchConfig};
use arbor_core::types::{
    Conversation, FieldKind, NewTurn, Response, SearchMode, TurnEmbeddings,
};
use arbor_core::{ArborError, EmbeddingAdapter};
use arbor_search::HybridRanker;
use arbor_test_utils::{MockReply, TestHarness};

fn ranker(harness: &TestHarness) -> HybridRanker {
    HybridRanker::new(
        Arc::clone(&harness.storage),
        Arc::clone(&harness.embedder) as Arc<dyn EmbeddingAdapter>,
        SearchConfig::default(),
    )
}

#[tokio::test]
async fn hello_matches_the_prompt_field() {
    let harness = TestHarness::new().await.unwrap();
    let response = Response {
        id: "r1".into(),
        conversation_id: "chat-1".into(),
        parent_id: None,
        model: "llama3.2".into(),
        provider: "ollama".into(),
        prompt: "hello".into(),
        system_prompt: None,
        response_text: "hi there".into(),
        temperature: 0.7,
        top_p: 1.0,
        max_tokens: None,
        duration_ms: 12,
        datetime_utc: arbor_core::now_utc(),
        attachments: Vec::new(),
    };
    let turn = NewTurn {
        conversation: Some(Conversation {
            id: "chat-1".into(),
            title: "hello".into(),
            created_at: arbor_core::now_utc(),
        }),
        embeddings: Some(TurnEmbeddings {
            model: "mock-embed".into(),
            prompt: Some(harness.embedder.vector_for("hello")),
            response: Some(harness.embedder.vector_for("hi there")),
        }),
        response,
        attachments: Vec::new(),
    };
    harness.storage.insert_turn(&turn).await.unwrap();

    let hits = ranker(&harness)
        .search("hello", 10, 0, SearchMode::Text)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].response_id, "r1");
    assert_eq!(hits[0].conversation_id, "chat-1");
    assert_eq!(hits[0].matched_field, FieldKind::Prompt);

    let combined = ranker(&harness)
        .search("hello", 10, 0, SearchMode::Combined)
        .await
        .unwrap();
    assert_eq!(combined.len(), 1, "r1 must appear once: {combined:?}");
}

async fn seeded(count: usize) -> TestHarness {
    let replies = (0..count)
        .map(|i| MockReply::text(format!("answer number {i} about rust")))
        .collect();
    let harness = TestHarness::builder()
        .with_replies(replies)
        .build()
        .await
        .unwrap();
    for i in 0..count {
        harness
            .ask(&format!("question {i} about rust ownership"))
            .await
            .unwrap();
    }
    harness
}

#[tokio::test]
async fn combined_results_have_no_duplicates() {
    let harness = seeded(8).await;
    let hits = ranker(&harness)
        .search("rust ownership", 20, 0, SearchMode::Combined)
        .await
        .unwrap();
    let ids: HashSet<_> = hits.iter().map(|h| h.response_id.as_str()).collect();
    assert_eq!(ids.len(), hits.len());
    assert_eq!(hits.len(), 8);
    assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
}

#[tokio::test]
async fn consecutive_pages_are_disjoint() {
    let harness = seeded(12).await;
    let ranker = ranker(&harness);

    let first = ranker
        .search("rust", 5, 0, SearchMode::Combined)
        .await
        .unwrap();
    let second = ranker
        .search("rust", 5, 5, SearchMode::Combined)
        .await
        .unwrap();
    assert_eq!(first.len(), 5);
    assert_eq!(second.len(), 5);

    let a: HashSet<_> = first.iter().map(|h| &h.response_id).collect();
    let b: HashSet<_> = second.iter().map(|h| &h.response_id).collect();
    assert!(a.is_disjoint(&b));

    let again = ranker
        .search("rust", 5, 0, SearchMode::Combined)
        .await
        .unwrap();
    assert_eq!(first, again);
}

#[tokio::test]
async fn text_hits_survive_an_empty_vector_branch() {
    let harness = TestHarness::builder()
        .without_embeddings()
        .with_replies(vec![MockReply::text("borrow checker explained")])
        .build()
        .await
        .unwrap();
    harness.ask("what is the borrow checker").await.unwrap();

    let hits = ranker(&harness)
        .search("borrow checker", 10, 0, SearchMode::Combined)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert!(hits[0].distance.is_finite());
}

#[tokio::test]
async fn embedding_failure_fails_vector_and_combined_search() {
    let harness = seeded(2).await;
    harness.embedder.set_failing(true);
    let ranker = ranker(&harness);

    for mode in [SearchMode::Vector, SearchMode::Combined] {
        let err = ranker.search("rust", 5, 0, mode).await.unwrap_err();
        assert!(matches!(err, ArborError::Gateway { .. }), "{mode}: {err}");
    }
    let text = ranker.search("rust", 5, 0, SearchMode::Text).await.unwrap();
    assert_eq!(text.len(), 2);
}

#[tokio::test]
async fn blank_query_does_not_touch_the_embedder() {
    let harness = TestHarness::new().await.unwrap();
    let before = harness.embedder.calls();
    let hits = ranker(&harness)
        .search("   ", 10, 0, SearchMode::Combined)
        .await
        .unwrap();
    assert!(hits.is_empty());
    assert_eq!(harness.embedder.calls(), before);
}

#[tokio::test]
async fn reciprocal_rank_fusion_is_selectable() {
    let harness = seeded(6).await;
    let ranker = HybridRanker::new(
        Arc::clone(&harness.storage),
        Arc::clone(&harness.embedder) as Arc<dyn EmbeddingAdapter>,
        SearchConfig {
            fusion: FusionStrategy::ReciprocalRank,
            ..SearchConfig::default()
        },
    );
    let hits = ranker
        .search("rust ownership", 10, 0, SearchMode::Combined)
        .await
        .unwrap();
    assert_eq!(hits.len(), 6);
    assert!(hits.iter().all(|h| h.distance > 0.9 && h.distance < 1.0));
}
