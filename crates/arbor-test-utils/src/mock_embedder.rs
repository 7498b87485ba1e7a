// SPDX-FileCopyrightText: 2026 Arbor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic embedding adapter for tests.
//!
//! Each text becomes a bag-of-words vector: every lowercase alphanumeric
//! token adds 1.0 to a hashed bucket. Texts sharing words land close in
//! cosine distance, so vector search behaves plausibly without a model.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use arbor_core::traits::adapter::PluginAdapter;
use arbor_core::traits::embedding::EmbeddingAdapter;
use arbor_core::types::{AdapterType, EmbeddingInput, EmbeddingOutput, HealthStatus};
use arbor_core::ArborError;

/// A mock embedder with switchable failures.
pub struct MockEmbedder {
    dimensions: usize,
    failing: AtomicBool,
    fail_markers: Mutex<Vec<String>>,
    zero_markers: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl MockEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
            failing: AtomicBool::new(false),
            fail_markers: Mutex::new(Vec::new()),
            zero_markers: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Fail any call whose input contains `marker`.
    pub async fn fail_on(&self, marker: impl Into<String>) {
        self.fail_markers.lock().await.push(marker.into());
    }

    /// Answer with all-zero vectors for any call whose input contains `marker`.
    pub async fn zero_on(&self, marker: impl Into<String>) {
        self.zero_markers.lock().await.push(marker.into());
    }

    /// Number of `embed` calls so far, including failed ones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The vector this mock produces for `text`.
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dimensions];
        let tokens = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty());
        for token in tokens {
            let bucket = fnv1a(&token.to_lowercase()) % self.dimensions as u64;
            v[bucket as usize] += 1.0;
        }
        if v.iter().all(|x| *x == 0.0) {
            v[self.dimensions - 1] = 1.0;
        }
        v
    }
}

fn fnv1a(s: &str) -> u64 {
    s.bytes().fold(0xcbf29ce484222325, |h, b| {
        (h ^ u64::from(b)).wrapping_mul(0x100000001b3)
    })
}

#[async_trait]
impl PluginAdapter for MockEmbedder {
    fn name(&self) -> &str {
        "mock-embedder"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, ArborError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ArborError> {
        Ok(())
    }
}

#[async_trait]
impl EmbeddingAdapter for MockEmbedder {
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, ArborError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ArborError::gateway("mock embedder is offline"));
        }
        {
            let markers = self.fail_markers.lock().await;
            if input
                .texts
                .iter()
                .any(|t| markers.iter().any(|m| t.contains(m.as_str())))
            {
                return Err(ArborError::gateway("mock embedder rejected input"));
            }
        }
        let zeroed = {
            let markers = self.zero_markers.lock().await;
            input
                .texts
                .iter()
                .any(|t| markers.iter().any(|m| t.contains(m.as_str())))
        };
        if zeroed {
            return Ok(EmbeddingOutput {
                embeddings: vec![vec![0.0; self.dimensions]; input.texts.len()],
                dimensions: self.dimensions,
                model: "mock-embed".to_string(),
            });
        }

        Ok(EmbeddingOutput {
            embeddings: input.texts.iter().map(|t| self.vector_for(t)).collect(),
            dimensions: self.dimensions,
            model: "mock-embed".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_words_share_buckets() {
        let e = MockEmbedder::new(64);
        let a = e.vector_for("hello world");
        let b = e.vector_for("Hello there");
        let dot: f32 = a.iter().zip(&b).map(|(x, y)| x * y).sum();
        assert!(dot >= 1.0);
        assert_eq!(a, e.vector_for("hello world"));
    }

    #[test]
    fn blank_text_is_not_a_zero_vector() {
        let e = MockEmbedder::new(8);
        assert_eq!(e.vector_for("  ...  ")[7], 1.0);
    }

    #[tokio::test]
    async fn failures_are_switchable() {
        let e = MockEmbedder::new(4);
        let input = || EmbeddingInput {
            texts: vec!["ok".into(), "poison pill".into()],
        };
        assert_eq!(e.embed(input()).await.unwrap().embeddings.len(), 2);

        e.fail_on("poison").await;
        assert!(matches!(e.embed(input()).await, Err(ArborError::Gateway { .. })));

        let clean = EmbeddingInput {
            texts: vec!["fine".into()],
        };
        e.set_failing(true);
        assert!(e.embed(clean.clone()).await.is_err());
        e.set_failing(false);
        assert!(e.embed(clean).await.is_ok());
        assert_eq!(e.calls(), 4);
    }
}
