// SPDX-FileCopyrightText: 2026 Arbor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rank fusion of vector and lexical hit lists.
//!
//! Every function here is pure: the same inputs always give the same
//! output order, no response id appears twice and empty inputs are fine.
//! Lower distance is better throughout.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use arbor_core::types::{IndexHit, SimilarResponse};

/// Keep the first occurrence of each response id.
fn dedupe(scored: impl IntoIterator<Item = (IndexHit, f64)>) -> Vec<SimilarResponse> {
    let mut seen = std::collections::HashSet::new();
    scored
        .into_iter()
        .filter(|(hit, _)| seen.insert(hit.response.id.clone()))
        .map(|(hit, distance)| SimilarResponse::from_hit(hit, distance))
        .collect()
}

/// Single-index results: raw scores, input order, deduplicated.
pub fn raw(hits: Vec<IndexHit>) -> Vec<SimilarResponse> {
    dedupe(hits.into_iter().map(|h| {
        let score = h.score;
        (h, score)
    }))
}

/// Divide each score by `max(max_score, 1)`.
fn normalize(hits: Vec<IndexHit>) -> impl Iterator<Item = (IndexHit, f64)> {
    let max = hits
        .iter()
        .map(|h| h.score)
        .fold(f64::NEG_INFINITY, f64::max);
    let denominator = max.max(1.0);
    hits.into_iter().map(move |h| {
        let score = h.score / denominator;
        (h, score)
    })
}

/// Max-normalized merge.
///
/// Each list is scaled by its own maximum (floored at 1), the lists are
/// concatenated vector-first and stably sorted ascending, then deduplicated.
/// bm25 scores are negative, so lexical matches usually lead.
pub fn max_normalized(vector: Vec<IndexHit>, text: Vec<IndexHit>) -> Vec<SimilarResponse> {
    let mut merged: Vec<(IndexHit, f64)> = normalize(vector).chain(normalize(text)).collect();
    merged.sort_by(|a, b| a.1.total_cmp(&b.1));
    dedupe(merged)
}

/// Reciprocal rank fusion.
///
/// A response scores `sum(1 / (k + rank))` over the lists it appears in
/// (rank is 1-based, each response counted once per list) and is reported
/// with distance `1 - score`. The matched field comes from its first
/// appearance, vector list first. Ties keep first-appearance order.
pub fn reciprocal_rank(vector: Vec<IndexHit>, text: Vec<IndexHit>, k: f64) -> Vec<SimilarResponse> {
    let mut order: Vec<IndexHit> = Vec::new();
    let mut scores: HashMap<String, (usize, f64)> = HashMap::new();

    for list in [vector, text] {
        let mut rank = 0usize;
        let mut counted = std::collections::HashSet::new();
        for hit in list {
            if !counted.insert(hit.response.id.clone()) {
                continue;
            }
            rank += 1;
            let contribution = 1.0 / (k + rank as f64);
            match scores.entry(hit.response.id.clone()) {
                Entry::Occupied(mut e) => e.get_mut().1 += contribution,
                Entry::Vacant(e) => {
                    e.insert((order.len(), contribution));
                    order.push(hit);
                }
            }
        }
    }

    let mut fused: Vec<(IndexHit, f64)> = order
        .into_iter()
        .map(|hit| {
            let score = scores.get(&hit.response.id).map_or(0.0, |(_, s)| *s);
            (hit, 1.0 - score)
        })
        .collect();
    fused.sort_by(|a, b| a.1.total_cmp(&b.1));
    dedupe(fused)
}

/// The `offset..offset + limit` window of a ranked list.
pub fn paginate<T>(items: Vec<T>, offset: usize, limit: usize) -> Vec<T> {
    items.into_iter().skip(offset).take(limit).collect()
}
