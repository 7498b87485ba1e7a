// SPDX-FileCopyrightText: 2026 Arbor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hybrid retrieval over the conversation store.
//!
//! [`HybridRanker`] fans a query out to the vector and lexical indexes and
//! merges the two candidate lists with one of the strategies in [`fusion`].

pub mod fusion;
pub mod ranker;

pub use ranker::HybridRanker;
