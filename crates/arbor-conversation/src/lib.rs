// SPDX-FileCopyrightText: 2026 Arbor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation trees, turns and enrichment for Arbor.
//!
//! This crate rebuilds message chains from stored response nodes, runs new
//! turns against a completion gateway, and keeps embeddings and summaries
//! up to date on a best-effort basis.

pub mod catalog;
pub mod enrichment;
pub mod service;
pub mod tree;
pub mod turn;

pub use catalog::{ModelAvailability, ModelCatalog};
pub use enrichment::{BackfillReport, Enricher};
pub use service::ConversationService;
pub use tree::{
    Continuation, build_chain, collect_subtree, edit_context, regeneration_context, validate_tree,
};
pub use turn::{TurnEvent, TurnOutcome, TurnRequest};
