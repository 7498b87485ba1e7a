// SPDX-FileCopyrightText: 2026 Arbor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for the conversation store.
//!
//! Async functions take `&Database` and run one closure on the connection
//! thread. `*_row` helpers are synchronous and meant to be composed inside
//! a transaction.

pub mod attachments;
pub mod conversations;
pub mod embeddings;
pub mod lexical;
pub mod responses;
pub mod summaries;
pub mod turns;
pub mod vector;
