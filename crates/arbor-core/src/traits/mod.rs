// SPDX-FileCopyrightText: 2026 Arbor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod completion;
pub mod embedding;
pub mod storage;

pub use adapter::PluginAdapter;
pub use completion::{CompletionAdapter, CompletionStream};
pub use embedding::EmbeddingAdapter;
pub use storage::StorageAdapter;
