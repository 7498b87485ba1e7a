// SPDX-FileCopyrightText: 2026 Arbor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Arbor integration tests.
//!
//! Provides mock gateways and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MockEmbedder`] - Bag-of-words embedder with switchable failures
//! - [`MockCompletion`] - Completion gateway with queued replies
//! - [`TestHarness`] - Temp database plus the real service wired to the mocks

pub mod harness;
pub mod mock_completion;
pub mod mock_embedder;

pub use harness::{TEST_DIMENSIONS, TestHarness};
pub use mock_completion::{MockCompletion, MockReply};
pub use mock_embedder::MockEmbedder;
