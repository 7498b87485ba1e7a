// SPDX-FileCopyrightText: 2026 Arbor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Completion adapter trait for language-model integrations.

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::error::ArborError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{CompletionEvent, CompletionRequest, CompletionResponse};

/// A boxed stream of completion events.
pub type CompletionStream =
    Pin<Box<dyn Stream<Item = Result<CompletionEvent, ArborError>> + Send>>;

/// Adapter for language-model completion gateways.
///
/// Supports both single-shot completion and streaming responses.
#[async_trait]
pub trait CompletionAdapter: PluginAdapter {
    /// Sends a completion request and returns the full response.
    async fn complete(&self, request: CompletionRequest)
    -> Result<CompletionResponse, ArborError>;

    /// Sends a completion request and returns a stream of events.
    async fn stream(&self, request: CompletionRequest) -> Result<CompletionStream, ArborError>;

    /// Models the gateway can serve right now, when it can tell.
    ///
    /// `None` means the gateway has no way to list models.
    async fn installed_models(&self) -> Result<Option<Vec<String>>, ArborError> {
        Ok(None)
    }
}
