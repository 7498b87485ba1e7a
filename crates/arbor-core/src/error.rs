// SPDX-FileCopyrightText: 2026 Arbor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for Arbor.

use thiserror::Error;

/// The primary error type used across all Arbor adapter traits and core operations.
#[derive(Debug, Error)]
pub enum ArborError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed input rejected before any write happens.
    #[error("validation error: {0}")]
    Validation(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Embedding or completion gateway failures (network, quota, malformed reply).
    #[error("gateway error: {message}")]
    Gateway {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Persisted data violates a structural invariant (e.g. a parent cycle).
    #[error("integrity error: {0}")]
    Integrity(String),

    /// The requested entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ArborError {
    /// Shorthand for a gateway error without an underlying source.
    pub fn gateway(message: impl Into<String>) -> Self {
        Self::Gateway {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a storage error carrying only a message.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            source: message.into().into(),
        }
    }

    /// A short message suitable for interactive surfaces.
    ///
    /// Detail stays in the logs; the user sees a stable sentence.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Validation(_) => "The request was invalid. Please check your input.",
            Self::NotFound { .. } => "The requested item no longer exists.",
            Self::Gateway { .. } => {
                "The model service is unavailable right now. Please try again."
            }
            Self::Config(_) => "Arbor is misconfigured. Run `arbor doctor` for details.",
            Self::Storage { .. } | Self::Integrity(_) | Self::Internal(_) => {
                "Something went wrong. Please try again."
            }
        }
    }
}
