// SPDX-FileCopyrightText: 2026 Arbor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Types for running one conversation turn.

use arbor_core::ArborError;
use arbor_core::types::{NewAttachment, Response};
use arbor_storage::decode_data_uri;

/// Longest conversation title, in characters.
pub const TITLE_MAX_CHARS: usize = 100;

/// A request to send a prompt and store the reply as a new node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnRequest {
    /// Existing conversation to add a root turn to. Ignored for placement
    /// when `parent_id` is set, but must then agree with the parent.
    pub conversation_id: Option<String>,
    /// Node the new turn continues from.
    pub parent_id: Option<String>,
    pub prompt: String,
    /// Falls back to `app.default_model`.
    pub model: Option<String>,
    /// Falls back to `app.system_prompt`.
    pub system_prompt: Option<String>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub max_tokens: Option<u32>,
    /// Inline `data:image/...;base64,` attachments.
    pub attachments: Vec<String>,
}

impl TurnRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }
}

/// Progress reported while a turn streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    /// The turn was accepted; ids are final even though nothing is stored yet.
    Started {
        conversation_id: String,
        response_id: String,
    },
    /// A fragment of the model's reply.
    Delta(String),
}

/// How a turn ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The reply finished and was stored.
    Completed(Response),
    /// The caller cancelled; nothing was written.
    Cancelled,
}

/// Conversation title derived from its first prompt.
pub fn title_from_prompt(prompt: &str) -> String {
    prompt.trim().chars().take(TITLE_MAX_CHARS).collect()
}

/// Decode inline attachments, rejecting anything malformed or oversized.
pub(crate) fn decode_attachments(
    uris: &[String],
    max_bytes: usize,
) -> Result<Vec<(NewAttachment, String)>, ArborError> {
    uris.iter()
        .map(|uri| {
            let decoded = decode_data_uri(uri)?;
            if decoded.data.len() > max_bytes {
                return Err(ArborError::Validation(format!(
                    "attachment is {} bytes, limit is {max_bytes}",
                    decoded.data.len()
                )));
            }
            Ok((decoded, uri.clone()))
        })
        .collect()
}

/// Reject sampling parameters no provider accepts.
pub(crate) fn validate_sampling(temperature: f64, top_p: f64) -> Result<(), ArborError> {
    if !(0.0..=2.0).contains(&temperature) {
        return Err(ArborError::Validation(format!(
            "temperature must be between 0 and 2, got {temperature}"
        )));
    }
    if !(top_p > 0.0 && top_p <= 1.0) {
        return Err(ArborError::Validation(format!(
            "top_p must be in (0, 1], got {top_p}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_is_trimmed_and_truncated_on_char_boundary() {
        assert_eq!(title_from_prompt("  hello  "), "hello");
        let long = "é".repeat(150);
        let title = title_from_prompt(&long);
        assert_eq!(title.chars().count(), TITLE_MAX_CHARS);
        assert!(long.starts_with(&title));
    }

    #[test]
    fn oversized_attachment_is_rejected() {
        // "AAAA" decodes to three zero bytes.
        let uri = "data:image/png;base64,AAAA".to_string();
        assert!(decode_attachments(std::slice::from_ref(&uri), 3).is_ok());
        assert!(matches!(
            decode_attachments(&[uri], 2),
            Err(ArborError::Validation(_))
        ));
    }

    #[test]
    fn malformed_attachment_is_rejected() {
        let err = decode_attachments(&["data:text/plain;base64,AAAA".into()], 1024).unwrap_err();
        assert!(matches!(err, ArborError::Validation(_)));
    }

    #[test]
    fn sampling_bounds() {
        assert!(validate_sampling(0.0, 1.0).is_ok());
        assert!(validate_sampling(2.0, 0.1).is_ok());
        assert!(validate_sampling(-0.1, 1.0).is_err());
        assert!(validate_sampling(0.7, 0.0).is_err());
        assert!(validate_sampling(0.7, 1.5).is_err());
        assert!(validate_sampling(f64::NAN, 1.0).is_err());
    }
}
