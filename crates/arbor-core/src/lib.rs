// SPDX-FileCopyrightText: 2026 Arbor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for Arbor.
//!
//! This crate provides the trait definitions, error types, and common
//! types used throughout the Arbor workspace. Storage, embedding and
//! completion backends implement the traits defined here.

pub mod error;
pub mod models;
pub mod traits;
pub mod types;

pub use error::ArborError;
pub use models::{DEFAULT_EMBEDDING_MODEL, MODEL_TABLE, ModelInfo, Provider};
pub use types::{AdapterType, HealthStatus};

pub use traits::{
    CompletionAdapter, CompletionStream, EmbeddingAdapter, PluginAdapter, StorageAdapter,
};

/// Current UTC time as an RFC 3339 string with millisecond precision.
///
/// This is the single timestamp format persisted by Arbor; it sorts
/// lexicographically in chronological order.
pub fn now_utc() -> String {
    format_utc(chrono::Utc::now())
}

/// Format an instant the way Arbor persists timestamps.
pub fn format_utc(t: chrono::DateTime<chrono::Utc>) -> String {
    t.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn arbor_error_has_all_variants() {
        let _config = ArborError::Config("test".into());
        let _validation = ArborError::Validation("test".into());
        let _storage = ArborError::Storage {
            source: Box::new(std::io::Error::other("test")),
        };
        let _gateway = ArborError::Gateway {
            message: "test".into(),
            source: None,
        };
        let _integrity = ArborError::Integrity("cycle".into());
        let _not_found = ArborError::NotFound {
            entity: "response",
            id: "r1".into(),
        };
        let _internal = ArborError::Internal("test".into());
    }

    #[test]
    fn user_message_hides_detail() {
        let err = ArborError::Storage {
            source: Box::new(std::io::Error::other("disk I/O error at page 42")),
        };
        assert!(!err.user_message().contains("page 42"));
        assert!(err.to_string().contains("page 42"));
    }

    #[test]
    fn adapter_type_display_round_trip() {
        use std::str::FromStr;

        for variant in [
            AdapterType::Storage,
            AdapterType::Embedding,
            AdapterType::Completion,
        ] {
            let parsed = AdapterType::from_str(&variant.to_string()).expect("should parse back");
            assert_eq!(variant, parsed);
        }
    }

    #[test]
    fn search_mode_parses_lowercase() {
        use std::str::FromStr;
        use types::SearchMode;

        assert_eq!(SearchMode::from_str("vector").unwrap(), SearchMode::Vector);
        assert_eq!(SearchMode::from_str("text").unwrap(), SearchMode::Text);
        assert_eq!(SearchMode::from_str("combined").unwrap(), SearchMode::Combined);
        assert_eq!(SearchMode::default(), SearchMode::Combined);
    }

    #[test]
    fn format_utc_matches_known_instants() {
        let epoch = Utc.timestamp_millis_opt(0).unwrap();
        assert_eq!(format_utc(epoch), "1970-01-01T00:00:00.000Z");
        let leap = Utc.timestamp_millis_opt(1_709_251_199_123).unwrap();
        assert_eq!(format_utc(leap), "2024-02-29T23:59:59.123Z");
    }

    #[test]
    fn all_trait_modules_are_exported() {
        fn _assert_plugin_adapter<T: PluginAdapter>() {}
        fn _assert_storage_adapter<T: StorageAdapter>() {}
        fn _assert_embedding_adapter<T: EmbeddingAdapter>() {}
        fn _assert_completion_adapter<T: CompletionAdapter>() {}
    }
}
