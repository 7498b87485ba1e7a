// SPDX-FileCopyrightText: 2026 Arbor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns figment failures into miette diagnostics.
//!
//! Unknown keys get a source span pointing into the offending `arbor.toml`
//! and a "did you mean?" hint (Jaro-Winkler over the keys the section
//! accepts).

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use figment::error::Kind;
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Minimum Jaro-Winkler similarity score to suggest a correction.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// A configuration error with rich diagnostic information.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// A top-level table Arbor does not know, e.g. `[serach]`.
    #[error("unknown configuration section `[{section}]`")]
    #[diagnostic(
        code(arbor::config::unknown_section),
        help("{}", hint(suggestion.as_deref(), "sections", valid))
    )]
    UnknownSection {
        section: String,
        suggestion: Option<String>,
        valid: String,
        #[label("not an Arbor section")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A key inside a known section that the section does not accept.
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(arbor::config::unknown_key),
        help("{}", hint(suggestion.as_deref(), "keys", valid))
    )]
    UnknownKey {
        /// Dotted path, e.g. `providers.openai.api_kye`.
        key: String,
        suggestion: Option<String>,
        valid: String,
        #[label("this key is not recognized")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("invalid type for key `{key}`: found {found}")]
    #[diagnostic(code(arbor::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        key: String,
        found: String,
        expected: String,
    },

    /// A value is not one of the accepted variants (e.g. `search.fusion`).
    #[error("invalid value for key `{key}`: `{value}`")]
    #[diagnostic(code(arbor::config::invalid_value), help("use one of: {accepted}"))]
    InvalidValue {
        key: String,
        value: String,
        accepted: String,
    },

    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(arbor::config::missing_key),
        help("add `{key} = <value>` to your arbor.toml")
    )]
    MissingKey { key: String },

    /// A semantic validation failure.
    #[error("validation error: {message}")]
    #[diagnostic(code(arbor::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(arbor::config::other))]
    Other(String),
}

fn hint(suggestion: Option<&str>, what: &str, valid: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Valid {what}: {valid}"),
        None => format!("valid {what}: {valid}"),
    }
}

/// Convert a `figment::Error` into one `ConfigError` per underlying failure.
///
/// `toml_sources` pairs each file path figment read with its contents, so
/// unknown keys can be located.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    err.into_iter()
        .map(|error| convert(&error, toml_sources))
        .collect()
}

fn convert(error: &figment::error::Error, toml_sources: &[(String, String)]) -> ConfigError {
    let section: Vec<String> = error.path.iter().map(|s| s.to_string()).collect();
    let dotted = |leaf: &str| {
        if section.is_empty() {
            leaf.to_string()
        } else {
            format!("{}.{leaf}", section.join("."))
        }
    };

    match &error.kind {
        Kind::UnknownField(field, expected) => {
            let suggestion = suggest_key(field, expected);
            let valid = expected.join(", ");
            let (span, src) = locate(error, &section, field, toml_sources);
            if section.is_empty() {
                ConfigError::UnknownSection {
                    section: field.clone(),
                    suggestion,
                    valid,
                    span,
                    src,
                }
            } else {
                ConfigError::UnknownKey {
                    key: dotted(field.as_str()),
                    suggestion,
                    valid,
                    span,
                    src,
                }
            }
        }
        Kind::MissingField(field) => ConfigError::MissingKey { key: dotted(field.as_ref()) },
        Kind::InvalidType(found, expected) => ConfigError::InvalidType {
            key: section.join("."),
            found: found.to_string(),
            expected: expected.to_string(),
        },
        Kind::UnknownVariant(value, accepted) => ConfigError::InvalidValue {
            key: section.join("."),
            value: value.clone(),
            accepted: accepted.join(", "),
        },
        _ => ConfigError::Other(error.to_string()),
    }
}

/// Span and source for `field` if the error came from one of `toml_sources`.
fn locate(
    error: &figment::error::Error,
    section: &[String],
    field: &str,
    toml_sources: &[(String, String)],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let Some(figment::Source::File(path)) = error.metadata.as_ref().and_then(|m| m.source.as_ref())
    else {
        return (None, None);
    };
    let path = path.display().to_string();
    let Some((name, content)) = toml_sources.iter().find(|(p, _)| *p == path) else {
        return (None, None);
    };

    let offset = if section.is_empty() {
        find_section_offset(content, field)
    } else {
        find_key_offset(content, section, field)
    };
    match offset {
        Some(offset) => (
            Some(SourceSpan::new(offset.into(), field.len())),
            Some(NamedSource::new(name, content.clone())),
        ),
        None => (None, None),
    }
}

/// Table name of a `[header]` line, if `line` is one.
fn header_name(line: &str) -> Option<&str> {
    let inner = line.trim().strip_prefix('[')?;
    let end = inner.find(']')?;
    Some(inner[..end].trim())
}

/// Byte offset of `field` inside the `[section]` header that names it.
///
/// Matches both `[field]` and nested headers such as `[field.sub]`.
pub fn find_section_offset(content: &str, field: &str) -> Option<usize> {
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        if let Some(name) = header_name(line) {
            let top = name.split('.').next().unwrap_or(name);
            if top == field {
                return line.find(field).map(|at| offset + at);
            }
        }
        offset += line.len();
    }
    None
}

/// Byte offset of `field` as a key inside the table named by `path`.
///
/// For `path = ["providers", "openai"]` and `field = "api_kye"` this finds
/// `api_kye = ...` below `[providers.openai]` and before the next header.
pub fn find_key_offset(content: &str, path: &[String], field: &str) -> Option<usize> {
    let wanted = path.join(".");
    let mut current = String::new();
    let mut offset = 0;

    for line in content.split_inclusive('\n') {
        if let Some(name) = header_name(line) {
            current = name.to_string();
        } else if current == wanted {
            let trimmed = line.trim_start();
            if let Some(rest) = trimmed.strip_prefix(field) {
                if rest.trim_start().starts_with('=') {
                    return Some(offset + (line.len() - trimmed.len()));
                }
            }
        }
        offset += line.len();
    }
    None
}

/// Best Jaro-Winkler match for `unknown` above the threshold.
pub fn suggest_key<S: AsRef<str>>(unknown: &str, valid_keys: &[S]) -> Option<String> {
    valid_keys
        .iter()
        .map(|k| (k.as_ref(), strsim::jaro_winkler(unknown, k.as_ref())))
        .filter(|(_, score)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(k, _)| k.to_string())
}

/// Print each error to stderr through miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = miette::GraphicalReportHandler::new();
    for error in errors {
        let mut out = String::new();
        match handler.render_report(&mut out, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{out}"),
            Err(_) => eprintln!("Error: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggests_database_path_for_typo() {
        let valid = ["database_path", "data_dir", "wal_mode"];
        assert_eq!(
            suggest_key("databse_path", &valid),
            Some("database_path".to_string())
        );
    }

    #[test]
    fn no_suggestion_for_distant_typo() {
        let valid = ["default_limit", "fusion", "rrf_k"];
        assert_eq!(suggest_key("zzzzzz", &valid), None);
    }

    #[test]
    fn key_offset_in_nested_section() {
        let content = "[app]\nlog_level = \"info\"\n\n[providers.openai]\napi_kye = \"x\"\n";
        let path = vec!["providers".to_string(), "openai".to_string()];
        let o = find_key_offset(content, &path, "api_kye").unwrap();
        assert_eq!(&content[o..o + 7], "api_kye");
    }

    #[test]
    fn key_offset_ignores_other_sections() {
        let content = "[app]\nlog_level = \"info\"\n[search]\nfusion = \"x\"\n";
        let path = vec!["app".to_string()];
        assert_eq!(find_key_offset(content, &path, "fusion"), None);
    }

    #[test]
    fn key_offset_ignores_header_text_inside_values() {
        let content = "[app]\nsystem_prompt = \"see [search]\"\n[search]\nfusoin = 1\n";
        let path = vec!["search".to_string()];
        let o = find_key_offset(content, &path, "fusoin").unwrap();
        assert_eq!(&content[o..o + 6], "fusoin");
    }

    #[test]
    fn section_offset_points_at_header() {
        let content = "[app]\nlog_level = \"info\"\n\n[serach]\ndefault_limit = 3\n";
        let o = find_section_offset(content, "serach").unwrap();
        assert_eq!(&content[o..o + 6], "serach");
    }

    #[test]
    fn hint_lists_valid_names() {
        assert_eq!(
            hint(Some("search"), "sections", "app, search"),
            "did you mean `search`? Valid sections: app, search"
        );
        assert_eq!(hint(None, "keys", "a, b"), "valid keys: a, b");
    }
}
