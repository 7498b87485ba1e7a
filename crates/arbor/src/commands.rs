// SPDX-FileCopyrightText: 2026 Arbor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read and maintenance subcommands.

use arbor_core::ArborError;
use arbor_core::types::SearchMode;
use colored::Colorize;
use serde::Serialize;

use crate::app::App;

/// Longest excerpt printed per text field in table output.
const EXCERPT_CHARS: usize = 60;

/// Output mode shared by all commands.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub json: bool,
}

impl Output {
    /// Print `value` as pretty JSON.
    pub fn emit_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), ArborError> {
        let text = serde_json::to_string_pretty(value)
            .map_err(|e| ArborError::Internal(format!("failed to encode JSON output: {e}")))?;
        println!("{text}");
        Ok(())
    }
}

/// First line of `text`, shortened for table output.
pub fn excerpt(text: &str) -> String {
    let line = text.lines().next().unwrap_or("").trim();
    if line.chars().count() > EXCERPT_CHARS {
        let cut: String = line.chars().take(EXCERPT_CHARS - 3).collect();
        format!("{cut}...")
    } else {
        line.to_string()
    }
}

pub async fn conversations(app: &App, out: Output) -> Result<(), ArborError> {
    let conversations = app.service.list_conversations().await?;
    if out.json {
        return out.emit_json(&conversations);
    }
    if conversations.is_empty() {
        println!("No conversations yet.");
    }
    for c in &conversations {
        println!("{}  {}  {}", c.id.dimmed(), c.created_at, excerpt(&c.title));
    }
    Ok(())
}

pub async fn responses(app: &App, out: Output, conversation: &str) -> Result<(), ArborError> {
    let responses = app.service.list_responses(conversation).await?;
    if out.json {
        return out.emit_json(&responses);
    }
    for r in &responses {
        let parent = r.parent_id.as_deref().unwrap_or("-");
        println!(
            "{}  parent={}  {}  {}",
            r.id.dimmed(),
            parent,
            r.model.cyan(),
            excerpt(&r.prompt)
        );
        if !r.attachments.is_empty() {
            println!("    {} attachment(s)", r.attachments.len());
        }
    }
    Ok(())
}

pub async fn chain(
    app: &App,
    out: Output,
    conversation: &str,
    response: &str,
) -> Result<(), ArborError> {
    let messages = app.service.chain(conversation, response).await?;
    if out.json {
        return out.emit_json(&messages);
    }
    for m in &messages {
        println!("{}", format!("[{}]", m.role).bold());
        println!("{}", m.content);
        println!();
    }
    Ok(())
}

pub async fn search(
    app: &App,
    out: Output,
    query: &str,
    limit: Option<usize>,
    offset: usize,
    mode: SearchMode,
) -> Result<(), ArborError> {
    let hits = app.service.search(query, limit, offset, mode).await?;
    if out.json {
        return out.emit_json(&hits);
    }
    if hits.is_empty() {
        println!("No matches.");
    }
    for (i, h) in hits.iter().enumerate() {
        println!(
            "{:>3}. {:.4}  {}/{}  [{}]",
            offset + i + 1,
            h.distance,
            h.conversation_id.dimmed(),
            h.response_id,
            h.matched_field
        );
        println!("     > {}", excerpt(&h.prompt));
        println!("     < {}", excerpt(&h.response_text));
    }
    Ok(())
}

pub async fn delete_conversation(app: &App, conversation: &str) -> Result<(), ArborError> {
    app.service.delete_conversation(conversation).await?;
    println!("Deleted conversation {conversation}.");
    Ok(())
}

pub async fn delete_response(
    app: &App,
    conversation: &str,
    response: &str,
    subtree: bool,
) -> Result<(), ArborError> {
    if subtree {
        let deleted = app.service.delete_subtree(conversation, response).await?;
        println!("Deleted {deleted} response(s).");
    } else {
        app.service.delete_response(conversation, response).await?;
        println!("Deleted response {response}.");
    }
    Ok(())
}

pub async fn backfill(app: &App, out: Output, batch_size: usize) -> Result<(), ArborError> {
    let report = app.service.backfill_embeddings(batch_size).await?;
    if out.json {
        return out.emit_json(&serde_json::json!({
            "scanned": report.scanned,
            "embedded": report.embedded,
            "failed": report.failed,
        }));
    }
    println!(
        "Scanned {}, embedded {}, failed {}.",
        report.scanned, report.embedded, report.failed
    );
    Ok(())
}

pub async fn reindex(app: &App) -> Result<(), ArborError> {
    app.service.rebuild_lexical_index().await?;
    println!("Full-text index rebuilt.");
    Ok(())
}

pub async fn models(app: &App, out: Output, refresh: bool) -> Result<(), ArborError> {
    if refresh {
        app.service.invalidate_models().await;
    }
    let models = app.service.available_models().await?;
    if out.json {
        return out.emit_json(&models);
    }
    for m in &models {
        let mark = if m.available {
            "available".green()
        } else {
            "unavailable".red()
        };
        println!(
            "{:<28} {:<10} {:<12} {}",
            m.id,
            m.provider.to_string(),
            mark,
            m.label
        );
    }
    Ok(())
}

pub async fn summaries(app: &App, out: Output, conversation: &str) -> Result<(), ArborError> {
    let summaries = app.service.list_summaries(conversation).await?;
    if out.json {
        return out.emit_json(&summaries);
    }
    if summaries.is_empty() {
        println!("No summaries.");
    }
    for s in &summaries {
        println!("{}  {}", s.response_id.dimmed(), s.summary);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_keeps_short_first_lines() {
        assert_eq!(excerpt("  hello\nsecond line"), "hello");
        assert_eq!(excerpt(""), "");
    }

    #[test]
    fn excerpt_shortens_long_lines() {
        let long = "x".repeat(200);
        let e = excerpt(&long);
        assert_eq!(e.chars().count(), EXCERPT_CHARS);
        assert!(e.ends_with("..."));
    }
}
