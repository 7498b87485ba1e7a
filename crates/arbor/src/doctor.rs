// SPDX-FileCopyrightText: 2026 Arbor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `arbor doctor` command implementation.
//!
//! Runs diagnostic checks against the Arbor environment to identify
//! configuration issues, storage problems and unreachable gateways.

use std::io::IsTerminal;
use std::path::Path;
use std::time::{Duration, Instant};

use arbor_config::ArborConfig;
use arbor_core::{ArborError, HealthStatus, PluginAdapter, StorageAdapter};
use arbor_ollama::{OllamaChat, OllamaEmbedder};

use crate::app::App;

/// Status of a diagnostic check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// Result of a single diagnostic check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub duration: Duration,
}

impl CheckResult {
    fn new(name: &str, status: CheckStatus, message: impl Into<String>, start: Instant) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.into(),
            duration: start.elapsed(),
        }
    }
}

/// Run the `arbor doctor` command.
///
/// With `deep`, also runs `PRAGMA integrity_check` and validates every
/// conversation tree. With `plain`, disables colored output.
pub async fn run_doctor(
    config: &ArborConfig,
    config_path: Option<&Path>,
    deep: bool,
    plain: bool,
) -> Result<(), ArborError> {
    let use_color = !plain && std::io::stdout().is_terminal();
    let mut results = vec![
        check_config(config_path),
        check_database(config).await,
        check_embedding(config).await,
        check_chat(config).await,
    ];
    if deep {
        results.push(check_db_integrity(&config.storage.database_path).await);
        results.push(check_trees(config).await);
    }

    println!();
    println!("  arbor doctor");
    println!("  {}", "-".repeat(50));

    let mut issues = 0;
    for result in &results {
        if result.status != CheckStatus::Pass {
            issues += 1;
        }
        println!("{}", format_line(result, use_color));
    }
    println!();

    if issues > 0 {
        let issue_word = if issues == 1 { "issue" } else { "issues" };
        println!("  {issues} {issue_word} found.");
        if !deep {
            println!("  Run with --deep for detailed diagnostics.");
        }
    } else {
        println!("  All checks passed.");
    }
    println!();

    Ok(())
}

fn format_line(result: &CheckResult, use_color: bool) -> String {
    let duration_ms = result.duration.as_millis();
    if use_color {
        use colored::Colorize;
        let (symbol, message) = match result.status {
            CheckStatus::Pass => ("✓".green(), result.message.normal()),
            CheckStatus::Warn => ("!".yellow(), result.message.yellow()),
            CheckStatus::Fail => ("✗".red(), result.message.red()),
        };
        format!(
            "    {symbol} {:<20} {message} ({duration_ms}ms)",
            result.name
        )
    } else {
        let tag = match result.status {
            CheckStatus::Pass => "[OK]  ",
            CheckStatus::Warn => "[WARN]",
            CheckStatus::Fail => "[FAIL]",
        };
        format!(
            "    {tag} {:<20} {} ({duration_ms}ms)",
            result.name, result.message
        )
    }
}

/// Check configuration loads without errors.
fn check_config(path: Option<&Path>) -> CheckResult {
    let start = Instant::now();
    let loaded = match path {
        Some(path) => arbor_config::load_and_validate_path(path),
        None => arbor_config::load_and_validate(),
    };
    match loaded {
        Ok(_) => CheckResult::new("Configuration", CheckStatus::Pass, "valid", start),
        Err(errors) => CheckResult::new(
            "Configuration",
            CheckStatus::Fail,
            format!("{} error(s)", errors.len()),
            start,
        ),
    }
}

/// Check the database opens and answers a query.
async fn check_database(config: &ArborConfig) -> CheckResult {
    let start = Instant::now();
    let path = &config.storage.database_path;
    if !Path::new(path).exists() {
        return CheckResult::new(
            "Database",
            CheckStatus::Warn,
            format!("not found: {path} (will be created on first use)"),
            start,
        );
    }

    let storage = arbor_storage::SqliteStorage::new(config.storage.clone());
    if let Err(e) = storage.initialize().await {
        return CheckResult::new("Database", CheckStatus::Fail, format!("open failed: {e}"), start);
    }
    health_result("Database", storage.health_check().await, start)
}

async fn check_embedding(config: &ArborConfig) -> CheckResult {
    let start = Instant::now();
    if !config.embedding.enabled {
        return CheckResult::new(
            "Embeddings",
            CheckStatus::Warn,
            "disabled (vector search finds nothing new)",
            start,
        );
    }
    match OllamaEmbedder::new(&config.embedding) {
        Ok(embedder) => health_result("Embeddings", embedder.health_check().await, start),
        Err(e) => CheckResult::new("Embeddings", CheckStatus::Fail, e.to_string(), start),
    }
}

async fn check_chat(config: &ArborConfig) -> CheckResult {
    let start = Instant::now();
    match OllamaChat::new(&config.providers.ollama) {
        Ok(chat) => health_result("Local models", chat.health_check().await, start),
        Err(e) => CheckResult::new("Local models", CheckStatus::Fail, e.to_string(), start),
    }
}

fn health_result(
    name: &str,
    health: Result<HealthStatus, ArborError>,
    start: Instant,
) -> CheckResult {
    match health {
        Ok(HealthStatus::Healthy) => CheckResult::new(name, CheckStatus::Pass, "healthy", start),
        Ok(HealthStatus::Degraded(why)) => CheckResult::new(name, CheckStatus::Warn, why, start),
        Ok(HealthStatus::Unhealthy(why)) => CheckResult::new(name, CheckStatus::Fail, why, start),
        Err(e) => CheckResult::new(name, CheckStatus::Fail, e.to_string(), start),
    }
}

/// Deep check: SQLite integrity check.
async fn check_db_integrity(db_path: &str) -> CheckResult {
    let start = Instant::now();
    if !Path::new(db_path).exists() {
        return CheckResult::new(
            "DB integrity",
            CheckStatus::Warn,
            "database not found (skipped)",
            start,
        );
    }

    let conn = match tokio_rusqlite::Connection::open(db_path).await {
        Ok(conn) => conn,
        Err(e) => {
            return CheckResult::new(
                "DB integrity",
                CheckStatus::Fail,
                format!("open failed: {e}"),
                start,
            );
        }
    };
    let verdict = conn
        .call(|conn| -> Result<String, rusqlite::Error> {
            conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))
        })
        .await;
    match verdict {
        Ok(v) if v == "ok" => CheckResult::new("DB integrity", CheckStatus::Pass, "ok", start),
        Ok(v) => CheckResult::new("DB integrity", CheckStatus::Fail, v, start),
        Err(e) => CheckResult::new(
            "DB integrity",
            CheckStatus::Fail,
            format!("check failed: {e}"),
            start,
        ),
    }
}

/// Deep check: every conversation is a valid tree.
async fn check_trees(config: &ArborConfig) -> CheckResult {
    let start = Instant::now();
    if !Path::new(&config.storage.database_path).exists() {
        return CheckResult::new(
            "Conversation trees",
            CheckStatus::Warn,
            "database not found (skipped)",
            start,
        );
    }
    let app = match App::open(config.clone()).await {
        Ok(app) => app,
        Err(e) => {
            return CheckResult::new("Conversation trees", CheckStatus::Fail, e.to_string(), start);
        }
    };

    let result = async {
        let conversations = app.service.list_conversations().await?;
        let mut broken = Vec::new();
        for c in &conversations {
            match app.service.validate_conversation(&c.id).await {
                Ok(()) => {}
                Err(ArborError::Integrity(why)) => broken.push(format!("{}: {why}", c.id)),
                Err(e) => return Err(e),
            }
        }
        Ok::<_, ArborError>((conversations.len(), broken))
    }
    .await;
    let _ = app.close().await;

    match result {
        Ok((count, broken)) if broken.is_empty() => CheckResult::new(
            "Conversation trees",
            CheckStatus::Pass,
            format!("{count} conversation(s) valid"),
            start,
        ),
        Ok((_, broken)) => CheckResult::new(
            "Conversation trees",
            CheckStatus::Fail,
            broken.join("; "),
            start,
        ),
        Err(e) => CheckResult::new("Conversation trees", CheckStatus::Fail, e.to_string(), start),
    }
}
