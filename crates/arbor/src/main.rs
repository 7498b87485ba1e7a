// SPDX-FileCopyrightText: 2026 Arbor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Arbor - branching conversations with hybrid recall.
//!
//! This is the command-line entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod app;
mod ask;
mod commands;
mod doctor;

use std::path::PathBuf;

use arbor_core::ArborError;
use arbor_core::types::SearchMode;
use clap::{Parser, Subcommand};
use tracing::error;

/// Arbor - branching conversations with hybrid recall.
#[derive(Parser, Debug)]
#[command(name = "arbor", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print machine-readable JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// List conversations, newest first.
    Conversations,
    /// List every response in a conversation.
    Responses { conversation: String },
    /// Show the message chain from the root to a response.
    Chain {
        conversation: String,
        response: String,
    },
    /// Search past responses by meaning and by text.
    Search {
        query: String,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long, default_value = "combined")]
        mode: SearchMode,
    },
    /// Delete a conversation and everything in it.
    DeleteConversation { conversation: String },
    /// Delete a response node.
    DeleteResponse {
        conversation: String,
        response: String,
        /// Also delete every descendant.
        #[arg(long)]
        subtree: bool,
    },
    /// Send a prompt and store the reply. Ctrl+C cancels without writing.
    Ask {
        prompt: String,
        /// Add a root turn to this conversation.
        #[arg(long)]
        conversation: Option<String>,
        /// Continue from this response.
        #[arg(long)]
        parent: Option<String>,
        /// Re-ask this response's prompt as a sibling (ignores PROMPT).
        #[arg(long, conflicts_with_all = ["parent", "edit"])]
        regenerate: Option<String>,
        /// Ask PROMPT in place of this response's prompt.
        #[arg(long, conflicts_with = "parent")]
        edit: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        system: Option<String>,
        #[arg(long)]
        temperature: Option<f64>,
        #[arg(long)]
        top_p: Option<f64>,
        #[arg(long)]
        max_tokens: Option<u32>,
        /// Attach an image file (repeatable).
        #[arg(long = "image")]
        images: Vec<PathBuf>,
    },
    /// Embed responses that have no vectors yet.
    Backfill {
        #[arg(long, default_value_t = 100)]
        batch_size: usize,
    },
    /// Rebuild the full-text index from stored responses.
    Reindex,
    /// List known models and whether they can be used.
    Models {
        /// Ignore the cached availability probe.
        #[arg(long)]
        refresh: bool,
    },
    /// List summaries generated for a conversation.
    Summaries { conversation: String },
    /// Check configuration, storage and gateways.
    Doctor {
        /// Also verify database integrity and every conversation tree.
        #[arg(long)]
        deep: bool,
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("arbor={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&std::path::Path>) -> arbor_config::ArborConfig {
    let loaded = match path {
        Some(path) => arbor_config::load_and_validate_path(path),
        None => arbor_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            arbor_config::render_errors(&errors);
            std::process::exit(2);
        }
    }
}

async fn run(cli: Cli, config: arbor_config::ArborConfig) -> Result<(), ArborError> {
    if let Commands::Doctor { deep, plain } = cli.command {
        return doctor::run_doctor(&config, cli.config.as_deref(), deep, plain).await;
    }

    let app = app::App::open(config).await?;
    let out = commands::Output { json: cli.json };
    let result = match cli.command {
        Commands::Conversations => commands::conversations(&app, out).await,
        Commands::Responses { conversation } => {
            commands::responses(&app, out, &conversation).await
        }
        Commands::Chain {
            conversation,
            response,
        } => commands::chain(&app, out, &conversation, &response).await,
        Commands::Search {
            query,
            limit,
            offset,
            mode,
        } => commands::search(&app, out, &query, limit, offset, mode).await,
        Commands::DeleteConversation { conversation } => {
            commands::delete_conversation(&app, &conversation).await
        }
        Commands::DeleteResponse {
            conversation,
            response,
            subtree,
        } => commands::delete_response(&app, &conversation, &response, subtree).await,
        Commands::Ask {
            prompt,
            conversation,
            parent,
            regenerate,
            edit,
            model,
            system,
            temperature,
            top_p,
            max_tokens,
            images,
        } => {
            let args = ask::AskArgs {
                prompt,
                conversation,
                parent,
                regenerate,
                edit,
                model,
                system,
                temperature,
                top_p,
                max_tokens,
                images,
            };
            ask::run_ask(&app, out, args).await
        }
        Commands::Backfill { batch_size } => commands::backfill(&app, out, batch_size).await,
        Commands::Reindex => commands::reindex(&app).await,
        Commands::Models { refresh } => commands::models(&app, out, refresh).await,
        Commands::Summaries { conversation } => {
            commands::summaries(&app, out, &conversation).await
        }
        Commands::Doctor { .. } => Ok(()),
    };

    app.close().await?;
    result
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref());
    init_tracing(&config.app.log_level);

    if let Err(e) = run(cli, config).await {
        error!(error = %e, "command failed");
        use colored::Colorize;
        eprintln!("{}: {}", "error".red(), e.user_message());
        eprintln!("  {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        // Only jemalloc supports advancing the epoch.
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn search_mode_parses_from_flag() {
        let cli = Cli::parse_from(["arbor", "search", "hello", "--mode", "text", "--limit", "5"]);
        match cli.command {
            Commands::Search {
                query, mode, limit, ..
            } => {
                assert_eq!(query, "hello");
                assert_eq!(mode, SearchMode::Text);
                assert_eq!(limit, Some(5));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn regenerate_conflicts_with_parent() {
        let parsed = Cli::try_parse_from([
            "arbor",
            "ask",
            "x",
            "--regenerate",
            "r1",
            "--parent",
            "r0",
        ]);
        assert!(parsed.is_err());
    }
}
