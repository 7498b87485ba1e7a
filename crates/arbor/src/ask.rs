// SPDX-FileCopyrightText: 2026 Arbor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `arbor ask`: stream one turn to stdout and store it.
//!
//! Ctrl+C cancels the turn while it streams; nothing is written in that
//! case.

use std::io::Write;
use std::path::{Path, PathBuf};

use arbor_conversation::{TurnEvent, TurnOutcome, TurnRequest};
use arbor_core::ArborError;
use arbor_core::models::Provider;
use colored::Colorize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::app::App;
use crate::commands::Output;

/// Arguments of `arbor ask`.
#[derive(Debug, Default)]
pub struct AskArgs {
    pub prompt: String,
    pub conversation: Option<String>,
    pub parent: Option<String>,
    pub regenerate: Option<String>,
    pub edit: Option<String>,
    pub model: Option<String>,
    pub system: Option<String>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub max_tokens: Option<u32>,
    pub images: Vec<PathBuf>,
}

/// Media type for an image file, from its extension.
fn image_media_type(path: &Path) -> Result<&'static str, ArborError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Ok("image/png"),
        "jpg" | "jpeg" => Ok("image/jpeg"),
        "gif" => Ok("image/gif"),
        "webp" => Ok("image/webp"),
        _ => Err(ArborError::Validation(format!(
            "unsupported image type: {}",
            path.display()
        ))),
    }
}

async fn image_data_uri(path: &Path) -> Result<String, ArborError> {
    let media_type = image_media_type(path)?;
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        ArborError::Validation(format!("cannot read {}: {e}", path.display()))
    })?;
    Ok(arbor_storage::encode_data_uri(media_type, &bytes))
}

fn require_conversation(args: &AskArgs, flag: &str) -> Result<String, ArborError> {
    args.conversation
        .clone()
        .ok_or_else(|| ArborError::Validation(format!("{flag} needs --conversation")))
}

/// Build the turn request, starting from a stored node for
/// `--regenerate` and `--edit`.
async fn build_request(app: &App, args: AskArgs) -> Result<TurnRequest, ArborError> {
    let mut request = if let Some(id) = args.regenerate.as_deref() {
        let conversation = require_conversation(&args, "--regenerate")?;
        app.service.regenerate_request(&conversation, id).await?
    } else if let Some(id) = args.edit.as_deref() {
        let conversation = require_conversation(&args, "--edit")?;
        app.service
            .edit_request(&conversation, id, &args.prompt)
            .await?
    } else {
        TurnRequest {
            conversation_id: args.conversation.clone(),
            parent_id: args.parent.clone(),
            ..TurnRequest::new(args.prompt.clone())
        }
    };

    if args.model.is_some() {
        request.model = args.model;
    }
    if args.system.is_some() {
        request.system_prompt = args.system;
    }
    request.temperature = args.temperature.or(request.temperature);
    request.top_p = args.top_p.or(request.top_p);
    request.max_tokens = args.max_tokens.or(request.max_tokens);
    for path in &args.images {
        request.attachments.push(image_data_uri(path).await?);
    }
    Ok(request)
}

/// Cancel the returned token on Ctrl+C.
fn cancel_on_ctrl_c() -> (CancellationToken, tokio::task::JoinHandle<()>) {
    let token = CancellationToken::new();
    let token_clone = token.clone();
    let handle = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl+C, cancelling turn");
            token_clone.cancel();
        }
    });
    (token, handle)
}

pub async fn run_ask(app: &App, out: Output, args: AskArgs) -> Result<(), ArborError> {
    let request = build_request(app, args).await?;

    let model = request
        .model
        .clone()
        .unwrap_or_else(|| app.service.config().app.default_model.clone());
    let provider = Provider::for_model(&model).unwrap_or(Provider::Ollama);
    let completion = app.completion_for(provider)?;

    let (cancel, signal_task) = cancel_on_ctrl_c();
    let (tx, mut rx) = mpsc::channel(64);
    let quiet = out.json;

    let printer = async move {
        let mut stdout = std::io::stdout();
        while let Some(event) = rx.recv().await {
            if quiet {
                continue;
            }
            match event {
                TurnEvent::Started {
                    conversation_id,
                    response_id,
                } => {
                    eprintln!(
                        "{}",
                        format!("conversation {conversation_id}, response {response_id}").dimmed()
                    );
                }
                TurnEvent::Delta(text) => {
                    print!("{text}");
                    stdout.flush().ok();
                }
            }
        }
    };

    let (outcome, ()) = tokio::join!(
        app.service.run_turn(request, completion, tx, cancel),
        printer
    );
    signal_task.abort();

    match outcome? {
        TurnOutcome::Completed(response) => {
            if out.json {
                out.emit_json(&response)?;
            } else {
                println!();
            }
        }
        TurnOutcome::Cancelled => {
            eprintln!();
            eprintln!("{}", "Cancelled; nothing was saved.".yellow());
        }
    }
    Ok(())
}
