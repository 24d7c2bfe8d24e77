//! Arkaios CLI - binary entry point and line-oriented session loop.
//!
//! # Architecture
//!
//! The CLI wires [`arkaios_engine::Session`] to a Gemini gateway and the
//! built-in file tools, then reads commands from stdin:
//!
//! ```text
//! main() -> build_session() -> run_repl()
//!                                 |
//!   stdin line ---+--- transcript grew (watch) ---+--- turn finished (mpsc)
//!                                 v
//!                     render new transcript entries
//! ```
//!
//! Turns run on a spawned task so `/capture` and `/mount` stay usable while
//! the model is working.

mod commands;
mod render;

use anyhow::{Context, Result};
use std::{
    env,
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use arkaios_engine::arkaios_providers::GeminiGateway;
use arkaios_engine::arkaios_tools::{ToolRegistry, Workspace};
use arkaios_engine::{ArkaiosConfig, ImageAttachment, Session, SubmitOutcome, TurnOutcome};
use arkaios_types::ApiKey;

use commands::{Command, HELP_TEXT};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // No log file: stay silent rather than interleave logs with the REPL.
    tracing_subscriber::registry().with(env_filter).init();
}

fn open_log_file() -> (Option<(PathBuf, fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new().create(true).append(true).open(&candidate) {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => warnings.push(format!(
                "Failed to open log file {}: {e}",
                candidate.display()
            )),
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // ~/.arkaios/logs/arkaios.log
    if let Some(config_path) = ArkaiosConfig::path()
        && let Some(config_dir) = config_path.parent()
    {
        candidates.push(config_dir.join("logs").join("arkaios.log"));
    }

    candidates.push(PathBuf::from(".arkaios").join("logs").join("arkaios.log"));
    candidates
}

/// Key from the environment, read once at startup.
fn env_api_key() -> ApiKey {
    ["GEMINI_API_KEY", "API_KEY"]
        .into_iter()
        .filter_map(|name| env::var(name).ok())
        .map(ApiKey::new)
        .find(|key| !key.is_empty())
        .unwrap_or_default()
}

fn load_config() -> ArkaiosConfig {
    match ArkaiosConfig::load() {
        Ok(config) => config.unwrap_or_default(),
        Err(err) => {
            tracing::error!(path = %err.path().display(), error = %err, "Using default config");
            eprintln!("warning: {err}; using defaults");
            ArkaiosConfig::default()
        }
    }
}

fn build_session(config: &ArkaiosConfig) -> Result<Session> {
    let api = config.api_config(env_api_key());
    if api.api_key().is_empty() {
        tracing::warn!("No API key configured; model calls will fail");
        eprintln!("warning: GEMINI_API_KEY is not set; requests will be rejected");
    }
    tracing::info!(model = api.model(), "Starting session");

    let gateway = GeminiGateway::new(api).context("failed to build HTTP client")?;
    let registry =
        ToolRegistry::with_builtins(config.tool_settings()).context("failed to register tools")?;
    let session = Session::new(Arc::new(gateway), registry, config.session_settings());

    if let Some(path) = config.workspace_path() {
        match Workspace::open(&path) {
            Ok(workspace) => {
                session.mount(workspace);
            }
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "Startup workspace not mounted"
                );
                eprintln!("warning: {err}");
            }
        }
    }
    Ok(session)
}

/// Tracks how much of the transcript has been printed.
struct Printer {
    rendered: usize,
}

impl Printer {
    fn flush(&mut self, session: &Session) {
        let fresh = session.messages_since(self.rendered);
        self.rendered += fresh.len();
        for message in &fresh {
            println!("{}", render::format_message(message));
        }
    }
}

async fn load_capture(source: &str) -> Result<ImageAttachment> {
    if source.starts_with("data:") {
        return Ok(ImageAttachment::from_data_url(source)?);
    }
    let path = Path::new(source);
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(ImageAttachment::from_png_bytes(&bytes)?)
}

fn print_status(session: &Session, model: &str) {
    println!("model:      {model}");
    match session.workspace() {
        Some(workspace) => println!(
            "workspace:  {} ({})",
            workspace.display_path(),
            workspace.access()
        ),
        None => println!("workspace:  (none)"),
    }
    println!(
        "capture:    {}",
        if session.has_pending_image() { "staged" } else { "none" }
    );
    println!(
        "state:      {}",
        if session.is_processing() { "working" } else { "idle" }
    );
    println!("messages:   {}", session.transcript_len());
}

fn report_outcome(outcome: &SubmitOutcome) {
    match outcome {
        SubmitOutcome::Busy => println!("(still working on the previous message)"),
        SubmitOutcome::Empty => println!("(nothing to send)"),
        SubmitOutcome::Completed(report) => {
            tracing::debug!(rounds = report.rounds, outcome = ?report.outcome, "Turn reported");
            if matches!(
                report.outcome,
                TurnOutcome::GatewayFailed | TurnOutcome::InternalError
            ) {
                println!("(send again to retry)");
            }
        }
    }
}

async fn run_repl(session: Session, model: String) -> Result<()> {
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<SubmitOutcome>();
    let mut printer = Printer { rendered: 0 };
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    session.greet();
    printer.flush(&session);
    println!("Type /help for commands.");
    let mut changes = session.subscribe();

    loop {
        tokio::select! {
            Ok(()) = changes.changed() => {
                printer.flush(&session);
            }
            Some(outcome) = done_rx.recv() => {
                printer.flush(&session);
                report_outcome(&outcome);
            }
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                match commands::parse(&line) {
                    Command::Send(text) => {
                        if session.is_processing() {
                            println!("(still working on the previous message)");
                            continue;
                        }
                        if text.is_empty() && !session.has_pending_image() {
                            continue;
                        }
                        let turn_session = session.clone();
                        let text = text.to_string();
                        let done_tx = done_tx.clone();
                        tokio::spawn(async move {
                            let outcome = turn_session.submit(&text).await;
                            let _ = done_tx.send(outcome);
                        });
                        println!("(working...)");
                    }
                    Command::Capture(source) => match load_capture(source).await {
                        Ok(image) => {
                            session.set_pending_image(image);
                            println!("Capture staged; it will be sent with your next message.");
                        }
                        Err(err) => println!("Capture failed: {err:#}"),
                    },
                    Command::ClearImage => {
                        if session.clear_pending_image().is_some() {
                            println!("Capture cleared.");
                        } else {
                            println!("No capture staged.");
                        }
                    }
                    Command::Mount(dir) => match Workspace::open(dir) {
                        Ok(workspace) => {
                            println!(
                                "Mounted {} (access: {})",
                                workspace.display_path(),
                                workspace.access()
                            );
                            session.mount(workspace);
                        }
                        Err(err) => println!("Mount failed: {err}"),
                    },
                    Command::Status => print_status(&session, &model),
                    Command::Help => println!("{HELP_TEXT}"),
                    Command::Quit => break,
                    Command::MissingArgument { command, usage } => {
                        println!("{command} needs an argument. Usage: {usage}");
                    }
                    Command::Unknown(name) => {
                        println!("Unknown command /{name}. Type /help for commands.");
                    }
                }
            }
        }
    }

    if session.is_processing() {
        println!("(exiting with a turn still in progress)");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = load_config();
    let model = config.api_config(ApiKey::default()).model().to_string();
    let session = build_session(&config)?;

    let result = run_repl(session, model).await;
    if let Err(err) = &result {
        tracing::error!(error = %err, "Session ended with error");
    }
    result
}
