//! Promptdeck CLI
//!
//! Terminal surface for the batching text-generation server: submit one
//! prompt and watch it stream, fan out a batch, and inspect the dashboard
//! endpoints.
//!
//! # Usage
//!
//! ```bash
//! # Stream one answer to stdout
//! promptdeck submit -u ana -p high "Explain ownership in one paragraph"
//!
//! # Fan out a batch of drafts (JSON array) and print each outcome
//! promptdeck batch drafts.json
//! cat drafts.json | promptdeck batch -
//!
//! # Dashboard
//! promptdeck analytics
//! promptdeck history --json
//! promptdeck settings --api-key sk-... --high 1024:500
//! promptdeck health
//!
//! # Verbose logging
//! RUST_LOG=debug promptdeck submit -u ana "hi"
//! ```
//!
//! # Environment Variables
//!
//! - `PROMPTDECK_API_URL`: Server base URL (default: http://localhost:8000)
//! - `PROMPTDECK_USERNAME`: Default username for `submit`
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)

mod output;

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

use promptdeck_core::config::{self, ConfigOverrides};
use promptdeck_core::{
    HttpBackend, Priority, PriorityThreshold, RequestDraft, SessionRegistry, SettingsUpdate,
};

use output::SessionReport;

#[derive(Debug, Parser)]
#[command(name = "promptdeck", version, about = "Submit prompts to a batching text-generation server")]
struct Cli {
    /// Server base URL (overrides config file and environment)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Whole-request timeout in seconds (0 = none)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Submit one prompt and stream the answer to stdout
    Submit(SubmitArgs),
    /// Submit a JSON array of drafts concurrently
    Batch {
        /// File with `[{"username", "prompt", "priority"}, ...]`, or `-` for stdin
        input: String,
    },
    /// Show request analytics
    Analytics,
    /// Show chat history
    History {
        /// Print raw normalised entries as JSON
        #[arg(long)]
        json: bool,
    },
    /// Update server settings (only the given fields are sent)
    Settings(SettingsArgs),
    /// Check server health
    Health,
}

#[derive(Debug, Args)]
struct SubmitArgs {
    /// Who is asking
    #[arg(short, long, env = "PROMPTDECK_USERNAME")]
    username: String,

    /// low, medium or high (or 0, 1, 2)
    #[arg(short, long, default_value = "medium")]
    priority: Priority,

    /// Prompt text
    #[arg(required = true, num_args = 1..)]
    prompt: Vec<String>,
}

#[derive(Debug, Args)]
struct SettingsArgs {
    /// Upstream API key
    #[arg(long)]
    api_key: Option<String>,

    /// High-priority threshold as TOKENS:LATENCY
    #[arg(long, value_parser = output::parse_threshold)]
    high: Option<PriorityThreshold>,

    /// Medium-priority threshold as TOKENS:LATENCY
    #[arg(long, value_parser = output::parse_threshold)]
    medium: Option<PriorityThreshold>,

    /// Low-priority threshold as TOKENS:LATENCY
    #[arg(long, value_parser = output::parse_threshold)]
    low: Option<PriorityThreshold>,
}

impl From<SettingsArgs> for SettingsUpdate {
    fn from(args: SettingsArgs) -> Self {
        Self {
            api_key: args.api_key,
            high_priority: args.high,
            medium_priority: args.medium,
            low_priority: args.low,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("promptdeck_core=info,promptdeck=info")
            }),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    let cli = Cli::parse();

    let mut client_config = match cli.config.clone() {
        Some(path) => config::load_config_from_path(Some(path)),
        None => config::load_config(),
    }
    .context("Failed to load configuration")?;

    let mut overrides = ConfigOverrides::new();
    if let Some(url) = cli.api_url.clone() {
        overrides = overrides.with_base_url(url);
    }
    if let Some(secs) = cli.timeout {
        overrides = overrides.with_request_timeout_secs(secs);
    }
    overrides
        .apply(&mut client_config)
        .context("Invalid command-line configuration")?;

    info!(
        base_url = %client_config.base_url,
        source = %client_config.source(),
        "Using server"
    );
    let backend = HttpBackend::from_config(&client_config)?;

    match cli.command {
        Command::Submit(args) => submit(backend, args).await,
        Command::Batch { input } => batch(backend, &input).await,
        Command::Analytics => {
            let analytics = backend.fetch_analytics().await?;
            print!("{}", output::render_analytics(&analytics));
            Ok(ExitCode::SUCCESS)
        }
        Command::History { json } => {
            let items = backend.fetch_chat_history().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else {
                print!("{}", output::render_history(&items));
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Settings(args) => {
            let update = SettingsUpdate::from(args);
            if backend.put_settings(&update).await? {
                println!("Settings updated.");
            } else {
                println!("Nothing to update.");
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Health => match backend.health().await {
            Ok(health) => {
                println!("{} (version {})", health.status, health.version);
                Ok(ExitCode::SUCCESS)
            }
            Err(e) => {
                eprintln!("unhealthy: {e}");
                Ok(ExitCode::FAILURE)
            }
        },
    }
}

/// Stream one answer to stdout as it arrives
async fn submit(backend: HttpBackend, args: SubmitArgs) -> anyhow::Result<ExitCode> {
    let registry = SessionRegistry::new(backend);
    let draft = RequestDraft::new(args.username, args.prompt.join(" "), args.priority);

    let Some(mut handle) = registry.submit_one(&draft) else {
        anyhow::bail!("Username and prompt must not be empty");
    };

    let mut stdout = std::io::stdout();
    let mut printed = 0;
    let finished = loop {
        let snapshot = handle.snapshot();
        let partial = snapshot.text();
        let fresh = output::unseen_suffix(partial, printed);
        if !fresh.is_empty() {
            stdout.write_all(fresh.as_bytes())?;
            stdout.flush()?;
            printed = partial.len();
        }
        if snapshot.is_terminal() {
            break snapshot;
        }

        tokio::select! {
            changed = handle.changed() => {
                if changed.is_none() {
                    break handle.snapshot();
                }
            }
            _ = tokio::signal::ctrl_c() => {
                warn!(request_id = %handle.id(), "Interrupted, cancelling request");
                registry.discard(handle.id());
            }
        }
    };

    if let Some(result) = finished.result() {
        stdout.write_all(output::unseen_suffix(&result.text, printed).as_bytes())?;
        writeln!(stdout)?;
        info!(
            request_id = %result.request_id,
            tokens_used = result.tokens_used,
            latency_ms = result.latency_ms,
            "Completed"
        );
        return Ok(ExitCode::SUCCESS);
    }

    if printed > 0 {
        writeln!(stdout)?;
    }
    eprintln!("error: {}", finished.visible_output());
    Ok(ExitCode::FAILURE)
}

/// Fan out a batch and print each outcome as one JSON line when it finishes
async fn batch(backend: HttpBackend, input: &str) -> anyhow::Result<ExitCode> {
    let raw = if input == "-" {
        let mut buf = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buf)
            .await
            .context("Failed to read drafts from stdin")?;
        buf
    } else {
        tokio::fs::read_to_string(input)
            .await
            .with_context(|| format!("Failed to read {input}"))?
    };
    let drafts: Vec<RequestDraft> =
        serde_json::from_str(&raw).context("Drafts must be a JSON array of objects")?;

    let registry = SessionRegistry::new(backend);
    let handles = registry.submit_all(&drafts);
    let skipped = drafts.len() - handles.len();
    if skipped > 0 {
        warn!(skipped, "Skipped drafts with empty username or prompt");
    }

    let mut pending: FuturesUnordered<_> = handles.into_iter().map(|h| h.wait()).collect();
    let mut failures = 0usize;
    while let Some(session) = pending.next().await {
        let report = SessionReport::from_session(&session);
        if !report.succeeded() {
            failures += 1;
        }
        println!("{}", serde_json::to_string(&report)?);
    }

    let summary = registry.summary();
    info!(
        completed = summary.completed,
        failed = summary.failed,
        skipped,
        "Batch finished"
    );

    Ok(if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
