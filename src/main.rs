//! CLI entry point for drivefetch.

use std::io::{self, IsTerminal};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use drivefetch_core::{DriveFetcher, ProgressEvent, extract_file_id, tool_identity};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

mod app_config;
mod cli;
mod progress;

use app_config::{VerbositySetting, build_fetch_config, env_api_key, load_file_config};
use cli::Args;
use progress::ProgressDisplay;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    let file_config = load_file_config(args.config.as_deref())?;

    // Priority: RUST_LOG env var > quiet flag > verbose flag > config file > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => file_config
                .as_ref()
                .and_then(|cfg| cfg.verbosity)
                .unwrap_or(VerbositySetting::Default)
                .filter_directive(),
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");
    info!(version = %tool_identity(), "drivefetch starting");

    let identifier = extract_file_id(&args.input).context("Could not determine file ID")?;
    let config = build_fetch_config(&args, file_config.as_ref(), env_api_key());
    debug!(?config, "resolved fetch configuration");

    let fetcher = DriveFetcher::new(&config)?;

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, cancelling download");
                cancel.cancel();
            }
        })
    };

    let show_progress = !args.no_progress && !args.quiet && io::stderr().is_terminal();
    let display = ProgressDisplay::new(show_progress);
    let on_progress = |event: &ProgressEvent| display.report(event);

    let outcome = fetcher
        .fetch_file_with_cancel(&identifier, Some(&on_progress), &cancel)
        .await;
    display.finish();
    ctrl_c.abort();

    match outcome {
        Ok(stored) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&stored)?);
            } else if !args.quiet {
                println!(
                    "Saved {} ({} bytes)",
                    stored.local_file_path.display(),
                    stored.file_size
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!(category = %e.category(), "download failed");
            if args.json {
                let body = serde_json::json!({
                    "error": e.category().as_str(),
                    "message": e.to_string(),
                });
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                eprintln!("Error: {e}");
            }
            Ok(ExitCode::FAILURE)
        }
    }
}
