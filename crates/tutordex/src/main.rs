//! TutorDex aggregation pipeline entry point.
//!
//! Thin dispatcher: parse the CLI, load config, hand off to `commands`. Each
//! subcommand wires only the adapters it needs via [`wiring`] instead of
//! standing up the whole pipeline for, say, a one-off `requeue-stale`.

mod cli;
mod commands;
mod config;
mod telegram_source;
mod wiring;

use std::process::ExitCode;

use clap::Parser;
use cli::{Cli, CollectorAction, Commands, WorkerAction};
use tutordex_logging::LogConfig;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = tutordex_logging::init_logging(LogConfig {
        app_name: "tutordex",
        verbose: cli.verbose,
        tui_mode: false,
    }) {
        eprintln!("failed to initialize logging: {err}");
        return ExitCode::FAILURE;
    }

    let resolved = match config::load(cli.config.clone()) {
        Ok(resolved) => resolved,
        Err(err) => {
            tracing::error!(error = %err, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Collector { action: CollectorAction::Tail { channels } } => {
            commands::collector_tail(&resolved, channels).await
        }
        Commands::Collector { action: CollectorAction::Backfill { since, until, channels } } => {
            commands::collector_backfill(&resolved, since, until, channels).await
        }
        Commands::Worker { action: WorkerAction::Run { workers } } => {
            commands::worker_run(&resolved, workers).await
        }
        Commands::Worker { action: WorkerAction::Oneshot } => commands::worker_oneshot(&resolved).await,
        Commands::RequeueStale => commands::requeue_stale(&resolved).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "command failed");
            ExitCode::FAILURE
        }
    }
}
