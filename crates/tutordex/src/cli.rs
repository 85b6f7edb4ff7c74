//! CLI surface, matching the `casparian` binary's
//! `Cli { global flags, #[command(subcommand)] Commands }` shape.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "tutordex", about = "TutorDex aggregation pipeline")]
pub struct Cli {
    /// Enable verbose logging (debug to stderr in addition to the log file)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Path to the config TOML file (defaults to $TUTORDEX_CONFIG or
    /// ~/.tutordex/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Telegram ingestion: live tail or historical backfill
    Collector {
        #[command(subcommand)]
        action: CollectorAction,
    },

    /// Extraction worker orchestrator
    Worker {
        #[command(subcommand)]
        action: WorkerAction,
    },

    /// Requeue jobs stuck `processing` past the stale threshold and exit
    RequeueStale,
}

#[derive(Subcommand, Debug)]
pub enum CollectorAction {
    /// Subscribe to the live update stream and ingest forever
    Tail {
        /// Restrict to these channels (defaults to config's channel list)
        #[arg(long = "channels", value_delimiter = ',')]
        channels: Vec<String>,
    },

    /// Walk channel history within a time window and ingest each post
    Backfill {
        /// RFC3339 start of the window (inclusive)
        #[arg(long)]
        since: chrono::DateTime<chrono::Utc>,

        /// RFC3339 end of the window (inclusive)
        #[arg(long)]
        until: chrono::DateTime<chrono::Utc>,

        /// Restrict to these channels (defaults to config's channel list)
        #[arg(long = "channels", value_delimiter = ',')]
        channels: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum WorkerAction {
    /// Run the bounded worker pool until shutdown is signaled
    Run {
        /// Override the configured worker pool size
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Claim and process whatever jobs are pending right now, then exit
    Oneshot,
}
