//! Command-line interface.

use clap::{Parser, Subcommand};

use padmigrate_infra::redis::queue::DEFAULT_KEY_PREFIX;

/// Migrates exported hackpad archives into the new platform.
#[derive(Debug, Parser)]
#[command(name = "padmigrate-worker", version)]
pub struct Cli {
    /// Redis holding the job queue
    #[arg(long, env = "PADMIGRATE_REDIS_URL", default_value = "redis://127.0.0.1:6379", global = true)]
    pub redis_url: String,

    /// Prefix of the queue keys
    #[arg(long, env = "PADMIGRATE_QUEUE_PREFIX", default_value = DEFAULT_KEY_PREFIX, global = true)]
    pub queue_prefix: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Recover interrupted claims, then process jobs until killed (default)
    Run,
    /// Move a job left in processing back onto the pending list
    Requeue {
        /// Archive file stem identifying the job
        job_id: String,
    },
    /// Print queue counts as JSON
    Status,
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Run)
    }
}
