//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Top-level CLI parser for `vouch`.
#[derive(Debug, Parser)]
#[command(
    name = "vouch",
    version,
    about = "Independently verify task completion, with bounded self-correction"
)]
pub struct Cli {
    /// Log debug output to stderr (overridden by `RUST_LOG`).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one verification pass over a criteria file.
    Verify {
        /// YAML list of completion criteria.
        criteria: PathBuf,
        /// Identity of whoever produced the work being verified.
        #[arg(long, default_value = "external-executor")]
        executor_id: String,
        /// Task ID to record in the result (generated when omitted).
        #[arg(long)]
        task_id: Option<String>,
        /// Print the result as JSON instead of a report.
        #[arg(long)]
        json: bool,
    },
    /// Run a task through the full correction loop.
    Run {
        /// What the task should accomplish.
        #[arg(long)]
        description: String,
        /// Shell command that performs the task.
        #[arg(long)]
        command: String,
        /// YAML list of completion criteria for the task.
        #[arg(long)]
        criteria: Option<PathBuf>,
        /// Identity recorded for the shell executor.
        #[arg(long, default_value = "shell-executor")]
        executor_id: String,
    },
    /// Show a stored task history, or list stored tasks.
    Show {
        /// The task ID to display. Lists all tasks when omitted.
        task_id: Option<String>,
    },
}
