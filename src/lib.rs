//! Bounded self-correction with independent verification.
//!
//! A task executor does the work, a [`SelfReviewer`](review::SelfReviewer)
//! pre-checks it, and a [`Verifier`](verify::Verifier) with a different
//! identity decides whether the task's completion criteria hold. Failed
//! verifications are analyzed into a hint for the next attempt; after the
//! last attempt the task is escalated to a human.

pub mod adapters;
pub mod analyze;
pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod correction;
pub mod error;
pub mod escalation;
pub mod executor;
pub mod logging;
pub mod ports;
pub mod review;
pub mod store;
pub mod task;
pub mod verify;

#[cfg(test)]
mod testing;

use clap::Parser;

/// Run the CLI with the provided arguments.
///
/// # Errors
///
/// Returns an error string when argument parsing fails or command execution fails.
pub fn run<I, T>(args: I) -> Result<(), String>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = cli::Cli::try_parse_from(args).map_err(|err| err.to_string())?;
    logging::init_logging(cli.verbose);
    commands::dispatch(&cli.command)
}
