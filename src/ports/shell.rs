//! Shell executor port for running external commands under a deadline.

use std::time::Duration;

use super::{PortError, PortFuture};

/// The output of a shell command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellOutput {
    /// The exit code of the process, `-1` when it was killed by a signal.
    pub exit_code: i32,
    /// The captured standard output.
    pub stdout: String,
    /// The captured standard error.
    pub stderr: String,
    /// Whether the command was killed because it exceeded its timeout.
    pub timed_out: bool,
}

impl ShellOutput {
    /// Returns `true` if the command finished in time with exit code 0.
    #[must_use]
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == 0
    }

    /// Returns stdout and stderr joined, as recorded in evidence.
    #[must_use]
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
        }
    }
}

/// Executes shell commands with a bounded runtime.
pub trait ShellExecutor: Send + Sync {
    /// Runs a command string in the system shell.
    ///
    /// A command that outlives `timeout` is forcibly terminated and reported
    /// with `timed_out = true` rather than as an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be spawned.
    fn run<'a>(
        &'a self,
        command: &'a str,
        timeout: Duration,
    ) -> PortFuture<'a, Result<ShellOutput, PortError>>;
}
