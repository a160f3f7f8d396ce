//! The task executor seam and the built-in shell executor.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::context::ServiceContext;
use crate::error::ExecutionError;
use crate::task::{AttemptRecord, ClaimedOutput, ExecutorOutput};
use crate::verify::describe_timeout;

/// Exit status a worker uses to report a missing dependency (`EX_TEMPFAIL`).
pub const EXIT_DEPENDENCY_UNAVAILABLE: i32 = 75;

/// Boxed future returned by [`TaskExecutor::execute`].
pub type ExecuteFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ExecutorOutput, ExecutionError>> + Send + 'a>>;

/// Everything an executor learns about earlier attempts.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionContext<'a> {
    /// The attempt being executed (1-based).
    pub attempt_number: u32,
    /// Completed attempts, oldest first.
    pub prior_attempts: &'a [AttemptRecord],
    /// Guidance derived from the previous failure; `None` on attempt 1.
    pub alternative_approach_hint: Option<&'a str>,
    /// Changes requested by self-review during a local patch round.
    pub requested_changes: &'a [String],
}

/// Produces work for a task.
///
/// Must be safe to call repeatedly for the same task: every retry and every
/// local patch round calls `execute` again.
pub trait TaskExecutor: Send + Sync {
    /// Identity recorded against the work, compared with the verifier's.
    fn identity(&self) -> &str;

    /// Does (or redoes) the work described by `description`.
    fn execute<'a>(
        &'a self,
        description: &'a str,
        context: ExecutionContext<'a>,
    ) -> ExecuteFuture<'a>;
}

/// Runs a shell command as the task worker.
///
/// The worker receives `VOUCH_TASK`, `VOUCH_ATTEMPT`, `VOUCH_HINT` and
/// `VOUCH_REQUESTED_CHANGES` (newline separated) in its environment and
/// declares outputs by printing `output: <path>` lines.
pub struct ShellTaskExecutor {
    ctx: Arc<ServiceContext>,
    identity: String,
    command: String,
    timeout: Duration,
}

impl ShellTaskExecutor {
    /// Creates an executor running `command` with the given timeout.
    pub fn new(
        ctx: Arc<ServiceContext>,
        identity: impl Into<String>,
        command: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self { ctx, identity: identity.into(), command: command.into(), timeout }
    }

    fn script(&self, description: &str, context: &ExecutionContext<'_>) -> String {
        let vars = [
            ("VOUCH_TASK", description.to_string()),
            ("VOUCH_ATTEMPT", context.attempt_number.to_string()),
            ("VOUCH_HINT", context.alternative_approach_hint.unwrap_or_default().to_string()),
            ("VOUCH_REQUESTED_CHANGES", context.requested_changes.join("\n")),
        ];
        let exports: Vec<String> =
            vars.iter().map(|(name, value)| format!("{name}={}", shell_quote(value))).collect();
        format!("export {}; {}", exports.join(" "), self.command)
    }
}

impl std::fmt::Debug for ShellTaskExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShellTaskExecutor")
            .field("identity", &self.identity)
            .field("command", &self.command)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl TaskExecutor for ShellTaskExecutor {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn execute<'a>(
        &'a self,
        description: &'a str,
        context: ExecutionContext<'a>,
    ) -> ExecuteFuture<'a> {
        let script = self.script(description, &context);
        Box::pin(async move {
            let output = self
                .ctx
                .shell
                .run(&script, self.timeout)
                .await
                .map_err(|e| {
                    ExecutionError::Failed(format!("could not start `{}`: {e}", self.command))
                })?;

            if output.timed_out {
                return Err(ExecutionError::Failed(format!(
                    "`{}` timed out after {}",
                    self.command,
                    describe_timeout(self.timeout)
                )));
            }
            if output.exit_code == EXIT_DEPENDENCY_UNAVAILABLE {
                return Err(ExecutionError::DependencyUnavailable(last_line(&output.combined())));
            }
            if !output.success() {
                return Err(ExecutionError::Failed(format!(
                    "`{}` exited with code {}: {}",
                    self.command,
                    output.exit_code,
                    last_line(&output.combined())
                )));
            }

            Ok(parse_output(&output.stdout, output.exit_code, &output.stderr))
        })
    }
}

fn parse_output(stdout: &str, exit_code: i32, stderr: &str) -> ExecutorOutput {
    let mut outputs = Vec::new();
    let mut summary = Vec::new();
    for line in stdout.lines() {
        match line.trim().strip_prefix("output:") {
            Some(path) if !path.trim().is_empty() => outputs.push(ClaimedOutput::file(path.trim())),
            Some(_) => {}
            None if !line.trim().is_empty() => summary.push(line.trim()),
            None => {}
        }
    }
    ExecutorOutput {
        summary: summary.join("\n"),
        outputs,
        criteria: None,
        payload: serde_json::json!({ "exit_code": exit_code, "stderr": stderr }),
    }
}

fn last_line(text: &str) -> String {
    text.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("no output").trim().to_string()
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{exited, fake_context, timed_out, MemFs, ScriptedHttp, ScriptedShell};

    const CONTEXT: ExecutionContext<'static> = ExecutionContext {
        attempt_number: 2,
        prior_attempts: &[],
        alternative_approach_hint: Some("don't guess"),
        requested_changes: &[],
    };

    fn executor(shell: &ScriptedShell) -> ShellTaskExecutor {
        let ctx = fake_context(MemFs::default(), shell.clone(), ScriptedHttp::default());
        ShellTaskExecutor::new(ctx, "worker", "./work.sh", Duration::from_secs(60))
    }

    fn script_for(exec: &ShellTaskExecutor) -> String {
        exec.script("write it", &CONTEXT)
    }

    #[tokio::test]
    async fn parses_declared_outputs_and_summary() {
        let shell = ScriptedShell::default();
        let exec = executor(&shell);
        let stdout = "wrote files\noutput: out.txt\noutput: \n";
        let shell = shell.respond(&script_for(&exec), Ok(exited(0, stdout, "")));

        let output = exec.execute("write it", CONTEXT).await.unwrap();

        assert_eq!(output.outputs, vec![ClaimedOutput::file("out.txt")]);
        assert_eq!(output.summary, "wrote files");
        assert_eq!(output.payload["exit_code"], 0);
        assert_eq!(shell.calls()[0].1, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn passes_context_through_environment() {
        let shell = ScriptedShell::default();
        let exec = executor(&shell);
        exec.execute("write it", CONTEXT).await.unwrap();

        let command = &shell.calls()[0].0;
        assert!(command.starts_with("export VOUCH_TASK='write it' VOUCH_ATTEMPT='2' "));
        assert!(command.contains(r"VOUCH_HINT='don'\''t guess'"));
        assert!(command.ends_with("; ./work.sh"));
    }

    #[tokio::test]
    async fn exit_75_means_dependency_unavailable() {
        let shell = ScriptedShell::default();
        let exec = executor(&shell);
        let _shell = shell.respond(&script_for(&exec), Ok(exited(75, "", "database is down\n")));

        let err = exec.execute("write it", CONTEXT).await.unwrap_err();
        assert_eq!(err, ExecutionError::DependencyUnavailable("database is down".into()));
    }

    #[tokio::test]
    async fn other_failures_are_execution_failures() {
        let shell = ScriptedShell::default();
        let exec = executor(&shell);
        let _shell = shell
            .respond(&script_for(&exec), Ok(exited(1, "", "boom")))
            .respond(&script_for(&exec), Ok(timed_out("")))
            .respond(&script_for(&exec), Err("sh: not found".into()));

        let first = exec.execute("write it", CONTEXT).await.unwrap_err();
        let second = exec.execute("write it", CONTEXT).await.unwrap_err();
        let third = exec.execute("write it", CONTEXT).await.unwrap_err();

        assert_eq!(first, ExecutionError::Failed("`./work.sh` exited with code 1: boom".into()));
        assert_eq!(second, ExecutionError::Failed("`./work.sh` timed out after 60s".into()));
        assert!(matches!(third, ExecutionError::Failed(msg) if msg.contains("sh: not found")));
    }
}
