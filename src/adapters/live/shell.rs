//! Live shell executor using `tokio::process`.
//!
//! Each command runs in its own process group so that a timeout can take
//! down the whole tree the shell spawned, not just `sh` itself. The group is
//! also killed when the returned future is dropped before the command exits.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::ports::shell::{ShellExecutor, ShellOutput};
use crate::ports::{PortError, PortFuture};

/// How long to wait for pipe readers after the process is gone.
const PIPE_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Live shell executor that runs commands via `sh -c`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LiveShellExecutor;

impl ShellExecutor for LiveShellExecutor {
    fn run<'a>(
        &'a self,
        command: &'a str,
        timeout: Duration,
    ) -> PortFuture<'a, Result<ShellOutput, PortError>> {
        Box::pin(run_with_timeout(command, timeout))
    }
}

async fn run_with_timeout(command: &str, timeout: Duration) -> Result<ShellOutput, PortError> {
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd.spawn()?;
    // Declared after `child` so it drops first.
    let mut guard = GroupKillGuard { pid: child.id() };
    debug!(command, pid = child.id(), "spawned command");
    let stdout = spawn_reader(child.stdout.take());
    let stderr = spawn_reader(child.stderr.take());

    let (exit_code, timed_out) = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(status) => {
            guard.disarm();
            (status?.code().unwrap_or(-1), false)
        }
        Err(_) => {
            warn!(
                command,
                timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                "command timed out, killing it"
            );
            terminate(&mut child).await;
            guard.disarm();
            (-1, true)
        }
    };

    Ok(ShellOutput {
        exit_code,
        stdout: drain(stdout).await,
        stderr: drain(stderr).await,
        timed_out,
    })
}

fn spawn_reader<R>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    pipe.map(|mut pipe| {
        tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Err(err) = pipe.read_to_end(&mut buf).await {
                warn!(error = %err, bytes = buf.len(), "failed to read command output");
            }
            buf
        })
    })
}

async fn drain(reader: Option<JoinHandle<Vec<u8>>>) -> String {
    let Some(mut handle) = reader else {
        return String::new();
    };
    match tokio::time::timeout(PIPE_DRAIN_GRACE, &mut handle).await {
        Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
        Ok(Err(_)) => String::new(),
        Err(_) => {
            // Something outside the process group still holds the pipe open.
            handle.abort();
            String::new()
        }
    }
}

/// Kills the process group of a command whose future was dropped mid-run.
///
/// `kill_on_drop` only reaches `sh`; anything it forked would outlive it.
struct GroupKillGuard {
    pid: Option<u32>,
}

impl GroupKillGuard {
    fn disarm(&mut self) {
        self.pid = None;
    }
}

impl Drop for GroupKillGuard {
    fn drop(&mut self) {
        let Some(pid) = self.pid.take() else {
            return;
        };
        #[cfg(unix)]
        {
            debug!(pid, "command abandoned before exit, killing its process group");
            let status = std::process::Command::new("kill")
                .args(["-KILL", "--", &format!("-{pid}")])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status();
            match status {
                Ok(status) if status.success() => {}
                Ok(status) => debug!(pid, ?status, "process group kill reported failure"),
                Err(err) => warn!(pid, error = %err, "failed to signal process group"),
            }
        }
        #[cfg(not(unix))]
        let _ = pid;
    }
}

/// Kills the command's process group, then kills and reaps the shell itself.
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        let group = format!("-{pid}");
        match Command::new("kill").args(["-KILL", "--", &group]).status().await {
            Ok(status) if status.success() => {}
            Ok(status) => debug!(pid, ?status, "process group kill reported failure"),
            Err(err) => warn!(pid, error = %err, "failed to signal process group"),
        }
    }
    if let Err(err) = child.kill().await {
        warn!(error = %err, "failed to kill timed-out command");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONG: Duration = Duration::from_secs(30);

    #[tokio::test]
    async fn runs_echo_command() {
        let result = LiveShellExecutor.run("echo hello", LONG).await.unwrap();

        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout.trim(), "hello");
        assert!(result.stderr.is_empty());
        assert!(result.success());
    }

    #[tokio::test]
    async fn captures_exit_code_and_stderr() {
        let result = LiveShellExecutor
            .run("echo oops >&2; exit 42", LONG)
            .await
            .unwrap();

        assert_eq!(result.exit_code, 42);
        assert_eq!(result.stderr.trim(), "oops");
        assert!(!result.success());
    }

    #[tokio::test]
    async fn kills_commands_that_exceed_the_timeout() {
        let started = std::time::Instant::now();
        let result = LiveShellExecutor
            .run("echo started; sleep 30; echo never", Duration::from_millis(300))
            .await
            .unwrap();

        assert!(result.timed_out);
        assert!(!result.success());
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(result.stdout.contains("started"));
        assert!(!result.stdout.contains("never"));
    }

    /// True while `pid` exists and is not a zombie.
    fn is_running(pid: u32) -> bool {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Ok(stat) => stat
                .rsplit_once(')')
                .and_then(|(_, rest)| rest.trim_start().chars().next())
                .is_some_and(|state| state != 'Z'),
            Err(_) => false,
        }
    }

    async fn wait_until_gone(pid: u32) -> bool {
        for _ in 0..40 {
            if !is_running(pid) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        false
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn dropping_the_future_kills_background_children() {
        let dir = std::env::temp_dir().join(format!("vouch-shell-drop-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let pidfile = dir.join("pid");
        let command = format!("sleep 30 & echo $! > {}; wait", pidfile.display());

        let abandoned =
            tokio::time::timeout(Duration::from_millis(500), LiveShellExecutor.run(&command, LONG))
                .await;
        assert!(abandoned.is_err());

        let pid: u32 = std::fs::read_to_string(&pidfile).unwrap().trim().parse().unwrap();
        assert!(wait_until_gone(pid).await, "background sleep {pid} survived the drop");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
