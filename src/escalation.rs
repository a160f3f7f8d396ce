//! Escalation sinks: where tasks go after exhausting their attempts.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::context::ServiceContext;
use crate::ports::{PortError, PortFuture};
use crate::store::TaskStore;
use crate::task::Task;

/// Hands a task that exhausted its attempts to a human.
///
/// The correction loop calls `escalate` exactly once per escalated task, with
/// the task's full attempt history and every verification result attached.
pub trait EscalationSink: Send + Sync {
    /// Delivers the escalation.
    ///
    /// # Errors
    ///
    /// Returns an error if delivery failed; the loop surfaces it to the host.
    fn escalate<'a>(
        &'a self,
        task: &'a Task,
        reason: &'a str,
    ) -> PortFuture<'a, Result<(), PortError>>;
}

/// Persisted form of an escalation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationRecord {
    /// The escalated task, including its whole history.
    pub task: Task,
    /// Why it was escalated.
    pub reason: String,
    /// When the escalation was raised.
    pub escalated_at: DateTime<Utc>,
}

/// Logs the escalation report at WARN.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEscalationSink;

impl EscalationSink for LogEscalationSink {
    fn escalate<'a>(
        &'a self,
        task: &'a Task,
        reason: &'a str,
    ) -> PortFuture<'a, Result<(), PortError>> {
        Box::pin(async move {
            log_escalation(task, reason);
            Ok(())
        })
    }
}

/// Logs the escalation and writes it to `<root>/escalations/<task-id>.yaml`.
pub struct StoreEscalationSink {
    ctx: Arc<ServiceContext>,
    root: PathBuf,
}

impl StoreEscalationSink {
    /// Creates a sink writing under the given store root.
    #[must_use]
    pub fn new(ctx: Arc<ServiceContext>, root: &Path) -> Self {
        Self { ctx, root: root.to_path_buf() }
    }
}

impl std::fmt::Debug for StoreEscalationSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreEscalationSink").field("root", &self.root).finish_non_exhaustive()
    }
}

impl EscalationSink for StoreEscalationSink {
    fn escalate<'a>(
        &'a self,
        task: &'a Task,
        reason: &'a str,
    ) -> PortFuture<'a, Result<(), PortError>> {
        Box::pin(async move {
            log_escalation(task, reason);
            let record = EscalationRecord {
                task: task.clone(),
                reason: reason.to_string(),
                escalated_at: self.ctx.clock.now(),
            };
            let yaml = serde_yaml::to_string(&record)?;
            let path = TaskStore::new(&self.ctx, &self.root).save_escalation(task.id(), &yaml)?;
            tracing::info!(task_id = task.id(), path = %path.display(), "escalation written");
            Ok(())
        })
    }
}

fn log_escalation(task: &Task, reason: &str) {
    tracing::warn!(
        task_id = task.id(),
        attempts = task.attempts().len(),
        reason,
        "escalating to human review\n{}",
        format_escalation(task, reason)
    );
}

/// Renders the human-facing failure report for an escalated task.
///
/// Lists every attempt with its verifier, check counts and failures, then
/// the last three executor errors.
#[must_use]
pub fn format_escalation(task: &Task, reason: &str) -> String {
    let mut lines = vec![
        "ESCALATING TO HUMAN REVIEW".to_string(),
        format!("Task: {}", task.id()),
        format!("Description: {}", task.description()),
        format!("Reason: {reason}"),
        format!("Attempts: {}", task.attempts().len()),
    ];

    for attempt in task.attempts() {
        lines.push(String::new());
        match (&attempt.verification, &attempt.executor_error) {
            (Some(result), _) => {
                lines.push(format!(
                    "Attempt {}: verified by {}, {}/{} checks passed",
                    attempt.attempt_number,
                    result.verifier_identity(),
                    result.passed_checks(),
                    result.total_checks()
                ));
                for failure in result.failures() {
                    lines.push(format!(
                        "  - [{}] {}: {}",
                        failure.criterion_kind(),
                        failure.target(),
                        failure.reason()
                    ));
                }
            }
            (None, Some(error)) => {
                lines.push(format!("Attempt {}: executor failed: {error}", attempt.attempt_number));
            }
            (None, None) => lines.push(format!("Attempt {}: not verified", attempt.attempt_number)),
        }
        if let Some(hint) = &attempt.alternative_approach_hint {
            lines.push(format!("  hint given: {hint}"));
        }
    }

    let errors: Vec<&str> =
        task.attempts().iter().filter_map(|a| a.executor_error.as_deref()).collect();
    if !errors.is_empty() {
        lines.push(String::new());
        lines.push("Recent executor errors:".to_string());
        for error in &errors[errors.len().saturating_sub(3)..] {
            lines.push(format!("  - {error}"));
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{
        AttemptRecord, CompletionCriterion, Evidence, TaskOutcome, VerificationResult,
    };
    use crate::testing::{fake_context, FixedClock, MemFs, ScriptedHttp, ScriptedShell};

    fn attempt(
        n: u32,
        verification: Option<VerificationResult>,
        error: Option<&str>,
    ) -> AttemptRecord {
        AttemptRecord {
            attempt_number: n,
            criteria: vec![CompletionCriterion::file_exists("out.txt")],
            executor_output: None,
            executor_error: error.map(String::from),
            self_review_passed: true,
            requested_changes: Vec::new(),
            local_patches: 0,
            verification,
            alternative_approach_hint: (n > 1).then(|| format!("hint {n}")),
            started_at: FixedClock::default().0,
            finished_at: FixedClock::default().0,
        }
    }

    fn escalated_task() -> Task {
        let criterion = CompletionCriterion::file_exists("out.txt");
        let failed = Evidence::new(
            &criterion,
            false,
            String::new(),
            "File does not exist: out.txt".into(),
            FixedClock::default().0,
        );
        let mut task = Task::new("task-7", "write out.txt", vec![criterion]);
        let result = VerificationResult::new("task-7".into(), "qa".into(), vec![failed]);
        task.append_attempt(attempt(1, Some(result), None)).unwrap();
        task.append_attempt(attempt(2, None, Some("disk full"))).unwrap();
        task.append_attempt(attempt(3, None, Some("permission denied"))).unwrap();
        task.finish(TaskOutcome::EscalatedToHuman { reason: "3 attempts failed".into() }).unwrap();
        task
    }

    #[test]
    fn report_lists_every_attempt_and_recent_errors() {
        let report = format_escalation(&escalated_task(), "3 attempts failed");

        assert!(report.starts_with("ESCALATING TO HUMAN REVIEW\nTask: task-7"));
        assert!(report.contains("Attempts: 3"));
        assert!(report.contains("Attempt 1: verified by qa, 0/1 checks passed"));
        assert!(report.contains("  - [file_exists] out.txt: File does not exist: out.txt"));
        assert!(report.contains("Attempt 2: executor failed: disk full"));
        assert!(report.contains("  hint given: hint 3"));
        assert!(report.ends_with("Recent executor errors:\n  - disk full\n  - permission denied"));
    }

    #[tokio::test]
    async fn store_sink_writes_the_full_history() {
        let fs = MemFs::default();
        let ctx = fake_context(fs.clone(), ScriptedShell::default(), ScriptedHttp::default());
        let sink = StoreEscalationSink::new(ctx, Path::new("/store"));
        let task = escalated_task();

        sink.escalate(&task, "3 attempts failed").await.unwrap();

        let yaml = fs.get("/store/escalations/task-7.yaml").unwrap();
        let record: EscalationRecord = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(record.task, task);
        assert_eq!(record.reason, "3 attempts failed");
        assert_eq!(record.escalated_at, FixedClock::default().0);
    }

    #[tokio::test]
    async fn log_sink_accepts_every_escalation() {
        assert!(LogEscalationSink.escalate(&escalated_task(), "why").await.is_ok());
    }
}
