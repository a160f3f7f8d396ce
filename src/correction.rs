//! The bounded correction loop.
//!
//! One loop drives one [`Task`] through
//! `Executing -> SelfReviewing -> (LocalPatch -> Executing)* -> Verifying`
//! until the task is `Completed`, `EscalatedToHuman` or `Blocked`. Steps of a
//! task run strictly in sequence; separate tasks can run in separate loops.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::analyze::FailureAnalyzer;
use crate::context::ServiceContext;
use crate::error::{ExecutionError, LoopError, SelfAttestationError, TaskError};
use crate::escalation::EscalationSink;
use crate::executor::{ExecutionContext, TaskExecutor};
use crate::review::SelfReviewer;
use crate::task::{
    default_criteria_for, AttemptRecord, CompletionCriterion, ExecutorOutput, Task, TaskOutcome,
};
use crate::verify::{describe_timeout, VerificationRequest, Verifier};

/// Retry bounds for a correction loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopConfig {
    /// Attempts before escalating to a human.
    pub max_attempts: u32,
    /// Local patch rounds per attempt before verification is forced.
    pub max_local_patches: u32,
    /// Deadline for the whole task; `None` waits indefinitely.
    pub task_timeout: Option<Duration>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self { max_attempts: 3, max_local_patches: 2, task_timeout: None }
    }
}

/// What one attempt produced, before it is appended to the task.
struct AttemptStep {
    record: AttemptRecord,
    blocked: Option<String>,
}

/// Runs tasks through execute, self-review, verify and retry.
pub struct CorrectionLoop {
    ctx: Arc<ServiceContext>,
    executor: Arc<dyn TaskExecutor>,
    reviewer: Box<dyn SelfReviewer>,
    verifier: Verifier,
    analyzer: FailureAnalyzer,
    sink: Arc<dyn EscalationSink>,
    config: LoopConfig,
}

impl CorrectionLoop {
    /// Wires a loop from its collaborators.
    #[must_use]
    pub fn new(
        ctx: Arc<ServiceContext>,
        executor: Arc<dyn TaskExecutor>,
        reviewer: Box<dyn SelfReviewer>,
        verifier: Verifier,
        analyzer: FailureAnalyzer,
        sink: Arc<dyn EscalationSink>,
        config: LoopConfig,
    ) -> Self {
        Self { ctx, executor, reviewer, verifier, analyzer, sink, config }
    }

    /// Runs `task` to a terminal outcome, honoring the configured deadline.
    ///
    /// # Errors
    ///
    /// See [`Self::run_until`].
    pub async fn run(&self, task: Task) -> Result<Task, LoopError> {
        match self.config.task_timeout {
            Some(limit) => {
                let deadline = async move {
                    tokio::time::sleep(limit).await;
                    format!("task timed out after {}", describe_timeout(limit))
                };
                self.drive(task, deadline).await
            }
            None => self.drive(task, std::future::pending()).await,
        }
    }

    /// Runs `task` until it reaches an outcome or `cancel` resolves.
    ///
    /// Cancellation abandons the attempt in progress and finishes the task as
    /// `Blocked`. The returned task carries its full history.
    ///
    /// # Errors
    ///
    /// Returns [`LoopError::SelfAttestation`] when executor and verifier
    /// share an identity (no attempt is recorded), [`LoopError::EscalationFailed`]
    /// when the escalation sink rejects an escalated task, and
    /// [`LoopError::Task`] when `task` is already terminal.
    pub async fn run_until<C>(&self, task: Task, cancel: C) -> Result<Task, LoopError>
    where
        C: Future<Output = ()> + Send,
    {
        self.drive(task, async move {
            cancel.await;
            "cancelled".to_string()
        })
        .await
    }

    async fn drive<C>(&self, mut task: Task, cancel: C) -> Result<Task, LoopError>
    where
        C: Future<Output = String> + Send,
    {
        if task.is_terminal() {
            return Err(TaskError::AlreadyTerminal(task.id().to_string()).into());
        }
        if self.executor.identity() == self.verifier.identity() {
            error!(
                task_id = task.id(),
                identity = self.executor.identity(),
                "executor and verifier share an identity"
            );
            return Err(SelfAttestationError {
                task_id: task.id().to_string(),
                identity: self.executor.identity().to_string(),
            }
            .into());
        }

        tokio::pin!(cancel);
        let max_attempts = self.config.max_attempts.max(1);
        let mut hint: Option<String> = None;

        loop {
            let attempt_number = task.next_attempt_number();
            info!(task_id = task.id(), attempt = attempt_number, max_attempts, "starting attempt");

            let step = tokio::select! {
                biased;
                reason = &mut cancel => Err(reason),
                step = self.attempt(&task, attempt_number, hint.as_deref()) => Ok(step),
            };
            let AttemptStep { record, blocked } = match step {
                Ok(step) => step?,
                Err(reason) => {
                    warn!(task_id = task.id(), attempt = attempt_number, %reason, "task blocked");
                    task.finish(TaskOutcome::Blocked { reason })?;
                    return Ok(task);
                }
            };

            let verified = record.verified();
            let next_hint = (!verified).then(|| self.hint_for(&record));
            task.append_attempt(record)?;

            if let Some(reason) = blocked {
                warn!(task_id = task.id(), attempt = attempt_number, %reason, "task blocked");
                task.finish(TaskOutcome::Blocked { reason })?;
                return Ok(task);
            }
            if verified {
                info!(task_id = task.id(), attempt = attempt_number, "task completed");
                task.finish(TaskOutcome::Completed)?;
                return Ok(task);
            }
            if attempt_number >= max_attempts {
                return self.escalate(task).await;
            }

            info!(
                task_id = task.id(),
                attempt = attempt_number,
                hint = next_hint.as_deref().unwrap_or_default(),
                "retrying with alternative approach"
            );
            hint = next_hint;
        }
    }

    async fn attempt(
        &self,
        task: &Task,
        attempt_number: u32,
        hint: Option<&str>,
    ) -> Result<AttemptStep, SelfAttestationError> {
        let started_at = self.ctx.clock.now();
        let mut requested_changes: Vec<String> = Vec::new();
        let mut local_patches = 0;

        let (output, criteria, review) = loop {
            let context = ExecutionContext {
                attempt_number,
                prior_attempts: task.attempts(),
                alternative_approach_hint: hint,
                requested_changes: &requested_changes,
            };
            let output = match self.executor.execute(task.description(), context).await {
                Ok(output) => output,
                Err(err) => {
                    warn!(
                        task_id = task.id(),
                        attempt = attempt_number,
                        error = %err,
                        "executor failed"
                    );
                    let blocked = match &err {
                        ExecutionError::DependencyUnavailable(reason) => Some(reason.clone()),
                        ExecutionError::Failed(_) => None,
                    };
                    let record = AttemptRecord {
                        attempt_number,
                        criteria: task.criteria().to_vec(),
                        executor_output: None,
                        executor_error: Some(err.to_string()),
                        self_review_passed: false,
                        requested_changes,
                        local_patches,
                        verification: None,
                        alternative_approach_hint: hint.map(String::from),
                        started_at,
                        finished_at: self.ctx.clock.now(),
                    };
                    return Ok(AttemptStep { record, blocked });
                }
            };

            let criteria = effective_criteria(task, &output);
            let review = self.reviewer.review(&output, &criteria);
            debug!(
                task_id = task.id(),
                attempt = attempt_number,
                passed = review.passed,
                changes = review.requested_changes.len(),
                "self-review finished"
            );
            if review.passed {
                break (output, criteria, review);
            }
            if local_patches >= self.config.max_local_patches {
                info!(
                    task_id = task.id(),
                    attempt = attempt_number,
                    local_patches,
                    "local patch limit reached; verifying anyway"
                );
                break (output, criteria, review);
            }
            local_patches += 1;
            info!(task_id = task.id(), attempt = attempt_number, local_patches, "patching locally");
            requested_changes = review.requested_changes;
        };

        let request = VerificationRequest {
            task_id: task.id(),
            executor_identity: self.executor.identity(),
            criteria: &criteria,
        };
        let verification = self.verifier.verify(&request).await?;

        let record = AttemptRecord {
            attempt_number,
            criteria,
            executor_output: Some(output),
            executor_error: None,
            self_review_passed: review.passed,
            requested_changes: review.requested_changes,
            local_patches,
            verification: Some(verification),
            alternative_approach_hint: hint.map(String::from),
            started_at,
            finished_at: self.ctx.clock.now(),
        };
        Ok(AttemptStep { record, blocked: None })
    }

    fn hint_for(&self, record: &AttemptRecord) -> String {
        match (&record.verification, &record.executor_error) {
            (Some(result), _) => self.analyzer.analyze(result).alternative_approach_hint,
            (None, Some(error)) => {
                self.analyzer.analyze_execution_error(error).alternative_approach_hint
            }
            (None, None) => "retry the task from scratch".to_string(),
        }
    }

    async fn escalate(&self, mut task: Task) -> Result<Task, LoopError> {
        let reason = escalation_reason(task.attempts());
        task.finish(TaskOutcome::EscalatedToHuman { reason: reason.clone() })?;
        warn!(task_id = task.id(), %reason, "escalating task");

        if let Err(source) = self.sink.escalate(&task, &reason).await {
            error!(task_id = task.id(), error = %source, "escalation sink failed");
            return Err(LoopError::EscalationFailed { task: Box::new(task), source });
        }
        Ok(task)
    }
}

impl std::fmt::Debug for CorrectionLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorrectionLoop")
            .field("executor", &self.executor.identity())
            .field("verifier", &self.verifier.identity())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Summarizes why every attempt in `attempts` fell short.
fn escalation_reason(attempts: &[AttemptRecord]) -> String {
    let errors = attempts.iter().filter(|a| a.executor_error.is_some()).count();
    if errors == 0 {
        return format!("verification failed after {} attempts", attempts.len());
    }
    let rejected = attempts.iter().filter(|a| a.verification.is_some()).count();
    format!(
        "{} attempts failed ({rejected} failed verification, {errors} executor errors)",
        attempts.len()
    )
}

/// Criteria an attempt is verified against.
///
/// The executor's revised set wins over the task's; when both are empty the
/// defaults for the claimed file outputs apply.
fn effective_criteria(task: &Task, output: &ExecutorOutput) -> Vec<CompletionCriterion> {
    let criteria = output.criteria.as_deref().unwrap_or(task.criteria());
    if criteria.is_empty() {
        default_criteria_for(&output.outputs)
    } else {
        criteria.to_vec()
    }
}
