//! Task, attempt and evidence types.
//!
//! A [`Task`] owns its attempt history. Attempt numbers are checked on
//! append, so the history is always `1, 2, 3, ...`, and nothing can be
//! appended once the task reaches a [`TaskOutcome`].

pub mod attempt;
pub mod criterion;
pub mod evidence;

use serde::{Deserialize, Serialize};

pub use attempt::{AttemptRecord, ExecutorOutput};
pub use criterion::{
    default_criteria_for, ClaimedOutput, CompletionCriterion, CriterionKind, OutputKind,
};
pub use evidence::{Evidence, VerificationResult};

use crate::error::TaskError;

/// Terminal state of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TaskOutcome {
    /// The last attempt passed verification.
    Completed,
    /// Every attempt failed; a human has been asked to take over.
    EscalatedToHuman {
        /// Why the task was escalated.
        reason: String,
    },
    /// An external dependency was unavailable or the task was cancelled.
    Blocked {
        /// What blocked the task.
        reason: String,
    },
}

impl TaskOutcome {
    /// The `snake_case` name of the outcome.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::EscalatedToHuman { .. } => "escalated_to_human",
            Self::Blocked { .. } => "blocked",
        }
    }
}

/// A unit of work judged by the correction loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    id: String,
    description: String,
    criteria: Vec<CompletionCriterion>,
    #[serde(default)]
    attempts: Vec<AttemptRecord>,
    #[serde(default)]
    outcome: Option<TaskOutcome>,
}

impl Task {
    /// Creates a task with its initial criterion set and an empty history.
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        criteria: Vec<CompletionCriterion>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            criteria,
            attempts: Vec::new(),
            outcome: None,
        }
    }

    /// The task identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// What the executor is asked to do.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The criteria supplied when the task was created.
    #[must_use]
    pub fn criteria(&self) -> &[CompletionCriterion] {
        &self.criteria
    }

    /// The attempt history, oldest first.
    #[must_use]
    pub fn attempts(&self) -> &[AttemptRecord] {
        &self.attempts
    }

    /// The terminal outcome, if reached.
    #[must_use]
    pub fn outcome(&self) -> Option<&TaskOutcome> {
        self.outcome.as_ref()
    }

    /// Returns `true` once the task has an outcome.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.outcome.is_some()
    }

    /// The number the next appended attempt must carry.
    #[must_use]
    pub fn next_attempt_number(&self) -> u32 {
        u32::try_from(self.attempts.len()).map_or(u32::MAX, |n| n.saturating_add(1))
    }

    /// Every verification result in the history, oldest first.
    pub fn verification_history(&self) -> impl Iterator<Item = &VerificationResult> {
        self.attempts.iter().filter_map(|a| a.verification.as_ref())
    }

    /// Appends an attempt to the history.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::AlreadyTerminal`] if the task has an outcome and
    /// [`TaskError::OutOfOrder`] if the record's number is not
    /// [`Self::next_attempt_number`].
    pub fn append_attempt(&mut self, record: AttemptRecord) -> Result<(), TaskError> {
        if self.is_terminal() {
            return Err(TaskError::AlreadyTerminal(self.id.clone()));
        }
        let expected = self.next_attempt_number();
        if record.attempt_number != expected {
            return Err(TaskError::OutOfOrder {
                task_id: self.id.clone(),
                expected,
                found: record.attempt_number,
            });
        }
        self.attempts.push(record);
        Ok(())
    }

    /// Moves the task to its terminal outcome.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::AlreadyTerminal`] if an outcome is already set and
    /// [`TaskError::NotVerified`] if `Completed` is requested while the last
    /// attempt did not pass verification.
    pub fn finish(&mut self, outcome: TaskOutcome) -> Result<(), TaskError> {
        if self.is_terminal() {
            return Err(TaskError::AlreadyTerminal(self.id.clone()));
        }
        if outcome == TaskOutcome::Completed
            && !self.attempts.last().is_some_and(AttemptRecord::verified)
        {
            return Err(TaskError::NotVerified(self.id.clone()));
        }
        self.outcome = Some(outcome);
        Ok(())
    }
}
