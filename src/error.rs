//! Error types surfaced by the verification core.
//!
//! Per-criterion failures are never errors: they are recorded as failed
//! evidence. The types here cover executor failures (which consume an
//! attempt) and the structural defects that abort a correction loop.

use thiserror::Error;

use crate::ports::PortError;
use crate::task::Task;

/// A verifier was asked to judge work produced under its own identity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "self-attestation rejected for task {task_id}: identity '{identity}' cannot verify its own work"
)]
pub struct SelfAttestationError {
    /// The task whose verification was refused.
    pub task_id: String,
    /// The identity shared by executor and verifier.
    pub identity: String,
}

/// Failure raised by a task executor instead of producing output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    /// The executor ran but could not produce a result.
    #[error("execution failed: {0}")]
    Failed(String),
    /// Something the executor depends on is unavailable; the task is blocked.
    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),
}

/// Violations of a task's append-only history.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The task already reached a terminal outcome.
    #[error("task {0} already has a terminal outcome")]
    AlreadyTerminal(String),
    /// An attempt record arrived with the wrong sequence number.
    #[error("task {task_id} expected attempt {expected}, got {found}")]
    OutOfOrder {
        /// The task being appended to.
        task_id: String,
        /// The attempt number the history expects next.
        expected: u32,
        /// The attempt number carried by the record.
        found: u32,
    },
    /// `Completed` was requested but the last attempt did not pass verification.
    #[error("task {0} cannot complete without a passing verification")]
    NotVerified(String),
}

/// Errors that abort a correction loop instead of producing an outcome.
#[derive(Debug, Error)]
pub enum LoopError {
    /// Executor and verifier share an identity; the loop was mis-wired.
    #[error(transparent)]
    SelfAttestation(#[from] SelfAttestationError),
    /// The task was escalated but the escalation sink failed to accept it.
    ///
    /// The task, with its full history and `EscalatedToHuman` outcome, is
    /// handed back so the host can retry delivery.
    #[error("escalation of task {} failed: {source}", .task.id())]
    EscalationFailed {
        /// The escalated task.
        task: Box<Task>,
        /// The sink's error.
        source: PortError,
    },
    /// The task history rejected an update.
    #[error(transparent)]
    Task(#[from] TaskError),
}

/// Failures of the task store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record exists for the task.
    #[error("task {0} not found in store")]
    NotFound(String),
    /// The filesystem rejected a read, write or listing.
    #[error("failed to access {path}: {message}")]
    Io {
        /// The path being accessed.
        path: String,
        /// The filesystem error.
        message: String,
    },
    /// A record could not be encoded or decoded.
    #[error("malformed record for task {task_id}: {source}")]
    Serde {
        /// The task whose record is malformed.
        task_id: String,
        /// The YAML error.
        source: serde_yaml::Error,
    },
    /// The stored history length differs from what the writer expected.
    ///
    /// Signals that two writers processed the same task.
    #[error("task {task_id}: expected {expected} stored attempts, found {found}")]
    Conflict {
        /// The task being written.
        task_id: String,
        /// Attempt count the writer based its update on.
        expected: usize,
        /// Attempt count actually stored.
        found: usize,
    },
    /// A stored attempt differs from the writer's copy of the same attempt.
    #[error("task {task_id}: stored attempt {attempt} differs from the one being persisted")]
    Diverged {
        /// The task being written.
        task_id: String,
        /// The first attempt number that differs.
        attempt: u32,
    },
    /// The stored task rejected the update.
    #[error(transparent)]
    Task(#[from] TaskError),
}

/// Invalid configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A variable could not be parsed.
    #[error("{key}: invalid value {value:?}: {reason}")]
    Invalid {
        /// The environment variable name.
        key: String,
        /// The raw value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_attestation_message_names_identity() {
        let err = SelfAttestationError { task_id: "t-1".into(), identity: "agent-1".into() };
        let msg = err.to_string();
        assert!(msg.contains("agent-1"));
        assert!(msg.contains("t-1"));
    }

    #[test]
    fn loop_error_wraps_self_attestation_transparently() {
        let inner = SelfAttestationError { task_id: "t-1".into(), identity: "agent-1".into() };
        let err = LoopError::from(inner.clone());
        assert_eq!(err.to_string(), inner.to_string());
        assert!(matches!(err, LoopError::SelfAttestation(_)));
    }
}
