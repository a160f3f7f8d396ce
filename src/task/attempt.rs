//! Executor output and per-attempt history records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::criterion::{ClaimedOutput, CompletionCriterion};
use super::evidence::VerificationResult;

/// What a task executor hands back after doing the work.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutorOutput {
    /// Short human-readable summary of what was done.
    #[serde(default)]
    pub summary: String,
    /// Outputs the executor claims to have produced.
    #[serde(default)]
    pub outputs: Vec<ClaimedOutput>,
    /// A revised criterion set for this attempt, when the task scope changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criteria: Option<Vec<CompletionCriterion>>,
    /// Opaque executor-specific result.
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// One iteration of the correction loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// 1-based position in the task's history.
    pub attempt_number: u32,
    /// The criteria this attempt was judged against, frozen at verification time.
    pub criteria: Vec<CompletionCriterion>,
    /// The executor's output, absent when the executor failed.
    pub executor_output: Option<ExecutorOutput>,
    /// The executor's error message, when it failed instead of producing output.
    pub executor_error: Option<String>,
    /// Whether the final self-review of this attempt passed.
    pub self_review_passed: bool,
    /// Findings of the last self-review.
    pub requested_changes: Vec<String>,
    /// How many local patch iterations ran before verification.
    pub local_patches: u32,
    /// The authoritative verdict, absent when verification never ran.
    pub verification: Option<VerificationResult>,
    /// The hint this attempt received, derived from the previous failure.
    pub alternative_approach_hint: Option<String>,
    /// When the attempt started.
    pub started_at: DateTime<Utc>,
    /// When the attempt finished.
    pub finished_at: DateTime<Utc>,
}

impl AttemptRecord {
    /// Returns `true` if this attempt passed external verification.
    #[must_use]
    pub fn verified(&self) -> bool {
        self.verification.as_ref().is_some_and(VerificationResult::verified)
    }
}
