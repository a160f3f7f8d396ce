//! Evidence records and the verification verdict built from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::criterion::{CompletionCriterion, CriterionKind};

/// The recorded result of checking one criterion.
///
/// Evidence is immutable: a re-check produces a new record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    criterion_kind: CriterionKind,
    target: String,
    passed: bool,
    raw_output: String,
    reason: String,
    collected_at: DateTime<Utc>,
}

impl Evidence {
    /// Records the outcome of checking `criterion`.
    #[must_use]
    pub fn new(
        criterion: &CompletionCriterion,
        passed: bool,
        raw_output: String,
        reason: String,
        collected_at: DateTime<Utc>,
    ) -> Self {
        Self {
            criterion_kind: criterion.kind,
            target: criterion.target.clone(),
            passed,
            raw_output,
            reason,
            collected_at,
        }
    }

    /// The kind of criterion that was checked.
    #[must_use]
    pub fn criterion_kind(&self) -> CriterionKind {
        self.criterion_kind
    }

    /// The checked path, command or URL.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Whether the criterion held.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.passed
    }

    /// Unsummarized output captured by the checker.
    #[must_use]
    pub fn raw_output(&self) -> &str {
        &self.raw_output
    }

    /// Human-readable explanation; always present for failures.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// When the evidence was collected.
    #[must_use]
    pub fn collected_at(&self) -> DateTime<Utc> {
        self.collected_at
    }
}

/// All evidence gathered by one verification pass.
///
/// `verified` is computed once from the evidence and is `true` exactly when
/// no evidence failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    task_id: String,
    verifier_identity: String,
    verified: bool,
    evidence: Vec<Evidence>,
}

impl VerificationResult {
    /// Aggregates evidence, in criterion order, into a verdict.
    #[must_use]
    pub fn new(task_id: String, verifier_identity: String, evidence: Vec<Evidence>) -> Self {
        let verified = evidence.iter().all(Evidence::passed);
        Self { task_id, verifier_identity, verified, evidence }
    }

    /// The verified task.
    #[must_use]
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Identity of the verifier that produced this result.
    #[must_use]
    pub fn verifier_identity(&self) -> &str {
        &self.verifier_identity
    }

    /// Conjunction over every evidence record.
    #[must_use]
    pub fn verified(&self) -> bool {
        self.verified
    }

    /// Evidence in the same order as the criteria that produced it.
    #[must_use]
    pub fn evidence(&self) -> &[Evidence] {
        &self.evidence
    }

    /// The failing subsequence of [`Self::evidence`].
    #[must_use]
    pub fn failures(&self) -> Vec<&Evidence> {
        self.evidence.iter().filter(|e| !e.passed()).collect()
    }

    /// Number of passing checks.
    #[must_use]
    pub fn passed_checks(&self) -> usize {
        self.evidence.iter().filter(|e| e.passed()).count()
    }

    /// Number of failing checks.
    #[must_use]
    pub fn failed_checks(&self) -> usize {
        self.total_checks() - self.passed_checks()
    }

    /// Number of checks performed.
    #[must_use]
    pub fn total_checks(&self) -> usize {
        self.evidence.len()
    }
}
