//! Failure analysis between correction attempts.
//!
//! Turns the failing evidence of a [`VerificationResult`] into failure
//! categories, concrete fixes and a single alternative-approach hint for the
//! next attempt. The analysis is rule-based: the same result always yields
//! the same hint.

use std::collections::BTreeMap;

use crate::task::{CriterionKind, Evidence, VerificationResult};

/// Coarse failure buckets, keyed by criterion kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FailureCategory {
    /// A declared file is missing or empty.
    MissingOutput,
    /// Type-checker errors.
    TypeError,
    /// A build or test command failed.
    BuildOrTestFailure,
    /// Previously-passing tests now fail.
    Regression,
    /// Placeholder markers remain in the output.
    IncompleteImplementation,
    /// Linter findings.
    LintViolation,
    /// An HTTP endpoint did not answer as expected.
    EndpointUnavailable,
    /// The executor failed before producing output.
    ExecutionError,
}

impl FailureCategory {
    /// Categorizes a failed criterion kind.
    #[must_use]
    pub fn for_kind(kind: CriterionKind) -> Self {
        match kind {
            CriterionKind::FileExists | CriterionKind::FileNotEmpty => Self::MissingOutput,
            CriterionKind::NoPlaceholders => Self::IncompleteImplementation,
            CriterionKind::CommandSucceeds => Self::BuildOrTestFailure,
            CriterionKind::TypeCheckPasses => Self::TypeError,
            CriterionKind::LintPasses => Self::LintViolation,
            CriterionKind::HttpEndpointResponds => Self::EndpointUnavailable,
            CriterionKind::NoRegressions => Self::Regression,
        }
    }

    /// The key used in [`FailureAnalysis::categories`].
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingOutput => "missing_output",
            Self::TypeError => "type_error",
            Self::BuildOrTestFailure => "build_or_test_failure",
            Self::Regression => "regression",
            Self::IncompleteImplementation => "incomplete_implementation",
            Self::LintViolation => "lint_violation",
            Self::EndpointUnavailable => "endpoint_unavailable",
            Self::ExecutionError => "execution_error",
        }
    }

    fn hint(self) -> &'static str {
        match self {
            Self::MissingOutput => {
                "create every declared output file at the exact path listed before anything else"
            }
            Self::TypeError => "prioritize fixing type errors before re-running tests",
            Self::BuildOrTestFailure => {
                "reproduce the failing command and fix its first reported error before re-running"
            }
            Self::Regression => {
                "restore the previously-passing tests before continuing with new work"
            }
            Self::IncompleteImplementation => {
                "replace every placeholder marker with a working implementation"
            }
            Self::LintViolation => {
                "apply the linter's automatic fixes, then resolve the remaining findings by hand"
            }
            Self::EndpointUnavailable => {
                "make sure the service is running and reachable before checking the endpoint again"
            }
            Self::ExecutionError => "address the execution error before retrying the task",
        }
    }
}

/// Actionable summary of one failed verification (or executor failure).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureAnalysis {
    /// Failure counts per category key.
    pub categories: BTreeMap<String, usize>,
    /// One concrete fix per failure, in evidence order.
    pub suggested_fixes: Vec<String>,
    /// Guidance passed to the next executor attempt.
    pub alternative_approach_hint: String,
}

/// Deterministic, rule-based failure analyzer.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailureAnalyzer;

impl FailureAnalyzer {
    /// Analyzes the failures of a verification result.
    ///
    /// The hint follows the dominant category when it accounts for more than
    /// half of the failures; otherwise it names every category and starts
    /// with the most fundamental one (missing outputs before type errors
    /// before failing commands, and so on).
    #[must_use]
    pub fn analyze(&self, result: &VerificationResult) -> FailureAnalysis {
        let failures = result.failures();
        if failures.is_empty() {
            return FailureAnalysis {
                categories: BTreeMap::new(),
                suggested_fixes: Vec::new(),
                alternative_approach_hint: "no failures to address".to_string(),
            };
        }

        let mut counts: BTreeMap<FailureCategory, usize> = BTreeMap::new();
        for evidence in &failures {
            *counts.entry(FailureCategory::for_kind(evidence.criterion_kind())).or_default() += 1;
        }

        let mut suggested_fixes: Vec<String> = failures.iter().map(|e| suggest_fix(e)).collect();
        if failures.iter().any(|e| e.reason().starts_with("timed out")) {
            suggested_fixes.push(
                "Break long-running work into smaller steps or raise the check timeout".to_string(),
            );
        }

        let total = failures.len();
        // BTreeMap iteration follows FailureCategory's declaration order,
        // which is also the priority order.
        let first = counts.keys().next().copied().unwrap_or(FailureCategory::ExecutionError);
        let dominant = counts.iter().find(|(_, n)| **n * 2 > total).map(|(c, _)| *c);

        let alternative_approach_hint = match dominant {
            Some(category) => category.hint().to_string(),
            None => {
                let names: Vec<&str> = counts.keys().map(|c| c.as_str()).collect();
                format!(
                    "failures span {} categories ({}); start with {}: {}",
                    counts.len(),
                    names.join(", "),
                    first.as_str(),
                    first.hint()
                )
            }
        };

        FailureAnalysis {
            categories: counts.into_iter().map(|(c, n)| (c.as_str().to_string(), n)).collect(),
            suggested_fixes,
            alternative_approach_hint,
        }
    }

    /// Analyzes an executor failure that produced no output to verify.
    #[must_use]
    pub fn analyze_execution_error(&self, message: &str) -> FailureAnalysis {
        let lower = message.to_lowercase();
        let mut suggested_fixes = Vec::new();

        if lower.contains("not found") || lower.contains("no such file") {
            suggested_fixes
                .push("Check file paths and make sure parent directories exist".to_string());
        }
        if lower.contains("timed out") || lower.contains("timeout") {
            suggested_fixes
                .push("Break the work into smaller operations or increase the timeout".to_string());
        }
        if lower.contains("permission") || lower.contains("access denied") {
            suggested_fixes.push("Check file permissions and ensure write access".to_string());
        }
        if lower.contains("import") || lower.contains("module") {
            suggested_fixes.push(
                "Check that dependencies are installed and import paths are correct".to_string(),
            );
        }
        if suggested_fixes.is_empty() {
            suggested_fixes
                .push("Review the error message carefully and check the documentation".to_string());
        }

        let alternative_approach_hint = format!(
            "the previous attempt failed before producing output ({message}); {}",
            suggested_fixes[0].to_lowercase()
        );

        FailureAnalysis {
            categories: BTreeMap::from([(FailureCategory::ExecutionError.as_str().to_string(), 1)]),
            suggested_fixes,
            alternative_approach_hint,
        }
    }
}

fn suggest_fix(evidence: &Evidence) -> String {
    let target = evidence.target();
    let reason = evidence.reason();
    match evidence.criterion_kind() {
        CriterionKind::FileExists => format!("Create `{target}`"),
        CriterionKind::FileNotEmpty => format!("Write content to `{target}` ({reason})"),
        CriterionKind::NoPlaceholders => format!("Finish the work in `{target}`: {reason}"),
        CriterionKind::CommandSucceeds => format!("Make `{target}` succeed: {reason}"),
        CriterionKind::TypeCheckPasses => format!("Fix the type errors reported by `{target}`"),
        CriterionKind::LintPasses => format!("Fix the lint findings reported by `{target}`"),
        CriterionKind::HttpEndpointResponds => format!("Bring `{target}` up: {reason}"),
        CriterionKind::NoRegressions => format!("Repair regressions found by `{target}`: {reason}"),
    }
}
