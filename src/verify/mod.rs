//! Independent verification of completion criteria.
//!
//! The [`Verifier`] is the authoritative gate: it refuses to judge work
//! produced under its own identity, checks every criterion in order without
//! short-circuiting, and records one [`Evidence`] per criterion. Checker
//! failures of any kind (a command that cannot be spawned, an unreachable
//! URL, an unreadable file) become failed evidence, never errors.

mod command;
mod endpoint;
mod files;
mod report;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

pub(crate) use crate::ports::describe_timeout;
pub use report::format_report;

use crate::context::ServiceContext;
use crate::error::SelfAttestationError;
use crate::task::{CompletionCriterion, CriterionKind, Evidence, VerificationResult};

/// Markers that flag unfinished work in a file.
pub const DEFAULT_PLACEHOLDER_MARKERS: [&str; 3] = ["TODO", "FIXME", "PLACEHOLDER"];

/// Verifier identity and checker limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierConfig {
    /// Identity recorded on every result; must differ from the executor's.
    pub identity: String,
    /// Deadline for command-based checks.
    pub command_timeout: Duration,
    /// Deadline for HTTP checks.
    pub http_timeout: Duration,
    /// Markers searched for by `no_placeholders`, reported in this order.
    pub placeholder_markers: Vec<String>,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            identity: "vouch-verifier".to_string(),
            command_timeout: Duration::from_secs(300),
            http_timeout: Duration::from_secs(10),
            placeholder_markers: DEFAULT_PLACEHOLDER_MARKERS
                .iter()
                .map(|m| (*m).to_string())
                .collect(),
        }
    }
}

/// The work submitted for one verification pass.
#[derive(Debug, Clone, Copy)]
pub struct VerificationRequest<'a> {
    /// The task being verified.
    pub task_id: &'a str,
    /// Identity of the executor that produced the work.
    pub executor_identity: &'a str,
    /// The criteria to check, in order.
    pub criteria: &'a [CompletionCriterion],
}

/// Result of running one checker, before it is stamped into [`Evidence`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CheckOutcome {
    pub passed: bool,
    pub raw_output: String,
    pub reason: String,
}

impl CheckOutcome {
    pub(crate) fn pass(raw_output: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { passed: true, raw_output: raw_output.into(), reason: reason.into() }
    }

    pub(crate) fn fail(raw_output: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { passed: false, raw_output: raw_output.into(), reason: reason.into() }
    }
}

/// Checks completion criteria against filesystem, subprocess and HTTP evidence.
pub struct Verifier {
    ctx: Arc<ServiceContext>,
    config: VerifierConfig,
}

impl Verifier {
    /// Creates a verifier over the given ports.
    #[must_use]
    pub fn new(ctx: Arc<ServiceContext>, config: VerifierConfig) -> Self {
        Self { ctx, config }
    }

    /// This verifier's identity.
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.config.identity
    }

    /// Runs every criterion and aggregates the evidence.
    ///
    /// # Errors
    ///
    /// Returns [`SelfAttestationError`] without checking anything when the
    /// executor identity equals this verifier's identity.
    pub async fn verify(
        &self,
        request: &VerificationRequest<'_>,
    ) -> Result<VerificationResult, SelfAttestationError> {
        if request.executor_identity == self.config.identity {
            error!(
                task_id = request.task_id,
                identity = request.executor_identity,
                "refusing to verify work produced by the verifier's own identity"
            );
            return Err(SelfAttestationError {
                task_id: request.task_id.to_string(),
                identity: request.executor_identity.to_string(),
            });
        }

        info!(
            task_id = request.task_id,
            verifier_id = %self.config.identity,
            executor_id = request.executor_identity,
            criteria = request.criteria.len(),
            "starting verification"
        );

        let mut evidence = Vec::with_capacity(request.criteria.len());
        for criterion in request.criteria {
            let outcome = self.check(criterion).await;
            if outcome.passed {
                debug!(kind = %criterion.kind, target = %criterion.target, "criterion passed");
            } else {
                warn!(
                    kind = %criterion.kind,
                    target = %criterion.target,
                    reason = %outcome.reason,
                    "criterion failed"
                );
            }
            evidence.push(Evidence::new(
                criterion,
                outcome.passed,
                outcome.raw_output,
                outcome.reason,
                self.ctx.clock.now(),
            ));
        }

        let result = VerificationResult::new(
            request.task_id.to_string(),
            self.config.identity.clone(),
            evidence,
        );
        info!(
            task_id = request.task_id,
            verified = result.verified(),
            passed = result.passed_checks(),
            total = result.total_checks(),
            "verification finished"
        );
        Ok(result)
    }

    async fn check(&self, criterion: &CompletionCriterion) -> CheckOutcome {
        let fs = self.ctx.fs.as_ref();
        let shell = self.ctx.shell.as_ref();
        let target = criterion.target.as_str();
        match criterion.kind {
            CriterionKind::FileExists => files::file_exists(fs, target),
            CriterionKind::FileNotEmpty => files::file_not_empty(fs, target),
            CriterionKind::NoPlaceholders => {
                files::no_placeholders(fs, target, &self.config.placeholder_markers)
            }
            CriterionKind::CommandSucceeds
            | CriterionKind::TypeCheckPasses
            | CriterionKind::LintPasses => {
                command::command_succeeds(shell, criterion, self.config.command_timeout).await
            }
            CriterionKind::HttpEndpointResponds => {
                endpoint::endpoint_responds(
                    self.ctx.http.as_ref(),
                    criterion,
                    self.config.http_timeout,
                )
                .await
            }
            CriterionKind::NoRegressions => {
                command::no_regressions(shell, criterion, self.config.command_timeout).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{exited, fake_context, timed_out, MemFs, ScriptedHttp, ScriptedShell};

    fn verifier(fs: MemFs, shell: ScriptedShell, http: ScriptedHttp) -> Verifier {
        Verifier::new(fake_context(fs, shell, http), VerifierConfig::default())
    }

    fn request<'a>(criteria: &'a [CompletionCriterion]) -> VerificationRequest<'a> {
        VerificationRequest { task_id: "t-1", executor_identity: "agent-1", criteria }
    }

    #[tokio::test]
    async fn rejects_self_attestation_before_checking_anything() {
        let shell = ScriptedShell::default();
        let mut config = VerifierConfig::default();
        config.identity = "agent-1".into();
        let verifier = Verifier::new(
            fake_context(MemFs::default(), shell.clone(), ScriptedHttp::default()),
            config,
        );
        let criteria = vec![CompletionCriterion::command_succeeds("pytest")];

        let err = verifier.verify(&request(&criteria)).await.unwrap_err();

        assert_eq!(err.identity, "agent-1");
        assert!(shell.calls().is_empty());
    }

    #[tokio::test]
    async fn checks_every_criterion_in_order_without_short_circuit() {
        let fs = MemFs::default().with_file("report.md", "# Report\nAll done.");
        let shell = ScriptedShell::default().respond("pytest", Ok(exited(1, "", "2 failed")));
        let verifier = verifier(fs, shell.clone(), ScriptedHttp::default());
        let criteria = vec![
            CompletionCriterion::command_succeeds("pytest"),
            CompletionCriterion::file_exists("missing.txt"),
            CompletionCriterion::file_not_empty("report.md"),
        ];

        let result = verifier.verify(&request(&criteria)).await.unwrap();

        assert!(!result.verified());
        assert_eq!(result.total_checks(), 3);
        let kinds: Vec<_> = result.evidence().iter().map(Evidence::criterion_kind).collect();
        assert_eq!(
            kinds,
            vec![
                CriterionKind::CommandSucceeds,
                CriterionKind::FileExists,
                CriterionKind::FileNotEmpty,
            ]
        );
        assert_eq!(result.failed_checks(), 2);
        assert!(result.evidence()[2].passed());
        assert_eq!(result.verifier_identity(), "vouch-verifier");
    }

    #[tokio::test]
    async fn empty_criteria_verify_vacuously() {
        let verifier =
            verifier(MemFs::default(), ScriptedShell::default(), ScriptedHttp::default());
        let result = verifier.verify(&request(&[])).await.unwrap();
        assert!(result.verified());
        assert_eq!(result.total_checks(), 0);
    }

    #[tokio::test]
    async fn type_check_and_lint_use_the_command_timeout() {
        let shell = ScriptedShell::default()
            .respond("mypy .", Ok(exited(0, "Success", "")))
            .respond("ruff check", Ok(timed_out("")));
        let verifier = verifier(MemFs::default(), shell.clone(), ScriptedHttp::default());
        let criteria = vec![
            CompletionCriterion::new(CriterionKind::TypeCheckPasses, "mypy ."),
            CompletionCriterion::new(CriterionKind::LintPasses, "ruff check"),
        ];

        let result = verifier.verify(&request(&criteria)).await.unwrap();

        assert!(result.evidence()[0].passed());
        assert_eq!(result.evidence()[1].reason(), "timed out after 300s");
        assert!(shell.calls().iter().all(|(_, t)| *t == Duration::from_secs(300)));
    }

    #[tokio::test]
    async fn repeated_file_checks_agree() {
        let fs = MemFs::default().with_file("out.txt", "data").with_file("empty.txt", "");
        let verifier = verifier(fs, ScriptedShell::default(), ScriptedHttp::default());
        let criteria = vec![
            CompletionCriterion::file_exists("out.txt"),
            CompletionCriterion::file_not_empty("empty.txt"),
            CompletionCriterion::file_exists("gone.txt"),
        ];

        let first = verifier.verify(&request(&criteria)).await.unwrap();
        let second = verifier.verify(&request(&criteria)).await.unwrap();

        let passed = |r: &VerificationResult| -> Vec<bool> {
            r.evidence().iter().map(Evidence::passed).collect()
        };
        assert_eq!(passed(&first), passed(&second));
        assert_eq!(passed(&first), vec![true, false, false]);
    }
}
