//! Subprocess checkers: command, type-check, lint and regression checks.

use std::collections::BTreeSet;
use std::time::Duration;

use super::{describe_timeout, CheckOutcome};
use crate::ports::{ShellExecutor, ShellOutput};
use crate::task::CompletionCriterion;

pub(super) async fn command_succeeds(
    shell: &dyn ShellExecutor,
    criterion: &CompletionCriterion,
    timeout: Duration,
) -> CheckOutcome {
    let command = criterion.target.as_str();
    let output = match run(shell, criterion, timeout).await {
        Ok(output) => output,
        Err(outcome) => return outcome,
    };
    let raw = output.combined();

    if output.exit_code != 0 {
        let reason =
            format!("{} `{command}` exited with code {}", criterion.kind, output.exit_code);
        return CheckOutcome::fail(raw, reason);
    }
    if let Some(expected) = criterion.expected.as_deref().filter(|e| !e.is_empty()) {
        if !raw.contains(expected) {
            let reason = format!("Output of `{command}` does not contain {expected:?}");
            return CheckOutcome::fail(raw, reason);
        }
    }
    CheckOutcome::pass(raw, format!("{} `{command}` exited with code 0", criterion.kind))
}

pub(super) async fn no_regressions(
    shell: &dyn ShellExecutor,
    criterion: &CompletionCriterion,
    timeout: Duration,
) -> CheckOutcome {
    let baseline = parse_baseline(criterion.expected.as_deref().unwrap_or_default());
    if baseline.is_empty() {
        return CheckOutcome::fail(
            String::new(),
            "No baseline of previously-passing tests supplied",
        );
    }

    let output = match run(shell, criterion, timeout).await {
        Ok(output) => output,
        Err(outcome) => return outcome,
    };
    let raw = output.combined();
    let report = TestReport::parse(&raw);

    let regressions: Vec<&str> = baseline
        .iter()
        .filter(|name| report.failed.contains(*name) || !report.passed.contains(*name))
        .map(String::as_str)
        .collect();
    if !regressions.is_empty() {
        let regressions = regressions.join(", ");
        let reason = format!("Regressions in previously-passing tests: [{regressions}]");
        return CheckOutcome::fail(raw, reason);
    }

    let passing = report.passed.len();
    if let Some(minimum) = criterion.threshold {
        if u64::try_from(passing).unwrap_or(u64::MAX) < minimum {
            let reason = format!("Only {passing} tests passed, expected at least {minimum}");
            return CheckOutcome::fail(raw, reason);
        }
    }
    CheckOutcome::pass(raw, format!("All {} baseline tests still pass", baseline.len()))
}

/// Runs the criterion's command, turning spawn failures and timeouts into
/// failed outcomes.
async fn run(
    shell: &dyn ShellExecutor,
    criterion: &CompletionCriterion,
    timeout: Duration,
) -> Result<ShellOutput, CheckOutcome> {
    let command = criterion.target.as_str();
    match shell.run(command, timeout).await {
        Ok(output) if output.timed_out => Err(CheckOutcome::fail(
            output.combined(),
            format!("timed out after {}", describe_timeout(timeout)),
        )),
        Ok(output) => Ok(output),
        Err(e) => Err(CheckOutcome::fail(e.to_string(), format!("Failed to run `{command}`: {e}"))),
    }
}

/// Test names from a baseline, one per line or comma separated.
fn parse_baseline(raw: &str) -> BTreeSet<String> {
    raw.split(['\n', ','])
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(String::from)
        .collect()
}

/// Passing and failing test names scraped from test-runner output.
#[derive(Debug, Default, PartialEq, Eq)]
struct TestReport {
    passed: BTreeSet<String>,
    failed: BTreeSet<String>,
}

impl TestReport {
    /// Understands libtest (`test a::b ... ok`) and pytest
    /// (`path::test PASSED`, `FAILED path::test - msg`) result lines.
    fn parse(output: &str) -> Self {
        let mut report = Self::default();
        for line in output.lines().map(str::trim) {
            if let Some(rest) = line.strip_prefix("test ") {
                if let Some((name, status)) = rest.split_once(" ... ") {
                    report.record(name.trim(), status.trim());
                }
                continue;
            }
            let pytest_failure =
                line.strip_prefix("FAILED ").or_else(|| line.strip_prefix("ERROR "));
            if let Some(rest) = pytest_failure {
                if let Some(name) = rest.split_whitespace().next() {
                    report.failed.insert(name.to_string());
                }
                continue;
            }
            let mut tokens = line.split_whitespace();
            if let (Some(name), Some(status)) = (tokens.next(), tokens.next()) {
                if name.contains("::") {
                    report.record(name, status);
                }
            }
        }
        for name in &report.failed {
            report.passed.remove(name);
        }
        report
    }

    fn record(&mut self, name: &str, status: &str) {
        match status {
            "ok" | "PASSED" => {
                self.passed.insert(name.to_string());
            }
            "FAILED" | "ERROR" => {
                self.failed.insert(name.to_string());
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::CriterionKind;
    use crate::testing::{exited, timed_out, ScriptedShell};

    const TIMEOUT: Duration = Duration::from_secs(300);

    const CARGO_OUTPUT: &str = "\
running 3 tests
test store::tests::saves ... ok
test store::tests::loads ... FAILED
test store::tests::lists ... ok

test result: FAILED. 2 passed; 1 failed; 0 ignored
";

    const PYTEST_OUTPUT: &str = "\
tests/test_api.py::test_health PASSED                                    [ 50%]
tests/test_api.py::test_login FAILED                                     [100%]
=========================== short test summary info ============================
FAILED tests/test_api.py::test_login - AssertionError: 401 != 200
";

    fn regressions(baseline: &str) -> CompletionCriterion {
        CompletionCriterion::new(CriterionKind::NoRegressions, "run-tests").expecting(baseline)
    }

    #[tokio::test]
    async fn zero_exit_passes() {
        let shell = ScriptedShell::default().respond("make", Ok(exited(0, "built", "")));
        let outcome =
            command_succeeds(&shell, &CompletionCriterion::command_succeeds("make"), TIMEOUT).await;
        assert!(outcome.passed);
        assert_eq!(outcome.raw_output, "built");
    }

    #[tokio::test]
    async fn non_zero_exit_fails_with_code_and_output() {
        let shell = ScriptedShell::default().respond("pytest", Ok(exited(1, "1 failed", "boom")));
        let outcome =
            command_succeeds(&shell, &CompletionCriterion::command_succeeds("pytest"), TIMEOUT)
                .await;
        assert!(!outcome.passed);
        assert_eq!(outcome.reason, "command_succeeds `pytest` exited with code 1");
        assert_eq!(outcome.raw_output, "1 failed\nboom");
    }

    #[tokio::test]
    async fn expected_text_must_appear_in_output() {
        let shell = ScriptedShell::default().respond("./smoke", Ok(exited(0, "all green", "")));
        let criterion = CompletionCriterion::command_succeeds("./smoke").expecting("42 passed");
        let outcome = command_succeeds(&shell, &criterion, TIMEOUT).await;
        assert!(!outcome.passed);
        assert!(outcome.reason.contains("42 passed"));
    }

    #[tokio::test]
    async fn timeout_is_reported_not_raised() {
        let shell = ScriptedShell::default().respond("sleep 999", Ok(timed_out("partial")));
        let outcome =
            command_succeeds(&shell, &CompletionCriterion::command_succeeds("sleep 999"), TIMEOUT)
                .await;
        assert!(!outcome.passed);
        assert_eq!(outcome.reason, "timed out after 300s");
        assert_eq!(outcome.raw_output, "partial");
    }

    #[tokio::test]
    async fn spawn_failure_is_failed_evidence() {
        let shell =
            ScriptedShell::default().respond("nope", Err("No such file or directory".into()));
        let outcome =
            command_succeeds(&shell, &CompletionCriterion::command_succeeds("nope"), TIMEOUT).await;
        assert!(!outcome.passed);
        assert_eq!(outcome.reason, "Failed to run `nope`: No such file or directory");
    }

    #[tokio::test]
    async fn regression_when_baseline_test_now_fails() {
        let shell =
            ScriptedShell::default().respond("run-tests", Ok(exited(101, CARGO_OUTPUT, "")));
        let criterion = regressions("store::tests::saves\nstore::tests::loads");

        let outcome = no_regressions(&shell, &criterion, TIMEOUT).await;

        assert!(!outcome.passed);
        assert_eq!(
            outcome.reason,
            "Regressions in previously-passing tests: [store::tests::loads]"
        );
    }

    #[tokio::test]
    async fn new_failures_outside_the_baseline_are_not_regressions() {
        let shell = ScriptedShell::default().respond("run-tests", Ok(exited(1, PYTEST_OUTPUT, "")));
        let criterion = regressions("tests/test_api.py::test_health");

        let outcome = no_regressions(&shell, &criterion, TIMEOUT).await;

        assert!(outcome.passed, "{}", outcome.reason);
    }

    #[tokio::test]
    async fn vanished_baseline_test_is_a_regression() {
        let shell = ScriptedShell::default().respond("run-tests", Ok(exited(0, CARGO_OUTPUT, "")));
        let criterion = regressions("store::tests::saves, store::tests::deleted");

        let outcome = no_regressions(&shell, &criterion, TIMEOUT).await;

        assert!(!outcome.passed);
        assert!(outcome.reason.contains("store::tests::deleted"));
    }

    #[tokio::test]
    async fn threshold_sets_minimum_passing_tests() {
        let shell = ScriptedShell::default().respond("run-tests", Ok(exited(0, CARGO_OUTPUT, "")));
        let criterion = regressions("store::tests::saves").with_threshold(5);

        let outcome = no_regressions(&shell, &criterion, TIMEOUT).await;

        assert!(!outcome.passed);
        assert_eq!(outcome.reason, "Only 2 tests passed, expected at least 5");
    }

    #[tokio::test]
    async fn missing_baseline_fails_without_running_tests() {
        let shell = ScriptedShell::default();
        let criterion = CompletionCriterion::new(CriterionKind::NoRegressions, "run-tests");

        let outcome = no_regressions(&shell, &criterion, TIMEOUT).await;

        assert!(!outcome.passed);
        assert!(shell.calls().is_empty());
    }

    #[test]
    fn parses_pytest_summary_lines() {
        let report = TestReport::parse(PYTEST_OUTPUT);
        assert!(report.passed.contains("tests/test_api.py::test_health"));
        assert!(report.failed.contains("tests/test_api.py::test_login"));
        assert!(!report.passed.contains("tests/test_api.py::test_login"));
    }
}
