//! Human-readable rendering of verification results.

use crate::analyze::FailureAnalyzer;
use crate::task::VerificationResult;

/// Formats a [`VerificationResult`] as a PASS/FAIL report.
///
/// Failing evidence is followed by its reason and indented raw output, and
/// a failed result ends with the analyzer's suggested next steps.
#[must_use]
pub fn format_report(result: &VerificationResult) -> String {
    let mut lines = Vec::new();
    lines.push(format!("Task: {}", result.task_id()));
    lines.push(format!("Verifier: {}", result.verifier_identity()));
    lines.push(String::new());

    for evidence in result.evidence() {
        let status = if evidence.passed() { "PASS" } else { "FAIL" };
        lines.push(format!("  [{status}] {} {}", evidence.criterion_kind(), evidence.target()));
        if !evidence.passed() {
            lines.push(format!("         reason: {}", evidence.reason()));
            for raw_line in evidence.raw_output().lines() {
                lines.push(format!("         | {raw_line}"));
            }
        }
    }

    lines.push(String::new());
    let overall = if result.verified() { "VERIFIED" } else { "NOT VERIFIED" };
    lines.push(format!(
        "Result: {overall} ({}/{} checks passed)",
        result.passed_checks(),
        result.total_checks()
    ));

    if !result.verified() {
        let analysis = FailureAnalyzer.analyze(result);
        lines.push(String::new());
        lines.push("Next steps:".to_string());
        for fix in &analysis.suggested_fixes {
            lines.push(format!("  - {fix}"));
        }
        lines.push(format!("  Hint: {}", analysis.alternative_approach_hint));
    }

    lines.join("\n")
}
