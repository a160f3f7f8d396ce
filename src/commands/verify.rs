//! `vouch verify` command.

use std::path::Path;
use std::sync::Arc;

use crate::config::Settings;
use crate::context::ServiceContext;
use crate::verify::{format_report, VerificationRequest, Verifier};

/// Execute the `verify` command: one verification pass over a criteria file.
///
/// Prints the report (or the result as JSON) to stdout.
///
/// # Errors
///
/// Returns an error string if the criteria file is unusable, the executor
/// identity equals the verifier's, or any criterion failed.
pub async fn run(
    ctx: &Arc<ServiceContext>,
    settings: &Settings,
    criteria_path: &Path,
    executor_id: &str,
    task_id: Option<&str>,
    json: bool,
) -> Result<(), String> {
    let criteria = super::load_criteria(ctx, criteria_path)?;
    let task_id = task_id.map_or_else(|| ctx.id_gen.generate_id(), String::from);

    let verifier = Verifier::new(Arc::clone(ctx), settings.verifier.clone());
    let request = VerificationRequest {
        task_id: &task_id,
        executor_identity: executor_id,
        criteria: &criteria,
    };
    let result = verifier.verify(&request).await.map_err(|e| e.to_string())?;

    if json {
        let rendered = serde_json::to_string_pretty(&result)
            .map_err(|e| format!("Failed to serialize verification result: {e}"))?;
        println!("{rendered}");
    } else {
        println!("{}", format_report(&result));
    }

    if result.verified() {
        Ok(())
    } else {
        Err(format!(
            "Task {task_id} not verified: {} of {} checks failed",
            result.failed_checks(),
            result.total_checks()
        ))
    }
}
