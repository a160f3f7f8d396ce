//! `vouch run` command.

use std::path::Path;
use std::sync::Arc;

use crate::analyze::FailureAnalyzer;
use crate::config::Settings;
use crate::context::ServiceContext;
use crate::correction::CorrectionLoop;
use crate::error::LoopError;
use crate::escalation::StoreEscalationSink;
use crate::executor::ShellTaskExecutor;
use crate::review::OutputReviewer;
use crate::store::TaskStore;
use crate::task::{Task, TaskOutcome};
use crate::verify::Verifier;

/// Execute the `run` command: drive a shell task through the correction loop.
///
/// The finished task is persisted to the store whatever its outcome.
///
/// # Errors
///
/// Returns an error string unless the task completed.
pub async fn run(
    ctx: &Arc<ServiceContext>,
    settings: &Settings,
    description: &str,
    command: &str,
    criteria_path: Option<&Path>,
    executor_id: &str,
) -> Result<(), String> {
    let criteria = match criteria_path {
        Some(path) => super::load_criteria(ctx, path)?,
        None => Vec::new(),
    };
    let task = Task::new(ctx.id_gen.generate_id(), description, criteria);

    let correction = CorrectionLoop::new(
        Arc::clone(ctx),
        Arc::new(ShellTaskExecutor::new(
            Arc::clone(ctx),
            executor_id,
            command,
            settings.verifier.command_timeout,
        )),
        Box::new(OutputReviewer::with_markers(
            Arc::clone(ctx),
            settings.verifier.placeholder_markers.clone(),
        )),
        Verifier::new(Arc::clone(ctx), settings.verifier.clone()),
        FailureAnalyzer,
        Arc::new(StoreEscalationSink::new(Arc::clone(ctx), &settings.store_dir)),
        settings.correction.clone(),
    );

    let store = TaskStore::new(ctx, &settings.store_dir);
    let task = match correction.run(task).await {
        Ok(task) => task,
        Err(LoopError::EscalationFailed { task, source }) => {
            store.persist(&task).map_err(|e| e.to_string())?;
            return Err(format!(
                "Task {} escalated, but the escalation was not delivered: {source}",
                task.id()
            ));
        }
        Err(err) => return Err(err.to_string()),
    };
    store.persist(&task).map_err(|e| e.to_string())?;

    super::show::print_task(&task);

    let Some(outcome) = task.outcome() else {
        return Err(format!("Task {} ended without an outcome", task.id()));
    };
    match outcome {
        TaskOutcome::Completed => Ok(()),
        TaskOutcome::EscalatedToHuman { reason } | TaskOutcome::Blocked { reason } => {
            Err(format!("Task {} {}: {reason}", task.id(), outcome.label()))
        }
    }
}
