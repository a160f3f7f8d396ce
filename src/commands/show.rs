//! `vouch show` command.

use crate::config::Settings;
use crate::context::ServiceContext;
use crate::store::TaskStore;
use crate::task::{Task, TaskOutcome};
use crate::verify::format_report;

/// Execute the `show` command.
///
/// When `id` is provided, prints the task's full attempt history.
/// When no `id` is given, lists all stored task IDs.
///
/// # Errors
///
/// Returns an error string if the store cannot be read.
pub fn run(ctx: &ServiceContext, settings: &Settings, id: Option<&str>) -> Result<(), String> {
    let store = TaskStore::new(ctx, &settings.store_dir);

    if let Some(task_id) = id {
        let task = store.load(task_id).map_err(|e| e.to_string())?;
        print_task(&task);
    } else {
        let ids = store.list().map_err(|e| e.to_string())?;
        if ids.is_empty() {
            println!("No tasks found in store.");
        } else {
            println!("Stored tasks:");
            for id in &ids {
                println!("  {id}");
            }
            println!("\nUse `vouch show <TASK_ID>` to view details.");
        }
    }
    Ok(())
}

/// Prints a task header followed by every attempt.
pub(crate) fn print_task(task: &Task) {
    println!("Task: {}", task.id());
    println!("Description: {}", task.description());
    println!("Outcome: {}", describe_outcome(task.outcome()));
    println!("Attempts: {}", task.attempts().len());

    for attempt in task.attempts() {
        println!();
        println!(
            "--- Attempt {} (self-review {}, {} local patch(es)) ---",
            attempt.attempt_number,
            if attempt.self_review_passed { "passed" } else { "failed" },
            attempt.local_patches
        );
        if let Some(hint) = &attempt.alternative_approach_hint {
            println!("Hint: {hint}");
        }
        if let Some(error) = &attempt.executor_error {
            println!("Executor error: {error}");
        }
        if let Some(result) = &attempt.verification {
            println!("{}", format_report(result));
        }
    }
}

fn describe_outcome(outcome: Option<&TaskOutcome>) -> String {
    let Some(outcome) = outcome else {
        return "in progress".to_string();
    };
    match outcome {
        TaskOutcome::Completed => outcome.label().to_string(),
        TaskOutcome::EscalatedToHuman { reason } | TaskOutcome::Blocked { reason } => {
            format!("{} ({reason})", outcome.label())
        }
    }
}
