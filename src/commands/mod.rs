//! Command dispatch and handlers.

pub mod run;
pub mod show;
pub mod verify;

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use crate::cli::Command;
use crate::config::Settings;
use crate::context::ServiceContext;
use crate::task::CompletionCriterion;

/// Dispatch a parsed command to its handler.
///
/// # Errors
///
/// Returns an error string if configuration is invalid or the selected
/// command handler fails.
pub fn dispatch(command: &Command) -> Result<(), String> {
    let settings = Settings::from_env().map_err(|e| e.to_string())?;
    let ctx = Arc::new(ServiceContext::live());
    dispatch_with_context(command, &ctx, &settings)
}

/// Dispatch a command with the given service context and settings.
fn dispatch_with_context(
    command: &Command,
    ctx: &Arc<ServiceContext>,
    settings: &Settings,
) -> Result<(), String> {
    match command {
        Command::Verify { criteria, executor_id, task_id, json } => block_on(verify::run(
            ctx,
            settings,
            criteria,
            executor_id,
            task_id.as_deref(),
            *json,
        )),
        Command::Run { description, command, criteria, executor_id } => block_on(run::run(
            ctx,
            settings,
            description,
            command,
            criteria.as_deref(),
            executor_id,
        )),
        Command::Show { task_id } => show::run(ctx, settings, task_id.as_deref()),
    }
}

fn block_on<F: Future<Output = Result<(), String>>>(future: F) -> Result<(), String> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start async runtime: {e}"))?;
    runtime.block_on(future)
}

/// Loads a YAML list of completion criteria.
///
/// # Errors
///
/// Returns an error string if the file cannot be read or parsed.
pub fn load_criteria(
    ctx: &ServiceContext,
    path: &Path,
) -> Result<Vec<CompletionCriterion>, String> {
    let contents = ctx
        .fs
        .read_to_string(path)
        .map_err(|e| format!("Failed to read criteria file {}: {e}", path.display()))?;
    serde_yaml::from_str(&contents)
        .map_err(|e| format!("Failed to parse criteria file {}: {e}", path.display()))
}
