//! Local, non-authoritative pre-check of executor output.
//!
//! A passing self-review only means the output is worth sending to the
//! [`Verifier`](crate::verify::Verifier); it never completes a task.

use std::path::Path;
use std::sync::Arc;

use crate::context::ServiceContext;
use crate::task::{CompletionCriterion, CriterionKind, ExecutorOutput, OutputKind};
use crate::verify::DEFAULT_PLACEHOLDER_MARKERS;

/// Advisory result of a self-review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfReview {
    /// `true` when no changes were requested.
    pub passed: bool,
    /// Changes the executor should make before external verification.
    pub requested_changes: Vec<String>,
}

impl SelfReview {
    /// Builds a review from its findings; no findings means it passed.
    #[must_use]
    pub fn from_changes(requested_changes: Vec<String>) -> Self {
        Self { passed: requested_changes.is_empty(), requested_changes }
    }
}

/// Cheap pre-check run on the executor's side of the loop.
///
/// Implementations must not mutate the output and must turn their own
/// failures (unreadable files and the like) into requested changes.
pub trait SelfReviewer: Send + Sync {
    /// Reviews one executor output against the criteria it will be verified on.
    fn review(&self, output: &ExecutorOutput, criteria: &[CompletionCriterion]) -> SelfReview;
}

/// Default reviewer: inspects declared file outputs and file criteria.
pub struct OutputReviewer {
    ctx: Arc<ServiceContext>,
    markers: Vec<String>,
}

impl OutputReviewer {
    /// Creates a reviewer that flags the default placeholder markers.
    #[must_use]
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        let markers = DEFAULT_PLACEHOLDER_MARKERS.iter().map(|m| (*m).to_string()).collect();
        Self::with_markers(ctx, markers)
    }

    /// Creates a reviewer with a custom placeholder marker set.
    #[must_use]
    pub fn with_markers(ctx: Arc<ServiceContext>, markers: Vec<String>) -> Self {
        Self { ctx, markers }
    }

    fn review_file(&self, path: &str, changes: &mut Vec<String>) {
        let fs = &self.ctx.fs;
        let p = Path::new(path);
        if !fs.exists(p) {
            changes.push(format!("Declared output {path} does not exist"));
            return;
        }
        match fs.file_len(p) {
            Ok(0) => {
                changes.push(format!("Declared output {path} is empty"));
                return;
            }
            Ok(_) => {}
            Err(e) => {
                changes.push(format!("Could not inspect {path}: {e}"));
                return;
            }
        }
        match fs.read_to_string(p) {
            Ok(contents) => {
                let found: Vec<&str> = self
                    .markers
                    .iter()
                    .filter(|m| contents.contains(m.as_str()))
                    .map(String::as_str)
                    .collect();
                if !found.is_empty() {
                    let found = found.join(", ");
                    changes.push(format!("Remove placeholders from {path}: [{found}]"));
                }
            }
            Err(e) => changes.push(format!("Could not read {path}: {e}")),
        }
    }
}

impl std::fmt::Debug for OutputReviewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputReviewer").field("markers", &self.markers).finish_non_exhaustive()
    }
}

impl SelfReviewer for OutputReviewer {
    fn review(&self, output: &ExecutorOutput, criteria: &[CompletionCriterion]) -> SelfReview {
        let mut changes = Vec::new();

        if criteria.is_empty() && output.outputs.is_empty() {
            changes.push(
                "No completion criteria and no declared outputs; declare what was produced"
                    .to_string(),
            );
        }

        for claimed in output.outputs.iter().filter(|o| o.kind == OutputKind::File) {
            if claimed.path.trim().is_empty() {
                changes.push("A file output was declared without a path".to_string());
            } else {
                self.review_file(&claimed.path, &mut changes);
            }
        }

        for criterion in criteria {
            let declared = output.outputs.iter().any(|o| o.path == criterion.target);
            match criterion.kind {
                CriterionKind::FileExists | CriterionKind::FileNotEmpty if !declared => {
                    if !self.ctx.fs.exists(Path::new(&criterion.target)) {
                        changes.push(format!("Required file {} does not exist", criterion.target));
                    }
                }
                _ => {}
            }
        }

        changes.dedup();
        SelfReview::from_changes(changes)
    }
}
