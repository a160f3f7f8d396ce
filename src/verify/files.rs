//! Filesystem checkers: `file_exists`, `file_not_empty`, `no_placeholders`.

use std::path::Path;

use super::CheckOutcome;
use crate::ports::FileSystem;

pub(super) fn file_exists(fs: &dyn FileSystem, target: &str) -> CheckOutcome {
    if fs.exists(Path::new(target)) {
        CheckOutcome::pass(format!("exists: {target}"), format!("File exists: {target}"))
    } else {
        CheckOutcome::fail(format!("missing: {target}"), format!("File does not exist: {target}"))
    }
}

pub(super) fn file_not_empty(fs: &dyn FileSystem, target: &str) -> CheckOutcome {
    let path = Path::new(target);
    if !fs.exists(path) {
        return CheckOutcome::fail(
            format!("missing: {target}"),
            format!("File does not exist: {target}"),
        );
    }
    match fs.file_len(path) {
        Ok(0) => CheckOutcome::fail("size: 0 bytes", format!("File is empty: {target}")),
        Ok(len) => CheckOutcome::pass(
            format!("size: {len} bytes"),
            format!("File is not empty: {target} ({len} bytes)"),
        ),
        Err(e) => CheckOutcome::fail(e.to_string(), format!("Could not stat {target}: {e}")),
    }
}

pub(super) fn no_placeholders(
    fs: &dyn FileSystem,
    target: &str,
    markers: &[String],
) -> CheckOutcome {
    let contents = match fs.read_to_string(Path::new(target)) {
        Ok(contents) => contents,
        Err(e) => {
            return CheckOutcome::fail(e.to_string(), format!("Could not read {target}: {e}"))
        }
    };

    let found: Vec<&str> =
        markers.iter().map(String::as_str).filter(|m| contents.contains(m)).collect();
    if found.is_empty() {
        return CheckOutcome::pass(String::new(), format!("No placeholders in {target}"));
    }

    let hits: Vec<String> = contents
        .lines()
        .enumerate()
        .filter(|(_, line)| found.iter().any(|m| line.contains(m)))
        .map(|(i, line)| format!("{}: {line}", i + 1))
        .collect();
    CheckOutcome::fail(hits.join("\n"), format!("Found placeholders: [{}]", found.join(", ")))
}
