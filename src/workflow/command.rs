//! Command Line Construction
//!
//! Turns a step plus parameter values into the literal line sent to the
//! shell. Only `"` inside the directory is escaped; the destination shell
//! does its own tokenization and every approval-gated command is shown to
//! the operator verbatim before it runs.

use std::path::Path;

use crate::workflow::template::resolve_command;
use crate::workflow::{ParameterMap, Step, WorkflowDefinition};

/// Returns true for `/abs/path` and drive-letter paths like `C:\work`.
fn is_absolute_dir(dir: &str) -> bool {
    if dir.starts_with('/') {
        return true;
    }

    let bytes = dir.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/')
}

/// Computes the directory a step should run in, if any.
pub fn effective_dir(step: &Step, workspace_root: &Path) -> Option<String> {
    let dir = step.working_dir.as_deref().map(str::trim)?;
    if dir.is_empty() {
        return None;
    }

    if is_absolute_dir(dir) {
        return Some(dir.to_string());
    }

    let root = workspace_root.to_string_lossy();
    Some(format!("{}/{}", root.trim_end_matches('/'), dir))
}

/// Builds the executable command line for a step.
///
/// # Example
/// ```
/// use std::path::Path;
/// use stepgate::workflow::{ParameterMap, Step};
/// use stepgate::workflow::command::build_run_command;
///
/// let step = Step::new("deploy", "deploy").with_working_dir("infra");
/// let line = build_run_command(&step, &ParameterMap::new(), Path::new("/home/u/proj"));
/// assert_eq!(line, r#"cd "/home/u/proj/infra" && deploy"#);
/// ```
pub fn build_run_command(step: &Step, values: &ParameterMap, workspace_root: &Path) -> String {
    let resolved = resolve_command(&step.command, values);

    match effective_dir(step, workspace_root) {
        Some(dir) => format!("cd \"{}\" && {}", dir.replace('"', "\\\""), resolved),
        None => resolved,
    }
}

/// Builds the command line of every step, for display before a run.
pub fn preview_commands(
    definition: &WorkflowDefinition,
    values: &ParameterMap,
    workspace_root: &Path,
) -> Vec<String> {
    definition
        .steps
        .iter()
        .map(|step| build_run_command(step, values, workspace_root))
        .collect()
}
