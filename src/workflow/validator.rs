//! Workflow Validation
//!
//! Checks a definition before it is persisted:
//! - Workflow has a name
//! - Workflow has at least one step
//! - Every step has a non-blank command
//! - Step IDs are unique
//!
//! Validation runs at save time only. An already-saved workflow is never
//! re-validated before it runs.

use std::collections::HashSet;

use log::{debug, info, warn};
use thiserror::Error;

use super::model::{Step, WorkflowDefinition};
use super::template::has_placeholders;

/// Validation error types for user-friendly error messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Workflow has no name")]
    EmptyName,

    #[error("Workflow has no steps")]
    NoSteps,

    #[error("Step {index} ('{step}') has no command specified")]
    EmptyCommand { index: usize, step: String },

    #[error("Duplicate step ID: '{0}'")]
    DuplicateStepId(String),
}

/// Validates a single step's fields.
fn validate_step(index: usize, step: &Step) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if step.command.trim().is_empty() {
        errors.push(ValidationError::EmptyCommand {
            index,
            step: step.id.clone(),
        });
    }

    if step.command.contains("{{") && !has_placeholders(&step.command) {
        warn!(
            "Step '{}': command contains '{{{{' but no valid placeholder",
            step.id
        );
    }

    if !step.needs_approval() {
        debug!("Step '{}' runs without approval", step.id);
    }

    errors
}

/// Collects every problem with a definition.
///
/// Useful for editor feedback where all errors should be shown at once.
pub fn collect_errors(workflow: &WorkflowDefinition) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if workflow.name.trim().is_empty() {
        errors.push(ValidationError::EmptyName);
    }

    if workflow.steps.is_empty() {
        errors.push(ValidationError::NoSteps);
        return errors;
    }

    let mut seen_ids: HashSet<&str> = HashSet::new();
    for (index, step) in workflow.steps.iter().enumerate() {
        if !step.id.is_empty() && !seen_ids.insert(step.id.as_str()) {
            errors.push(ValidationError::DuplicateStepId(step.id.clone()));
        }
        errors.extend(validate_step(index, step));
    }

    errors
}

/// Validates a definition, returning the first problem found.
pub fn validate_workflow(workflow: &WorkflowDefinition) -> Result<(), ValidationError> {
    info!(
        "Validating workflow '{}' with {} steps",
        workflow.name,
        workflow.steps.len()
    );

    match collect_errors(workflow).into_iter().next() {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

/// Quick validation that returns a list of error messages.
pub fn quick_validate(workflow: &WorkflowDefinition) -> Vec<String> {
    collect_errors(workflow)
        .iter()
        .map(ToString::to_string)
        .collect()
}
