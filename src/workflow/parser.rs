//! Workflow Definition Files
//!
//! Loads and writes single workflow definitions as standalone YAML files,
//! independent of any store. Used to import hand-written definitions.

use std::error::Error;
use std::fs;
use std::path::Path;

use log::{debug, info};

use super::model::WorkflowDefinition;
use super::template::extract_param_keys;
use super::validator::validate_workflow;

/// Loads a workflow definition from a YAML file.
///
/// This function:
/// 1. Reads and parses the YAML file
/// 2. Validates the definition
///
/// # Example
///
/// ```rust,no_run
/// use stepgate::workflow::load_definition;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let workflow = load_definition("release.yaml")?;
///     println!("Loaded {} steps", workflow.steps.len());
///     Ok(())
/// }
/// ```
pub fn load_definition(path: impl AsRef<Path>) -> Result<WorkflowDefinition, Box<dyn Error>> {
    let path = path.as_ref();
    info!("Loading workflow from: {}", path.display());

    let yaml_content = fs::read_to_string(path).map_err(|e| {
        format!(
            "Failed to read workflow file '{}': {}. Check that the file exists and is readable.",
            path.display(),
            e
        )
    })?;

    debug!("YAML content loaded ({} bytes)", yaml_content.len());

    let workflow: WorkflowDefinition = serde_yaml::from_str(&yaml_content)
        .map_err(|e| format!("Failed to parse workflow YAML: {}. Check the file format.", e))?;

    validate_workflow(&workflow)?;

    info!(
        "Parsed workflow '{}': {} steps, parameters {:?}",
        workflow.name,
        workflow.steps.len(),
        extract_param_keys(&workflow.steps)
    );

    Ok(workflow)
}

/// Saves a workflow definition to a YAML file.
pub fn save_definition(
    workflow: &WorkflowDefinition,
    path: impl AsRef<Path>,
) -> Result<(), Box<dyn Error>> {
    let path = path.as_ref();
    let yaml_content = serde_yaml::to_string(workflow)?;
    fs::write(path, yaml_content)?;
    info!("Workflow saved to: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::Step;
    use tempfile::tempdir;

    #[test]
    fn test_save_and_load_definition() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("release.yaml");

        let workflow = WorkflowDefinition::new("Release")
            .with_id("release")
            .with_step(Step::new("tag", "git tag {{version}}"));

        save_definition(&workflow, &path).unwrap();
        assert!(path.exists());

        let loaded = load_definition(&path).unwrap();
        assert_eq!(loaded.id, "release");
        assert_eq!(loaded.steps[0].command, "git tag {{version}}");
    }

    #[test]
    fn test_load_definition_file_not_found() {
        let result = load_definition("/nonexistent/path/workflow.yaml");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_definition_invalid_yaml() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("bad.yaml");
        fs::write(&path, "this is not valid yaml: [[[").unwrap();

        assert!(load_definition(&path).is_err());
    }

    #[test]
    fn test_load_definition_rejects_invalid_workflow() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("empty.yaml");
        fs::write(&path, "name: Empty\nsteps: []\n").unwrap();

        let err = load_definition(&path).unwrap_err();
        assert!(err.to_string().contains("no steps"));
    }
}
