//! Workflow Store
//!
//! CRUD persistence for workflow definitions, keyed by workspace path and
//! workflow id. The engine only depends on the [`WorkflowStore`] trait.
//!
//! [`YamlWorkflowStore`] keeps one file per definition at
//! `{workspace}/.stepgate/workflows/{id}.yaml`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use thiserror::Error;
use uuid::Uuid;

use super::model::{WorkflowDefinition, WorkflowSummary};
use super::validator::{validate_workflow, ValidationError};

/// Store directory relative to the workspace root.
///
/// Overridable through `STEPGATE_STORE_DIR`.
pub static STORE_DIR: Lazy<PathBuf> = Lazy::new(|| {
    std::env::var_os("STEPGATE_STORE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(".stepgate").join("workflows"))
});

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Workflow '{0}' not found")]
    NotFound(String),

    #[error("Invalid workflow id '{0}'")]
    InvalidId(String),

    #[error("Invalid workflow: {0}")]
    Validation(#[from] ValidationError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Persistence for workflow definitions.
pub trait WorkflowStore {
    /// Lists the workflows of a workspace.
    fn list(&self, workspace: &Path) -> Result<Vec<WorkflowSummary>, StoreError>;

    /// Loads one definition.
    fn load(&self, workspace: &Path, workflow_id: &str) -> Result<WorkflowDefinition, StoreError>;

    /// Validates and persists a definition, returning what was stored.
    fn save(
        &self,
        workspace: &Path,
        definition: WorkflowDefinition,
    ) -> Result<WorkflowDefinition, StoreError>;

    /// Removes a definition.
    fn delete(&self, workspace: &Path, workflow_id: &str) -> Result<(), StoreError>;
}

/// Stores each definition as a YAML file inside the workspace.
#[derive(Debug, Clone)]
pub struct YamlWorkflowStore {
    dir: PathBuf,
}

impl YamlWorkflowStore {
    /// Creates a store using [`STORE_DIR`].
    pub fn new() -> Self {
        Self {
            dir: STORE_DIR.clone(),
        }
    }

    /// Creates a store using a custom workspace-relative directory.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn store_dir(&self, workspace: &Path) -> PathBuf {
        workspace.join(&self.dir)
    }

    fn file_path(&self, workspace: &Path, workflow_id: &str) -> Result<PathBuf, StoreError> {
        check_id(workflow_id)?;
        Ok(self.store_dir(workspace).join(format!("{}.yaml", workflow_id)))
    }

    fn read(&self, path: &Path) -> Result<WorkflowDefinition, StoreError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }
}

impl Default for YamlWorkflowStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Ids become file names, so they must not escape the store directory.
fn check_id(workflow_id: &str) -> Result<(), StoreError> {
    let valid = !workflow_id.trim().is_empty()
        && workflow_id != "."
        && workflow_id != ".."
        && !workflow_id.contains(['/', '\\']);

    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidId(workflow_id.to_string()))
    }
}

impl WorkflowStore for YamlWorkflowStore {
    fn list(&self, workspace: &Path) -> Result<Vec<WorkflowSummary>, StoreError> {
        let dir = self.store_dir(workspace);
        if !dir.is_dir() {
            debug!("No workflow store at {}", dir.display());
            return Ok(Vec::new());
        }

        let mut summaries = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
                continue;
            }

            match self.read(&path) {
                Ok(definition) => summaries.push(definition.summary()),
                Err(e) => warn!("Skipping unreadable workflow {}: {}", path.display(), e),
            }
        }

        summaries.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(summaries)
    }

    fn load(&self, workspace: &Path, workflow_id: &str) -> Result<WorkflowDefinition, StoreError> {
        let path = self.file_path(workspace, workflow_id)?;
        if !path.exists() {
            return Err(StoreError::NotFound(workflow_id.to_string()));
        }

        let definition = self.read(&path)?;
        debug!("Loaded workflow '{}' from {}", workflow_id, path.display());
        Ok(definition)
    }

    fn save(
        &self,
        workspace: &Path,
        mut definition: WorkflowDefinition,
    ) -> Result<WorkflowDefinition, StoreError> {
        validate_workflow(&definition)?;

        if definition.id.trim().is_empty() {
            definition.id = Uuid::new_v4().to_string();
        }
        let path = self.file_path(workspace, &definition.id)?;

        let now = Utc::now();
        if path.exists() {
            let existing = self.read(&path)?;
            definition.version = existing.version + 1;
            definition.created_at = existing.created_at;
        } else {
            definition.version = 1;
            definition.created_at = now;
        }
        definition.updated_at = now;

        fs::create_dir_all(self.store_dir(workspace))?;
        fs::write(&path, serde_yaml::to_string(&definition)?)?;

        info!(
            "Saved workflow '{}' (version {}) to {}",
            definition.id,
            definition.version,
            path.display()
        );
        Ok(definition)
    }

    fn delete(&self, workspace: &Path, workflow_id: &str) -> Result<(), StoreError> {
        let path = self.file_path(workspace, workflow_id)?;
        if !path.exists() {
            return Err(StoreError::NotFound(workflow_id.to_string()));
        }

        fs::remove_file(&path)?;
        info!("Deleted workflow '{}'", workflow_id);
        Ok(())
    }
}
