//! Workflow Data Model
//!
//! Core data structures representing workflow definitions and their steps.
//!
//! # Example YAML Format
//!
//! ```yaml
//! id: release
//! name: Cut a release
//! version: 3
//! steps:
//!   - id: checkout
//!     title: Switch branch
//!     command: git checkout {{branch}}
//!     requires_approval: false
//!
//!   - id: publish
//!     title: Publish crate
//!     command: cargo publish
//!     working_dir: crates/core
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Parameter values for one workflow instance, keyed by placeholder identifier.
pub type ParameterMap = HashMap<String, String>;

/// A single shell step in a workflow.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Step {
    /// Identifier of the step within its workflow
    pub id: String,

    /// Short human-readable label
    #[serde(default)]
    pub title: String,

    /// Command template, may contain `{{identifier}}` placeholders
    pub command: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Whether an operator must approve the step; unset means yes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_approval: Option<bool>,

    /// Absolute or workspace-relative directory to run the command in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
}

impl Step {
    /// Creates a new step that requires approval.
    ///
    /// # Example
    ///
    /// ```
    /// use stepgate::workflow::Step;
    ///
    /// let step = Step::new("build", "cargo build --release")
    ///     .with_title("Build")
    ///     .with_working_dir("crates/app")
    ///     .auto_approved();
    /// assert!(!step.needs_approval());
    /// ```
    pub fn new(id: impl Into<String>, command: impl Into<String>) -> Self {
        let id = id.into().trim().to_string();
        Self {
            title: id.clone(),
            id,
            command: command.into(),
            description: None,
            requires_approval: None,
            working_dir: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Sets the approval flag explicitly.
    pub fn with_approval(mut self, required: bool) -> Self {
        self.requires_approval = Some(required);
        self
    }

    /// Marks the step as safe to run without an operator decision.
    pub fn auto_approved(self) -> Self {
        self.with_approval(false)
    }

    /// Returns true unless approval was explicitly turned off.
    pub fn needs_approval(&self) -> bool {
        self.requires_approval != Some(false)
    }
}

/// A named, ordered sequence of steps.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WorkflowDefinition {
    /// Unique within a workspace; blank until first saved
    #[serde(default)]
    pub id: String,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Steps in execution order
    #[serde(default)]
    pub steps: Vec<Step>,

    /// Incremented by the store on every save
    #[serde(default)]
    pub version: u32,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl WorkflowDefinition {
    /// Creates an unsaved definition with no steps.
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            name: name.into(),
            description: None,
            steps: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Appends a step.
    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Gets a step by ID.
    pub fn get_step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Returns the number of steps in the workflow.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if the workflow has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Builds the listing entry for this definition.
    pub fn summary(&self) -> WorkflowSummary {
        WorkflowSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            step_count: self.steps.len(),
        }
    }
}

/// Listing entry returned by a workflow store.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WorkflowSummary {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub step_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_creation() {
        let step = Step::new(" lint ", "cargo clippy")
            .with_title("Lint")
            .with_working_dir("crates/core");

        assert_eq!(step.id, "lint");
        assert_eq!(step.title, "Lint");
        assert_eq!(step.working_dir.as_deref(), Some("crates/core"));
    }

    #[test]
    fn test_step_title_defaults_to_id() {
        let step = Step::new("deploy", "make deploy");
        assert_eq!(step.title, "deploy");
    }

    #[test]
    fn test_step_approval_defaults_to_required() {
        let step = Step::new("s", "rm -rf target");
        assert_eq!(step.requires_approval, None);
        assert!(step.needs_approval());

        assert!(step.clone().with_approval(true).needs_approval());
        assert!(!step.auto_approved().needs_approval());
    }

    #[test]
    fn test_workflow_builders() {
        let workflow = WorkflowDefinition::new("Release")
            .with_id("release")
            .with_step(Step::new("a", "echo a"))
            .with_step(Step::new("b", "echo b"));

        assert_eq!(workflow.len(), 2);
        assert!(!workflow.is_empty());
        assert_eq!(workflow.get_step("b").unwrap().command, "echo b");
        assert!(workflow.get_step("c").is_none());
    }

    #[test]
    fn test_workflow_summary() {
        let workflow = WorkflowDefinition::new("Release")
            .with_id("release")
            .with_description("Tag and publish")
            .with_step(Step::new("a", "echo a"));

        let summary = workflow.summary();
        assert_eq!(summary.id, "release");
        assert_eq!(summary.description.as_deref(), Some("Tag and publish"));
        assert_eq!(summary.step_count, 1);
    }

    #[test]
    fn test_deserialize_minimal_yaml() {
        let yaml = r#"
name: Minimal
steps:
  - id: one
    command: echo {{who}}
  - id: two
    command: ls
    requires_approval: false
    working_dir: /tmp
"#;
        let workflow: WorkflowDefinition = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(workflow.id, "");
        assert_eq!(workflow.version, 0);
        assert_eq!(workflow.steps.len(), 2);
        assert!(workflow.steps[0].needs_approval());
        assert!(!workflow.steps[1].needs_approval());
        assert_eq!(workflow.steps[1].working_dir.as_deref(), Some("/tmp"));
    }

    #[test]
    fn test_serialize_skips_unset_fields() {
        let workflow = WorkflowDefinition::new("Skip").with_step(Step::new("a", "echo a"));
        let yaml = serde_yaml::to_string(&workflow).unwrap();

        assert!(!yaml.contains("requires_approval"));
        assert!(!yaml.contains("working_dir"));
        assert!(!yaml.contains("description"));
    }
}
