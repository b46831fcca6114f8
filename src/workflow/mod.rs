//! Workflow Definition Module
//!
//! Provides data structures and pure utilities for defining, validating,
//! previewing, and persisting shell workflows.
//!
//! # Structure
//!
//! - [`model`]: Core data structures (WorkflowDefinition, Step)
//! - [`template`]: `{{placeholder}}` scanning and substitution
//! - [`command`]: Building literal shell command lines
//! - [`validator`]: Save-time validation rules
//! - [`parser`]: Standalone YAML definition files
//! - [`store`]: Per-workspace definition persistence

pub mod command;
pub mod model;
pub mod parser;
pub mod store;
pub mod template;
pub mod validator;

pub use command::{build_run_command, preview_commands};
pub use model::{ParameterMap, Step, WorkflowDefinition, WorkflowSummary};
pub use parser::{load_definition, save_definition};
pub use store::{StoreError, WorkflowStore, YamlWorkflowStore};
pub use template::{extract_param_keys, get_missing_params, resolve_command};
pub use validator::{validate_workflow, ValidationError};
