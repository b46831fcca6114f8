//! Stepgate - Approval-Gated Workflow Execution Engine
//!
//! Runs ordered shell commands in a workspace terminal. Steps may contain
//! `{{param}}` placeholders that are filled in before the run starts, and
//! any step not marked as auto-approved waits for an operator before its
//! command is sent.
//!
//! # Architecture
//!
//! The library is organized into three main modules:
//!
//! - [`workflow`]: Definitions, placeholder templates, and persistence
//! - [`execution`]: Run state machine, approval gates, and terminals
//! - [`monitoring`]: Timeline of what each run did
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use stepgate::execution::{drive_run, Engine, PromptGate, ShellTerminal};
//! use stepgate::load_definition;
//! use stepgate::workflow::ParameterMap;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let workflow = load_definition("release.yaml")?;
//!
//!     let mut values = ParameterMap::new();
//!     values.insert("branch".to_string(), "main".to_string());
//!
//!     let mut engine = Engine::new(ShellTerminal::new("bash"));
//!     let mut gate = PromptGate::stdio();
//!     let update = drive_run(&mut engine, &mut gate, Path::new("."), &workflow, &values);
//!
//!     println!("{:?}", update);
//!     Ok(())
//! }
//! ```

pub mod execution;
pub mod monitoring;
pub mod workflow;

// Re-export commonly used types
pub use execution::engine::{Engine, RunUpdate};
pub use workflow::model::{Step, WorkflowDefinition};
pub use workflow::parser::load_definition;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "Stepgate";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_version() {
        assert!(!VERSION.is_empty());
        assert!(VERSION.contains('.'));
    }

    #[test]
    fn test_app_name() {
        assert_eq!(APP_NAME, "Stepgate");
    }

    #[test]
    fn test_module_exports_step() {
        let step = Step::new("test", "echo test");
        assert_eq!(step.id, "test");
        assert!(step.needs_approval());
    }

    #[test]
    fn test_module_exports_workflow() {
        let workflow = WorkflowDefinition::new("Empty");
        assert!(workflow.is_empty());
    }

    #[test]
    fn test_version_format() {
        let parts: Vec<&str> = VERSION.split('.').collect();
        assert!(parts.len() >= 2, "Version should have at least major.minor");
        for part in parts {
            assert!(part.parse::<u32>().is_ok(), "Version components should be numeric");
        }
    }
}
