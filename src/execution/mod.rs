//! Workflow Execution Module
//!
//! Runs workflow steps through a terminal, pausing at approval gates.
//!
//! # Architecture
//!
//! - [`engine`]: Run state machine driven by [`RunCommand`]s
//! - [`run`]: The per-run state stored while a run is paused
//! - [`approval`]: Operator checkpoints
//! - [`terminal`]: Shell sessions that receive dispatched commands

pub mod approval;
pub mod engine;
pub mod run;
pub mod terminal;

pub use approval::{ApprovalGate, Decision, PromptGate, ScriptedGate};
pub use engine::{drive_run, Engine, EngineError, RunCommand, RunUpdate};
pub use run::{PendingApproval, RunPhase, RunState, StepAction};
pub use terminal::{DryRunTerminal, ShellTerminal, TerminalChannel, TerminalError};
