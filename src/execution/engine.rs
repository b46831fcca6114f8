//! Workflow Run Engine
//!
//! Drives runs through their steps in definition order:
//! - Auto-approved steps are written to the terminal immediately
//! - Any other step pauses the run until an operator approves or declines
//! - Declining discards the run; earlier steps are not rolled back
//!
//! The engine never blocks while a run is paused. Each paused run is stored
//! as a [`RunState`] keyed by workflow id and resumed by a later
//! [`RunCommand`]. There are no timeouts: a run can wait indefinitely.
//!
//! Runs of different workflows may be in flight at the same time. Starting
//! a workflow that already has a run in flight is rejected with
//! [`EngineError::AlreadyRunning`] and leaves the existing run untouched.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};
use thiserror::Error;

use crate::monitoring::{EventType, RunTimeline};
use crate::workflow::{
    build_run_command, extract_param_keys, get_missing_params, ParameterMap, WorkflowDefinition,
};

use super::approval::{ApprovalGate, Decision};
use super::run::{PendingApproval, RunPhase, RunState, StepAction};
use super::terminal::{TerminalChannel, TerminalError};

#[derive(Debug, Error)]
pub enum EngineError {
    /// Placeholder values are needed before the run can start
    #[error("Workflow '{workflow_id}' is missing parameters: {}", .missing.join(", "))]
    MissingParameters {
        workflow_id: String,
        missing: Vec<String>,
    },

    #[error("Workflow '{0}' already has a run in progress")]
    AlreadyRunning(String),

    #[error("Workflow '{0}' has no run in progress")]
    NoActiveRun(String),

    #[error("Workflow '{0}' is not waiting for approval")]
    NotAwaitingApproval(String),

    #[error("Terminal unavailable for workflow '{workflow_id}': {source}")]
    ChannelUnavailable {
        workflow_id: String,
        #[source]
        source: TerminalError,
    },
}

impl EngineError {
    pub fn workflow_id(&self) -> &str {
        match self {
            Self::MissingParameters { workflow_id, .. } => workflow_id,
            Self::AlreadyRunning(id) | Self::NoActiveRun(id) | Self::NotAwaitingApproval(id) => id,
            Self::ChannelUnavailable { workflow_id, .. } => workflow_id,
        }
    }
}

/// A request to the engine.
#[derive(Debug, Clone)]
pub enum RunCommand {
    Start {
        workspace: PathBuf,
        definition: WorkflowDefinition,
        values: ParameterMap,
    },
    Approve {
        workspace: PathBuf,
        workflow_id: String,
    },
    Decline {
        workflow_id: String,
    },
    Stop {
        workflow_id: String,
    },
}

/// What a command led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunUpdate {
    /// Paused; the run stays stored until approved, declined, or stopped
    AwaitingApproval(PendingApproval),
    Completed {
        workflow_id: String,
        dispatched: usize,
    },
    /// Declined at `step_index`; nothing from that step on was sent
    Cancelled {
        workflow_id: String,
        step_index: usize,
    },
    Stopped {
        workflow_id: String,
        step_index: usize,
    },
    /// Collect these values and start again
    NeedsParameters {
        workflow_id: String,
        missing: Vec<String>,
    },
    Failed {
        workflow_id: String,
        message: String,
    },
}

impl RunUpdate {
    pub fn workflow_id(&self) -> &str {
        match self {
            Self::AwaitingApproval(pending) => &pending.workflow_id,
            Self::Completed { workflow_id, .. }
            | Self::Cancelled { workflow_id, .. }
            | Self::Stopped { workflow_id, .. }
            | Self::NeedsParameters { workflow_id, .. }
            | Self::Failed { workflow_id, .. } => workflow_id,
        }
    }

    /// True unless the run is paused for approval.
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::AwaitingApproval(_))
    }
}

/// Executes workflow runs against a terminal channel.
///
/// # Example
///
/// ```
/// use std::path::Path;
/// use stepgate::execution::{DryRunTerminal, Engine, RunUpdate};
/// use stepgate::workflow::{ParameterMap, Step, WorkflowDefinition};
///
/// let workflow = WorkflowDefinition::new("Setup")
///     .with_id("setup")
///     .with_step(Step::new("install", "npm install").auto_approved());
///
/// let mut engine = Engine::new(DryRunTerminal::new());
/// let update = engine
///     .run_workflow(Path::new("/ws"), &workflow, &ParameterMap::new())
///     .unwrap();
///
/// assert!(matches!(update, RunUpdate::Completed { dispatched: 1, .. }));
/// assert_eq!(engine.terminal().written(), &["npm install\n"]);
/// ```
pub struct Engine<T: TerminalChannel> {
    terminal: T,
    runs: HashMap<String, RunState>,
    timeline: RunTimeline,
}

impl<T: TerminalChannel> Engine<T> {
    /// Creates an engine with no runs in flight.
    pub fn new(terminal: T) -> Self {
        Self {
            terminal,
            runs: HashMap::new(),
            timeline: RunTimeline::new(),
        }
    }

    pub fn terminal(&self) -> &T {
        &self.terminal
    }

    pub fn terminal_mut(&mut self) -> &mut T {
        &mut self.terminal
    }

    pub fn timeline(&self) -> &RunTimeline {
        &self.timeline
    }

    /// Current phase of a workflow's run; `Idle` when none is stored.
    pub fn phase(&self, workflow_id: &str) -> RunPhase {
        self.runs
            .get(workflow_id)
            .map(RunState::phase)
            .unwrap_or(RunPhase::Idle)
    }

    pub fn run_state(&self, workflow_id: &str) -> Option<&RunState> {
        self.runs.get(workflow_id)
    }

    /// Ids of workflows with a paused run, sorted.
    pub fn active_runs(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.runs.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Starts a run.
    ///
    /// Every step's command line is built once, here, from `values`. Later
    /// edits to the definition or the values do not affect the run.
    pub fn run_workflow(
        &mut self,
        workspace: &Path,
        definition: &WorkflowDefinition,
        values: &ParameterMap,
    ) -> Result<RunUpdate, EngineError> {
        let workflow_id = definition.id.clone();

        if self.runs.contains_key(&workflow_id) {
            warn!("Refusing to start '{}': a run is already in progress", workflow_id);
            return Err(EngineError::AlreadyRunning(workflow_id));
        }

        let keys = extract_param_keys(&definition.steps);
        let missing = get_missing_params(&keys, values);
        if !missing.is_empty() {
            info!("Workflow '{}' needs parameters: {:?}", workflow_id, missing);
            return Err(EngineError::MissingParameters {
                workflow_id,
                missing,
            });
        }

        let resolved_commands: Vec<String> = definition
            .steps
            .iter()
            .map(|step| build_run_command(step, values, workspace))
            .collect();

        info!(
            "Starting workflow '{}' ({} steps) in {}",
            workflow_id,
            definition.steps.len(),
            workspace.display()
        );

        let state = RunState::new(workflow_id, definition.steps.clone(), resolved_commands);
        self.advance(workspace, state)
    }

    /// Runs the paused step, then continues until the next pause or the end.
    pub fn approve(&mut self, workspace: &Path, workflow_id: &str) -> Result<RunUpdate, EngineError> {
        let mut state = self.take_paused(workflow_id)?;
        let index = state.step_index();
        self.timeline
            .add_event(workflow_id, Some(index), EventType::Approved);

        let command = state.current_command().unwrap_or_default().to_string();
        self.dispatch(workspace, &mut state, index, &command)?;
        self.advance(workspace, state)
    }

    /// Cancels a paused run. Already dispatched steps are left as they are.
    pub fn decline(&mut self, workflow_id: &str) -> Result<RunUpdate, EngineError> {
        let mut state = self.take_paused(workflow_id)?;
        let step_index = state.step_index();
        state.cancel();

        self.timeline
            .add_event(workflow_id, Some(step_index), EventType::Declined);
        self.timeline
            .add_event(workflow_id, None, EventType::Cancelled);
        info!("Workflow '{}' cancelled at step {}", workflow_id, step_index + 1);

        Ok(RunUpdate::Cancelled {
            workflow_id: workflow_id.to_string(),
            step_index,
        })
    }

    /// Discards a run regardless of its phase.
    pub fn stop(&mut self, workflow_id: &str) -> Result<RunUpdate, EngineError> {
        let state = self
            .runs
            .remove(workflow_id)
            .ok_or_else(|| EngineError::NoActiveRun(workflow_id.to_string()))?;

        self.timeline.add_event(workflow_id, None, EventType::Stopped);
        info!("Workflow '{}' stopped", workflow_id);

        Ok(RunUpdate::Stopped {
            workflow_id: workflow_id.to_string(),
            step_index: state.step_index(),
        })
    }

    /// Applies a command, turning every error into an update.
    pub fn handle(&mut self, command: RunCommand) -> RunUpdate {
        let result = match command {
            RunCommand::Start {
                workspace,
                definition,
                values,
            } => self.run_workflow(&workspace, &definition, &values),
            RunCommand::Approve {
                workspace,
                workflow_id,
            } => self.approve(&workspace, &workflow_id),
            RunCommand::Decline { workflow_id } => self.decline(&workflow_id),
            RunCommand::Stop { workflow_id } => self.stop(&workflow_id),
        };

        result.unwrap_or_else(|e| match e {
            EngineError::MissingParameters {
                workflow_id,
                missing,
            } => RunUpdate::NeedsParameters {
                workflow_id,
                missing,
            },
            other => {
                warn!("{}", other);
                RunUpdate::Failed {
                    workflow_id: other.workflow_id().to_string(),
                    message: other.to_string(),
                }
            }
        })
    }

    fn take_paused(&mut self, workflow_id: &str) -> Result<RunState, EngineError> {
        let state = self
            .runs
            .remove(workflow_id)
            .ok_or_else(|| EngineError::NoActiveRun(workflow_id.to_string()))?;

        match state.phase() {
            RunPhase::AwaitingApproval(_) => Ok(state),
            _ => {
                self.runs.insert(workflow_id.to_string(), state);
                Err(EngineError::NotAwaitingApproval(workflow_id.to_string()))
            }
        }
    }

    /// Steps forward from the cursor until a pause or the end.
    fn advance(&mut self, workspace: &Path, mut state: RunState) -> Result<RunUpdate, EngineError> {
        loop {
            match state.next_action() {
                StepAction::Dispatch { index, command } => {
                    self.dispatch(workspace, &mut state, index, &command)?;
                }
                StepAction::AwaitApproval(pending) => {
                    state.pause();
                    self.timeline.add_event(
                        state.workflow_id(),
                        Some(pending.step_index),
                        EventType::ApprovalRequested,
                    );
                    self.runs.insert(state.workflow_id().to_string(), state);
                    return Ok(RunUpdate::AwaitingApproval(pending));
                }
                StepAction::Finish => {
                    let workflow_id = state.workflow_id().to_string();
                    self.timeline
                        .add_event(&workflow_id, None, EventType::Completed);
                    info!(
                        "Workflow '{}' completed ({} steps dispatched)",
                        workflow_id,
                        state.step_index()
                    );
                    return Ok(RunUpdate::Completed {
                        workflow_id,
                        dispatched: state.step_index(),
                    });
                }
            }
        }
    }

    /// Writes one command. On a terminal failure the run is dropped by the
    /// caller, since `state` is never stored again.
    fn dispatch(
        &mut self,
        workspace: &Path,
        state: &mut RunState,
        index: usize,
        command: &str,
    ) -> Result<(), EngineError> {
        let workflow_id = state.workflow_id().to_string();

        if let Err(source) = self.terminal.ensure_ready(workspace) {
            error!("Workflow '{}' aborted: {}", workflow_id, source);
            self.timeline.add_event(
                &workflow_id,
                Some(index),
                EventType::Failed(source.to_string()),
            );
            return Err(EngineError::ChannelUnavailable {
                workflow_id,
                source,
            });
        }

        debug!("Dispatching step {} of '{}': {}", index + 1, workflow_id, command);
        self.terminal.write(&format!("{}\n", command));
        self.timeline
            .add_event(&workflow_id, Some(index), EventType::Dispatched);
        state.mark_dispatched();
        Ok(())
    }
}

/// Runs a workflow to a final update, asking `gate` at every pause.
///
/// Returns `NeedsParameters` without dispatching anything when values are
/// missing; the caller collects them and calls again.
pub fn drive_run<T: TerminalChannel, G: ApprovalGate>(
    engine: &mut Engine<T>,
    gate: &mut G,
    workspace: &Path,
    definition: &WorkflowDefinition,
    values: &ParameterMap,
) -> RunUpdate {
    let mut update = engine.handle(RunCommand::Start {
        workspace: workspace.to_path_buf(),
        definition: definition.clone(),
        values: values.clone(),
    });

    loop {
        let RunUpdate::AwaitingApproval(pending) = &update else {
            return update;
        };

        let workflow_id = pending.workflow_id.clone();
        let next = match gate.review(pending) {
            Decision::Approve => RunCommand::Approve {
                workspace: workspace.to_path_buf(),
                workflow_id,
            },
            Decision::Decline => RunCommand::Decline { workflow_id },
        };
        update = engine.handle(next);
    }
}
