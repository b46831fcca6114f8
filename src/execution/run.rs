//! Run State
//!
//! A run is a plain value: a snapshot of the workflow's steps, the command
//! lines resolved when the run started, and a cursor. Pausing for approval
//! means storing this value and returning; resuming means handing it a
//! decision. Nothing here performs I/O.

use log::debug;

use crate::workflow::Step;

/// Where a run is in its lifecycle.
///
/// `Completed` and `Cancelled` are terminal; the engine discards the run as
/// soon as it reaches either, so observers see `Idle` afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    /// About to dispatch, or has just dispatched, step `i`
    Running(usize),
    /// Paused until an operator decides on step `i`
    AwaitingApproval(usize),
    Completed,
    Cancelled,
}

impl RunPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// What the run should do next from its current position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepAction {
    /// Send this command without asking
    Dispatch { index: usize, command: String },
    /// Pause and ask an operator about the current step
    AwaitApproval(PendingApproval),
    /// Every step has been dispatched
    Finish,
}

/// A step surfaced to an operator, with the exact line that will run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingApproval {
    pub workflow_id: String,
    pub step_index: usize,
    pub step_count: usize,
    pub step_id: String,
    pub title: String,
    pub command: String,
}

/// Progress of one workflow execution.
#[derive(Debug, Clone, PartialEq)]
pub struct RunState {
    workflow_id: String,
    step_index: usize,
    steps: Vec<Step>,
    resolved_commands: Vec<String>,
    phase: RunPhase,
}

impl RunState {
    /// Creates a run at step 0.
    ///
    /// `resolved_commands` must have one entry per step.
    pub fn new(workflow_id: impl Into<String>, steps: Vec<Step>, resolved_commands: Vec<String>) -> Self {
        debug_assert_eq!(steps.len(), resolved_commands.len());
        Self {
            workflow_id: workflow_id.into(),
            step_index: 0,
            steps,
            resolved_commands,
            phase: RunPhase::Running(0),
        }
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    pub fn step_index(&self) -> usize {
        self.step_index
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn resolved_commands(&self) -> &[String] {
        &self.resolved_commands
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn is_finished(&self) -> bool {
        self.step_index >= self.steps.len()
    }

    /// Decides the next action without changing anything.
    pub fn next_action(&self) -> StepAction {
        let index = self.step_index;
        match self.steps.get(index) {
            None => StepAction::Finish,
            Some(step) if step.needs_approval() => {
                StepAction::AwaitApproval(self.approval_for(index, step))
            }
            Some(_) => StepAction::Dispatch {
                index,
                command: self.resolved_commands[index].clone(),
            },
        }
    }

    /// Command of the step under the cursor, if any.
    pub fn current_command(&self) -> Option<&str> {
        self.resolved_commands.get(self.step_index).map(String::as_str)
    }

    /// Builds the operator-facing description of the current step.
    pub fn pending_approval(&self) -> Option<PendingApproval> {
        let step = self.steps.get(self.step_index)?;
        Some(self.approval_for(self.step_index, step))
    }

    fn approval_for(&self, index: usize, step: &Step) -> PendingApproval {
        PendingApproval {
            workflow_id: self.workflow_id.clone(),
            step_index: index,
            step_count: self.steps.len(),
            step_id: step.id.clone(),
            title: step.title.clone(),
            command: self.resolved_commands[index].clone(),
        }
    }

    pub(crate) fn pause(&mut self) {
        self.phase = RunPhase::AwaitingApproval(self.step_index);
        debug!(
            "Run '{}' awaiting approval at step {}",
            self.workflow_id, self.step_index
        );
    }

    /// Moves the cursor past a dispatched step.
    pub(crate) fn mark_dispatched(&mut self) {
        self.phase = RunPhase::Running(self.step_index);
        self.step_index += 1;
        if self.is_finished() {
            self.phase = RunPhase::Completed;
        }
    }

    pub(crate) fn cancel(&mut self) {
        self.phase = RunPhase::Cancelled;
    }
}
