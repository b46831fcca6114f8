//! Approval Gate
//!
//! Shows an operator the exact command a paused step will run and returns
//! their decision. The engine never calls a gate directly; whoever drives
//! the engine asks the gate and feeds the answer back as a
//! [`RunCommand`](super::engine::RunCommand).

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

use colored::Colorize;
use log::warn;

use super::run::PendingApproval;

/// Operator's answer for a paused step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Decline,
}

/// Human-in-the-loop checkpoint.
pub trait ApprovalGate {
    fn review(&mut self, pending: &PendingApproval) -> Decision;
}

/// Asks on a terminal: prints the command and reads `y`/`n`.
///
/// Anything other than an explicit yes declines, including end of input.
pub struct PromptGate<R, W> {
    input: R,
    output: W,
}

impl PromptGate<io::StdinLock<'static>, io::Stdout> {
    /// Prompts on stdin/stdout.
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> PromptGate<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// The streams the gate prompts on, for asking other questions in turn.
    pub fn streams_mut(&mut self) -> (&mut R, &mut W) {
        (&mut self.input, &mut self.output)
    }

    fn prompt(&mut self, pending: &PendingApproval) -> io::Result<Decision> {
        writeln!(self.output)?;
        writeln!(
            self.output,
            "{} Step {}/{}: {}",
            "?".yellow().bold(),
            pending.step_index + 1,
            pending.step_count,
            pending.title.bold()
        )?;
        writeln!(self.output, "  {}", pending.command.cyan())?;
        write!(self.output, "Run this command? [y/N] ")?;
        self.output.flush()?;

        let mut answer = String::new();
        self.input.read_line(&mut answer)?;

        Ok(parse_answer(&answer))
    }
}

impl<R: BufRead, W: Write> ApprovalGate for PromptGate<R, W> {
    fn review(&mut self, pending: &PendingApproval) -> Decision {
        self.prompt(pending).unwrap_or_else(|e| {
            warn!("Approval prompt failed, declining: {}", e);
            Decision::Decline
        })
    }
}

fn parse_answer(answer: &str) -> Decision {
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Decision::Approve,
        _ => Decision::Decline,
    }
}

/// Replays a fixed list of decisions, recording what it was shown.
///
/// Declines once the script runs out.
#[derive(Debug, Default, Clone)]
pub struct ScriptedGate {
    decisions: VecDeque<Decision>,
    reviewed: Vec<PendingApproval>,
}

impl ScriptedGate {
    pub fn new(decisions: impl IntoIterator<Item = Decision>) -> Self {
        Self {
            decisions: decisions.into_iter().collect(),
            reviewed: Vec::new(),
        }
    }

    /// Approves the first `count` requests, then declines.
    pub fn approve_all(count: usize) -> Self {
        Self::new(std::iter::repeat(Decision::Approve).take(count))
    }

    /// Every approval request seen so far.
    pub fn reviewed(&self) -> &[PendingApproval] {
        &self.reviewed
    }
}

impl ApprovalGate for ScriptedGate {
    fn review(&mut self, pending: &PendingApproval) -> Decision {
        self.reviewed.push(pending.clone());
        self.decisions.pop_front().unwrap_or(Decision::Decline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> PendingApproval {
        PendingApproval {
            workflow_id: "wf".to_string(),
            step_index: 0,
            step_count: 2,
            step_id: "push".to_string(),
            title: "Push".to_string(),
            command: "git push origin main".to_string(),
        }
    }

    #[test]
    fn test_parse_answer() {
        assert_eq!(parse_answer("y\n"), Decision::Approve);
        assert_eq!(parse_answer(" YES "), Decision::Approve);
        assert_eq!(parse_answer("n"), Decision::Decline);
        assert_eq!(parse_answer(""), Decision::Decline);
        assert_eq!(parse_answer("sure"), Decision::Decline);
    }

    #[test]
    fn test_prompt_gate_shows_command() {
        let mut output = Vec::new();
        let decision = {
            let mut gate = PromptGate::new("y\n".as_bytes(), &mut output);
            gate.review(&pending())
        };

        assert_eq!(decision, Decision::Approve);
        let shown = String::from_utf8(output).unwrap();
        assert!(shown.contains("git push origin main"));
        assert!(shown.contains("1/2"));
    }

    #[test]
    fn test_prompt_gate_declines_on_eof() {
        let mut gate = PromptGate::new("".as_bytes(), Vec::new());
        assert_eq!(gate.review(&pending()), Decision::Decline);
    }

    #[test]
    fn test_scripted_gate() {
        let mut gate = ScriptedGate::new([Decision::Approve]);

        assert_eq!(gate.review(&pending()), Decision::Approve);
        assert_eq!(gate.review(&pending()), Decision::Decline);
        assert_eq!(gate.reviewed().len(), 2);
    }

    #[test]
    fn test_approve_all_declines_after_count() {
        let mut gate = ScriptedGate::approve_all(2);

        assert_eq!(gate.review(&pending()), Decision::Approve);
        assert_eq!(gate.review(&pending()), Decision::Approve);
        assert_eq!(gate.review(&pending()), Decision::Decline);
    }
}
