//! Run Timeline
//!
//! Records what happened to each run: approval requests, decisions,
//! dispatched commands, and how the run ended.

use chrono::{DateTime, Utc};

/// Type of timeline event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    /// Run paused waiting on an operator
    ApprovalRequested,
    Approved,
    Declined,
    /// Command written to the terminal
    Dispatched,
    Completed,
    Cancelled,
    /// Run discarded by an explicit stop
    Stopped,
    /// Run aborted by an error
    Failed(String),
}

impl EventType {
    /// Short lowercase label for reports.
    pub fn label(&self) -> String {
        match self {
            Self::ApprovalRequested => "awaiting approval".to_string(),
            Self::Approved => "approved".to_string(),
            Self::Declined => "declined".to_string(),
            Self::Dispatched => "dispatched".to_string(),
            Self::Completed => "completed".to_string(),
            Self::Cancelled => "cancelled".to_string(),
            Self::Stopped => "stopped".to_string(),
            Self::Failed(reason) => format!("failed: {}", reason),
        }
    }
}

/// A single event in the timeline.
#[derive(Debug, Clone)]
pub struct TimelineEvent {
    pub workflow_id: String,
    /// Step the event refers to, if any
    pub step_index: Option<usize>,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
}

/// Tracks events of every run handled by an engine.
#[derive(Debug, Clone, Default)]
pub struct RunTimeline {
    events: Vec<TimelineEvent>,
}

impl RunTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an event.
    pub fn add_event(&mut self, workflow_id: &str, step_index: Option<usize>, event_type: EventType) {
        self.events.push(TimelineEvent {
            workflow_id: workflow_id.to_string(),
            step_index,
            event_type,
            timestamp: Utc::now(),
        });
    }

    /// Returns all recorded events.
    pub fn get_events(&self) -> &[TimelineEvent] {
        &self.events
    }

    /// Returns the events of one workflow, oldest first.
    pub fn events_for<'a>(&'a self, workflow_id: &'a str) -> impl Iterator<Item = &'a TimelineEvent> + 'a {
        self.events.iter().filter(move |e| e.workflow_id == workflow_id)
    }

    /// Number of commands dispatched for a workflow.
    pub fn dispatched_count(&self, workflow_id: &str) -> usize {
        self.events_for(workflow_id)
            .filter(|e| e.event_type == EventType::Dispatched)
            .count()
    }

    /// Renders a plain-text report of a workflow's events.
    pub fn summary(&self, workflow_id: &str) -> String {
        let mut output = format!("Run timeline for '{}':\n", workflow_id);

        for event in self.events_for(workflow_id) {
            let step = event
                .step_index
                .map(|i| format!("step {}", i + 1))
                .unwrap_or_else(|| "-".to_string());

            output.push_str(&format!(
                "  {}  {:<8}  {}\n",
                event.timestamp.format("%H:%M:%S%.3f"),
                step,
                event.event_type.label()
            ));
        }

        output
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeline_creation() {
        let timeline = RunTimeline::new();
        assert!(timeline.get_events().is_empty());
    }

    #[test]
    fn test_add_and_filter_events() {
        let mut timeline = RunTimeline::new();
        timeline.add_event("a", Some(0), EventType::Dispatched);
        timeline.add_event("b", Some(0), EventType::ApprovalRequested);
        timeline.add_event("a", Some(1), EventType::Dispatched);
        timeline.add_event("a", None, EventType::Completed);

        assert_eq!(timeline.get_events().len(), 4);
        assert_eq!(timeline.events_for("a").count(), 3);
        assert_eq!(timeline.dispatched_count("a"), 2);
        assert_eq!(timeline.dispatched_count("b"), 0);
    }

    #[test]
    fn test_events_are_ordered() {
        let mut timeline = RunTimeline::new();
        timeline.add_event("a", Some(0), EventType::ApprovalRequested);
        timeline.add_event("a", Some(0), EventType::Approved);

        let events: Vec<_> = timeline.events_for("a").collect();
        assert_eq!(events[0].event_type, EventType::ApprovalRequested);
        assert!(events[0].timestamp <= events[1].timestamp);
    }

    #[test]
    fn test_summary() {
        let mut timeline = RunTimeline::new();
        timeline.add_event("deploy", Some(0), EventType::Declined);
        timeline.add_event("deploy", None, EventType::Failed("shell gone".to_string()));

        let summary = timeline.summary("deploy");
        assert!(summary.contains("Run timeline for 'deploy'"));
        assert!(summary.contains("step 1"));
        assert!(summary.contains("declined"));
        assert!(summary.contains("failed: shell gone"));
    }

    #[test]
    fn test_clear() {
        let mut timeline = RunTimeline::new();
        timeline.add_event("a", None, EventType::Stopped);
        timeline.clear();
        assert!(timeline.get_events().is_empty());
    }
}
