//! Run Monitoring Module
//!
//! Keeps a record of what each workflow run did.
//!
//! # Components
//!
//! - [`RunTimeline`]: Approval, dispatch, and termination events

pub mod timeline;

pub use timeline::{EventType, RunTimeline, TimelineEvent};
