//! Monitoring Module
//!
//! Timing of atomic operations during an iteration and reporting of whole
//! runs.
//!
//! # Components
//!
//! - [`AtomicTimeline`]: Per-operation start/end timing for Gantt charts
//! - [`RunReport`]: Iteration results, JSON persistence and summaries

pub mod report;
pub mod timeline;

pub use report::{IterationRecord, OperationStats, RunReport};
pub use timeline::{AtomicRecord, AtomicTimeline, EventType, TimelineEvent};
