//! Atomic Action Timeline
//!
//! Tracks start/end times of every atomic operation (cloud calls and action
//! steps) of one iteration, for reports and Gantt charts.
//!
//! The same operation name usually occurs many times per iteration
//! (`nova.boot_server` once per server); each completed start/end pair
//! becomes one [`AtomicRecord`].

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Type of timeline event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventType {
    /// Operation started
    Started,
    /// Operation completed successfully
    Completed,
    /// Operation failed
    Failed,
}

/// A single event in the timeline.
#[derive(Debug, Clone)]
pub struct TimelineEvent {
    /// Atomic operation name
    pub action: String,
    pub event_type: EventType,
    pub timestamp: Instant,
}

/// One timed run of an atomic operation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AtomicRecord {
    pub name: String,
    /// Offset from the start of the timeline
    pub started_ms: f64,
    pub duration_ms: f64,
    pub success: bool,
}

/// Timeline of the atomic operations of one iteration.
#[derive(Debug, Clone)]
pub struct AtomicTimeline {
    events: Vec<TimelineEvent>,
    start_time: Instant,
}

impl AtomicTimeline {
    /// Creates a new timeline starting now.
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            start_time: Instant::now(),
        }
    }

    /// Records an event for an operation.
    pub fn add_event(&mut self, action: impl Into<String>, event_type: EventType) {
        self.events.push(TimelineEvent {
            action: action.into(),
            event_type,
            timestamp: Instant::now(),
        });
    }

    /// Runs `f`, recording it as `name` and marking it failed on `Err`.
    ///
    /// # Example
    ///
    /// ```
    /// use novaload::monitoring::AtomicTimeline;
    ///
    /// let mut timeline = AtomicTimeline::new();
    /// let value: Result<u32, String> = timeline.time("nova.list_servers", || Ok(3));
    /// assert_eq!(value, Ok(3));
    /// assert_eq!(timeline.records().len(), 1);
    /// ```
    pub fn time<T, E, F>(&mut self, name: &str, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        self.add_event(name, EventType::Started);
        let result = f();
        let outcome = if result.is_ok() {
            EventType::Completed
        } else {
            EventType::Failed
        };
        self.add_event(name, outcome);
        result
    }

    /// Returns all recorded events.
    pub fn get_events(&self) -> &[TimelineEvent] {
        &self.events
    }

    /// Returns the total elapsed time since timeline creation.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Pairs start and end events into records, ordered by start time.
    ///
    /// Operations that started but never finished are left out.
    pub fn records(&self) -> Vec<AtomicRecord> {
        let mut open: HashMap<&str, Vec<Instant>> = HashMap::new();
        let mut records = Vec::new();

        for event in &self.events {
            match event.event_type {
                EventType::Started => {
                    open.entry(event.action.as_str())
                        .or_default()
                        .push(event.timestamp);
                }
                EventType::Completed | EventType::Failed => {
                    let started = open
                        .get_mut(event.action.as_str())
                        .and_then(|starts| starts.pop());
                    if let Some(started) = started {
                        records.push(AtomicRecord {
                            name: event.action.clone(),
                            started_ms: millis(started.duration_since(self.start_time)),
                            duration_ms: millis(event.timestamp.duration_since(started)),
                            success: event.event_type == EventType::Completed,
                        });
                    }
                }
            }
        }

        records.sort_by(|a, b| a.started_ms.total_cmp(&b.started_ms));
        records
    }

    /// Total time spent per operation name.
    pub fn totals(&self) -> BTreeMap<String, Duration> {
        let mut totals: BTreeMap<String, Duration> = BTreeMap::new();
        for record in self.records() {
            *totals.entry(record.name).or_default() +=
                Duration::from_secs_f64(record.duration_ms / 1000.0);
        }
        totals
    }

    /// Generates an ASCII Gantt chart representation.
    ///
    /// Each operation run is shown as a bar indicating when it ran relative
    /// to the total iteration time.
    pub fn gantt_chart(&self) -> String {
        let mut output = String::from("\nAtomic Action Timeline:\n\n");

        let total_time = millis(self.elapsed());
        if total_time <= 0.0 {
            return output;
        }

        // Scale to 50 characters width
        let scale = 50.0 / total_time;

        for record in self.records() {
            let start_pos = (record.started_ms * scale) as usize;
            let width = (record.duration_ms * scale).max(1.0) as usize;

            let mut bar = " ".repeat(start_pos);
            bar.push_str(&"#".repeat(width));

            let marker = if record.success { "" } else { " FAILED" };
            output.push_str(&format!(
                "{:24} |{}| ({:.1} ms){}\n",
                truncate(&record.name, 24),
                bar,
                record.duration_ms,
                marker
            ));
        }

        output.push_str(&format!("\nTotal: {:.1} ms\n", total_time));
        output
    }
}

impl Default for AtomicTimeline {
    fn default() -> Self {
        Self::new()
    }
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// Truncates a string to at most `max_len` characters, padding short ones.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return format!("{:width$}", s, width = max_len);
    }
    let keep = max_len.saturating_sub(3);
    let end = s.char_indices().nth(keep).map_or(s.len(), |(i, _)| i);
    format!("{}...", &s[..end])
}
