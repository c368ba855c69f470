//! Action Specification Model
//!
//! An action specification is the user-facing, ordered list of named
//! operations with repeat counts.
//!
//! # Example YAML Format
//!
//! ```yaml
//! actions:
//!   - hard_reboot: 1
//!   - stop_start: 2
//!   - hard_reboot: 1
//! ```

use serde::ser::{SerializeMap, SerializeSeq, Serializer};
use serde::Serialize;

/// One entry of an action specification: run `name` `count` times in a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionEntry {
    pub name: String,
    pub count: usize,
}

impl ActionEntry {
    pub fn new(name: impl Into<String>, count: usize) -> Self {
        Self {
            name: name.into(),
            count,
        }
    }
}

/// Ordered list of action entries. Names may repeat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionSpec {
    entries: Vec<ActionEntry>,
}

impl ActionSpec {
    /// Creates an empty specification.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a specification from entries, keeping their order.
    pub fn from_entries(entries: Vec<ActionEntry>) -> Self {
        Self { entries }
    }

    /// Appends an entry.
    ///
    /// # Example
    ///
    /// ```
    /// use novaload::actions::ActionSpec;
    ///
    /// let spec = ActionSpec::new().with("hard_reboot", 1).with("stop_start", 2);
    /// assert_eq!(spec.total_steps(), 3);
    /// ```
    pub fn with(mut self, name: impl Into<String>, count: usize) -> Self {
        self.entries.push(ActionEntry::new(name, count));
        self
    }

    pub fn entries(&self) -> &[ActionEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all repeat counts.
    pub fn total_steps(&self) -> usize {
        self.entries.iter().map(|e| e.count).sum()
    }
}

/// Serializes back to the user-facing `[{name: count}, ...]` form.
impl Serialize for ActionSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.entries.len()))?;
        for entry in &self.entries {
            seq.serialize_element(&SingleEntry(entry))?;
        }
        seq.end()
    }
}

struct SingleEntry<'a>(&'a ActionEntry);

impl Serialize for SingleEntry<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.0.name, &self.0.count)?;
        map.end()
    }
}
