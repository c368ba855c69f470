//! Run Reports
//!
//! Per-iteration results of a run, saved as JSON and summarised per atomic
//! operation.
//!
//! Reports are written to `{dir}/{scenario}-{timestamp}.json`.

use std::collections::BTreeMap;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};

use super::timeline::AtomicRecord;

/// Result of one iteration.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct IterationRecord {
    pub index: usize,
    pub duration_ms: f64,
    pub atomic_actions: Vec<AtomicRecord>,
    /// Why the iteration failed, if it did
    pub error: Option<String>,
    #[serde(default)]
    pub cleanup_failures: Vec<String>,
    /// Resources created and deleted by the iteration
    #[serde(default)]
    pub created: usize,
    #[serde(default)]
    pub deleted: usize,
}

impl IterationRecord {
    /// Record for an iteration that never got to run.
    pub fn failed(index: usize, error: String) -> Self {
        Self {
            index,
            duration_ms: 0.0,
            atomic_actions: Vec::new(),
            error: Some(error),
            cleanup_failures: Vec::new(),
            created: 0,
            deleted: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Timing statistics of one atomic operation across a run.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationStats {
    pub name: String,
    pub count: usize,
    pub min_ms: f64,
    pub avg_ms: f64,
    pub max_ms: f64,
    /// Fraction of runs that succeeded, 0.0 to 1.0
    pub success_rate: f64,
}

/// All iterations of one scenario run.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RunReport {
    pub scenario: String,
    pub started_at: DateTime<Utc>,
    pub iterations: Vec<IterationRecord>,
}

impl RunReport {
    /// Creates an empty report started now.
    pub fn new(scenario: &str) -> Self {
        Self {
            scenario: scenario.to_string(),
            started_at: Utc::now(),
            iterations: Vec::new(),
        }
    }

    pub fn push(&mut self, record: IterationRecord) {
        self.iterations.push(record);
    }

    /// Orders iterations by index.
    pub fn sort(&mut self) {
        self.iterations.sort_by_key(|i| i.index);
    }

    pub fn success_count(&self) -> usize {
        self.iterations.iter().filter(|i| i.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.iterations.len() - self.success_count()
    }

    /// True if every iteration succeeded.
    pub fn is_success(&self) -> bool {
        self.failure_count() == 0
    }

    /// Per-operation statistics, ordered by name.
    pub fn stats(&self) -> Vec<OperationStats> {
        let mut grouped: BTreeMap<&str, Vec<&AtomicRecord>> = BTreeMap::new();
        for record in self.iterations.iter().flat_map(|i| &i.atomic_actions) {
            grouped.entry(record.name.as_str()).or_default().push(record);
        }

        grouped
            .into_iter()
            .map(|(name, records)| {
                let count = records.len();
                let durations = records.iter().map(|r| r.duration_ms);
                let min_ms = durations.clone().fold(f64::INFINITY, f64::min);
                let max_ms = durations.clone().fold(0.0, f64::max);
                let avg_ms = durations.sum::<f64>() / count as f64;
                let successes = records.iter().filter(|r| r.success).count();
                OperationStats {
                    name: name.to_string(),
                    count,
                    min_ms,
                    avg_ms,
                    max_ms,
                    success_rate: successes as f64 / count as f64,
                }
            })
            .collect()
    }

    /// Renders a plain-text summary table.
    pub fn summary(&self) -> String {
        let mut output = format!(
            "\n{} ({} iterations, {} failed)\n\n",
            self.scenario,
            self.iterations.len(),
            self.failure_count()
        );

        output.push_str(&format!(
            "{:<28} {:>6} {:>10} {:>10} {:>10} {:>8}\n",
            "Action", "Count", "Min (ms)", "Avg (ms)", "Max (ms)", "Success"
        ));
        output.push_str(&format!("{}\n", "-".repeat(77)));

        for stats in self.stats() {
            output.push_str(&format!(
                "{:<28} {:>6} {:>10.1} {:>10.1} {:>10.1} {:>7.1}%\n",
                stats.name,
                stats.count,
                stats.min_ms,
                stats.avg_ms,
                stats.max_ms,
                stats.success_rate * 100.0
            ));
        }

        let cleanup_failures: usize = self.iterations.iter().map(|i| i.cleanup_failures.len()).sum();
        if cleanup_failures > 0 {
            output.push_str(&format!("\nCleanup failures: {}\n", cleanup_failures));
        }
        output
    }

    /// Report file name: scenario plus start timestamp.
    pub fn file_name(&self) -> String {
        format!(
            "{}-{}.json",
            self.scenario,
            self.started_at.format("%Y%m%dT%H%M%S%.3fZ")
        )
    }

    /// Saves the report as pretty JSON into `dir`, creating it if needed.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<PathBuf, Box<dyn Error>> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let path = dir.join(self.file_name());
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json)?;

        info!("Saved report to {}", path.display());
        Ok(path)
    }

    /// Loads a report written by [`RunReport::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Box<dyn Error>> {
        let content = fs::read_to_string(path.as_ref())?;
        let report: RunReport = serde_json::from_str(&content)?;
        Ok(report)
    }
}
