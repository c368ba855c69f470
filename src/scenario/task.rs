//! Task File Loading
//!
//! A task file maps scenario names to a list of workload entries, each with
//! its own arguments and runner settings. Entries run in file order.
//!
//! # Example YAML Format
//!
//! ```yaml
//! NovaServers.mixed_complex_workload_one:
//!   - args:
//!       image: cirros
//!       flavor: m1.tiny
//!       volume_size: 1
//!       count: 3
//!       actions:
//!         - stop_start: 1
//!     runner:
//!       times: 2
//!       concurrency: 2
//! ```

use std::fs;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::catalog::{self, ScenarioDef};
use super::config::ScenarioArgs;
use crate::error::ConfigurationError;

/// How many iterations to run and how many at once.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerConfig {
    #[serde(default = "default_one")]
    pub times: usize,
    #[serde(default = "default_one")]
    pub concurrency: usize,
}

fn default_one() -> usize {
    1
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            times: 1,
            concurrency: 1,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
struct WorkloadEntry {
    args: ScenarioArgs,
    #[serde(default)]
    runner: RunnerConfig,
}

/// One scenario run requested by a task file.
#[derive(Debug, Clone)]
pub struct TaskWorkload {
    pub scenario: &'static ScenarioDef,
    pub args: ScenarioArgs,
    pub runner: RunnerConfig,
}

/// A parsed task file.
#[derive(Debug, Clone, Default)]
pub struct Task {
    pub workloads: Vec<TaskWorkload>,
}

impl Task {
    /// Keeps only the workloads of one scenario.
    pub fn only(mut self, scenario: &str) -> Result<Self, ConfigurationError> {
        let def = catalog::find(scenario)?;
        self.workloads.retain(|w| w.scenario.name() == def.name());
        Ok(self)
    }
}

/// Parses a task from YAML text.
pub fn parse_task(yaml: &str) -> Result<Task, ConfigurationError> {
    let document: serde_yaml::Value = serde_yaml::from_str(yaml)
        .map_err(|e| ConfigurationError::InvalidTask(format!("failed to parse YAML: {}", e)))?;

    let mapping = match document {
        serde_yaml::Value::Mapping(mapping) => mapping,
        serde_yaml::Value::Null => serde_yaml::Mapping::new(),
        _ => {
            return Err(ConfigurationError::InvalidTask(
                "top level must map scenario names to workload lists".to_string(),
            ))
        }
    };

    let mut task = Task::default();
    for (key, value) in mapping {
        let name = key.as_str().ok_or_else(|| {
            ConfigurationError::InvalidTask(format!("scenario name {:?} is not a string", key))
        })?;
        let scenario = catalog::find(name)?;

        let entries: Vec<WorkloadEntry> = serde_yaml::from_value(value)
            .map_err(|e| ConfigurationError::InvalidTask(format!("{}: {}", name, e)))?;

        for (index, entry) in entries.into_iter().enumerate() {
            if entry.runner.times == 0 || entry.runner.concurrency == 0 {
                return Err(ConfigurationError::InvalidTask(format!(
                    "{} entry {}: runner times and concurrency must be at least 1",
                    name, index
                )));
            }
            debug!(
                "Workload {} #{}: times={}, concurrency={}",
                name, index, entry.runner.times, entry.runner.concurrency
            );
            task.workloads.push(TaskWorkload {
                scenario,
                args: entry.args,
                runner: entry.runner,
            });
        }
    }

    Ok(task)
}

/// Loads a task from a YAML file.
///
/// # Example
///
/// ```rust,no_run
/// use novaload::scenario::load_task;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let task = load_task("task.yaml")?;
///     println!("Loaded {} workloads", task.workloads.len());
///     Ok(())
/// }
/// ```
pub fn load_task(path: &str) -> Result<Task, ConfigurationError> {
    info!("Loading task from: {}", path);

    let content = fs::read_to_string(path).map_err(|e| {
        ConfigurationError::InvalidTask(format!(
            "Failed to read task file '{}': {}. Check that the file exists and is readable.",
            path, e
        ))
    })?;
    debug!("YAML content loaded ({} bytes)", content.len());

    let task = parse_task(&content)?;
    info!("Parsed {} workloads", task.workloads.len());
    Ok(task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const TASK: &str = r#"
NovaServers.mixed_complex_workload_two:
  - args:
      image: cirros
      flavor: m1.tiny
      to_flavor: m1.small
      volume_size: 1
    runner:
      times: 3
      concurrency: 2
NovaServers.complex_workload:
  - args:
      image: cirros
      flavor: m1.tiny
      volume_size: 1
      actions:
        - hard_reboot: 1
"#;

    #[test]
    fn test_parse_task_keeps_order() {
        let task = parse_task(TASK).unwrap();

        assert_eq!(task.workloads.len(), 2);
        assert_eq!(
            task.workloads[0].scenario.name(),
            "NovaServers.mixed_complex_workload_two"
        );
        assert_eq!(task.workloads[0].runner.times, 3);
        assert_eq!(task.workloads[1].runner, RunnerConfig::default());
        assert_eq!(task.workloads[1].args.actions[0]["hard_reboot"], 1);
    }

    #[test]
    fn test_parse_task_unknown_scenario() {
        let yaml = "NovaServers.nope:\n  - args: {image: a, flavor: b, volume_size: 1}\n";
        let err = parse_task(yaml).unwrap_err();
        assert_eq!(err, ConfigurationError::UnknownScenario("NovaServers.nope".to_string()));
    }

    #[test]
    fn test_parse_task_rejects_zero_times() {
        let yaml = r#"
NovaServers.complex_workload:
  - args: {image: cirros, flavor: m1.tiny, volume_size: 1}
    runner: {times: 0}
"#;
        assert!(matches!(
            parse_task(yaml),
            Err(ConfigurationError::InvalidTask(_))
        ));
    }

    #[test]
    fn test_parse_task_rejects_non_mapping() {
        assert!(parse_task("- just\n- a list\n").is_err());
        assert!(parse_task("").unwrap().workloads.is_empty());
    }

    #[test]
    fn test_only_filters_scenario() {
        let task = parse_task(TASK)
            .unwrap()
            .only("NovaServers.complex_workload")
            .unwrap();
        assert_eq!(task.workloads.len(), 1);

        assert!(parse_task(TASK).unwrap().only("bogus").is_err());
    }

    #[test]
    fn test_load_task_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("task.yaml");
        std::fs::write(&path, TASK).unwrap();

        let task = load_task(path.to_str().unwrap()).unwrap();
        assert_eq!(task.workloads.len(), 2);
    }

    #[test]
    fn test_load_task_file_not_found() {
        let err = load_task("/nonexistent/path/task.yaml").unwrap_err();
        assert!(err.to_string().contains("Failed to read task file"));
    }
}
