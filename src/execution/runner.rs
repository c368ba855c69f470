//! Iteration Runner
//!
//! Runs a scenario `times` times with up to `concurrency` iterations in
//! flight. Workers take iteration numbers from a shared counter and send
//! their records back over a channel.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Sender};
use std::sync::Arc;
use std::thread;

use log::{debug, error, info, log_enabled, Level};

use super::driver::{IterationOutcome, WorkloadDriver};
use crate::actions::{ActionRegistry, ServerTarget, SERVER_ACTIONS};
use crate::cloud::Cloud;
use crate::error::ConfigurationError;
use crate::monitoring::{IterationRecord, RunReport};
use crate::scenario::{RunnerConfig, ScenarioArgs, ScenarioDef};

/// Runs many iterations of one scenario.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use novaload::cloud::SimulatedCloud;
/// use novaload::execution::Runner;
/// use novaload::scenario::{catalog, ScenarioArgs};
///
/// let def = catalog::find("NovaServers.mixed_complex_workload_one").unwrap();
/// let args = ScenarioArgs::new("cirros", "m1.tiny", 1).with_count(1);
///
/// let mut runner = Runner::new(def, args, Arc::new(SimulatedCloud::with_defaults()));
/// runner.set_times(4);
/// runner.set_concurrency(2);
///
/// let report = runner.run().unwrap();
/// assert_eq!(report.iterations.len(), 4);
/// ```
pub struct Runner<'a> {
    def: &'a ScenarioDef,
    args: ScenarioArgs,
    cloud: Arc<dyn Cloud>,
    registry: &'a ActionRegistry<ServerTarget>,
    times: usize,
    concurrency: usize,
}

impl<'a> Runner<'a> {
    /// Creates a runner for one iteration at a time using the built-in actions.
    pub fn new(def: &'a ScenarioDef, args: ScenarioArgs, cloud: Arc<dyn Cloud>) -> Self {
        Self {
            def,
            args,
            cloud,
            registry: &SERVER_ACTIONS,
            times: 1,
            concurrency: 1,
        }
    }

    /// Uses a custom action registry.
    pub fn set_registry(&mut self, registry: &'a ActionRegistry<ServerTarget>) {
        self.registry = registry;
    }

    /// Sets the number of iterations.
    pub fn set_times(&mut self, times: usize) {
        self.times = times;
    }

    /// Sets the maximum number of iterations in flight.
    pub fn set_concurrency(&mut self, concurrency: usize) {
        self.concurrency = concurrency.max(1);
    }

    /// Applies a task file's runner settings.
    pub fn configure(&mut self, config: &RunnerConfig) {
        self.set_times(config.times);
        self.set_concurrency(config.concurrency);
    }

    /// Runs every iteration and collects the report.
    ///
    /// The arguments are validated once before any iteration starts; a
    /// configuration error aborts the whole run. Failed iterations are
    /// recorded and do not stop the others.
    pub fn run(&self) -> Result<RunReport, ConfigurationError> {
        WorkloadDriver::prepare_with(self.def, self.args.clone(), Arc::clone(&self.cloud), self.registry)?;

        let mut report = RunReport::new(self.def.name());
        let workers = self.concurrency.min(self.times);
        info!(
            "Running {} x{} (concurrency: {})",
            self.def.name(),
            self.times,
            workers
        );

        let next = AtomicUsize::new(0);
        let (tx, rx) = channel::<IterationRecord>();

        thread::scope(|scope| {
            for _ in 0..workers {
                let tx = tx.clone();
                let next = &next;
                scope.spawn(move || self.work(next, tx));
            }
            drop(tx);

            for record in rx {
                report.push(record);
            }
        });

        report.sort();
        info!(
            "{}: {}/{} iterations succeeded",
            self.def.name(),
            report.success_count(),
            report.iterations.len()
        );
        Ok(report)
    }

    /// Worker loop: runs iterations until the counter passes `times`.
    fn work(&self, next: &AtomicUsize, tx: Sender<IterationRecord>) {
        loop {
            let index = next.fetch_add(1, Ordering::SeqCst);
            if index >= self.times {
                break;
            }

            let record = match WorkloadDriver::prepare_with(
                self.def,
                self.args.clone(),
                Arc::clone(&self.cloud),
                self.registry,
            ) {
                Ok(driver) => record_outcome(index, driver.run()),
                Err(e) => {
                    error!("Iteration {} could not start: {}", index, e);
                    IterationRecord::failed(index, e.to_string())
                }
            };

            if let Err(e) = tx.send(record) {
                error!("Failed to send iteration record: {}", e);
                break;
            }
        }
    }
}

fn record_outcome(index: usize, outcome: IterationOutcome) -> IterationRecord {
    match &outcome.error {
        Some(e) => error!("Iteration {} failed: {}", index, e),
        None => info!("Iteration {} completed in {:.2?}", index, outcome.duration),
    }
    if log_enabled!(Level::Debug) {
        debug!("Iteration {}:{}", index, outcome.timeline.gantt_chart());
    }

    IterationRecord {
        index,
        duration_ms: outcome.duration.as_secs_f64() * 1000.0,
        atomic_actions: outcome.timeline.records(),
        error: outcome.error.as_ref().map(|e| e.to_string()),
        cleanup_failures: outcome
            .cleanup_failures
            .iter()
            .map(|e| e.to_string())
            .collect(),
        created: outcome.created.len(),
        deleted: outcome.deleted.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::SimulatedCloud;
    use crate::scenario::catalog;
    use serde_json::json;
    use std::time::Duration;

    const MIXED_ONE: &str = "NovaServers.mixed_complex_workload_one";

    fn runner(cloud: &Arc<SimulatedCloud>, args: ScenarioArgs) -> Runner<'static> {
        let shared: Arc<dyn Cloud> = cloud.clone();
        Runner::new(catalog::find(MIXED_ONE).unwrap(), args, shared)
    }

    fn args() -> ScenarioArgs {
        ScenarioArgs::new("cirros", "m1.tiny", 1).with_count(1)
    }

    #[test]
    fn test_runs_exactly_times_iterations() {
        let cloud = Arc::new(SimulatedCloud::with_defaults());
        let mut runner = runner(&cloud, args());
        runner.set_times(5);
        runner.set_concurrency(3);

        let report = runner.run().unwrap();

        assert_eq!(report.iterations.len(), 5);
        let indices: Vec<usize> = report.iterations.iter().map(|i| i.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
        assert_eq!(report.success_count(), 5);
        // one server boot per cycle plus one from the snapshot
        assert_eq!(cloud.call_count("nova.boot_server"), 10);
        assert_eq!(cloud.server_count(), 0);
    }

    #[test]
    fn test_iterations_overlap_with_concurrency() {
        let cloud = Arc::new(SimulatedCloud::with_defaults().with_latency(Duration::from_millis(5)));
        let mut runner = runner(&cloud, args());
        runner.set_times(4);
        runner.set_concurrency(4);

        let start = std::time::Instant::now();
        let report = runner.run().unwrap();
        let parallel = start.elapsed();

        let total: f64 = report.iterations.iter().map(|i| i.duration_ms).sum();
        assert!(parallel.as_secs_f64() * 1000.0 < total);
    }

    #[test]
    fn test_configuration_error_aborts_before_iterations() {
        let cloud = Arc::new(SimulatedCloud::with_defaults());
        let mut runner = runner(&cloud, args().with_actions(json!([{"nonexistent": 1}])));
        runner.set_times(3);

        let err = runner.run().unwrap_err();
        assert!(err.to_string().contains("nonexistent"));
        assert_eq!(cloud.call_count("nova.boot_server"), 0);
    }

    #[test]
    fn test_failed_iteration_does_not_stop_run() {
        let cloud = Arc::new(SimulatedCloud::with_defaults());
        cloud.fail_on("nova.snapshot_server", 2);
        let mut runner = runner(&cloud, args());
        runner.set_times(3);

        let report = runner.run().unwrap();

        assert_eq!(report.iterations.len(), 3);
        assert_eq!(report.failure_count(), 1);
        let failed = &report.iterations[1];
        assert!(failed.error.as_deref().unwrap_or("").contains("nova.snapshot_server"));
        assert_eq!(failed.created, failed.deleted);
        assert_eq!(cloud.server_count(), 0);
    }

    #[test]
    fn test_configure_from_task_settings() {
        let cloud = Arc::new(SimulatedCloud::with_defaults());
        let mut runner = runner(&cloud, args());
        runner.configure(&RunnerConfig {
            times: 2,
            concurrency: 0,
        });

        assert_eq!(runner.concurrency, 1);
        assert_eq!(runner.run().unwrap().iterations.len(), 2);
    }
}
