//! Action Builder
//!
//! Turns a validated [`ActionSpec`] and a target resource into an ordered
//! sequence of bound steps.
//!
//! Each factory is called once per specification entry; the resulting step
//! is yielded `count` times in a row. Steps therefore must be safe to run
//! repeatedly.

use std::iter::FusedIterator;

use log::{debug, error};
use serde_json::Value;

use super::model::ActionSpec;
use super::registry::{ActionRegistry, BoundStep};
use super::schema::SchemaValidator;
use crate::error::{ExecutionError, RegistryError, StepResult, WorkloadError};

/// Builds step sequences from a registry.
pub struct ActionBuilder<'r, R> {
    registry: &'r ActionRegistry<R>,
}

impl<'r, R> ActionBuilder<'r, R> {
    pub fn new(registry: &'r ActionRegistry<R>) -> Self {
        Self { registry }
    }

    /// Validator accepting exactly the actions of this builder's registry.
    pub fn validator(&self) -> SchemaValidator {
        SchemaValidator::for_registry(self.registry)
    }

    /// Resolves every entry of `spec` and binds it to `target`.
    ///
    /// All names are resolved before any factory is called, so an unknown
    /// name never leaves a half-built sequence behind. Entries with a zero
    /// count are resolved but not bound.
    pub fn build(&self, spec: &ActionSpec, target: &R) -> Result<ResolvedSteps, RegistryError> {
        let resolved = spec
            .entries()
            .iter()
            .map(|entry| {
                self.registry
                    .resolve(&entry.name)
                    .map(|factory| (factory, entry.count))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let bound: Vec<(BoundStep, usize)> = resolved
            .into_iter()
            .filter(|(_, count)| *count > 0)
            .map(|(factory, count)| (factory.bind(target), count))
            .collect();

        let steps = ResolvedSteps::new(bound);
        debug!("Built {} steps from {} entries", steps.len(), spec.len());
        Ok(steps)
    }

    /// Validates a raw specification, then builds it.
    pub fn build_actions(&self, raw: &Value, target: &R) -> Result<ResolvedSteps, WorkloadError> {
        let spec = self.validator().parse(raw)?;
        Ok(self.build(&spec, target)?)
    }
}

/// Lazy, finite, single-use sequence of bound steps.
#[derive(Debug)]
pub struct ResolvedSteps {
    entries: std::vec::IntoIter<(BoundStep, usize)>,
    current: Option<(BoundStep, usize)>,
    remaining: usize,
}

impl ResolvedSteps {
    fn new(entries: Vec<(BoundStep, usize)>) -> Self {
        let remaining = entries.iter().map(|(_, count)| count).sum();
        Self {
            entries: entries.into_iter(),
            current: None,
            remaining,
        }
    }
}

impl Iterator for ResolvedSteps {
    type Item = BoundStep;

    fn next(&mut self) -> Option<BoundStep> {
        loop {
            if let Some((step, left)) = self.current.as_mut() {
                if *left > 0 {
                    *left -= 1;
                    self.remaining -= 1;
                    return Some(step.clone());
                }
            }
            self.current = Some(self.entries.next()?);
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for ResolvedSteps {}

impl FusedIterator for ResolvedSteps {}

/// Runs `steps` in order through `invoke`, stopping at the first failure.
///
/// Returns the number of steps executed. Steps after a failing one are
/// never invoked.
pub fn run_steps<F>(steps: ResolvedSteps, mut invoke: F) -> Result<usize, ExecutionError>
where
    F: FnMut(&BoundStep) -> StepResult,
{
    let mut executed = 0;
    for (index, step) in steps.enumerate() {
        if let Err(source) = invoke(&step) {
            error!("Action '{}' failed at step {}: {}", step.name(), index, source);
            return Err(ExecutionError::Step {
                action: step.name().to_string(),
                index,
                source,
            });
        }
        executed += 1;
    }
    Ok(executed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<String>>>;

    /// Registry whose steps append their name to the target log.
    fn recording_registry(binds: Arc<AtomicUsize>) -> ActionRegistry<Log> {
        let mut registry = ActionRegistry::new();
        for name in ["hard_reboot", "stop_start", "fail"] {
            let binds = Arc::clone(&binds);
            registry
                .register(name, move |log: &Log| {
                    binds.fetch_add(1, Ordering::SeqCst);
                    let log = Arc::clone(log);
                    BoundStep::new(name, move || {
                        log.lock().unwrap().push(name.to_string());
                        if name == "fail" {
                            Err("step failed".into())
                        } else {
                            Ok(())
                        }
                    })
                })
                .unwrap();
        }
        registry
    }

    #[test]
    fn test_build_order_and_length() {
        let registry = recording_registry(Arc::new(AtomicUsize::new(0)));
        let builder = ActionBuilder::new(&registry);
        let log: Log = Arc::default();

        let spec = ActionSpec::new().with("hard_reboot", 1).with("stop_start", 2);
        let steps = builder.build(&spec, &log).unwrap();
        assert_eq!(steps.len(), 3);

        let names: Vec<String> = steps.map(|s| s.name().to_string()).collect();
        assert_eq!(names, vec!["hard_reboot", "stop_start", "stop_start"]);
    }

    #[test]
    fn test_factory_called_once_per_entry() {
        let binds = Arc::new(AtomicUsize::new(0));
        let registry = recording_registry(Arc::clone(&binds));
        let builder = ActionBuilder::new(&registry);
        let log: Log = Arc::default();

        let spec = ActionSpec::new()
            .with("stop_start", 3)
            .with("hard_reboot", 0)
            .with("stop_start", 1);
        let executed = run_steps(builder.build(&spec, &log).unwrap(), BoundStep::run).unwrap();

        assert_eq!(executed, 4);
        assert_eq!(binds.load(Ordering::SeqCst), 2);
        assert_eq!(log.lock().unwrap().len(), 4);
    }

    #[test]
    fn test_zero_total_is_empty() {
        let registry = recording_registry(Arc::new(AtomicUsize::new(0)));
        let builder = ActionBuilder::new(&registry);
        let log: Log = Arc::default();

        let spec = ActionSpec::new().with("hard_reboot", 0).with("stop_start", 0);
        let mut steps = builder.build(&spec, &log).unwrap();
        assert_eq!(steps.len(), 0);
        assert!(steps.next().is_none());
    }

    #[test]
    fn test_unknown_name_fails_before_binding() {
        let binds = Arc::new(AtomicUsize::new(0));
        let registry = recording_registry(Arc::clone(&binds));
        let builder = ActionBuilder::new(&registry);
        let log: Log = Arc::default();

        let spec = ActionSpec::new().with("hard_reboot", 1).with("ghost", 1);
        let err = builder.build(&spec, &log).unwrap_err();

        assert_eq!(err, RegistryError::UnknownAction("ghost".to_string()));
        assert_eq!(binds.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failure_stops_remaining_steps() {
        let registry = recording_registry(Arc::new(AtomicUsize::new(0)));
        let builder = ActionBuilder::new(&registry);
        let log: Log = Arc::default();

        let spec = ActionSpec::new()
            .with("hard_reboot", 1)
            .with("fail", 1)
            .with("stop_start", 2);
        let err = run_steps(builder.build(&spec, &log).unwrap(), BoundStep::run).unwrap_err();

        assert!(matches!(err, ExecutionError::Step { index: 1, ref action, .. } if action == "fail"));
        assert_eq!(*log.lock().unwrap(), vec!["hard_reboot", "fail"]);
    }

    #[test]
    fn test_build_actions_validates_first() {
        let binds = Arc::new(AtomicUsize::new(0));
        let registry = recording_registry(Arc::clone(&binds));
        let builder = ActionBuilder::new(&registry);
        let log: Log = Arc::default();

        let err = builder
            .build_actions(&json!([{"nonexistent": 1}]), &log)
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("nonexistent"));
        assert_eq!(binds.load(Ordering::SeqCst), 0);

        let steps = builder
            .build_actions(&json!([{"hard_reboot": 2}]), &log)
            .unwrap();
        assert_eq!(steps.len(), 2);
    }

    #[test]
    fn test_size_hint_tracks_consumption() {
        let registry = recording_registry(Arc::new(AtomicUsize::new(0)));
        let builder = ActionBuilder::new(&registry);
        let log: Log = Arc::default();

        let spec = ActionSpec::new().with("stop_start", 2).with("hard_reboot", 1);
        let mut steps = builder.build(&spec, &log).unwrap();
        steps.next();
        assert_eq!(steps.len(), 2);
        steps.next();
        steps.next();
        assert_eq!(steps.len(), 0);
        assert!(steps.next().is_none());
        assert!(steps.next().is_none());
    }
}
