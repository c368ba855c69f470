//! Action Registry
//!
//! Maps action names to factories that bind an action to a target resource.
//! A registry is populated once at startup and only read afterwards, so a
//! single instance can be shared by any number of concurrent drivers.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::debug;

use crate::error::{RegistryError, StepResult};

/// A zero-argument executable step bound to a target.
///
/// Cloning is cheap and every clone runs the same body.
#[derive(Clone)]
pub struct BoundStep {
    name: String,
    body: Arc<dyn Fn() -> StepResult + Send + Sync>,
}

impl BoundStep {
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn() -> StepResult + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            body: Arc::new(body),
        }
    }

    /// Name of the action this step was bound from.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs the step once.
    pub fn run(&self) -> StepResult {
        (self.body)()
    }
}

impl fmt::Debug for BoundStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundStep").field("name", &self.name).finish()
    }
}

/// Produces a bound step for a target resource.
pub trait ActionFactory<R>: Send + Sync {
    fn bind(&self, target: &R) -> BoundStep;
}

impl<R, F> ActionFactory<R> for F
where
    F: Fn(&R) -> BoundStep + Send + Sync,
{
    fn bind(&self, target: &R) -> BoundStep {
        self(target)
    }
}

/// Name to factory mapping for one kind of target resource.
pub struct ActionRegistry<R> {
    factories: HashMap<String, Arc<dyn ActionFactory<R>>>,
}

impl<R> Default for ActionRegistry<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> ActionRegistry<R> {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registers a factory under `name`. Names are unique; a second
    /// registration with the same name is rejected.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> Result<(), RegistryError>
    where
        F: ActionFactory<R> + 'static,
    {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(RegistryError::DuplicateAction(name));
        }
        debug!("Registered action '{}'", name);
        self.factories.insert(name, Arc::new(factory));
        Ok(())
    }

    /// Looks up the factory registered under `name`.
    pub fn resolve(&self, name: &str) -> Result<&Arc<dyn ActionFactory<R>>, RegistryError> {
        self.factories
            .get(name)
            .ok_or_else(|| RegistryError::UnknownAction(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// All registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn noop(name: &'static str) -> impl Fn(&u32) -> BoundStep {
        move |_target: &u32| BoundStep::new(name, || Ok(()))
    }

    #[test]
    fn test_register_and_resolve() {
        let mut registry: ActionRegistry<u32> = ActionRegistry::new();
        registry.register("reboot", noop("reboot")).unwrap();

        assert!(registry.contains("reboot"));
        assert_eq!(registry.len(), 1);

        let step = registry.resolve("reboot").unwrap().bind(&7);
        assert_eq!(step.name(), "reboot");
        assert!(step.run().is_ok());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry: ActionRegistry<u32> = ActionRegistry::new();
        registry.register("reboot", noop("reboot")).unwrap();

        let err = registry.register("reboot", noop("other")).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateAction("reboot".to_string()));

        // the original factory is kept
        let step = registry.resolve("reboot").unwrap().bind(&0);
        assert_eq!(step.name(), "reboot");
    }

    #[test]
    fn test_resolve_unknown() {
        let registry: ActionRegistry<u32> = ActionRegistry::new();
        let err = registry.resolve("ghost").err().unwrap();
        assert_eq!(err, RegistryError::UnknownAction("ghost".to_string()));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_names_sorted() {
        let mut registry: ActionRegistry<u32> = ActionRegistry::new();
        registry.register("stop_start", noop("stop_start")).unwrap();
        registry.register("hard_reboot", noop("hard_reboot")).unwrap();
        assert_eq!(registry.names(), vec!["hard_reboot", "stop_start"]);
    }

    #[test]
    fn test_bound_step_clones_share_body() {
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&counter);
        let step = BoundStep::new("count", move || {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let copy = step.clone();
        step.run().unwrap();
        copy.run().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_factory_sees_target() {
        let mut registry: ActionRegistry<u32> = ActionRegistry::new();
        registry
            .register("check", |target: &u32| {
                let value = *target;
                BoundStep::new("check", move || {
                    if value > 10 {
                        Err(format!("target {} too large", value).into())
                    } else {
                        Ok(())
                    }
                })
            })
            .unwrap();

        let factory = registry.resolve("check").unwrap();
        assert!(factory.bind(&3).run().is_ok());
        assert!(factory.bind(&30).run().is_err());
    }
}
