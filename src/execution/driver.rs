//! Workload Driver
//!
//! Runs one iteration of a scenario: validates the arguments up front, walks
//! the phase list, then deletes everything the iteration created.
//!
//! Cleanup runs whether the phases succeed or not. Resources are released
//! newest first from the ledger, then the scenario's resource classes are
//! swept for anything else carrying this iteration's name prefix.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use super::pacing::{self, sleep_between, NameGenerator};
use crate::actions::{run_steps, ActionBuilder, ActionRegistry, ActionSpec, SchemaValidator};
use crate::actions::{ServerTarget, SERVER_ACTIONS};
use crate::cloud::{
    BootImage, BootRequest, Cloud, CloudError, Flavor, Image, ResourceKind, Server, Volume,
    VolumeRequest,
};
use crate::error::{CleanupError, ConfigurationError, ExecutionError, WorkloadError};
use crate::monitoring::AtomicTimeline;
use crate::scenario::{
    Amount, BootSource, CleanupLedger, Coercion, Phase, Repeat, Resource, ResourceRef,
    ScenarioArgs, ScenarioDef, Slot,
};

/// Base of generated resource names.
const NAME_BASE: &str = "novaload";

/// Order in which leftover resource classes are swept.
const SWEEP_ORDER: [ResourceKind; 3] = [
    ResourceKind::Server,
    ResourceKind::Image,
    ResourceKind::Volume,
];

/// Result of one iteration.
#[derive(Debug)]
pub struct IterationOutcome {
    pub scenario: &'static str,
    pub created: Vec<ResourceRef>,
    pub deleted: Vec<ResourceRef>,
    /// Action steps run across every `RunActions` phase
    pub steps_executed: usize,
    pub cleanup_failures: Vec<CleanupError>,
    /// Why the phases stopped early, if they did
    pub error: Option<WorkloadError>,
    pub duration: Duration,
    pub timeline: AtomicTimeline,
}

impl IterationOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Created resources that were not deleted.
    pub fn leaked(&self) -> Vec<&ResourceRef> {
        self.created
            .iter()
            .filter(|r| !self.deleted.contains(r))
            .collect()
    }
}

/// Per-iteration mutable state.
#[derive(Default)]
struct RunState {
    slots: HashMap<Slot, Vec<Resource>>,
    ledger: CleanupLedger,
    created: Vec<ResourceRef>,
    deleted: Vec<ResourceRef>,
    steps_executed: usize,
}

impl RunState {
    /// Stores a new resource in a slot and records it for cleanup.
    fn keep(&mut self, slot: Slot, resource: Resource) {
        self.created.push(resource.reference());
        self.ledger.record(resource.clone());
        self.slots.entry(slot).or_default().push(resource);
    }

    fn servers(&self, slot: Slot) -> Result<Vec<Server>, ExecutionError> {
        let servers: Vec<Server> = self
            .slots
            .get(slot)
            .into_iter()
            .flatten()
            .filter_map(|r| match r {
                Resource::Server(server) => Some(server.clone()),
                _ => None,
            })
            .collect();
        if servers.is_empty() {
            return Err(ExecutionError::EmptySlot(slot));
        }
        Ok(servers)
    }

    fn volume(&self, slot: Slot) -> Result<Volume, ExecutionError> {
        self.slots
            .get(slot)
            .into_iter()
            .flatten()
            .find_map(|r| match r {
                Resource::Volume(volume) => Some(volume.clone()),
                _ => None,
            })
            .ok_or(ExecutionError::EmptySlot(slot))
    }

    fn image(&self, slot: Slot) -> Result<Image, ExecutionError> {
        self.slots
            .get(slot)
            .into_iter()
            .flatten()
            .find_map(|r| match r {
                Resource::Image(image) => Some(image.clone()),
                _ => None,
            })
            .ok_or(ExecutionError::EmptySlot(slot))
    }
}

/// Driver for one iteration of a scenario.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use novaload::cloud::SimulatedCloud;
/// use novaload::execution::WorkloadDriver;
/// use novaload::scenario::{catalog, ScenarioArgs};
/// use serde_json::json;
///
/// let cloud = Arc::new(SimulatedCloud::with_defaults());
/// let def = catalog::find("NovaServers.mixed_complex_workload_one").unwrap();
/// let args = ScenarioArgs::new("cirros", "m1.tiny", 1)
///     .with_count(2)
///     .with_actions(json!([{"stop_start": 1}]));
///
/// let driver = WorkloadDriver::prepare(def, args, cloud.clone()).unwrap();
/// let outcome = driver.run();
/// assert!(outcome.is_success());
/// assert!(outcome.leaked().is_empty());
/// ```
pub struct WorkloadDriver<'a> {
    def: &'a ScenarioDef,
    args: ScenarioArgs,
    cloud: Arc<dyn Cloud>,
    registry: &'a ActionRegistry<ServerTarget>,
    actions: ActionSpec,
    image: String,
    flavor: String,
    to_flavor: Option<String>,
    count: usize,
    names: NameGenerator,
    timeline: AtomicTimeline,
}

impl<'a> WorkloadDriver<'a> {
    /// Prepares a driver using the built-in server actions.
    pub fn prepare(
        def: &'a ScenarioDef,
        args: ScenarioArgs,
        cloud: Arc<dyn Cloud>,
    ) -> Result<Self, ConfigurationError> {
        Self::prepare_with(def, args, cloud, &SERVER_ACTIONS)
    }

    /// Prepares a driver with a custom action registry.
    ///
    /// Every check happens here, before any resource is created: required
    /// services, name to id resolution, image against flavor, argument
    /// consistency and the action specification.
    pub fn prepare_with(
        def: &'a ScenarioDef,
        args: ScenarioArgs,
        cloud: Arc<dyn Cloud>,
        registry: &'a ActionRegistry<ServerTarget>,
    ) -> Result<Self, ConfigurationError> {
        let meta = &def.meta;
        info!("Preparing {}", meta.name);

        let available = cloud.services();
        if let Some(missing) = meta
            .required_services
            .iter()
            .find(|service| !available.contains(service))
        {
            return Err(ConfigurationError::MissingService(*missing));
        }

        let coerced = |c: Coercion| meta.coercions.contains(&c);

        let image = if coerced(Coercion::Image) || meta.check_image_on_flavor {
            Some(lookup_image(cloud.as_ref(), &args.image)?)
        } else {
            None
        };
        let flavor = if coerced(Coercion::Flavor) || meta.check_image_on_flavor {
            Some(lookup_flavor(cloud.as_ref(), &args.flavor)?)
        } else {
            None
        };

        if meta.check_image_on_flavor {
            if let (Some(image), Some(flavor)) = (&image, &flavor) {
                if image.min_ram_mb > flavor.ram_mb {
                    return Err(ConfigurationError::ImageTooLarge {
                        image: image.name.clone(),
                        flavor: flavor.name.clone(),
                        min_ram_mb: image.min_ram_mb,
                        ram_mb: flavor.ram_mb,
                    });
                }
            }
        }

        let image_id = match image {
            Some(image) if coerced(Coercion::Image) => image.id,
            _ => args.image.clone(),
        };
        let flavor_id = match flavor {
            Some(flavor) if coerced(Coercion::Flavor) => flavor.id,
            _ => args.flavor.clone(),
        };

        if def.resizes() && args.to_flavor.is_none() {
            return Err(ConfigurationError::MissingArgument("to_flavor"));
        }
        let to_flavor = match &args.to_flavor {
            Some(name) if coerced(Coercion::ToFlavor) => {
                Some(lookup_flavor(cloud.as_ref(), name)?.id)
            }
            other => other.clone(),
        };

        validate_sleep(args.min_sleep, args.max_sleep)?;

        if def.creates_volumes() && args.volume_size == 0 {
            return Err(ConfigurationError::InvalidArgument {
                name: "volume_size",
                reason: "must be at least 1 GB".to_string(),
            });
        }

        let actions = SchemaValidator::for_registry(registry).parse(&args.actions)?;
        let count = args.count.unwrap_or(def.default_count);

        debug!(
            "{}: image={}, flavor={}, count={}, {} action steps per server",
            meta.name,
            image_id,
            flavor_id,
            count,
            actions.total_steps()
        );

        Ok(Self {
            def,
            args,
            cloud,
            registry,
            actions,
            image: image_id,
            flavor: flavor_id,
            to_flavor,
            count,
            names: NameGenerator::new(NAME_BASE),
            timeline: AtomicTimeline::new(),
        })
    }

    pub fn scenario(&self) -> &'a ScenarioDef {
        self.def
    }

    /// The validated action specification.
    pub fn actions(&self) -> &ActionSpec {
        &self.actions
    }

    /// Number of servers or cycles this driver will use.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Prefix carried by every resource this driver creates.
    pub fn name_prefix(&self) -> &str {
        self.names.prefix()
    }

    /// Runs the phases, then cleans up.
    pub fn run(mut self) -> IterationOutcome {
        let started = Instant::now();
        let mut state = RunState::default();

        let result = self.run_phases(&mut state);
        if let Err(e) = &result {
            error!("{} aborted: {}", self.def.name(), e);
        }

        let release = state.ledger.release_all(
            self.cloud.as_ref(),
            self.args.force_delete,
            &mut self.timeline,
        );
        state.deleted.extend(release.deleted);
        let mut cleanup_failures = release.failures;
        cleanup_failures.extend(self.sweep(&mut state.deleted));

        let duration = started.elapsed();
        info!(
            "{} finished in {:.2?}: {} created, {} deleted, {} cleanup failures",
            self.def.name(),
            duration,
            state.created.len(),
            state.deleted.len(),
            cleanup_failures.len()
        );

        IterationOutcome {
            scenario: self.def.meta.name,
            created: state.created,
            deleted: state.deleted,
            steps_executed: state.steps_executed,
            cleanup_failures,
            error: result.err(),
            duration,
            timeline: self.timeline,
        }
    }

    fn run_phases(&mut self, state: &mut RunState) -> Result<(), WorkloadError> {
        let def = self.def;

        for phase in def.prelude {
            self.run_phase(phase, state)?;
        }

        let cycles = match def.repeat {
            Repeat::Once => 1,
            Repeat::Count => self.count,
        };
        for cycle in 0..cycles {
            debug!("{}: cycle {}/{}", def.name(), cycle + 1, cycles);
            state.slots.clear();
            for phase in def.cycle {
                self.run_phase(phase, state)?;
            }
        }
        Ok(())
    }

    fn run_phase(&mut self, phase: &Phase, state: &mut RunState) -> Result<(), WorkloadError> {
        info!("{}: {}", self.def.name(), phase);

        match *phase {
            Phase::ListServers => {
                let detailed = self.args.detailed;
                let servers = self.timed("nova.list_servers", |c| c.list_servers(detailed))?;
                debug!("Listed {} servers", servers.len());
            }
            Phase::Boot {
                into,
                source,
                amount,
            } => {
                let source = match source {
                    BootSource::Image => BootImage::Image(self.image.clone()),
                    BootSource::Volume(slot) => BootImage::Volume(state.volume(slot)?.id),
                    BootSource::Snapshot(slot) => BootImage::Image(state.image(slot)?.id),
                };
                let amount = match amount {
                    Amount::One => 1,
                    Amount::Count => self.count,
                };
                for _ in 0..amount {
                    let request =
                        BootRequest::new(self.names.generate(), source.clone(), &*self.flavor)
                            .with_auto_assign_nic(self.args.auto_assign_nic);
                    let server = self.timed("nova.boot_server", |c| c.boot_server(&request))?;
                    state.keep(into, Resource::Server(server));
                }
            }
            Phase::CreateVolume { into } => {
                let request = VolumeRequest {
                    name: self.names.generate(),
                    size_gb: self.args.volume_size,
                    image: Some(self.image.clone()),
                    volume_type: self.args.volume_type.clone(),
                };
                let volume = self.timed("cinder.create_volume", |c| c.create_volume(&request))?;
                state.keep(into, Resource::Volume(volume));
            }
            Phase::RunActions { on } => {
                for server in state.servers(on)? {
                    let target = ServerTarget::new(Arc::clone(&self.cloud), server);
                    let steps = ActionBuilder::new(self.registry).build(&self.actions, &target)?;
                    let timeline = &mut self.timeline;
                    state.steps_executed += run_steps(steps, |step| {
                        timeline.time(&format!("action.{}", step.name()), || step.run())
                    })?;
                }
            }
            Phase::Resize { on } => {
                let to_flavor = self
                    .to_flavor
                    .clone()
                    .ok_or(ConfigurationError::MissingArgument("to_flavor"))?;
                for server in state.servers(on)? {
                    self.timed("nova.resize", |c| c.resize(&server, &to_flavor))?;
                    if self.args.confirm {
                        self.timed("nova.resize_confirm", |c| c.confirm_resize(&server))?;
                    } else {
                        self.timed("nova.resize_revert", |c| c.revert_resize(&server))?;
                    }
                }
            }
            Phase::Snapshot { of, into } => {
                for server in state.servers(of)? {
                    let name = self.names.generate();
                    let image =
                        self.timed("nova.snapshot_server", |c| c.create_image(&server, &name))?;
                    state.keep(into, Resource::Image(image));
                }
            }
            Phase::Delete { slot } => {
                // an empty batch leaves nothing to delete
                let resources = state.slots.remove(slot).unwrap_or_default();
                for resource in resources {
                    resource
                        .delete(self.cloud.as_ref(), self.args.force_delete, &mut self.timeline)
                        .map_err(ExecutionError::operation(resource.delete_operation()))?;
                    state.ledger.forget(resource.id());
                    state.deleted.push(resource.reference());
                }
            }
            Phase::Sleep => {
                sleep_between(self.args.min_sleep, self.args.max_sleep);
            }
        }
        Ok(())
    }

    /// Runs one cloud call, timed under `operation`.
    fn timed<T, F>(&mut self, operation: &'static str, f: F) -> Result<T, ExecutionError>
    where
        F: FnOnce(&dyn Cloud) -> Result<T, CloudError>,
    {
        debug!("{}", operation);
        let cloud = Arc::clone(&self.cloud);
        self.timeline
            .time(operation, || f(cloud.as_ref()))
            .map_err(ExecutionError::operation(operation))
    }

    /// Deletes leftovers of the scenario's cleanup classes owned by this run.
    fn sweep(&mut self, deleted: &mut Vec<ResourceRef>) -> Vec<CleanupError> {
        let mut failures = Vec::new();
        let cleanup = self.def.meta.cleanup;
        let classes = SWEEP_ORDER
            .into_iter()
            .filter(|kind| cleanup.contains(kind));

        for kind in classes {
            let leftovers = match self.leftovers(kind) {
                Ok(leftovers) => leftovers,
                Err(e) => {
                    warn!("Sweep: cannot list {} resources: {}", kind, e);
                    continue;
                }
            };

            for resource in leftovers {
                match resource.delete(self.cloud.as_ref(), self.args.force_delete, &mut self.timeline)
                {
                    Ok(()) => {
                        info!("Sweep: deleted {} '{}'", kind, resource.id());
                        deleted.push(resource.reference());
                    }
                    Err(e) if e.is_not_found() => {
                        debug!("Sweep: {} '{}' already gone", kind, resource.id());
                    }
                    Err(e) => {
                        warn!("Sweep: failed to delete {} '{}': {}", kind, resource.id(), e);
                        failures.push(CleanupError {
                            kind,
                            id: resource.id().to_string(),
                            source: e,
                        });
                    }
                }
            }
        }
        failures
    }

    fn leftovers(&self, kind: ResourceKind) -> Result<Vec<Resource>, CloudError> {
        let all: Vec<Resource> = match kind {
            ResourceKind::Server => self
                .cloud
                .list_servers(false)?
                .into_iter()
                .map(Resource::Server)
                .collect(),
            ResourceKind::Image => self
                .cloud
                .list_images()?
                .into_iter()
                .map(Resource::Image)
                .collect(),
            ResourceKind::Volume => self
                .cloud
                .list_volumes()?
                .into_iter()
                .map(Resource::Volume)
                .collect(),
        };
        Ok(all
            .into_iter()
            .filter(|r| self.names.owns(r.name()))
            .collect())
    }
}

fn lookup_image(cloud: &dyn Cloud, name: &str) -> Result<Image, ConfigurationError> {
    cloud.find_image(name).map_err(|e| {
        debug!("Image lookup for '{}' failed: {}", name, e);
        ConfigurationError::ImageNotFound(name.to_string())
    })
}

fn lookup_flavor(cloud: &dyn Cloud, name: &str) -> Result<Flavor, ConfigurationError> {
    cloud.find_flavor(name).map_err(|e| {
        debug!("Flavor lookup for '{}' failed: {}", name, e);
        ConfigurationError::FlavorNotFound(name.to_string())
    })
}

fn validate_sleep(min_sleep: f64, max_sleep: f64) -> Result<(), ConfigurationError> {
    if !pacing::is_representable(min_sleep) {
        return Err(ConfigurationError::InvalidArgument {
            name: "min_sleep",
            reason: format!("must be a non-negative number of seconds, got {}", min_sleep),
        });
    }
    if !pacing::is_representable(max_sleep) {
        return Err(ConfigurationError::InvalidArgument {
            name: "max_sleep",
            reason: format!("must be a non-negative number of seconds, got {}", max_sleep),
        });
    }
    if max_sleep < min_sleep {
        return Err(ConfigurationError::InvalidArgument {
            name: "max_sleep",
            reason: format!("must be at least min_sleep ({}), got {}", min_sleep, max_sleep),
        });
    }
    Ok(())
}

/// Prepares and runs one iteration with the built-in server actions.
pub fn run_workload(
    def: &ScenarioDef,
    args: ScenarioArgs,
    cloud: Arc<dyn Cloud>,
) -> Result<IterationOutcome, ConfigurationError> {
    Ok(WorkloadDriver::prepare(def, args, cloud)?.run())
}
