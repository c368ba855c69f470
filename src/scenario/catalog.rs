//! Scenario Catalog
//!
//! The named scenarios, each expressed as metadata plus a declarative
//! phase list run by the generic driver.

use crate::cloud::{ResourceKind, Service};
use crate::error::ConfigurationError;

use super::config::{Coercion, WorkloadMeta};
use super::phase::{Amount, BootSource, Phase, Repeat};

/// A runnable scenario definition.
#[derive(Debug, Clone, Copy)]
pub struct ScenarioDef {
    pub meta: WorkloadMeta,
    /// Phases run once before the cycles
    pub prelude: &'static [Phase],
    /// Phases run once per cycle
    pub cycle: &'static [Phase],
    pub repeat: Repeat,
    /// `count` used when the arguments leave it unset
    pub default_count: usize,
}

impl ScenarioDef {
    pub fn name(&self) -> &'static str {
        self.meta.name
    }

    /// Iterates over every phase, prelude first.
    pub fn phases(&self) -> impl Iterator<Item = &'static Phase> {
        let (prelude, cycle): (&'static [Phase], &'static [Phase]) = (self.prelude, self.cycle);
        prelude.iter().chain(cycle.iter())
    }

    /// True if any phase resizes a server.
    pub fn resizes(&self) -> bool {
        self.phases().any(Phase::needs_to_flavor)
    }

    /// True if any phase creates a volume.
    pub fn creates_volumes(&self) -> bool {
        self.phases().any(Phase::creates_volume)
    }
}

const COMPUTE_AND_VOLUME: &[Service] = &[Service::Nova, Service::Cinder];
const COMPUTE_IMAGE_AND_VOLUME: &[Service] = &[Service::Nova, Service::Glance, Service::Cinder];

const IMAGE_AND_FLAVOR: &[Coercion] = &[Coercion::Image, Coercion::Flavor];
const IMAGE_AND_BOTH_FLAVORS: &[Coercion] =
    &[Coercion::Image, Coercion::Flavor, Coercion::ToFlavor];

const SERVERS_AND_VOLUMES: &[ResourceKind] = &[ResourceKind::Server, ResourceKind::Volume];
const ALL_RESOURCES: &[ResourceKind] = &[
    ResourceKind::Server,
    ResourceKind::Volume,
    ResourceKind::Image,
];

const STITCHED_CYCLE: &[Phase] = &[
    Phase::Boot {
        into: "batch",
        source: BootSource::Image,
        amount: Amount::Count,
    },
    Phase::Sleep,
    Phase::ListServers,
    Phase::Delete { slot: "batch" },
    Phase::CreateVolume { into: "volume" },
    Phase::Boot {
        into: "volume_server",
        source: BootSource::Volume("volume"),
        amount: Amount::One,
    },
    Phase::Sleep,
    Phase::ListServers,
    Phase::Delete {
        slot: "volume_server",
    },
    Phase::Boot {
        into: "server",
        source: BootSource::Image,
        amount: Amount::One,
    },
    Phase::RunActions { on: "server" },
    Phase::Delete { slot: "server" },
];

const LIST_ONCE: &[Phase] = &[Phase::ListServers];

const MIXED_ONE_CYCLE: &[Phase] = &[
    Phase::Boot {
        into: "server",
        source: BootSource::Image,
        amount: Amount::One,
    },
    Phase::Sleep,
    Phase::RunActions { on: "server" },
    Phase::Snapshot {
        of: "server",
        into: "snapshot",
    },
    Phase::Boot {
        into: "snapshot_server",
        source: BootSource::Snapshot("snapshot"),
        amount: Amount::One,
    },
    Phase::Sleep,
    Phase::ListServers,
];

const MIXED_ONE_BACKUP_CYCLE: &[Phase] = &[
    Phase::CreateVolume { into: "volume" },
    Phase::Sleep,
    Phase::Boot {
        into: "server",
        source: BootSource::Volume("volume"),
        amount: Amount::One,
    },
    Phase::Sleep,
    Phase::RunActions { on: "server" },
    Phase::Snapshot {
        of: "server",
        into: "snapshot",
    },
    Phase::Boot {
        into: "snapshot_server",
        source: BootSource::Snapshot("snapshot"),
        amount: Amount::One,
    },
    Phase::Sleep,
    Phase::ListServers,
];

const MIXED_TWO_CYCLE: &[Phase] = &[
    Phase::Boot {
        into: "server",
        source: BootSource::Image,
        amount: Amount::One,
    },
    Phase::Sleep,
    Phase::RunActions { on: "server" },
    Phase::Resize { on: "server" },
    Phase::RunActions { on: "server" },
    Phase::Snapshot {
        of: "server",
        into: "snapshot",
    },
    Phase::Sleep,
    Phase::ListServers,
];

/// Every scenario this crate can run.
pub static SCENARIOS: &[ScenarioDef] = &[
    ScenarioDef {
        meta: WorkloadMeta {
            name: "NovaServers.complex_workload",
            description: "Boot and delete a batch of servers, boot one from a new \
                          volume, then boot one and run the server actions on it",
            required_services: COMPUTE_AND_VOLUME,
            coercions: IMAGE_AND_FLAVOR,
            check_image_on_flavor: true,
            cleanup: SERVERS_AND_VOLUMES,
        },
        prelude: &[],
        cycle: STITCHED_CYCLE,
        repeat: Repeat::Once,
        default_count: 5,
    },
    ScenarioDef {
        meta: WorkloadMeta {
            name: "NovaServers.stitched_complex_workload",
            description: "Same phases as complex_workload, kept under its \
                          historical name",
            required_services: COMPUTE_AND_VOLUME,
            coercions: IMAGE_AND_FLAVOR,
            check_image_on_flavor: true,
            cleanup: SERVERS_AND_VOLUMES,
        },
        prelude: &[],
        cycle: STITCHED_CYCLE,
        repeat: Repeat::Once,
        default_count: 5,
    },
    ScenarioDef {
        meta: WorkloadMeta {
            name: "NovaServers.mixed_complex_workload_one",
            description: "Per cycle boot a server, run the server actions, \
                          snapshot it and boot a second server from the snapshot",
            required_services: COMPUTE_IMAGE_AND_VOLUME,
            coercions: IMAGE_AND_FLAVOR,
            check_image_on_flavor: true,
            cleanup: ALL_RESOURCES,
        },
        prelude: LIST_ONCE,
        cycle: MIXED_ONE_CYCLE,
        repeat: Repeat::Count,
        default_count: 5,
    },
    ScenarioDef {
        meta: WorkloadMeta {
            name: "NovaServers.mixed_complex_workload_one_backup",
            description: "As mixed_complex_workload_one, but each server boots \
                          from a volume created from the image",
            required_services: COMPUTE_IMAGE_AND_VOLUME,
            coercions: IMAGE_AND_FLAVOR,
            check_image_on_flavor: true,
            cleanup: ALL_RESOURCES,
        },
        prelude: LIST_ONCE,
        cycle: MIXED_ONE_BACKUP_CYCLE,
        repeat: Repeat::Count,
        default_count: 5,
    },
    ScenarioDef {
        meta: WorkloadMeta {
            name: "NovaServers.mixed_complex_workload_two",
            description: "Per cycle boot a server, run the server actions, resize \
                          it, run the actions again and snapshot it",
            required_services: COMPUTE_IMAGE_AND_VOLUME,
            coercions: IMAGE_AND_BOTH_FLAVORS,
            check_image_on_flavor: true,
            cleanup: ALL_RESOURCES,
        },
        prelude: LIST_ONCE,
        cycle: MIXED_TWO_CYCLE,
        repeat: Repeat::Count,
        default_count: 2,
    },
];

/// Looks up a scenario by its full name.
///
/// # Example
///
/// ```
/// use novaload::scenario::catalog;
///
/// let def = catalog::find("NovaServers.mixed_complex_workload_two").unwrap();
/// assert_eq!(def.default_count, 2);
/// ```
pub fn find(name: &str) -> Result<&'static ScenarioDef, ConfigurationError> {
    SCENARIOS
        .iter()
        .find(|def| def.name() == name)
        .ok_or_else(|| ConfigurationError::UnknownScenario(name.to_string()))
}

/// Names of every scenario, in catalog order.
pub fn names() -> Vec<&'static str> {
    SCENARIOS.iter().map(ScenarioDef::name).collect()
}
