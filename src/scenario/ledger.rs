//! Cleanup Ledger
//!
//! Records every resource a workload creates so that whatever is still
//! alive when the workload ends (normally or not) gets deleted.

use std::fmt;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::cloud::{Cloud, CloudError, Image, ResourceKind, Server, Volume};
use crate::error::CleanupError;
use crate::monitoring::AtomicTimeline;

/// A resource created by a workload.
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    Server(Server),
    Image(Image),
    Volume(Volume),
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Server(_) => ResourceKind::Server,
            Self::Image(_) => ResourceKind::Image,
            Self::Volume(_) => ResourceKind::Volume,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Server(server) => &server.id,
            Self::Image(image) => &image.id,
            Self::Volume(volume) => &volume.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Server(server) => &server.name,
            Self::Image(image) => &image.name,
            Self::Volume(volume) => &volume.name,
        }
    }

    /// Reference to this resource for reports.
    pub fn reference(&self) -> ResourceRef {
        ResourceRef {
            kind: self.kind(),
            id: self.id().to_string(),
        }
    }

    /// Atomic operation name of deleting this resource.
    pub fn delete_operation(&self) -> &'static str {
        match self {
            Self::Server(_) => "nova.delete_server",
            Self::Image(_) => "glance.delete_image",
            Self::Volume(_) => "cinder.delete_volume",
        }
    }

    /// Deletes this resource, timing the call into `timeline`.
    pub fn delete(
        &self,
        cloud: &dyn Cloud,
        force: bool,
        timeline: &mut AtomicTimeline,
    ) -> Result<(), CloudError> {
        timeline.time(self.delete_operation(), || match self {
            Self::Server(server) => cloud.delete_server(server, force),
            Self::Image(image) => cloud.delete_image(image),
            Self::Volume(volume) => cloud.delete_volume(volume),
        })
    }
}

/// Kind and id of a resource.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub id: String,
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind, self.id)
    }
}

/// Outcome of releasing a ledger.
#[derive(Debug, Default)]
pub struct Release {
    /// Resources deleted by this release
    pub deleted: Vec<ResourceRef>,
    /// Resources that were already gone
    pub already_gone: Vec<ResourceRef>,
    pub failures: Vec<CleanupError>,
}

/// Resources created so far, in creation order.
#[derive(Debug, Default)]
pub struct CleanupLedger {
    entries: Vec<Resource>,
}

impl CleanupLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a newly created resource.
    pub fn record(&mut self, resource: Resource) {
        debug!("Ledger: recorded {} '{}'", resource.kind(), resource.id());
        self.entries.push(resource);
    }

    /// Removes a resource that was deleted explicitly.
    pub fn forget(&mut self, id: &str) -> Option<Resource> {
        let position = self.entries.iter().position(|r| r.id() == id)?;
        Some(self.entries.remove(position))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|r| r.id() == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Deletes every recorded resource, most recent first.
    ///
    /// A resource that is already gone counts as released. Any other failure
    /// is logged and collected; the remaining resources are still attempted.
    /// The ledger is empty afterwards.
    pub fn release_all(
        &mut self,
        cloud: &dyn Cloud,
        force: bool,
        timeline: &mut AtomicTimeline,
    ) -> Release {
        let mut release = Release::default();

        while let Some(resource) = self.entries.pop() {
            match resource.delete(cloud, force, timeline) {
                Ok(()) => {
                    info!("Cleanup: deleted {} '{}'", resource.kind(), resource.id());
                    release.deleted.push(resource.reference());
                }
                Err(e) if e.is_not_found() => {
                    debug!(
                        "Cleanup: {} '{}' already gone",
                        resource.kind(),
                        resource.id()
                    );
                    release.already_gone.push(resource.reference());
                }
                Err(e) => {
                    warn!(
                        "Cleanup: failed to delete {} '{}': {}",
                        resource.kind(),
                        resource.id(),
                        e
                    );
                    release.failures.push(CleanupError {
                        kind: resource.kind(),
                        id: resource.id().to_string(),
                        source: e,
                    });
                }
            }
        }

        release
    }
}
