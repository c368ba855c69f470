//! Cloud Collaborator Interface
//!
//! The workloads never talk to compute, volume or image services directly.
//! Everything they need is expressed by the [`Cloud`] trait, which real
//! service clients or the in-memory [`SimulatedCloud`] implement.
//!
//! # Components
//!
//! - [`Cloud`]: resource lifecycle operations used by the workload driver
//! - [`memory`]: in-memory implementation with fault injection

pub mod memory;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::SimulatedCloud;

/// Services a workload may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    Nova,
    Cinder,
    Glance,
    Neutron,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Nova => "nova",
            Self::Cinder => "cinder",
            Self::Glance => "glance",
            Self::Neutron => "neutron",
        };
        f.write_str(name)
    }
}

/// Classes of resources a workload creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Server,
    Image,
    Volume,
}

impl ResourceKind {
    /// The service that owns resources of this kind.
    pub fn service(self) -> Service {
        match self {
            Self::Server => Service::Nova,
            Self::Image => Service::Glance,
            Self::Volume => Service::Cinder,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Server => "server",
            Self::Image => "image",
            Self::Volume => "volume",
        };
        f.write_str(name)
    }
}

/// Errors reported by a cloud collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CloudError {
    #[error("{kind} '{id}' not found")]
    NotFound { kind: ResourceKind, id: String },

    #[error("provisioning failed: {0}")]
    Provisioning(String),

    #[error("{kind} '{id}' is {status}, cannot {operation}")]
    InvalidState {
        kind: ResourceKind,
        id: String,
        status: String,
        operation: String,
    },

    #[error("{operation}: {reason}")]
    Operation { operation: String, reason: String },
}

impl CloudError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// A booted virtual server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub id: String,
    pub name: String,
    pub status: String,
    pub flavor: String,
    /// Image the server was booted from; `None` when booted from a volume
    pub image: Option<String>,
}

/// A glance image, either seeded or snapshotted from a server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub id: String,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub min_ram_mb: u32,
    #[serde(default)]
    pub min_disk_gb: u32,
}

/// A block storage volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub id: String,
    pub name: String,
    pub size_gb: u32,
    pub status: String,
    pub volume_type: Option<String>,
    pub image: Option<String>,
}

/// A compute flavor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flavor {
    pub id: String,
    pub name: String,
    pub vcpus: u32,
    pub ram_mb: u32,
    pub disk_gb: u32,
}

/// Where a server boots from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootImage {
    Image(String),
    /// Boot from a volume mapped as the root device (`vda`)
    Volume(String),
}

/// Parameters for booting one server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootRequest {
    pub name: String,
    pub source: BootImage,
    pub flavor: String,
    pub auto_assign_nic: bool,
}

impl BootRequest {
    pub fn new(name: impl Into<String>, source: BootImage, flavor: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source,
            flavor: flavor.into(),
            auto_assign_nic: false,
        }
    }

    pub fn with_auto_assign_nic(mut self, enabled: bool) -> Self {
        self.auto_assign_nic = enabled;
        self
    }

    /// Block device mapping string for a volume-backed boot.
    pub fn block_device_mapping(&self) -> Option<String> {
        match &self.source {
            BootImage::Volume(id) => Some(format!("{}:::1", id)),
            BootImage::Image(_) => None,
        }
    }
}

/// Parameters for creating a volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeRequest {
    pub name: String,
    pub size_gb: u32,
    pub image: Option<String>,
    pub volume_type: Option<String>,
}

/// Single server state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerOp {
    HardReboot,
    SoftReboot,
    Stop,
    Start,
    Rescue,
    Unrescue,
    Pause,
    Unpause,
    Suspend,
    Resume,
    Lock,
    Unlock,
    Shelve,
    Unshelve,
}

impl ServerOp {
    /// Atomic operation name used for timing and logging.
    pub fn operation_name(self) -> &'static str {
        match self {
            Self::HardReboot => "nova.reboot_server",
            Self::SoftReboot => "nova.soft_reboot_server",
            Self::Stop => "nova.stop_server",
            Self::Start => "nova.start_server",
            Self::Rescue => "nova.rescue_server",
            Self::Unrescue => "nova.unrescue_server",
            Self::Pause => "nova.pause_server",
            Self::Unpause => "nova.unpause_server",
            Self::Suspend => "nova.suspend_server",
            Self::Resume => "nova.resume_server",
            Self::Lock => "nova.lock_server",
            Self::Unlock => "nova.unlock_server",
            Self::Shelve => "nova.shelve_server",
            Self::Unshelve => "nova.unshelve_server",
        }
    }
}

/// Resource lifecycle operations consumed by the workloads.
///
/// Implementations are expected to block until the requested state is
/// reached (or report an error); polling and retry belong here, not in the
/// driver.
pub trait Cloud: Send + Sync {
    /// Services this cloud exposes.
    fn services(&self) -> Vec<Service>;

    /// Looks up an image by id or name.
    fn find_image(&self, name_or_id: &str) -> Result<Image, CloudError>;

    /// Looks up a flavor by id or name.
    fn find_flavor(&self, name_or_id: &str) -> Result<Flavor, CloudError>;

    fn boot_server(&self, request: &BootRequest) -> Result<Server, CloudError>;

    /// Deletes a server. Fails with [`CloudError::NotFound`] if already gone.
    fn delete_server(&self, server: &Server, force: bool) -> Result<(), CloudError>;

    fn list_servers(&self, detailed: bool) -> Result<Vec<Server>, CloudError>;

    /// Snapshots a server into a new image.
    fn create_image(&self, server: &Server, name: &str) -> Result<Image, CloudError>;

    fn delete_image(&self, image: &Image) -> Result<(), CloudError>;

    fn list_images(&self) -> Result<Vec<Image>, CloudError>;

    fn create_volume(&self, request: &VolumeRequest) -> Result<Volume, CloudError>;

    fn delete_volume(&self, volume: &Volume) -> Result<(), CloudError>;

    fn list_volumes(&self) -> Result<Vec<Volume>, CloudError>;

    fn resize(&self, server: &Server, flavor: &str) -> Result<(), CloudError>;

    fn confirm_resize(&self, server: &Server) -> Result<(), CloudError>;

    fn revert_resize(&self, server: &Server) -> Result<(), CloudError>;

    /// Applies a single state transition to a server.
    fn server_action(&self, server: &Server, op: ServerOp) -> Result<(), CloudError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_kind_service() {
        assert_eq!(ResourceKind::Server.service(), Service::Nova);
        assert_eq!(ResourceKind::Image.service(), Service::Glance);
        assert_eq!(ResourceKind::Volume.service(), Service::Cinder);
    }

    #[test]
    fn test_block_device_mapping() {
        let request = BootRequest::new("s1", BootImage::Volume("vol-1".to_string()), "m1.tiny");
        assert_eq!(request.block_device_mapping().as_deref(), Some("vol-1:::1"));

        let request = BootRequest::new("s2", BootImage::Image("img-1".to_string()), "m1.tiny");
        assert!(request.block_device_mapping().is_none());
    }

    #[test]
    fn test_service_serde_lowercase() {
        let services: Vec<Service> = serde_json::from_str(r#"["nova", "cinder"]"#).unwrap();
        assert_eq!(services, vec![Service::Nova, Service::Cinder]);
        assert_eq!(Service::Glance.to_string(), "glance");
    }

    #[test]
    fn test_not_found_detection() {
        let err = CloudError::NotFound {
            kind: ResourceKind::Server,
            id: "abc".to_string(),
        };
        assert!(err.is_not_found());
        assert!(err.to_string().contains("server 'abc'"));
        assert!(!CloudError::Provisioning("x".to_string()).is_not_found());
    }
}
