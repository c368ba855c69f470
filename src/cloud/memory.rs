//! In-Memory Cloud
//!
//! A [`Cloud`] implementation that keeps every resource in process memory.
//! Used by the CLI to exercise workloads without a real deployment and by
//! tests as a recording collaborator.
//!
//! Servers follow a small status machine so that impossible sequences (for
//! example starting a server that was never stopped) surface as errors the
//! same way a real compute service would reject them.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use log::debug;

use super::{
    BootImage, BootRequest, Cloud, CloudError, Flavor, Image, ResourceKind, Server, ServerOp,
    Service, Volume, VolumeRequest,
};

const ACTIVE: &str = "ACTIVE";
const SHUTOFF: &str = "SHUTOFF";
const RESCUE: &str = "RESCUE";
const PAUSED: &str = "PAUSED";
const SUSPENDED: &str = "SUSPENDED";
const SHELVED: &str = "SHELVED_OFFLOADED";
const VERIFY_RESIZE: &str = "VERIFY_RESIZE";

/// Default number of recent operations kept in the log.
pub const OPERATION_LOG_LIMIT: usize = 1024;

#[derive(Debug, Clone)]
struct SimServer {
    server: Server,
    locked: bool,
    previous_flavor: Option<String>,
    root_volume: Option<String>,
}

#[derive(Debug, Clone)]
struct Fault {
    operation: String,
    /// 1-based call number that fails
    nth: usize,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    flavors: Vec<Flavor>,
    images: BTreeMap<String, Image>,
    servers: BTreeMap<String, SimServer>,
    volumes: BTreeMap<String, Volume>,
    operations: VecDeque<String>,
    calls: HashMap<String, usize>,
    faults: Vec<Fault>,
}

impl State {
    fn allocate_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{:04}", prefix, self.next_id)
    }

    fn image(&self, name_or_id: &str) -> Option<&Image> {
        self.images
            .get(name_or_id)
            .or_else(|| self.images.values().find(|i| i.name == name_or_id))
    }

    fn flavor(&self, name_or_id: &str) -> Option<&Flavor> {
        self.flavors
            .iter()
            .find(|f| f.id == name_or_id || f.name == name_or_id)
    }

    fn server_mut(&mut self, id: &str) -> Result<&mut SimServer, CloudError> {
        self.servers.get_mut(id).ok_or_else(|| CloudError::NotFound {
            kind: ResourceKind::Server,
            id: id.to_string(),
        })
    }
}

/// In-memory cloud with fault injection and an operation log.
///
/// # Example
///
/// ```
/// use novaload::cloud::{BootImage, BootRequest, Cloud, SimulatedCloud};
///
/// let cloud = SimulatedCloud::with_defaults();
/// let image = cloud.find_image("cirros").unwrap();
/// let server = cloud
///     .boot_server(&BootRequest::new("s1", BootImage::Image(image.id), "m1.tiny"))
///     .unwrap();
/// assert_eq!(server.status, "ACTIVE");
/// ```
pub struct SimulatedCloud {
    state: Mutex<State>,
    services: Vec<Service>,
    latency: Option<Duration>,
    log_limit: usize,
}

impl Default for SimulatedCloud {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedCloud {
    /// Creates an empty cloud exposing every service.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            services: vec![Service::Nova, Service::Cinder, Service::Glance, Service::Neutron],
            latency: None,
            log_limit: OPERATION_LOG_LIMIT,
        }
    }

    /// Creates a cloud seeded with a small image and flavor catalog.
    pub fn with_defaults() -> Self {
        Self::new()
            .with_image("cirros", 0, 1)
            .with_image("ubuntu-22.04", 1024, 10)
            .with_flavor("m1.tiny", 1, 512, 1)
            .with_flavor("m1.small", 1, 2048, 20)
            .with_flavor("m1.medium", 2, 4096, 40)
            .with_flavor("m1.large", 4, 8192, 80)
    }

    /// Adds a base image.
    pub fn with_image(self, name: &str, min_ram_mb: u32, min_disk_gb: u32) -> Self {
        if let Ok(mut state) = self.state.lock() {
            let id = state.allocate_id("img");
            state.images.insert(
                id.clone(),
                Image {
                    id,
                    name: name.to_string(),
                    status: "active".to_string(),
                    min_ram_mb,
                    min_disk_gb,
                },
            );
        }
        self
    }

    /// Adds a flavor. The flavor id equals its name.
    pub fn with_flavor(self, name: &str, vcpus: u32, ram_mb: u32, disk_gb: u32) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.flavors.push(Flavor {
                id: name.to_string(),
                name: name.to_string(),
                vcpus,
                ram_mb,
                disk_gb,
            });
        }
        self
    }

    /// Restricts the services this cloud reports.
    pub fn with_services(mut self, services: Vec<Service>) -> Self {
        self.services = services;
        self
    }

    /// Adds a fixed delay to every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Keeps at most `limit` recent operations in the log. Zero disables it.
    ///
    /// Call counts are kept regardless.
    pub fn with_operation_log_limit(mut self, limit: usize) -> Self {
        self.log_limit = limit;
        self
    }

    /// Makes the `nth` call (1-based) to `operation` fail.
    pub fn fail_on(&self, operation: &str, nth: usize) {
        if let Ok(mut state) = self.state.lock() {
            state.faults.push(Fault {
                operation: operation.to_string(),
                nth,
            });
        }
    }

    /// Returns the most recent operations, oldest first.
    pub fn operations(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.operations.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of calls made to an operation.
    pub fn call_count(&self, operation: &str) -> usize {
        self.state
            .lock()
            .map(|s| s.calls.get(operation).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn server_count(&self) -> usize {
        self.state.lock().map(|s| s.servers.len()).unwrap_or(0)
    }

    pub fn volume_count(&self) -> usize {
        self.state.lock().map(|s| s.volumes.len()).unwrap_or(0)
    }

    /// Number of images, base images included.
    pub fn image_count(&self) -> usize {
        self.state.lock().map(|s| s.images.len()).unwrap_or(0)
    }

    /// Returns the current view of a server.
    pub fn server(&self, id: &str) -> Option<Server> {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.servers.get(id).map(|s| s.server.clone()))
    }

    /// Records a call and applies latency and injected faults.
    fn enter(&self, operation: &str) -> Result<MutexGuard<'_, State>, CloudError> {
        if let Some(latency) = self.latency {
            thread::sleep(latency);
        }

        let mut state = self.state.lock().map_err(|_| CloudError::Operation {
            operation: operation.to_string(),
            reason: "cloud state lock poisoned".to_string(),
        })?;

        if self.log_limit > 0 {
            if state.operations.len() >= self.log_limit {
                state.operations.pop_front();
            }
            state.operations.push_back(operation.to_string());
        }
        let count = {
            let entry = state.calls.entry(operation.to_string()).or_insert(0);
            *entry += 1;
            *entry
        };

        let injected = state
            .faults
            .iter()
            .any(|f| f.operation == operation && f.nth == count);
        if injected {
            debug!("Injected fault on {} (call {})", operation, count);
            return Err(CloudError::Operation {
                operation: operation.to_string(),
                reason: "injected fault".to_string(),
            });
        }

        Ok(state)
    }
}

fn invalid_state(server: &SimServer, operation: &str) -> CloudError {
    CloudError::InvalidState {
        kind: ResourceKind::Server,
        id: server.server.id.clone(),
        status: server.server.status.clone(),
        operation: operation.to_string(),
    }
}

fn transition(server: &mut SimServer, op: ServerOp) -> Result<(), CloudError> {
    let status = server.server.status.as_str();
    let operation = op.operation_name();

    let next = match op {
        ServerOp::Lock => {
            if server.locked {
                return Err(invalid_state(server, operation));
            }
            server.locked = true;
            return Ok(());
        }
        ServerOp::Unlock => {
            if !server.locked {
                return Err(invalid_state(server, operation));
            }
            server.locked = false;
            return Ok(());
        }
        ServerOp::HardReboot if status == ACTIVE || status == SHUTOFF => ACTIVE,
        ServerOp::SoftReboot if status == ACTIVE => ACTIVE,
        ServerOp::Stop if status == ACTIVE => SHUTOFF,
        ServerOp::Start if status == SHUTOFF => ACTIVE,
        ServerOp::Rescue if status == ACTIVE || status == SHUTOFF => RESCUE,
        ServerOp::Unrescue if status == RESCUE => ACTIVE,
        ServerOp::Pause if status == ACTIVE => PAUSED,
        ServerOp::Unpause if status == PAUSED => ACTIVE,
        ServerOp::Suspend if status == ACTIVE => SUSPENDED,
        ServerOp::Resume if status == SUSPENDED => ACTIVE,
        ServerOp::Shelve if status == ACTIVE || status == SHUTOFF => SHELVED,
        ServerOp::Unshelve if status == SHELVED => ACTIVE,
        _ => return Err(invalid_state(server, operation)),
    };

    server.server.status = next.to_string();
    Ok(())
}

impl Cloud for SimulatedCloud {
    fn services(&self) -> Vec<Service> {
        self.services.clone()
    }

    fn find_image(&self, name_or_id: &str) -> Result<Image, CloudError> {
        let state = self.enter("glance.get_image")?;
        state
            .image(name_or_id)
            .cloned()
            .ok_or_else(|| CloudError::NotFound {
                kind: ResourceKind::Image,
                id: name_or_id.to_string(),
            })
    }

    fn find_flavor(&self, name_or_id: &str) -> Result<Flavor, CloudError> {
        let state = self.enter("nova.get_flavor")?;
        state
            .flavor(name_or_id)
            .cloned()
            .ok_or_else(|| CloudError::Operation {
                operation: "nova.get_flavor".to_string(),
                reason: format!("flavor '{}' not found", name_or_id),
            })
    }

    fn boot_server(&self, request: &BootRequest) -> Result<Server, CloudError> {
        let mut state = self.enter("nova.boot_server")?;

        let flavor = state
            .flavor(&request.flavor)
            .map(|f| f.id.clone())
            .ok_or_else(|| CloudError::Provisioning(format!("flavor '{}' not found", request.flavor)))?;

        let (image, root_volume) = match &request.source {
            BootImage::Image(id) => {
                let image = state
                    .image(id)
                    .ok_or_else(|| CloudError::Provisioning(format!("image '{}' not found", id)))?;
                (Some(image.id.clone()), None)
            }
            BootImage::Volume(id) => {
                let volume = state
                    .volumes
                    .get_mut(id)
                    .ok_or_else(|| CloudError::Provisioning(format!("volume '{}' not found", id)))?;
                if volume.status != "available" {
                    return Err(CloudError::Provisioning(format!(
                        "volume '{}' is {}",
                        id, volume.status
                    )));
                }
                volume.status = "in-use".to_string();
                (None, Some(id.clone()))
            }
        };

        let id = state.allocate_id("srv");
        let server = Server {
            id: id.clone(),
            name: request.name.clone(),
            status: ACTIVE.to_string(),
            flavor,
            image,
        };
        state.servers.insert(
            id,
            SimServer {
                server: server.clone(),
                locked: false,
                previous_flavor: None,
                root_volume,
            },
        );

        debug!("Booted server {} ({})", server.id, server.name);
        Ok(server)
    }

    fn delete_server(&self, server: &Server, _force: bool) -> Result<(), CloudError> {
        let mut state = self.enter("nova.delete_server")?;
        let removed = state
            .servers
            .remove(&server.id)
            .ok_or_else(|| CloudError::NotFound {
                kind: ResourceKind::Server,
                id: server.id.clone(),
            })?;

        if let Some(volume_id) = removed.root_volume {
            if let Some(volume) = state.volumes.get_mut(&volume_id) {
                volume.status = "available".to_string();
            }
        }
        Ok(())
    }

    fn list_servers(&self, _detailed: bool) -> Result<Vec<Server>, CloudError> {
        let state = self.enter("nova.list_servers")?;
        Ok(state.servers.values().map(|s| s.server.clone()).collect())
    }

    fn create_image(&self, server: &Server, name: &str) -> Result<Image, CloudError> {
        let mut state = self.enter("nova.snapshot_server")?;

        let (status, source_image) = {
            let sim = state.server_mut(&server.id)?;
            (sim.server.status.clone(), sim.server.image.clone())
        };
        if status != ACTIVE && status != SHUTOFF {
            return Err(CloudError::InvalidState {
                kind: ResourceKind::Server,
                id: server.id.clone(),
                status,
                operation: "snapshot".to_string(),
            });
        }

        let (min_ram_mb, min_disk_gb) = source_image
            .as_deref()
            .and_then(|id| state.image(id))
            .map(|i| (i.min_ram_mb, i.min_disk_gb))
            .unwrap_or((0, 0));

        let id = state.allocate_id("img");
        let image = Image {
            id: id.clone(),
            name: name.to_string(),
            status: "active".to_string(),
            min_ram_mb,
            min_disk_gb,
        };
        state.images.insert(id, image.clone());
        Ok(image)
    }

    fn delete_image(&self, image: &Image) -> Result<(), CloudError> {
        let mut state = self.enter("glance.delete_image")?;
        state
            .images
            .remove(&image.id)
            .map(|_| ())
            .ok_or_else(|| CloudError::NotFound {
                kind: ResourceKind::Image,
                id: image.id.clone(),
            })
    }

    fn list_images(&self) -> Result<Vec<Image>, CloudError> {
        let state = self.enter("glance.list_images")?;
        Ok(state.images.values().cloned().collect())
    }

    fn create_volume(&self, request: &VolumeRequest) -> Result<Volume, CloudError> {
        let mut state = self.enter("cinder.create_volume")?;

        if request.size_gb == 0 {
            return Err(CloudError::Provisioning("volume size must be positive".to_string()));
        }
        let image = match &request.image {
            Some(id) => {
                let image = state
                    .image(id)
                    .ok_or_else(|| CloudError::Provisioning(format!("image '{}' not found", id)))?;
                if image.min_disk_gb > request.size_gb {
                    return Err(CloudError::Provisioning(format!(
                        "image '{}' needs {} GB, volume has {} GB",
                        id, image.min_disk_gb, request.size_gb
                    )));
                }
                Some(image.id.clone())
            }
            None => None,
        };

        let id = state.allocate_id("vol");
        let volume = Volume {
            id: id.clone(),
            name: request.name.clone(),
            size_gb: request.size_gb,
            status: "available".to_string(),
            volume_type: request.volume_type.clone(),
            image,
        };
        state.volumes.insert(id, volume.clone());
        Ok(volume)
    }

    fn delete_volume(&self, volume: &Volume) -> Result<(), CloudError> {
        let mut state = self.enter("cinder.delete_volume")?;
        let status = state
            .volumes
            .get(&volume.id)
            .map(|v| v.status.clone())
            .ok_or_else(|| CloudError::NotFound {
                kind: ResourceKind::Volume,
                id: volume.id.clone(),
            })?;

        if status == "in-use" {
            return Err(CloudError::InvalidState {
                kind: ResourceKind::Volume,
                id: volume.id.clone(),
                status,
                operation: "delete".to_string(),
            });
        }
        state.volumes.remove(&volume.id);
        Ok(())
    }

    fn list_volumes(&self) -> Result<Vec<Volume>, CloudError> {
        let state = self.enter("cinder.list_volumes")?;
        Ok(state.volumes.values().cloned().collect())
    }

    fn resize(&self, server: &Server, flavor: &str) -> Result<(), CloudError> {
        let mut state = self.enter("nova.resize")?;
        let target = state
            .flavor(flavor)
            .map(|f| f.id.clone())
            .ok_or_else(|| CloudError::Provisioning(format!("flavor '{}' not found", flavor)))?;

        let sim = state.server_mut(&server.id)?;
        if sim.server.status != ACTIVE && sim.server.status != SHUTOFF {
            return Err(invalid_state(sim, "resize"));
        }
        sim.previous_flavor = Some(std::mem::replace(&mut sim.server.flavor, target));
        sim.server.status = VERIFY_RESIZE.to_string();
        Ok(())
    }

    fn confirm_resize(&self, server: &Server) -> Result<(), CloudError> {
        let mut state = self.enter("nova.resize_confirm")?;
        let sim = state.server_mut(&server.id)?;
        if sim.server.status != VERIFY_RESIZE {
            return Err(invalid_state(sim, "confirm resize"));
        }
        sim.previous_flavor = None;
        sim.server.status = ACTIVE.to_string();
        Ok(())
    }

    fn revert_resize(&self, server: &Server) -> Result<(), CloudError> {
        let mut state = self.enter("nova.resize_revert")?;
        let sim = state.server_mut(&server.id)?;
        if sim.server.status != VERIFY_RESIZE {
            return Err(invalid_state(sim, "revert resize"));
        }
        if let Some(flavor) = sim.previous_flavor.take() {
            sim.server.flavor = flavor;
        }
        sim.server.status = ACTIVE.to_string();
        Ok(())
    }

    fn server_action(&self, server: &Server, op: ServerOp) -> Result<(), CloudError> {
        let mut state = self.enter(op.operation_name())?;
        let sim = state.server_mut(&server.id)?;
        transition(sim, op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boot(cloud: &SimulatedCloud, name: &str) -> Server {
        let image = cloud.find_image("cirros").unwrap();
        cloud
            .boot_server(&BootRequest::new(name, BootImage::Image(image.id), "m1.tiny"))
            .unwrap()
    }

    #[test]
    fn test_defaults_seeded() {
        let cloud = SimulatedCloud::with_defaults();
        assert_eq!(cloud.image_count(), 2);
        assert!(cloud.find_flavor("m1.small").is_ok());
        assert!(cloud.find_flavor("m9.huge").is_err());
        assert!(cloud.find_image("missing").unwrap_err().is_not_found());
    }

    #[test]
    fn test_boot_and_delete_server() {
        let cloud = SimulatedCloud::with_defaults();
        let server = boot(&cloud, "s1");

        assert_eq!(server.status, "ACTIVE");
        assert_eq!(cloud.server_count(), 1);

        cloud.delete_server(&server, false).unwrap();
        assert_eq!(cloud.server_count(), 0);

        let again = cloud.delete_server(&server, false);
        assert!(again.unwrap_err().is_not_found());
    }

    #[test]
    fn test_stop_start_transitions() {
        let cloud = SimulatedCloud::with_defaults();
        let server = boot(&cloud, "s1");

        assert!(cloud.server_action(&server, ServerOp::Start).is_err());
        cloud.server_action(&server, ServerOp::Stop).unwrap();
        assert_eq!(cloud.server(&server.id).unwrap().status, "SHUTOFF");
        cloud.server_action(&server, ServerOp::Start).unwrap();
        assert_eq!(cloud.server(&server.id).unwrap().status, "ACTIVE");
    }

    #[test]
    fn test_lock_unlock() {
        let cloud = SimulatedCloud::with_defaults();
        let server = boot(&cloud, "s1");

        assert!(cloud.server_action(&server, ServerOp::Unlock).is_err());
        cloud.server_action(&server, ServerOp::Lock).unwrap();
        assert!(cloud.server_action(&server, ServerOp::Lock).is_err());
        cloud.server_action(&server, ServerOp::Unlock).unwrap();
    }

    #[test]
    fn test_resize_confirm_and_revert() {
        let cloud = SimulatedCloud::with_defaults();
        let server = boot(&cloud, "s1");

        cloud.resize(&server, "m1.small").unwrap();
        assert_eq!(cloud.server(&server.id).unwrap().status, "VERIFY_RESIZE");
        cloud.revert_resize(&server).unwrap();
        assert_eq!(cloud.server(&server.id).unwrap().flavor, "m1.tiny");

        cloud.resize(&server, "m1.small").unwrap();
        cloud.confirm_resize(&server).unwrap();
        let current = cloud.server(&server.id).unwrap();
        assert_eq!(current.flavor, "m1.small");
        assert_eq!(current.status, "ACTIVE");

        assert!(cloud.confirm_resize(&server).is_err());
    }

    #[test]
    fn test_volume_in_use_until_server_deleted() {
        let cloud = SimulatedCloud::with_defaults();
        let image = cloud.find_image("cirros").unwrap();
        let volume = cloud
            .create_volume(&VolumeRequest {
                name: "v1".to_string(),
                size_gb: 1,
                image: Some(image.id),
                volume_type: None,
            })
            .unwrap();

        let server = cloud
            .boot_server(&BootRequest::new(
                "s1",
                BootImage::Volume(volume.id.clone()),
                "m1.tiny",
            ))
            .unwrap();
        assert!(server.image.is_none());

        assert!(matches!(
            cloud.delete_volume(&volume),
            Err(CloudError::InvalidState { .. })
        ));
        cloud.delete_server(&server, true).unwrap();
        cloud.delete_volume(&volume).unwrap();
        assert_eq!(cloud.volume_count(), 0);
    }

    #[test]
    fn test_volume_too_small_for_image() {
        let cloud = SimulatedCloud::with_defaults();
        let image = cloud.find_image("ubuntu-22.04").unwrap();
        let result = cloud.create_volume(&VolumeRequest {
            name: "v1".to_string(),
            size_gb: 5,
            image: Some(image.id),
            volume_type: None,
        });
        assert!(matches!(result, Err(CloudError::Provisioning(_))));
    }

    #[test]
    fn test_snapshot_inherits_requirements() {
        let cloud = SimulatedCloud::with_defaults();
        let image = cloud.find_image("ubuntu-22.04").unwrap();
        let server = cloud
            .boot_server(&BootRequest::new("s1", BootImage::Image(image.id), "m1.small"))
            .unwrap();

        let snapshot = cloud.create_image(&server, "snap").unwrap();
        assert_eq!(snapshot.min_ram_mb, 1024);
        assert_eq!(cloud.image_count(), 3);

        cloud.delete_image(&snapshot).unwrap();
        assert!(cloud.delete_image(&snapshot).unwrap_err().is_not_found());
    }

    #[test]
    fn test_fault_injection_hits_nth_call() {
        let cloud = SimulatedCloud::with_defaults();
        cloud.fail_on("nova.boot_server", 2);

        boot(&cloud, "s1");
        let image = cloud.find_image("cirros").unwrap();
        let second =
            cloud.boot_server(&BootRequest::new("s2", BootImage::Image(image.id), "m1.tiny"));
        assert!(second.is_err());
        boot(&cloud, "s3");

        assert_eq!(cloud.call_count("nova.boot_server"), 3);
        assert_eq!(cloud.server_count(), 2);
    }

    #[test]
    fn test_operation_log_order() {
        let cloud = SimulatedCloud::with_defaults();
        let server = boot(&cloud, "s1");
        cloud.list_servers(true).unwrap();
        cloud.delete_server(&server, false).unwrap();

        assert_eq!(
            cloud.operations(),
            vec![
                "glance.get_image",
                "nova.boot_server",
                "nova.list_servers",
                "nova.delete_server"
            ]
        );
    }

    #[test]
    fn test_operation_log_is_bounded() {
        let cloud = SimulatedCloud::with_defaults().with_operation_log_limit(2);
        for _ in 0..5 {
            cloud.list_servers(false).unwrap();
        }
        cloud.list_volumes().unwrap();

        assert_eq!(cloud.operations(), vec!["nova.list_servers", "cinder.list_volumes"]);
        assert_eq!(cloud.call_count("nova.list_servers"), 5);

        let silent = SimulatedCloud::with_defaults().with_operation_log_limit(0);
        silent.list_servers(false).unwrap();
        assert!(silent.operations().is_empty());
        assert_eq!(silent.call_count("nova.list_servers"), 1);
    }

    #[test]
    fn test_restricted_services() {
        let cloud = SimulatedCloud::new().with_services(vec![Service::Nova]);
        assert_eq!(cloud.services(), vec![Service::Nova]);
    }
}
