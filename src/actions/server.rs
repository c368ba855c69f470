//! Built-in Server Actions
//!
//! The standard set of actions that can be run against a booted server.
//! Each action is a short, fixed sequence of server state transitions that
//! leaves the server usable again (for example stop then start).

use std::fmt;
use std::sync::Arc;

use log::{debug, error};
use once_cell::sync::Lazy;

use super::registry::{ActionRegistry, BoundStep};
use crate::cloud::{Cloud, Server, ServerOp};

/// Process-wide registry of the built-in server actions.
///
/// Initialised on first use and never modified afterwards.
pub static SERVER_ACTIONS: Lazy<ActionRegistry<ServerTarget>> = Lazy::new(server_actions);

/// The server an action runs against, together with the cloud that owns it.
#[derive(Clone)]
pub struct ServerTarget {
    pub cloud: Arc<dyn Cloud>,
    pub server: Server,
}

impl ServerTarget {
    pub fn new(cloud: Arc<dyn Cloud>, server: Server) -> Self {
        Self { cloud, server }
    }
}

impl fmt::Debug for ServerTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerTarget")
            .field("server", &self.server.id)
            .finish()
    }
}

/// Built-in actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerAction {
    HardReboot,
    SoftReboot,
    StopStart,
    RescueUnrescue,
    PauseUnpause,
    SuspendResume,
    LockUnlock,
    ShelveUnshelve,
}

impl ServerAction {
    pub const ALL: [ServerAction; 8] = [
        Self::HardReboot,
        Self::SoftReboot,
        Self::StopStart,
        Self::RescueUnrescue,
        Self::PauseUnpause,
        Self::SuspendResume,
        Self::LockUnlock,
        Self::ShelveUnshelve,
    ];

    /// Name used in action specifications.
    pub fn name(self) -> &'static str {
        match self {
            Self::HardReboot => "hard_reboot",
            Self::SoftReboot => "soft_reboot",
            Self::StopStart => "stop_start",
            Self::RescueUnrescue => "rescue_unrescue",
            Self::PauseUnpause => "pause_unpause",
            Self::SuspendResume => "suspend_resume",
            Self::LockUnlock => "lock_unlock",
            Self::ShelveUnshelve => "shelve_unshelve",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.name() == name)
    }

    /// Server transitions performed by this action, in order.
    pub fn ops(self) -> &'static [ServerOp] {
        match self {
            Self::HardReboot => &[ServerOp::HardReboot],
            Self::SoftReboot => &[ServerOp::SoftReboot],
            Self::StopStart => &[ServerOp::Stop, ServerOp::Start],
            Self::RescueUnrescue => &[ServerOp::Rescue, ServerOp::Unrescue],
            Self::PauseUnpause => &[ServerOp::Pause, ServerOp::Unpause],
            Self::SuspendResume => &[ServerOp::Suspend, ServerOp::Resume],
            Self::LockUnlock => &[ServerOp::Lock, ServerOp::Unlock],
            Self::ShelveUnshelve => &[ServerOp::Shelve, ServerOp::Unshelve],
        }
    }

    /// Binds this action to a server.
    pub fn bind(self, target: &ServerTarget) -> BoundStep {
        let cloud = Arc::clone(&target.cloud);
        let server = target.server.clone();

        BoundStep::new(self.name(), move || {
            for op in self.ops() {
                debug!("{} on server {}", op.operation_name(), server.id);
                cloud.server_action(&server, *op)?;
            }
            Ok(())
        })
    }
}

impl fmt::Display for ServerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Creates a registry holding every built-in action.
pub fn server_actions() -> ActionRegistry<ServerTarget> {
    let mut registry = ActionRegistry::new();
    for action in ServerAction::ALL {
        let registered =
            registry.register(action.name(), move |target: &ServerTarget| action.bind(target));
        if let Err(e) = registered {
            error!("Skipping built-in action: {}", e);
        }
    }
    registry
}
