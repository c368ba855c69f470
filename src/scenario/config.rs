//! Scenario Configuration
//!
//! User-supplied run parameters ([`ScenarioArgs`]) and the static metadata
//! each scenario declares about itself ([`WorkloadMeta`]).
//!
//! # Example YAML Format
//!
//! ```yaml
//! image: cirros
//! flavor: m1.tiny
//! to_flavor: m1.small
//! volume_size: 1
//! count: 2
//! min_sleep: 0
//! max_sleep: 1.5
//! actions:
//!   - stop_start: 1
//!   - hard_reboot: 2
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cloud::{ResourceKind, Service};

/// Parameters for one scenario run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ScenarioArgs {
    /// Image name or id to boot servers from
    pub image: String,

    /// Flavor name or id for booted servers
    pub flavor: String,

    /// Flavor to resize to (resize scenarios only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_flavor: Option<String>,

    /// Size in GB of volumes created from `image`
    pub volume_size: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_type: Option<String>,

    /// Number of servers or cycles; the scenario default applies when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,

    /// Lower bound in seconds of the pause between phases
    #[serde(default)]
    pub min_sleep: f64,

    /// Upper bound in seconds of the pause between phases
    #[serde(default)]
    pub max_sleep: f64,

    /// Request detailed server listings
    #[serde(default = "default_true")]
    pub detailed: bool,

    #[serde(default)]
    pub force_delete: bool,

    /// Confirm resizes when true, revert them otherwise
    #[serde(default = "default_true")]
    pub confirm: bool,

    #[serde(default)]
    pub auto_assign_nic: bool,

    /// Raw action specification, validated before the run starts
    #[serde(default)]
    pub actions: Value,
}

fn default_true() -> bool {
    true
}

impl ScenarioArgs {
    pub fn new(image: impl Into<String>, flavor: impl Into<String>, volume_size: u32) -> Self {
        Self {
            image: image.into(),
            flavor: flavor.into(),
            to_flavor: None,
            volume_size,
            volume_type: None,
            count: None,
            min_sleep: 0.0,
            max_sleep: 0.0,
            detailed: true,
            force_delete: false,
            confirm: true,
            auto_assign_nic: false,
            actions: Value::Null,
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_to_flavor(mut self, flavor: impl Into<String>) -> Self {
        self.to_flavor = Some(flavor.into());
        self
    }

    pub fn with_actions(mut self, actions: Value) -> Self {
        self.actions = actions;
        self
    }

    pub fn with_sleep(mut self, min_sleep: f64, max_sleep: f64) -> Self {
        self.min_sleep = min_sleep;
        self.max_sleep = max_sleep;
        self
    }

    pub fn with_confirm(mut self, confirm: bool) -> Self {
        self.confirm = confirm;
        self
    }
}

/// Argument resolved from a user-facing name to a cloud id before the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    /// `image` is resolved to an image id
    Image,
    /// `flavor` is resolved to a flavor id
    Flavor,
    /// `to_flavor` is resolved to a flavor id
    ToFlavor,
}

/// Static description of a scenario.
#[derive(Debug, Clone, Copy)]
pub struct WorkloadMeta {
    pub name: &'static str,
    pub description: &'static str,
    pub required_services: &'static [Service],
    pub coercions: &'static [Coercion],
    /// Check that `image` fits into `flavor` (RAM only)
    pub check_image_on_flavor: bool,
    /// Resource classes swept for leftovers after the run
    pub cleanup: &'static [ResourceKind],
}
