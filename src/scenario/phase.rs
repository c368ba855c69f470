//! Workload Phases
//!
//! A scenario is an ordered list of phases. Phases that create resources
//! store them in a named slot; later phases refer to the slot by name.
//! Slots are cleared at the start of every cycle.

use std::fmt;

/// Name of a per-cycle resource slot.
pub type Slot = &'static str;

/// What a booted server starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootSource {
    /// The scenario's `image` argument
    Image,
    /// The volume stored in a slot
    Volume(Slot),
    /// The snapshot image stored in a slot
    Snapshot(Slot),
}

/// How many servers a boot phase creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Amount {
    One,
    /// The scenario's `count`
    Count,
}

/// How often the cycle phases run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    Once,
    /// `count` times
    Count,
}

/// One step of a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    ListServers,
    Boot {
        into: Slot,
        source: BootSource,
        amount: Amount,
    },
    /// Create a volume from `image`
    CreateVolume { into: Slot },
    /// Run the user's action pipeline against every server in the slot
    RunActions { on: Slot },
    /// Resize to `to_flavor`, then confirm or revert
    Resize { on: Slot },
    /// Snapshot every server in `of` into an image
    Snapshot { of: Slot, into: Slot },
    /// Delete everything in the slot now rather than at cleanup
    Delete { slot: Slot },
    /// Random pause between `min_sleep` and `max_sleep`
    Sleep,
}

impl Phase {
    /// True if the phase needs `to_flavor`.
    pub fn needs_to_flavor(&self) -> bool {
        matches!(self, Self::Resize { .. })
    }

    /// True if the phase creates a volume.
    pub fn creates_volume(&self) -> bool {
        matches!(self, Self::CreateVolume { .. })
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ListServers => write!(f, "list servers"),
            Self::Boot {
                into,
                source,
                amount,
            } => {
                let amount = match amount {
                    Amount::One => "one server",
                    Amount::Count => "count servers",
                };
                match source {
                    BootSource::Image => write!(f, "boot {} from image into '{}'", amount, into),
                    BootSource::Volume(slot) => {
                        write!(f, "boot {} from volume '{}' into '{}'", amount, slot, into)
                    }
                    BootSource::Snapshot(slot) => {
                        write!(f, "boot {} from snapshot '{}' into '{}'", amount, slot, into)
                    }
                }
            }
            Self::CreateVolume { into } => write!(f, "create volume into '{}'", into),
            Self::RunActions { on } => write!(f, "run actions on '{}'", on),
            Self::Resize { on } => write!(f, "resize '{}'", on),
            Self::Snapshot { of, into } => write!(f, "snapshot '{}' into '{}'", of, into),
            Self::Delete { slot } => write!(f, "delete '{}'", slot),
            Self::Sleep => write!(f, "sleep"),
        }
    }
}
