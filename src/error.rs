//! Error Types
//!
//! The taxonomy separates bad input from execution failures so callers can
//! report the former as a configuration problem and the latter as a failed
//! benchmark iteration.

use std::error::Error as StdError;

use thiserror::Error;

use crate::cloud::{CloudError, ResourceKind, Service};

/// Result type returned by a bound action step.
pub type StepResult = Result<(), Box<dyn StdError + Send + Sync>>;

/// Errors raised by the action registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// An action with this name is already registered
    #[error("action '{0}' is already registered")]
    DuplicateAction(String),

    /// No action with this name is registered
    #[error("unknown action '{0}'")]
    UnknownAction(String),
}

/// Invalid user input, detected before any resource is touched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("Invalid server actions configuration '{actions}' due to: {reason}")]
    InvalidActions { actions: String, reason: String },

    #[error("missing required argument '{0}'")]
    MissingArgument(&'static str),

    #[error("invalid argument '{name}': {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    #[error("unknown scenario '{0}'")]
    UnknownScenario(String),

    #[error("required service '{0}' is not available")]
    MissingService(Service),

    #[error("image '{0}' not found")]
    ImageNotFound(String),

    #[error("flavor '{0}' not found")]
    FlavorNotFound(String),

    #[error("image '{image}' requires {min_ram_mb} MB RAM but flavor '{flavor}' has {ram_mb} MB")]
    ImageTooLarge {
        image: String,
        flavor: String,
        min_ram_mb: u32,
        ram_mb: u32,
    },

    #[error("invalid task file: {0}")]
    InvalidTask(String),
}

/// A phase or action step failed while the workload was running.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// A bound action step failed
    #[error("action '{action}' failed at step {index}: {source}")]
    Step {
        action: String,
        index: usize,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// A cloud operation issued by a phase failed
    #[error("{operation} failed: {source}")]
    Operation {
        operation: &'static str,
        #[source]
        source: CloudError,
    },

    /// A phase referenced a slot that holds no resource
    #[error("slot '{0}' holds no resource")]
    EmptySlot(&'static str),
}

impl ExecutionError {
    /// Wraps a cloud error with the atomic operation name that produced it.
    pub fn operation(operation: &'static str) -> impl FnOnce(CloudError) -> Self {
        move |source| Self::Operation { operation, source }
    }
}

/// Failure deleting an already-created resource during cleanup.
#[derive(Debug, Clone, Error)]
#[error("failed to delete {kind} '{id}': {source}")]
pub struct CleanupError {
    pub kind: ResourceKind,
    pub id: String,
    #[source]
    pub source: CloudError,
}

/// Any error that ends a workload.
#[derive(Debug, Error)]
pub enum WorkloadError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Resolution failed after validation passed; indicates the validator and
    /// registry disagree
    #[error("internal consistency fault: {0}")]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

impl WorkloadError {
    /// Returns true for errors caused by user input.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}
