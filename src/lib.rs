//! novaload - Complex Server Lifecycle Workloads
//!
//! Benchmark workloads that boot, exercise, snapshot, resize and delete
//! compute servers, driven by a user-supplied pipeline of server actions.
//! The action pipeline is validated before any resource is created, and
//! every resource a workload creates is deleted when it ends.
//!
//! # Architecture
//!
//! The library is organized into five main modules:
//!
//! - [`actions`]: Action specifications, registry, validation and building
//! - [`cloud`]: The cloud collaborator interface and an in-memory cloud
//! - [`scenario`]: Declarative scenario definitions and task files
//! - [`execution`]: The workload driver and the iteration runner
//! - [`monitoring`]: Atomic operation timing and run reports
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use novaload::cloud::SimulatedCloud;
//! use novaload::execution::Runner;
//! use novaload::load_task;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let task = load_task("task.yaml")?;
//!     let cloud = Arc::new(SimulatedCloud::with_defaults());
//!
//!     for workload in task.workloads {
//!         let mut runner = Runner::new(workload.scenario, workload.args, cloud.clone());
//!         runner.configure(&workload.runner);
//!
//!         let report = runner.run()?;
//!         println!("{}", report.summary());
//!     }
//!     Ok(())
//! }
//! ```

pub mod actions;
pub mod cloud;
pub mod error;
pub mod execution;
pub mod monitoring;
pub mod scenario;

// Re-export commonly used types
pub use actions::{ActionBuilder, ActionRegistry, ActionSpec, SchemaValidator, SERVER_ACTIONS};
pub use error::{ConfigurationError, ExecutionError, WorkloadError};
pub use execution::{Runner, WorkloadDriver};
pub use scenario::task::load_task;
pub use scenario::ScenarioArgs;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "novaload";
