//! Scenario Module
//!
//! Declarative workload definitions run by the generic driver.
//!
//! # Structure
//!
//! - [`config`]: Run arguments and scenario metadata
//! - [`phase`]: The phase vocabulary scenarios are written in
//! - [`catalog`]: The named scenarios
//! - [`ledger`]: Tracking of created resources for cleanup
//! - [`task`]: Task file loading

pub mod catalog;
pub mod config;
pub mod ledger;
pub mod phase;
pub mod task;

pub use catalog::{ScenarioDef, SCENARIOS};
pub use config::{Coercion, ScenarioArgs, WorkloadMeta};
pub use ledger::{CleanupLedger, Release, Resource, ResourceRef};
pub use phase::{Amount, BootSource, Phase, Repeat, Slot};
pub use task::{load_task, parse_task, RunnerConfig, Task, TaskWorkload};
