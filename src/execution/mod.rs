//! Workload Execution Module
//!
//! Runs scenarios against a cloud: one iteration at a time through the
//! driver, or many through the runner.
//!
//! # Architecture
//!
//! - [`driver`]: Prepare, run and clean up one iteration
//! - [`runner`]: Repeated and concurrent iterations
//! - [`pacing`]: Think time between phases and resource naming

pub mod driver;
pub mod pacing;
pub mod runner;

pub use driver::{run_workload, IterationOutcome, WorkloadDriver};
pub use pacing::{sleep_between, NameGenerator};
pub use runner::Runner;
