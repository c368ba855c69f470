//! Action Pipeline Module
//!
//! Declarative action specifications, validated and resolved into ordered
//! steps bound to a target resource.
//!
//! # Structure
//!
//! - [`model`]: The specification data structures
//! - [`registry`]: Name to factory mapping
//! - [`schema`]: Structural validation of raw specifications
//! - [`builder`]: Resolution into a lazy step sequence
//! - [`server`]: Built-in server actions

pub mod builder;
pub mod model;
pub mod registry;
pub mod schema;
pub mod server;

pub use builder::{run_steps, ActionBuilder, ResolvedSteps};
pub use model::{ActionEntry, ActionSpec};
pub use registry::{ActionFactory, ActionRegistry, BoundStep};
pub use schema::{SchemaValidator, SchemaViolation};
pub use server::{server_actions, ServerAction, ServerTarget, SERVER_ACTIONS};
