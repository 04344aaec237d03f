//! Task execution engine
//!
//! This module handles the execution of tasks, including the task registry,
//! dependency resolution, freshness checks, command running and
//! conditional logic.

pub mod command;
pub mod context;
pub mod engine;
pub mod freshness;
pub mod interpolate;
pub mod plan;
pub mod registry;
pub mod task;
pub mod version;
pub mod when;

// Re-export main types
pub use command::*;
pub use context::*;
pub use engine::{Engine, Outcome, TaskState};
pub use interpolate::*;
pub use plan::{plan, ExecutionPlan};
pub use registry::{Registry, CLEAN_TASK};
pub use task::*;
pub use when::*;
