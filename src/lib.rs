//! Drake - a small make-style task engine
//!
//! Tasks are declared in a `drake.yml` file: symbolic tasks group work,
//! file tasks rebuild an output only when it is stale. Requested tasks are
//! planned into a dependency order and every task runs at most once.

// Public modules
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod runner;
pub mod ui;

// Re-export commonly used types
pub use error::{DrakeError, Result};
pub use runner::{plan, Context, Engine, ExecutionPlan, Registry, Task};

/// Current version of Drake
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
