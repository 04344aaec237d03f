//! Configuration parsing and validation
//!
//! This module handles parsing of drake.yml task files, validation of their
//! structure, and the environment options tasks consult while running.

pub mod env;
pub mod parse;
pub mod schema;
pub mod types;

// Re-export main types
pub use env::{Environment, OptionKind, OptionResolver, OptionSpec};
pub use parse::*;
pub use schema::*;
pub use types::*;
