//! Error types for Drake

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Drake operations
pub type Result<T> = std::result::Result<T, DrakeError>;

/// Main error type for Drake
#[derive(Error, Debug)]
pub enum DrakeError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Planning errors (unknown tasks, cycles)
    #[error("{0}")]
    Plan(#[from] PlanError),

    /// Environment option errors
    #[error("Option error: {0}")]
    EnvOption(#[from] OptionError),

    /// Task execution errors
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// Variable interpolation errors
    #[error("Interpolation error: {0}")]
    Interpolation(#[from] InterpolationError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// YAML parsing errors
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl DrakeError {
    /// Process exit code for this error.
    ///
    /// A failed command propagates its own exit code; everything else is 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            DrakeError::Execution(ExecutionError::ActionFailed {
                code: Some(code), ..
            }) if *code != 0 => *code,
            _ => 1,
        }
    }
}

/// Configuration parsing and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to find config file (searched: {0})")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Task '{0}' lists sources but has no file output")]
    SourcesWithoutFile(String),

    #[error("Task '{name}' is already defined as {existing} and cannot be redefined as {requested}")]
    KindConflict {
        name: String,
        existing: String,
        requested: String,
    },

    #[error("Failed to include file '{path}': {error}")]
    IncludeFile { path: PathBuf, error: String },
}

/// Errors raised while turning requested task names into an execution plan
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PlanError {
    #[error("{}", unknown_task_message(.name, .required_by.as_deref()))]
    UnknownTask {
        name: String,
        required_by: Option<String>,
    },

    #[error("Circular dependency detected: {}", cycle_message(.0))]
    DependencyCycle(Vec<String>),
}

fn unknown_task_message(name: &str, required_by: Option<&str>) -> String {
    match required_by {
        Some(parent) => format!("Task '{}' is not defined (required by '{}')", name, parent),
        None => format!("Task '{}' is not defined", name),
    }
}

fn cycle_message(members: &[String]) -> String {
    match members.first() {
        Some(first) => format!("{} -> {}", members.join(" -> "), first),
        None => String::new(),
    }
}

/// Environment option errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OptionError {
    #[error("Invalid value '{value}' for boolean option {name} (expected one of: 1, true, yes, on, 0, false, no, off)")]
    Invalid { name: String, value: String },

    #[error("Value of {name} is not valid UTF-8 ('{value}')")]
    NotUnicode { name: String, value: String },

    #[error("Option fallback chain loops back to {0}")]
    CircularFallback(String),
}

/// Task execution errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Task '{task}' failed at step {step} ({command}) with exit code {}", exit_code_message(.code))]
    ActionFailed {
        task: String,
        step: usize,
        command: String,
        code: Option<i32>,
    },

    #[error("Task '{task}' failed at step {step}: could not start '{command}': {source}")]
    SpawnFailed {
        task: String,
        step: usize,
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("Task '{task}' failed at step {step} ({procedure}): {message}")]
    ProcedureFailed {
        task: String,
        step: usize,
        procedure: String,
        message: String,
    },

    #[error("Failed to inspect '{path}': {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid value for '{name}': {error}")]
    InvalidValue { name: String, error: String },

    #[error("Task '{0}' already failed in this run")]
    AlreadyFailed(String),
}

fn exit_code_message(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "none (terminated by signal)".to_string(),
    }
}

/// Variable interpolation errors
#[derive(Error, Debug)]
pub enum InterpolationError {
    #[error("Recursive interpolation detected")]
    RecursiveInterpolation,

    #[error(transparent)]
    Option(#[from] OptionError),
}

/// Specialized result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Specialized result type for planning operations
pub type PlanResult<T> = std::result::Result<T, PlanError>;

/// Specialized result type for option resolution
pub type OptionResult<T> = std::result::Result<T, OptionError>;

/// Specialized result type for execution operations
pub type ExecutionResult<T> = std::result::Result<T, ExecutionError>;

/// Specialized result type for interpolation operations
pub type InterpolationResult<T> = std::result::Result<T, InterpolationError>;
