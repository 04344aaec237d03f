//! Execution context for task running
//!
//! The context tracks the state shared by every step of a run: where
//! commands execute, the run variables, and the frozen option values.

use crate::config::OptionResolver;
use crate::error::{InterpolationResult, OptionResult};
use crate::runner::interpolate;
use crate::ui;
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

/// Execution context that tracks state during a run
#[derive(Debug)]
pub struct Context {
    /// Directory commands and relative paths are resolved against
    pub working_dir: PathBuf,

    /// Run variables (command-line overrides, set-environment), exported to commands
    pub vars: HashMap<String, String>,

    /// Environment options
    pub options: OptionResolver,

    /// Custom interpreter (e.g., ["bash", "-c"])
    pub interpreter: Vec<String>,

    /// Verbosity level
    pub verbosity: Verbosity,

    /// Print what would run without running it
    pub dry_run: bool,
}

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Silent = 0,
    Quiet = 1,
    Normal = 2,
    Verbose = 3,
}

impl Context {
    /// Create a new context with default settings
    pub fn new() -> Self {
        Context {
            working_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            vars: HashMap::new(),
            options: OptionResolver::new(),
            interpreter: vec!["sh".to_string(), "-c".to_string()],
            verbosity: Verbosity::Normal,
            dry_run: false,
        }
    }

    /// Create a context with a specific working directory
    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = dir;
        self
    }

    /// Set variables
    pub fn with_vars(mut self, vars: HashMap<String, String>) -> Self {
        self.vars = vars;
        self
    }

    /// Replace the option resolver
    pub fn with_options(mut self, options: OptionResolver) -> Self {
        self.options = options;
        self
    }

    /// Set the interpreter
    pub fn with_interpreter(mut self, interpreter: Vec<String>) -> Self {
        self.interpreter = interpreter;
        self
    }

    /// Set verbosity level
    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Apply a command-line `NAME=value` override.
    ///
    /// The value becomes both an option value and a run variable.
    pub fn set_override(&mut self, name: &str, value: &str) {
        self.options.set_override(name, value);
        self.vars.insert(name.to_string(), value.to_string());
    }

    /// Set a single variable
    pub fn set_var(&mut self, key: String, value: String) {
        self.vars.insert(key, value);
    }

    /// Get a variable value
    pub fn get_var(&self, key: &str) -> Option<&String> {
        self.vars.get(key)
    }

    /// Look a name up in run variables, then options
    pub fn lookup(&self, name: &str) -> OptionResult<Option<String>> {
        match self.vars.get(name) {
            Some(value) => Ok(Some(value.clone())),
            None => self.options.string_option(name),
        }
    }

    /// Like `lookup`, but declared options follow their fallback chain
    pub fn resolve(&self, name: &str) -> OptionResult<Option<String>> {
        match self.vars.get(name) {
            Some(value) => Ok(Some(value.clone())),
            None => self.options.resolve_string(name),
        }
    }

    /// Interpolate `${NAME}` references; unknown names are left as written
    pub fn interpolate(&self, s: &str) -> InterpolationResult<String> {
        interpolate(s, |name| Ok(self.resolve(name)?))
    }

    /// Print debug message (only in verbose mode)
    pub fn print_debug(&self, message: &str) {
        if self.verbosity >= Verbosity::Verbose {
            ui::debug(message);
        }
    }

    /// Echo a command about to run
    pub fn print_run(&self, command: &str) {
        if self.verbosity >= Verbosity::Normal {
            ui::run(command, self.dry_run);
        }
    }

    /// Print task start message
    pub fn print_task_start(&self, task_name: &str) {
        self.print_debug(&format!("Running task: {}", task_name));
    }

    /// Print task complete message
    pub fn print_task_complete(&self, task_name: &str) {
        self.print_debug(&format!("Task completed: {}", task_name));
    }

    /// Print task skip message
    pub fn print_task_skip(&self, task_name: &str, reason: &str) {
        self.print_debug(&format!("Skipping task '{}': {}", task_name, reason));
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
