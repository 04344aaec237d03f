//! Runtime task types
//!
//! This module contains the runtime representation of tasks: their kind,
//! their action steps and the guards on those steps.

use crate::config;
use crate::error::{ConfigError, ConfigResult};
use crate::runner::version::parse_minimum;
use crate::runner::Context;
use anyhow::Context as _;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

/// Runtime task representation
#[derive(Debug, Clone)]
pub struct Task {
    /// Task name
    pub name: String,

    /// Description shown in task listings
    pub description: Option<String>,

    /// Prerequisite task names, in declared order
    pub prerequisites: Vec<String>,

    /// Whether the task produces a file
    pub kind: TaskKind,

    /// Run items making up the action
    pub actions: Vec<Run>,
}

/// Symbolic or file-backed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskKind {
    /// Always eligible to run
    Symbolic,

    /// Runs only when `output` is stale
    File {
        output: PathBuf,
        sources: Vec<PathBuf>,
    },
}

impl TaskKind {
    pub fn output(&self) -> Option<&PathBuf> {
        match self {
            TaskKind::Symbolic => None,
            TaskKind::File { output, .. } => Some(output),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            TaskKind::Symbolic => "a symbolic task".to_string(),
            TaskKind::File { output, .. } => format!("a file task for {}", output.display()),
        }
    }
}

impl Task {
    /// A symbolic task with no prerequisites and no action
    pub fn symbolic(name: impl Into<String>) -> Self {
        Task {
            name: name.into(),
            description: None,
            prerequisites: Vec::new(),
            kind: TaskKind::Symbolic,
            actions: Vec::new(),
        }
    }

    /// A file task producing `output`
    pub fn file(name: impl Into<String>, output: impl Into<PathBuf>) -> Self {
        Task {
            kind: TaskKind::File {
                output: output.into(),
                sources: Vec::new(),
            },
            ..Task::symbolic(name)
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_prerequisites<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prerequisites.extend(names.into_iter().map(Into::into));
        self
    }

    /// Add source paths; only meaningful for file tasks
    pub fn with_sources<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        if let TaskKind::File { sources, .. } = &mut self.kind {
            sources.extend(paths.into_iter().map(Into::into));
        }
        self
    }

    /// Append an unconditional step
    pub fn with_step(mut self, step: Step) -> Self {
        self.actions.push(Run::unconditional(vec![step]));
        self
    }

    pub fn with_run(mut self, run: Run) -> Self {
        self.actions.push(run);
        self
    }

    /// Create a new task from configuration
    pub fn from_config(name: String, config: config::Task) -> ConfigResult<Self> {
        let kind = match config.file {
            Some(output) => TaskKind::File {
                output: PathBuf::from(output),
                sources: config.sources.into_iter().map(PathBuf::from).collect(),
            },
            None => TaskKind::Symbolic,
        };

        let actions = config
            .run
            .into_iter()
            .map(Run::from_config)
            .collect::<ConfigResult<Vec<_>>>()
            .map_err(|e| match e {
                ConfigError::Invalid(message) => {
                    ConfigError::Invalid(format!("task '{}': {}", name, message))
                }
                other => other,
            })?;

        Ok(Task {
            name,
            description: config.desc,
            prerequisites: config.deps,
            kind,
            actions,
        })
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, TaskKind::File { .. })
    }

    /// Tasks named by `Invoke` steps of this task's action
    pub fn invoked_tasks(&self) -> impl Iterator<Item = &str> {
        self.actions
            .iter()
            .flat_map(|run| run.steps.iter())
            .filter_map(|step| match step {
                Step::Invoke(name) => Some(name.as_str()),
                _ => None,
            })
    }

    /// Options read by `enabled`/`disabled` guards of this task's run items
    pub fn option_guards(&self) -> impl Iterator<Item = &str> {
        self.actions
            .iter()
            .flat_map(|run| run.when.iter())
            .filter_map(|when| match &when.condition {
                WhenCondition::Enabled(option) | WhenCondition::Disabled(option) => {
                    Some(option.as_str())
                }
                _ => None,
            })
    }

    /// Number of steps across all run items
    pub fn step_count(&self) -> usize {
        self.actions.iter().map(|run| run.steps.len()).sum()
    }
}

/// Runtime representation of a run item
#[derive(Debug, Clone, Default)]
pub struct Run {
    /// Conditions that must all hold
    pub when: Vec<When>,

    /// Steps executed in order
    pub steps: Vec<Step>,
}

impl Run {
    pub fn unconditional(steps: Vec<Step>) -> Self {
        Run {
            when: Vec::new(),
            steps,
        }
    }

    pub fn guarded(when: Vec<When>, steps: Vec<Step>) -> Self {
        Run { when, steps }
    }

    /// Create from config
    pub fn from_config(config: config::Run) -> ConfigResult<Self> {
        match config {
            config::Run::SimpleCommand(cmd) => {
                let step = Step::Command(Command::Simple(cmd));
                Ok(Run::unconditional(vec![step]))
            }
            config::Run::Complex(item) => {
                let mut steps: Vec<Step> = item
                    .command
                    .into_iter()
                    .map(|c| Step::Command(Command::from_config(c)))
                    .collect();
                steps.extend(item.task.into_iter().map(Step::Invoke));
                if !item.set_environment.is_empty() {
                    let mut vars: Vec<(String, Option<String>)> =
                        item.set_environment.into_iter().collect();
                    vars.sort_by(|a, b| a.0.cmp(&b.0));
                    steps.push(Step::SetEnv(vars));
                }

                Ok(Run {
                    when: item
                        .when
                        .into_iter()
                        .map(When::from_config)
                        .collect::<ConfigResult<_>>()?,
                    steps,
                })
            }
        }
    }
}

/// One unit of a task's action
#[derive(Clone)]
pub enum Step {
    /// Run an external command
    Command(Command),

    /// Invoke another task (and its prerequisites) in the same run
    Invoke(String),

    /// Set (`Some`) or unset (`None`) run variables
    SetEnv(Vec<(String, Option<String>)>),

    /// Call an in-process procedure
    Procedure(Arc<dyn Procedure>),
}

impl Step {
    pub fn command(cmd: impl Into<String>) -> Self {
        Step::Command(Command::Simple(cmd.into()))
    }

    pub fn procedure<F>(label: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Context) -> anyhow::Result<()> + 'static,
    {
        Step::Procedure(Arc::new(FnProcedure::new(label, f)))
    }

    /// Short human-readable form used in messages
    pub fn describe(&self) -> String {
        match self {
            Step::Command(cmd) => cmd.print().to_string(),
            Step::Invoke(name) => format!("invoke {}", name),
            Step::SetEnv(vars) => {
                let names: Vec<&str> = vars.iter().map(|(k, _)| k.as_str()).collect();
                format!("set {}", names.join(", "))
            }
            Step::Procedure(p) => p.describe(),
        }
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Command(cmd) => f.debug_tuple("Command").field(cmd).finish(),
            Step::Invoke(name) => f.debug_tuple("Invoke").field(name).finish(),
            Step::SetEnv(vars) => f.debug_tuple("SetEnv").field(vars).finish(),
            Step::Procedure(p) => f.debug_tuple("Procedure").field(&p.describe()).finish(),
        }
    }
}

/// An in-process action step. Only success or failure is observed.
pub trait Procedure {
    fn describe(&self) -> String;
    fn call(&self, ctx: &mut Context) -> anyhow::Result<()>;
}

/// Procedure backed by a closure
pub struct FnProcedure<F> {
    label: String,
    f: F,
}

impl<F> FnProcedure<F>
where
    F: Fn(&mut Context) -> anyhow::Result<()>,
{
    pub fn new(label: impl Into<String>, f: F) -> Self {
        FnProcedure {
            label: label.into(),
            f,
        }
    }
}

impl<F> Procedure for FnProcedure<F>
where
    F: Fn(&mut Context) -> anyhow::Result<()>,
{
    fn describe(&self) -> String {
        self.label.clone()
    }

    fn call(&self, ctx: &mut Context) -> anyhow::Result<()> {
        (self.f)(ctx)
    }
}

/// Removes paths and glob matches below the working directory
#[derive(Debug, Clone)]
pub struct CleanProcedure {
    pub patterns: Vec<String>,
}

impl Procedure for CleanProcedure {
    fn describe(&self) -> String {
        format!("rm -rf {}", self.patterns.join(" "))
    }

    fn call(&self, ctx: &mut Context) -> anyhow::Result<()> {
        for pattern in &self.patterns {
            let full = ctx.working_dir.join(pattern);
            let full = full
                .to_str()
                .with_context(|| format!("path is not valid UTF-8: {}", full.display()))?;

            for entry in glob::glob(full).with_context(|| format!("bad pattern '{}'", pattern))? {
                let path = entry?;
                ctx.print_run(&format!("rm -rf {}", path.display()));
                let removed = if path.is_dir() {
                    fs::remove_dir_all(&path)
                } else {
                    fs::remove_file(&path)
                };
                removed.with_context(|| format!("failed to remove {}", path.display()))?;
            }
        }
        Ok(())
    }
}

/// Runtime representation of a command
#[derive(Debug, Clone)]
pub enum Command {
    /// Simple command string
    Simple(String),

    /// Complex command with options
    Complex {
        exec: String,
        print: String,
        quiet: bool,
        dir: Option<String>,
    },
}

impl Command {
    /// Create from config
    pub fn from_config(config: config::Command) -> Self {
        match config {
            config::Command::Simple(cmd) => Command::Simple(cmd),
            config::Command::Complex(detail) => Command::Complex {
                print: detail.print.clone().unwrap_or_else(|| detail.exec.clone()),
                exec: detail.exec,
                quiet: detail.quiet,
                dir: detail.dir,
            },
        }
    }

    /// Get the command to execute
    pub fn exec(&self) -> &str {
        match self {
            Command::Simple(cmd) => cmd,
            Command::Complex { exec, .. } => exec,
        }
    }

    /// Get what to print
    pub fn print(&self) -> &str {
        match self {
            Command::Simple(cmd) => cmd,
            Command::Complex { print, .. } => print,
        }
    }

    /// Check if this command is quiet
    pub fn is_quiet(&self) -> bool {
        match self {
            Command::Simple(_) => false,
            Command::Complex { quiet, .. } => *quiet,
        }
    }

    /// Get the working directory
    pub fn dir(&self) -> Option<&str> {
        match self {
            Command::Simple(_) => None,
            Command::Complex { dir, .. } => dir.as_deref(),
        }
    }
}

/// Runtime representation of a when condition
#[derive(Debug, Clone)]
pub struct When {
    pub condition: WhenCondition,
}

impl When {
    pub fn new(condition: WhenCondition) -> Self {
        When { condition }
    }

    pub fn from_config(config: config::When) -> ConfigResult<Self> {
        let condition = if let Some(eq) = config.equal {
            WhenCondition::Equal {
                left: eq.left,
                right: eq.right,
            }
        } else if let Some(ne) = config.not_equal {
            WhenCondition::NotEqual {
                left: ne.left,
                right: ne.right,
            }
        } else if let Some(cmd) = config.command {
            WhenCondition::Command(cmd)
        } else if let Some(path) = config.exists {
            WhenCondition::Exists(path)
        } else if let Some(var) = config.env_set {
            WhenCondition::EnvSet(var)
        } else if let Some(var) = config.env_not_set {
            WhenCondition::EnvNotSet(var)
        } else if let Some(opt) = config.enabled {
            WhenCondition::Enabled(opt)
        } else if let Some(opt) = config.disabled {
            WhenCondition::Disabled(opt)
        } else if let Some(check) = config.version_at_least {
            version_condition(check, true)?
        } else if let Some(check) = config.version_below {
            version_condition(check, false)?
        } else {
            WhenCondition::Always
        };

        Ok(When { condition })
    }
}

fn version_condition(check: config::VersionCheck, at_least: bool) -> ConfigResult<WhenCondition> {
    let (major, minor) = parse_minimum(&check.minimum).ok_or_else(|| {
        ConfigError::Invalid(format!(
            "minimum version '{}' must look like MAJOR.MINOR",
            check.minimum
        ))
    })?;

    Ok(if at_least {
        WhenCondition::VersionAtLeast {
            command: check.command,
            major,
            minor,
        }
    } else {
        WhenCondition::VersionBelow {
            command: check.command,
            major,
            minor,
        }
    })
}

/// Types of when conditions
#[derive(Debug, Clone)]
pub enum WhenCondition {
    Equal { left: String, right: String },
    NotEqual { left: String, right: String },
    Command(String),
    Exists(String),
    EnvSet(String),
    EnvNotSet(String),
    Enabled(String),
    Disabled(String),
    VersionAtLeast { command: String, major: u64, minor: u64 },
    VersionBelow { command: String, major: u64, minor: u64 },
    Always,
}
