//! Core configuration types
//!
//! This module defines the data structures that represent a drake.yml task file.

use crate::config::env::OptionKind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Top-level configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Application name (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Application usage description (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<String>,

    /// Task to run when none is named on the command line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    /// Global interpreter to use for commands (e.g., ["sh", "-c"])
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpreter: Option<Vec<String>>,

    /// Dotenv file consulted for options after the process environment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dotenv: Option<String>,

    /// Further task files merged into this one, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,

    /// Paths or glob patterns removed by the `clean` task
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clean: Vec<String>,

    /// Environment option declarations
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, OptionDecl>,

    /// Tasks defined in the configuration
    #[serde(default)]
    pub tasks: BTreeMap<String, Task>,

    /// Prerequisites appended to tasks defined here or in other files
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub enhance: BTreeMap<String, Vec<String>>,
}

/// A task definition
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Task {
    /// Description shown by `--tasks`
    #[serde(
        default,
        alias = "description",
        alias = "usage",
        skip_serializing_if = "Option::is_none"
    )]
    pub desc: Option<String>,

    /// Prerequisite task names, in the order they run
    #[serde(default, alias = "depends", skip_serializing_if = "Vec::is_empty")]
    pub deps: Vec<String>,

    /// Output file; makes this a file task
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Source files compared against the output
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,

    /// Run items to execute
    #[serde(default, deserialize_with = "deserialize_run_items")]
    pub run: Vec<Run>,
}

/// A run item - can be a command, subtask, or environment setter
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Run {
    /// Simple string command
    SimpleCommand(String),

    /// Complex run item with conditionals and multiple actions
    Complex(RunItem),
}

/// A complex run item with conditions and actions
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RunItem {
    /// Conditions that must be met for this run item to execute
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub when: Vec<When>,

    /// Commands to execute
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "deserialize_commands"
    )]
    pub command: Vec<Command>,

    /// Tasks to invoke
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "deserialize_subtasks"
    )]
    pub task: Vec<String>,

    /// Environment variables to set
    #[serde(
        rename = "set-environment",
        default,
        skip_serializing_if = "HashMap::is_empty"
    )]
    pub set_environment: HashMap<String, OptionString>,
}

/// A command to execute
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Command {
    /// Simple string command
    Simple(String),

    /// Complex command with additional options
    Complex(CommandDetail),
}

/// Detailed command specification
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CommandDetail {
    /// The command to execute
    pub exec: String,

    /// What to print when running (defaults to exec)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub print: Option<String>,

    /// Whether to suppress the command echo
    #[serde(default)]
    pub quiet: bool,

    /// Working directory for the command
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

/// A conditional expression
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct When {
    /// Check if values are equal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equal: Option<WhenComparison>,

    /// Check if values are not equal
    #[serde(rename = "not-equal", skip_serializing_if = "Option::is_none")]
    pub not_equal: Option<WhenComparison>,

    /// Check if a command succeeds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Check if a path exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exists: Option<String>,

    /// Check if an option variable is set
    #[serde(rename = "env-set", skip_serializing_if = "Option::is_none")]
    pub env_set: Option<String>,

    /// Check if an option variable is not set
    #[serde(rename = "env-not-set", skip_serializing_if = "Option::is_none")]
    pub env_not_set: Option<String>,

    /// Check if a boolean option resolves to true
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<String>,

    /// Check if a boolean option resolves to false
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled: Option<String>,

    /// Check if a tool reports at least a given version
    #[serde(rename = "version-at-least", skip_serializing_if = "Option::is_none")]
    pub version_at_least: Option<VersionCheck>,

    /// Check if a tool reports a version below a given one
    #[serde(rename = "version-below", skip_serializing_if = "Option::is_none")]
    pub version_below: Option<VersionCheck>,
}

/// A comparison for when conditions
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WhenComparison {
    /// Left-hand side of comparison
    pub left: String,

    /// Right-hand side of comparison
    pub right: String,
}

/// A tool version query
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VersionCheck {
    /// Command printing the tool's version, e.g. `bundle --version`
    pub command: String,

    /// Minimum version as "MAJOR.MINOR"
    pub minimum: String,
}

/// An environment option declaration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OptionDecl {
    /// Value type
    #[serde(rename = "type", default = "default_option_kind")]
    pub kind: OptionKind,

    /// Option consulted when this one is unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,

    /// Literal default
    #[serde(
        default,
        deserialize_with = "deserialize_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    pub default: Option<String>,
}

fn default_option_kind() -> OptionKind {
    OptionKind::String
}

/// An optional string value (used for environment variables)
pub type OptionString = Option<String>;

/// Accepts `true`, `1` or `"text"` for string-typed fields
fn deserialize_scalar<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    use serde_yaml::Value;

    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::String(s) => Ok(Some(s)),
        _ => Err(D::Error::custom("default must be a scalar")),
    }
}

/// Custom deserializer for run items that handles both single values and arrays
fn deserialize_run_items<'de, D>(deserializer: D) -> Result<Vec<Run>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    use serde_yaml::Value;

    let value = Value::deserialize(deserializer)?;

    match value {
        // Single string command
        Value::String(s) => Ok(vec![Run::SimpleCommand(s)]),
        // Array of run items
        Value::Sequence(seq) => {
            let mut runs = Vec::new();
            for item in seq {
                let run = Run::deserialize(item).map_err(D::Error::custom)?;
                runs.push(run);
            }
            Ok(runs)
        }
        // Null or not present
        Value::Null => Ok(Vec::new()),
        _ => Err(D::Error::custom("run must be a string or array")),
    }
}

/// Custom deserializer for commands that handles both single values and arrays
fn deserialize_commands<'de, D>(deserializer: D) -> Result<Vec<Command>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    use serde_yaml::Value;

    let value = Value::deserialize(deserializer)?;

    match value {
        // Single string or complex command
        Value::String(s) => Ok(vec![Command::Simple(s)]),
        Value::Mapping(_) => {
            let cmd = Command::deserialize(value).map_err(D::Error::custom)?;
            Ok(vec![cmd])
        }
        // Array of commands
        Value::Sequence(seq) => {
            let mut cmds = Vec::new();
            for item in seq {
                let cmd = Command::deserialize(item).map_err(D::Error::custom)?;
                cmds.push(cmd);
            }
            Ok(cmds)
        }
        Value::Null => Ok(Vec::new()),
        _ => Err(D::Error::custom("command must be a string, object, or array")),
    }
}

/// Custom deserializer for invoked tasks: a name or a list of names
fn deserialize_subtasks<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    use serde_yaml::Value;

    let value = Value::deserialize(deserializer)?;

    match value {
        Value::String(s) => Ok(vec![s]),
        Value::Sequence(seq) => seq
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(s),
                _ => Err(D::Error::custom("task names must be strings")),
            })
            .collect(),
        Value::Null => Ok(Vec::new()),
        _ => Err(D::Error::custom("task must be a string or array")),
    }
}
