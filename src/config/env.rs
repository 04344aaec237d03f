//! Environment-driven options
//!
//! Options are read from command-line `NAME=value` overrides, the process
//! environment and an optional dotenv file, in that order. Raw values are
//! frozen on first read so every caller in a run observes the same value.

use crate::error::{OptionError, OptionResult};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::env::{self, VarError};
use std::path::Path;

const TRUTHY: &[&str] = &["1", "true", "yes", "on"];
const FALSY: &[&str] = &["0", "false", "no", "off"];

/// Value type of an option
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    #[serde(alias = "boolean")]
    Bool,
    String,
}

/// A declared option with its default chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionSpec {
    pub name: String,
    pub kind: OptionKind,
    /// Option consulted when this one is unset
    pub fallback: Option<String>,
    /// Literal default when the whole chain is unset
    pub default: Option<String>,
}

impl OptionSpec {
    pub fn boolean(name: &str, default: bool) -> Self {
        OptionSpec {
            name: name.to_string(),
            kind: OptionKind::Bool,
            fallback: None,
            default: Some(default.to_string()),
        }
    }

    pub fn string(name: &str) -> Self {
        OptionSpec {
            name: name.to_string(),
            kind: OptionKind::String,
            fallback: None,
            default: None,
        }
    }

    pub fn with_fallback(mut self, fallback: &str) -> Self {
        self.fallback = Some(fallback.to_string());
        self
    }
}

/// One entry of an option's resolution order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Look up a variable by name
    Var(String),
    /// Literal default value
    Default(String),
}

/// Options every task file understands
pub fn builtin_options() -> Vec<OptionSpec> {
    vec![
        OptionSpec::boolean("SUDO", false),
        OptionSpec::boolean("DEVDEPS_DEFAULT", true),
        OptionSpec::boolean("BASE_DEPS", true).with_fallback("DEVDEPS_DEFAULT"),
        OptionSpec::boolean("DOCTOOLS", true).with_fallback("DEVDEPS_DEFAULT"),
        OptionSpec::boolean("USH_BUNDLES", true).with_fallback("DEVDEPS_DEFAULT"),
        OptionSpec::boolean("NODE_MODULES", true).with_fallback("DEVDEPS_DEFAULT"),
        OptionSpec::string("DEPS_TARGET"),
        OptionSpec::string("BUNDLE_ARGS"),
    ]
}

/// Parse a boolean token
pub fn parse_bool(name: &str, value: &str) -> OptionResult<bool> {
    let token = value.trim().to_ascii_lowercase();
    if TRUTHY.contains(&token.as_str()) {
        Ok(true)
    } else if FALSY.contains(&token.as_str()) {
        Ok(false)
    } else {
        Err(OptionError::Invalid {
            name: name.to_string(),
            value: value.to_string(),
        })
    }
}

/// Where unset names are looked up after the overrides
#[derive(Debug, Clone)]
pub enum Environment {
    /// The real process environment
    Process,
    /// A fixed set of variables
    Fixed(HashMap<String, String>),
}

impl Environment {
    fn get(&self, name: &str) -> OptionResult<Option<String>> {
        match self {
            Environment::Process => match env::var(name) {
                Ok(value) => Ok(Some(value)),
                Err(VarError::NotPresent) => Ok(None),
                Err(VarError::NotUnicode(raw)) => Err(OptionError::NotUnicode {
                    name: name.to_string(),
                    value: raw.to_string_lossy().into_owned(),
                }),
            },
            Environment::Fixed(vars) => Ok(vars.get(name).cloned()),
        }
    }
}

/// Resolves and caches option values
#[derive(Debug)]
pub struct OptionResolver {
    specs: HashMap<String, OptionSpec>,
    overrides: HashMap<String, String>,
    environment: Environment,
    dotenv: HashMap<String, String>,
    cache: RefCell<HashMap<String, OptionResult<Option<String>>>>,
}

impl OptionResolver {
    /// Resolver over the process environment with the built-in declarations
    pub fn new() -> Self {
        Self::with_environment(Environment::Process)
    }

    pub fn with_environment(environment: Environment) -> Self {
        let mut resolver = OptionResolver {
            specs: HashMap::new(),
            overrides: HashMap::new(),
            environment,
            dotenv: HashMap::new(),
            cache: RefCell::new(HashMap::new()),
        };
        for spec in builtin_options() {
            resolver.declare(spec);
        }
        resolver
    }

    /// Declare an option, replacing any earlier declaration of the same name
    pub fn declare(&mut self, spec: OptionSpec) {
        self.specs.insert(spec.name.clone(), spec);
    }

    /// Set a command-line override
    pub fn set_override(&mut self, name: &str, value: &str) {
        self.cache.borrow_mut().remove(name);
        self.overrides.insert(name.to_string(), value.to_string());
    }

    pub fn overrides(&self) -> &HashMap<String, String> {
        &self.overrides
    }

    /// Add dotenv values as the lowest-precedence layer
    pub fn with_dotenv(mut self, vars: HashMap<String, String>) -> Self {
        self.dotenv = vars;
        self
    }

    /// Load a dotenv file as the lowest-precedence layer
    pub fn load_dotenv(&mut self, path: &Path) -> Result<(), dotenvy::Error> {
        for item in dotenvy::from_path_iter(path)? {
            let (key, value) = item?;
            self.dotenv.insert(key, value);
        }
        Ok(())
    }

    /// Raw value of a variable, empty values count as unset
    fn raw(&self, name: &str) -> OptionResult<Option<String>> {
        if let Some(cached) = self.cache.borrow().get(name) {
            return cached.clone();
        }

        let value = match self.overrides.get(name) {
            Some(value) => Ok(Some(value.clone())),
            None => self
                .environment
                .get(name)
                .map(|value| value.or_else(|| self.dotenv.get(name).cloned())),
        }
        .map(|value| value.filter(|v| !v.is_empty()));

        tracing::trace!(option = name, value = ?value, "option read");
        self.cache
            .borrow_mut()
            .insert(name.to_string(), value.clone());
        value
    }

    /// Boolean option with an explicit default
    pub fn boolean_option(&self, name: &str, default: bool) -> OptionResult<bool> {
        match self.raw(name)? {
            Some(value) => parse_bool(name, &value),
            None => Ok(default),
        }
    }

    /// String option, `None` when unset
    pub fn string_option(&self, name: &str) -> OptionResult<Option<String>> {
        self.raw(name)
    }

    /// The ordered list of sources consulted for a declared option
    pub fn resolution_order(&self, name: &str) -> OptionResult<Vec<Source>> {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        let mut current = name.to_string();

        loop {
            if !seen.insert(current.clone()) {
                return Err(OptionError::CircularFallback(current));
            }
            order.push(Source::Var(current.clone()));

            let Some(spec) = self.specs.get(&current) else {
                break;
            };
            match &spec.fallback {
                Some(next) => current = next.clone(),
                None => {
                    if let Some(default) = &spec.default {
                        order.push(Source::Default(default.clone()));
                    }
                    break;
                }
            }
        }

        Ok(order)
    }

    fn resolve_raw(&self, name: &str) -> OptionResult<Option<(String, String)>> {
        for source in self.resolution_order(name)? {
            match source {
                Source::Var(var) => {
                    if let Some(value) = self.raw(&var)? {
                        return Ok(Some((var, value)));
                    }
                }
                Source::Default(value) => return Ok(Some((name.to_string(), value))),
            }
        }
        Ok(None)
    }

    /// Resolve a boolean option through its declared chain; unset is false
    pub fn resolve_bool(&self, name: &str) -> OptionResult<bool> {
        match self.resolve_raw(name)? {
            Some((var, value)) => parse_bool(&var, &value),
            None => Ok(false),
        }
    }

    /// Resolve a string option through its declared chain
    pub fn resolve_string(&self, name: &str) -> OptionResult<Option<String>> {
        Ok(self.resolve_raw(name)?.map(|(_, value)| value))
    }
}

impl Default for OptionResolver {
    fn default() -> Self {
        Self::new()
    }
}
