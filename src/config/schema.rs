//! Configuration validation
//!
//! Structural checks only. Unknown prerequisite names and cycles are
//! reported when a plan is built, so a broken task that is never requested
//! does not block unrelated ones.

use crate::config::env::{parse_bool, OptionKind};
use crate::config::types::{Config, OptionDecl, Run, Task};
use crate::error::{ConfigError, ConfigResult};

/// Validate a complete configuration
pub fn validate_config(config: &Config) -> ConfigResult<()> {
    for (name, task) in &config.tasks {
        validate_task(name, task)?;
    }

    for (name, option) in &config.options {
        validate_option(name, option)?;
    }

    if let Some(interpreter) = &config.interpreter {
        if interpreter.is_empty() {
            return Err(ConfigError::Invalid(
                "interpreter must name a program".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validate a single task
pub fn validate_task(name: &str, task: &Task) -> ConfigResult<()> {
    if name.trim().is_empty() {
        return Err(ConfigError::Invalid("task names cannot be empty".to_string()));
    }

    if !task.sources.is_empty() && task.file.is_none() {
        return Err(ConfigError::SourcesWithoutFile(name.to_string()));
    }

    if let Some(file) = &task.file {
        if file.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "task '{}' has an empty file output",
                name
            )));
        }
    }

    for run in &task.run {
        if let Run::Complex(item) = run {
            for when in &item.when {
                for check in [&when.version_at_least, &when.version_below]
                    .into_iter()
                    .flatten()
                {
                    if crate::runner::version::parse_minimum(&check.minimum).is_none() {
                        return Err(ConfigError::Invalid(format!(
                            "task '{}': minimum version '{}' must look like MAJOR.MINOR",
                            name, check.minimum
                        )));
                    }
                }
            }
        }
    }

    Ok(())
}

/// Validate an option declaration
fn validate_option(name: &str, option: &OptionDecl) -> ConfigResult<()> {
    if option.kind == OptionKind::Bool {
        if let Some(default) = &option.default {
            parse_bool(name, default).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }
    }
    if option.fallback.as_deref() == Some(name) {
        return Err(ConfigError::Invalid(format!(
            "option {} cannot fall back to itself",
            name
        )));
    }
    Ok(())
}
