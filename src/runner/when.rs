//! When condition evaluation
//!
//! This module handles evaluating conditional expressions for run items.

use crate::runner::version::{extract_version, is_at_least};
use crate::runner::{capture_command, check_command, Context, When, WhenCondition};
use crate::Result;

/// Evaluate a list of when conditions (all must be true - AND logic)
pub fn evaluate_when_list(when_list: &[When], ctx: &Context) -> Result<bool> {
    for when in when_list {
        if !evaluate_when(when, ctx)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn expand(ctx: &Context, value: &str) -> Result<String> {
    Ok(ctx.interpolate(value)?)
}

/// Evaluate a single when condition
pub fn evaluate_when(when: &When, ctx: &Context) -> Result<bool> {
    match &when.condition {
        WhenCondition::Always => Ok(true),

        WhenCondition::Equal { left, right } => Ok(expand(ctx, left)? == expand(ctx, right)?),

        WhenCondition::NotEqual { left, right } => Ok(expand(ctx, left)? != expand(ctx, right)?),

        WhenCondition::Command(cmd) => Ok(check_command(cmd, ctx)?),

        WhenCondition::Exists(path) => Ok(ctx.working_dir.join(expand(ctx, path)?).exists()),

        WhenCondition::EnvSet(name) => Ok(ctx.lookup(&expand(ctx, name)?)?.is_some()),

        WhenCondition::EnvNotSet(name) => Ok(ctx.lookup(&expand(ctx, name)?)?.is_none()),

        WhenCondition::Enabled(option) => Ok(ctx.options.resolve_bool(option)?),

        WhenCondition::Disabled(option) => Ok(!ctx.options.resolve_bool(option)?),

        WhenCondition::VersionAtLeast {
            command,
            major,
            minor,
        } => version_at_least(command, *major, *minor, ctx),

        WhenCondition::VersionBelow {
            command,
            major,
            minor,
        } => Ok(!version_at_least(command, *major, *minor, ctx)?),
    }
}

/// Whether the version `command` reports is at least `major.minor`.
///
/// A tool that is missing, fails, or prints no version counts as too old.
fn version_at_least(command: &str, major: u64, minor: u64, ctx: &Context) -> Result<bool> {
    let Some(output) = capture_command(command, ctx)? else {
        tracing::debug!(command, "no version reported");
        return Ok(false);
    };

    let satisfied = extract_version(&output)
        .map(|observed| is_at_least(observed, major, minor))
        .unwrap_or(false);
    tracing::debug!(command, major, minor, satisfied, "version gate evaluated");
    Ok(satisfied)
}
