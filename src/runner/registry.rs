//! Task registry
//!
//! Holds every task definition of one invocation. Defining a name twice
//! merges the definitions, so several task files can contribute
//! prerequisites and actions to the same task.

use crate::config::{validate_config, LoadedConfig};
use crate::error::{ConfigError, ConfigResult, PlanError, PlanResult};
use crate::runner::task::{CleanProcedure, Step, Task, TaskKind};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Name of the task generated from `clean:` patterns
pub const CLEAN_TASK: &str = "clean";

/// A set of named tasks
#[derive(Debug, Clone, Default)]
pub struct Registry {
    tasks: BTreeMap<String, Task>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from loaded task files.
    ///
    /// Tasks of every file are defined first, in file order; `enhance`
    /// sections are applied afterwards so they may refer to tasks of any
    /// file. A `clean` task is added when any file lists clean patterns.
    /// Every file is validated before its tasks are defined.
    pub fn from_configs(configs: &[LoadedConfig]) -> crate::Result<Self> {
        let mut registry = Registry::new();

        for loaded in configs {
            validate_config(&loaded.config).map_err(|e| {
                ConfigError::Invalid(format!("{}: {}", loaded.path.display(), e))
            })?;
            for (name, task) in &loaded.config.tasks {
                registry.define(Task::from_config(name.clone(), task.clone())?)?;
            }
        }

        let patterns: Vec<String> = configs
            .iter()
            .flat_map(|l| l.config.clean.iter().cloned())
            .collect();
        if !patterns.is_empty() {
            registry.define(
                Task::symbolic(CLEAN_TASK)
                    .with_description("Remove generated files")
                    .with_step(Step::Procedure(Arc::new(CleanProcedure { patterns }))),
            )?;
        }

        for loaded in configs {
            for (name, prerequisites) in &loaded.config.enhance {
                for prerequisite in prerequisites {
                    registry.append_prerequisite(name, prerequisite)?;
                }
            }
        }

        Ok(registry)
    }

    /// Define a task, merging with an existing definition of the same name.
    ///
    /// Merging appends new prerequisites and actions and replaces the
    /// description when the new definition has one. A symbolic
    /// re-declaration keeps an existing file kind; any other kind change is
    /// a [`ConfigError::KindConflict`].
    pub fn define(&mut self, task: Task) -> ConfigResult<()> {
        let Some(existing) = self.tasks.get_mut(&task.name) else {
            tracing::trace!(task = %task.name, "task defined");
            self.tasks.insert(task.name.clone(), task);
            return Ok(());
        };

        match (&existing.kind, &task.kind) {
            (_, TaskKind::Symbolic) => {}
            (TaskKind::File { output: a, .. }, TaskKind::File { output: b, .. }) if a == b => {}
            (existing_kind, requested_kind) => {
                return Err(ConfigError::KindConflict {
                    name: task.name,
                    existing: existing_kind.describe(),
                    requested: requested_kind.describe(),
                })
            }
        }

        tracing::trace!(task = %task.name, "task definition merged");
        if let (TaskKind::File { sources, .. }, TaskKind::File { sources: more, .. }) =
            (&mut existing.kind, task.kind)
        {
            for source in more {
                if !sources.contains(&source) {
                    sources.push(source);
                }
            }
        }
        for prerequisite in task.prerequisites {
            if !existing.prerequisites.contains(&prerequisite) {
                existing.prerequisites.push(prerequisite);
            }
        }
        existing.actions.extend(task.actions);
        if task.description.is_some() {
            existing.description = task.description;
        }

        Ok(())
    }

    /// Append a prerequisite to a defined task; appending twice is a no-op
    pub fn append_prerequisite(&mut self, name: &str, prerequisite: &str) -> PlanResult<()> {
        let task = self.tasks.get_mut(name).ok_or_else(|| PlanError::UnknownTask {
            name: name.to_string(),
            required_by: None,
        })?;

        if !task.prerequisites.iter().any(|p| p == prerequisite) {
            task.prerequisites.push(prerequisite.to_string());
        }
        Ok(())
    }

    /// Look up a task by name
    pub fn lookup(&self, name: &str) -> PlanResult<&Task> {
        self.tasks.get(name).ok_or_else(|| PlanError::UnknownTask {
            name: name.to_string(),
            required_by: None,
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// All tasks in name order
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    /// Tasks that carry a description, in name order
    pub fn described(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values().filter(|t| t.description.is_some())
    }
}
