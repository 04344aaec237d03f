//! Dependency resolution
//!
//! Expands requested task names into an execution plan: a post-order
//! depth-first walk over prerequisites, visited in declared order.

use crate::error::{PlanError, PlanResult};
use crate::runner::registry::Registry;
use std::collections::HashSet;
use std::fmt;

/// Ordered, duplicate-free list of tasks to run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionPlan {
    order: Vec<String>,
}

impl ExecutionPlan {
    pub fn tasks(&self) -> &[String] {
        &self.order
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.order.iter().any(|n| n == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.order.iter().position(|n| n == name)
    }
}

impl fmt::Display for ExecutionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.order.join(" -> "))
    }
}

/// Which edges a walk follows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edges {
    /// Declared prerequisites only
    Prerequisites,
    /// Prerequisites plus tasks invoked from action steps
    WithInvocations,
}

struct Walker<'a> {
    registry: &'a Registry,
    edges: Edges,
    recorded: HashSet<String>,
    visiting: Vec<String>,
    order: Vec<String>,
}

impl<'a> Walker<'a> {
    fn new(registry: &'a Registry, edges: Edges) -> Self {
        Walker {
            registry,
            edges,
            recorded: HashSet::new(),
            visiting: Vec::new(),
            order: Vec::new(),
        }
    }

    fn visit(&mut self, name: &str, required_by: Option<&str>) -> PlanResult<()> {
        if self.recorded.contains(name) {
            return Ok(());
        }
        if let Some(start) = self.visiting.iter().position(|n| n == name) {
            return Err(PlanError::DependencyCycle(self.visiting[start..].to_vec()));
        }

        let registry = self.registry;
        let task = registry
            .lookup(name)
            .map_err(|_| PlanError::UnknownTask {
                name: name.to_string(),
                required_by: required_by.map(str::to_string),
            })?;

        self.visiting.push(name.to_string());

        for prerequisite in &task.prerequisites {
            self.visit(prerequisite, Some(name))?;
        }
        if self.edges == Edges::WithInvocations {
            for invoked in task.invoked_tasks() {
                self.visit(invoked, Some(name))?;
            }
        }

        self.visiting.pop();
        self.recorded.insert(name.to_string());
        self.order.push(name.to_string());
        Ok(())
    }
}

fn walk<S: AsRef<str>>(registry: &Registry, requested: &[S], edges: Edges) -> PlanResult<Vec<String>> {
    let mut walker = Walker::new(registry, edges);
    for name in requested {
        walker.visit(name.as_ref(), None)?;
    }
    Ok(walker.order)
}

/// Build the execution plan for `requested`.
///
/// Fails with [`PlanError::UnknownTask`] for undefined names and
/// [`PlanError::DependencyCycle`] for cycles, including cycles closed through
/// tasks invoked from action steps, so no action runs on a broken graph.
pub fn plan<S: AsRef<str>>(registry: &Registry, requested: &[S]) -> PlanResult<ExecutionPlan> {
    walk(registry, requested, Edges::WithInvocations)?;
    let order = walk(registry, requested, Edges::Prerequisites)?;

    tracing::debug!(tasks = order.len(), plan = %order.join(" -> "), "execution plan built");
    Ok(ExecutionPlan { order })
}
