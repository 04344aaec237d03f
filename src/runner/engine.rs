//! Execution engine
//!
//! Walks an execution plan and runs each task's action at most once,
//! stopping at the first failure. File tasks are skipped while their output
//! is fresh.

use crate::error::{ExecutionError, PlanError};
use crate::runner::freshness;
use crate::runner::plan::{plan, ExecutionPlan};
use crate::runner::registry::Registry;
use crate::runner::task::{Step, Task, TaskKind};
use crate::runner::{evaluate_when_list, execute_command, Context};
use crate::Result;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

/// Per-run state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Running,
    /// `ran` is false for a file task found up to date
    Completed { ran: bool },
    Failed,
}

/// What happened to a completed task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ran,
    UpToDate,
}

/// Runs tasks from one registry, remembering what already ran
pub struct Engine<'r> {
    registry: &'r Registry,
    dry_run: bool,
    states: HashMap<String, TaskState>,
    stack: Vec<String>,
    outcomes: Vec<(String, Outcome)>,
}

impl<'r> Engine<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Engine {
            registry,
            dry_run: false,
            states: HashMap::new(),
            stack: Vec::new(),
            outcomes: Vec::new(),
        }
    }

    /// Print commands instead of running them
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Plan `names` and run the plan
    pub fn invoke<S: AsRef<str>>(&mut self, names: &[S], ctx: &mut Context) -> Result<()> {
        let plan = plan(self.registry, names)?;
        self.run(&plan, ctx)
    }

    /// Run every task of `plan` in order
    pub fn run(&mut self, plan: &ExecutionPlan, ctx: &mut Context) -> Result<()> {
        if self.dry_run {
            ctx.dry_run = true;
        }
        self.check_options(plan, ctx)?;
        for name in plan.iter() {
            self.execute(name, ctx)?;
        }
        Ok(())
    }

    /// Resolve every boolean option guarding a planned or invoked task; a
    /// bad value fails the run before any action executes
    fn check_options(&self, plan: &ExecutionPlan, ctx: &Context) -> Result<()> {
        let mut seen = HashSet::new();
        let mut pending: Vec<&str> = plan.iter().collect();

        while let Some(name) = pending.pop() {
            if !seen.insert(name) {
                continue;
            }
            let task = self.registry.lookup(name)?;
            for option in task.option_guards() {
                ctx.options.resolve_bool(option)?;
            }
            pending.extend(task.invoked_tasks());
        }
        Ok(())
    }

    /// Completed tasks in execution order
    pub fn outcomes(&self) -> &[(String, Outcome)] {
        &self.outcomes
    }

    pub fn state(&self, name: &str) -> TaskState {
        self.states.get(name).copied().unwrap_or(TaskState::Pending)
    }

    /// Whether `name` executed its action in this run
    pub fn ran(&self, name: &str) -> bool {
        self.state(name) == TaskState::Completed { ran: true }
    }

    /// Execute one task after its prerequisites; returns whether its action ran
    fn execute(&mut self, name: &str, ctx: &mut Context) -> Result<bool> {
        match self.state(name) {
            TaskState::Completed { ran } => return Ok(ran),
            TaskState::Running => {
                let start = self.stack.iter().position(|n| n == name).unwrap_or(0);
                return Err(PlanError::DependencyCycle(self.stack[start..].to_vec()).into());
            }
            TaskState::Failed => return Err(ExecutionError::AlreadyFailed(name.to_string()).into()),
            TaskState::Pending => {}
        }

        let registry = self.registry;
        let task = registry.lookup(name)?;

        self.states.insert(name.to_string(), TaskState::Running);
        self.stack.push(name.to_string());
        let result = self.execute_task(task, ctx);
        self.stack.pop();

        let state = match &result {
            Ok(ran) => TaskState::Completed { ran: *ran },
            Err(_) => TaskState::Failed,
        };
        self.states.insert(name.to_string(), state);
        result
    }

    fn execute_task(&mut self, task: &'r Task, ctx: &mut Context) -> Result<bool> {
        let registry = self.registry;
        let mut forced_by = None;
        let mut prerequisite_outputs = Vec::new();

        for prerequisite in &task.prerequisites {
            let ran = self.execute(prerequisite, ctx)?;
            if ran && forced_by.is_none() {
                forced_by = Some(prerequisite.as_str());
            }
            if let Some(output) = registry.lookup(prerequisite)?.kind.output() {
                prerequisite_outputs.push(ctx.working_dir.join(output));
            }
        }

        if let TaskKind::File { output, sources } = &task.kind {
            match forced_by {
                Some(prerequisite) => {
                    tracing::debug!(task = %task.name, prerequisite, "rebuilding, prerequisite ran");
                }
                None => {
                    let target = ctx.working_dir.join(output);
                    let mut inputs: Vec<PathBuf> =
                        sources.iter().map(|s| ctx.working_dir.join(s)).collect();
                    inputs.extend(prerequisite_outputs);

                    let staleness = freshness::check(&target, &inputs).map_err(|source| {
                        ExecutionError::Stat {
                            path: target.clone(),
                            source,
                        }
                    })?;
                    if !staleness.is_stale() {
                        tracing::debug!(task = %task.name, "up to date");
                        ctx.print_task_skip(&task.name, "up to date");
                        self.outcomes.push((task.name.clone(), Outcome::UpToDate));
                        return Ok(false);
                    }
                    tracing::debug!(task = %task.name, reason = %staleness, "rebuilding");
                }
            }
        }

        tracing::info!(task = %task.name, "task started");
        ctx.print_task_start(&task.name);
        self.run_actions(task, ctx)?;
        tracing::info!(task = %task.name, "task finished");
        ctx.print_task_complete(&task.name);

        self.outcomes.push((task.name.clone(), Outcome::Ran));
        Ok(true)
    }

    fn run_actions(&mut self, task: &'r Task, ctx: &mut Context) -> Result<()> {
        let mut step_number = 0;
        tracing::debug!(task = %task.name, steps = task.step_count(), "running actions");

        for run in &task.actions {
            if !evaluate_when_list(&run.when, ctx)? {
                tracing::debug!(task = %task.name, steps = run.steps.len(), "run item skipped");
                step_number += run.steps.len();
                continue;
            }

            for step in &run.steps {
                step_number += 1;
                self.run_step(task, step, step_number, ctx)?;
            }
        }

        Ok(())
    }

    fn run_step(&mut self, task: &Task, step: &Step, number: usize, ctx: &mut Context) -> Result<()> {
        match step {
            Step::Command(cmd) => execute_command(cmd, ctx, &task.name, number)?,

            Step::Invoke(name) => {
                self.execute(name, ctx)?;
            }

            Step::SetEnv(vars) => {
                for (key, value) in vars {
                    match value {
                        Some(value) => {
                            let value = ctx.interpolate(value)?;
                            ctx.set_var(key.clone(), value);
                        }
                        None => {
                            ctx.vars.remove(key);
                        }
                    }
                }
            }

            Step::Procedure(procedure) => {
                if ctx.dry_run {
                    ctx.print_run(&procedure.describe());
                    return Ok(());
                }
                procedure
                    .call(ctx)
                    .map_err(|e| ExecutionError::ProcedureFailed {
                        task: task.name.clone(),
                        step: number,
                        procedure: procedure.describe(),
                        message: format!("{:#}", e),
                    })?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::env::Environment;
    use crate::config::OptionResolver;
    use crate::error::{DrakeError, OptionError};
    use crate::runner::task::{Run, When, WhenCondition};
    use crate::runner::Verbosity;
    use std::cell::RefCell;
    use std::fs::{self, File};
    use std::rc::Rc;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    type Log = Rc<RefCell<Vec<String>>>;

    fn record(log: &Log, name: &str) -> Step {
        let log = Rc::clone(log);
        let name = name.to_string();
        Step::procedure(format!("record {}", name), move |_ctx| {
            log.borrow_mut().push(name.clone());
            Ok(())
        })
    }

    fn context(dir: &TempDir) -> Context {
        Context::new()
            .with_working_dir(dir.path().to_path_buf())
            .with_verbosity(Verbosity::Silent)
            .with_options(OptionResolver::with_environment(Environment::Fixed(
                HashMap::new(),
            )))
    }

    fn set_mtime(path: PathBuf, time: SystemTime) {
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(time)
            .unwrap();
    }

    #[test]
    fn test_umbrella_runs_each_suite_once_in_order() {
        let dir = TempDir::new().unwrap();
        let log: Log = Rc::default();
        let mut registry = Registry::new();
        registry
            .define(
                Task::symbolic("test")
                    .with_prerequisites(["test:oxt", "test:cxx", "test:ruby", "test:node"])
                    .with_prerequisites(["test:integration"]),
            )
            .unwrap();
        for suite in ["test:oxt", "test:ruby", "test:node"] {
            registry
                .define(Task::symbolic(suite).with_step(record(&log, suite)))
                .unwrap();
        }
        registry
            .define(
                Task::symbolic("test:cxx")
                    .with_prerequisites(["test:oxt"])
                    .with_step(record(&log, "test:cxx")),
            )
            .unwrap();
        registry
            .define(
                Task::symbolic("test:integration")
                    .with_prerequisites(["test:cxx", "test:ruby"])
                    .with_step(record(&log, "test:integration")),
            )
            .unwrap();

        let mut ctx = context(&dir);
        let mut engine = Engine::new(&registry);
        engine.invoke(&["test"], &mut ctx).unwrap();

        assert_eq!(
            *log.borrow(),
            vec!["test:oxt", "test:cxx", "test:ruby", "test:node", "test:integration"]
        );
        assert_eq!(engine.outcomes().len(), 6);
        assert!(engine.ran("test"));
    }

    #[test]
    fn test_shared_prerequisite_runs_once() {
        let dir = TempDir::new().unwrap();
        let log: Log = Rc::default();
        let mut registry = Registry::new();
        registry
            .define(Task::symbolic("app").with_prerequisites(["lib", "tool"]))
            .unwrap();
        registry
            .define(Task::symbolic("lib").with_prerequisites(["gen"]))
            .unwrap();
        registry
            .define(
                Task::symbolic("tool")
                    .with_prerequisites(["gen"])
                    .with_step(Step::Invoke("gen".into())),
            )
            .unwrap();
        registry
            .define(Task::symbolic("gen").with_step(record(&log, "gen")))
            .unwrap();

        let mut ctx = context(&dir);
        let mut engine = Engine::new(&registry);
        engine.invoke(&["app", "gen"], &mut ctx).unwrap();

        assert_eq!(*log.borrow(), vec!["gen"]);
    }

    #[test]
    fn test_missing_output_is_built_then_up_to_date() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("tool.c"), "int main() {}").unwrap();
        let mut registry = Registry::new();
        registry
            .define(
                Task::file("bin", "bin")
                    .with_sources(["tool.c"])
                    .with_step(Step::command("cp tool.c bin")),
            )
            .unwrap();

        let mut ctx = context(&dir);
        let mut first = Engine::new(&registry);
        first.invoke(&["bin"], &mut ctx).unwrap();
        assert_eq!(first.outcomes(), &[("bin".to_string(), Outcome::Ran)]);
        assert!(dir.path().join("bin").exists());

        let mut second = Engine::new(&registry);
        second.invoke(&["bin"], &mut ctx).unwrap();
        assert_eq!(second.outcomes(), &[("bin".to_string(), Outcome::UpToDate)]);
        assert_eq!(second.state("bin"), TaskState::Completed { ran: false });
    }

    #[test]
    fn test_touched_source_rebuilds_only_its_target() {
        let dir = TempDir::new().unwrap();
        for name in ["a.c", "b.c"] {
            fs::write(dir.path().join(name), name).unwrap();
        }
        let mut registry = Registry::new();
        for (out, src) in [("a.out", "a.c"), ("b.out", "b.c")] {
            registry
                .define(
                    Task::file(out, out)
                        .with_sources([src])
                        .with_step(Step::command(format!("cp {} {}", src, out))),
                )
                .unwrap();
        }
        registry
            .define(Task::symbolic("all").with_prerequisites(["a.out", "b.out"]))
            .unwrap();

        let mut ctx = context(&dir);
        Engine::new(&registry).invoke(&["all"], &mut ctx).unwrap();

        let now = SystemTime::now();
        let old = now - Duration::from_secs(60);
        set_mtime(dir.path().join("a.c"), old);
        set_mtime(dir.path().join("b.c"), old);
        set_mtime(dir.path().join("a.out"), now);
        set_mtime(dir.path().join("b.out"), now);

        let mut engine = Engine::new(&registry);
        engine.invoke(&["all"], &mut ctx).unwrap();
        assert!(!engine.ran("a.out"));
        assert!(!engine.ran("b.out"));

        set_mtime(dir.path().join("b.c"), now + Duration::from_secs(60));
        let mut engine = Engine::new(&registry);
        engine.invoke(&["all"], &mut ctx).unwrap();
        assert!(!engine.ran("a.out"));
        assert!(engine.ran("b.out"));
    }

    #[test]
    fn test_prerequisite_output_newer_rebuilds() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("gen.out"), "gen").unwrap();
        fs::write(dir.path().join("final"), "final").unwrap();
        let now = SystemTime::now();
        set_mtime(dir.path().join("final"), now - Duration::from_secs(60));
        set_mtime(dir.path().join("gen.out"), now);

        let log: Log = Rc::default();
        let mut registry = Registry::new();
        registry.define(Task::file("gen.out", "gen.out")).unwrap();
        registry
            .define(
                Task::file("final", "final")
                    .with_prerequisites(["gen.out"])
                    .with_step(record(&log, "final")),
            )
            .unwrap();

        let mut ctx = context(&dir);
        let mut engine = Engine::new(&registry);
        engine.invoke(&["final"], &mut ctx).unwrap();

        assert!(!engine.ran("gen.out"));
        assert_eq!(*log.borrow(), vec!["final"]);
    }

    #[test]
    fn test_symbolic_prerequisite_forces_rebuild() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("out"), "x").unwrap();
        let log: Log = Rc::default();
        let mut registry = Registry::new();
        registry.define(Task::symbolic("prepare")).unwrap();
        registry
            .define(
                Task::file("out", "out")
                    .with_prerequisites(["prepare"])
                    .with_step(record(&log, "out")),
            )
            .unwrap();

        let mut ctx = context(&dir);
        Engine::new(&registry).invoke(&["out"], &mut ctx).unwrap();
        assert_eq!(*log.borrow(), vec!["out"]);
    }

    #[test]
    fn test_failure_aborts_run() {
        let dir = TempDir::new().unwrap();
        let log: Log = Rc::default();
        let mut registry = Registry::new();
        registry
            .define(Task::symbolic("all").with_prerequisites(["first", "broken", "last"]))
            .unwrap();
        registry
            .define(Task::symbolic("first").with_step(record(&log, "first")))
            .unwrap();
        registry
            .define(
                Task::symbolic("broken")
                    .with_step(Step::command("true"))
                    .with_step(Step::command("exit 7"))
                    .with_step(record(&log, "after")),
            )
            .unwrap();
        registry
            .define(Task::symbolic("last").with_step(record(&log, "last")))
            .unwrap();

        let mut ctx = context(&dir);
        let mut engine = Engine::new(&registry);
        let err = engine.invoke(&["all"], &mut ctx).unwrap_err();

        match &err {
            DrakeError::Execution(ExecutionError::ActionFailed {
                task, step, code, ..
            }) => {
                assert_eq!(task, "broken");
                assert_eq!(*step, 2);
                assert_eq!(*code, Some(7));
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(err.exit_code(), 7);
        assert_eq!(*log.borrow(), vec!["first"]);
        assert_eq!(engine.state("broken"), TaskState::Failed);
        assert_eq!(engine.state("last"), TaskState::Pending);
        assert_eq!(engine.state("all"), TaskState::Pending);

        assert!(matches!(
            engine.invoke(&["broken"], &mut ctx),
            Err(DrakeError::Execution(ExecutionError::AlreadyFailed(_)))
        ));
    }

    #[test]
    fn test_procedure_failure() {
        let dir = TempDir::new().unwrap();
        let mut registry = Registry::new();
        registry
            .define(Task::symbolic("p").with_step(Step::procedure("explode", |_ctx| {
                anyhow::bail!("no space left")
            })))
            .unwrap();

        let mut ctx = context(&dir);
        match Engine::new(&registry).invoke(&["p"], &mut ctx) {
            Err(DrakeError::Execution(ExecutionError::ProcedureFailed {
                procedure,
                message,
                step,
                ..
            })) => {
                assert_eq!(procedure, "explode");
                assert_eq!(message, "no space left");
                assert_eq!(step, 1);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_skipped_run_item_still_counts_steps() {
        let dir = TempDir::new().unwrap();
        let mut registry = Registry::new();
        registry
            .define(
                Task::symbolic("t")
                    .with_run(Run::guarded(
                        vec![When::new(WhenCondition::Enabled("SUDO".into()))],
                        vec![Step::command("true"), Step::command("true")],
                    ))
                    .with_step(Step::command("exit 2")),
            )
            .unwrap();

        let mut ctx = context(&dir);
        match Engine::new(&registry).invoke(&["t"], &mut ctx) {
            Err(DrakeError::Execution(ExecutionError::ActionFailed { step, .. })) => {
                assert_eq!(step, 3)
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_set_env_reaches_later_commands() {
        let dir = TempDir::new().unwrap();
        let mut registry = Registry::new();
        registry
            .define(
                Task::symbolic("t")
                    .with_step(Step::SetEnv(vec![("TARGET".into(), Some("out".into()))]))
                    .with_step(Step::command("touch \"$TARGET\"")),
            )
            .unwrap();

        let mut ctx = context(&dir);
        Engine::new(&registry).invoke(&["t"], &mut ctx).unwrap();
        assert!(dir.path().join("out").exists());
        assert_eq!(ctx.get_var("TARGET"), Some(&"out".to_string()));
    }

    #[test]
    fn test_dry_run_executes_nothing() {
        let dir = TempDir::new().unwrap();
        let log: Log = Rc::default();
        let mut registry = Registry::new();
        registry
            .define(
                Task::file("out", "out")
                    .with_step(Step::command("touch out"))
                    .with_step(record(&log, "out")),
            )
            .unwrap();

        let mut ctx = context(&dir);
        let mut engine = Engine::new(&registry).with_dry_run(true);
        engine.invoke(&["out"], &mut ctx).unwrap();

        assert!(engine.ran("out"));
        assert!(!dir.path().join("out").exists());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_invalid_option_on_later_run_item_stops_before_any_step() {
        let dir = TempDir::new().unwrap();
        let log: Log = Rc::default();
        let mut registry = Registry::new();
        registry
            .define(
                Task::symbolic("deps")
                    .with_prerequisites(["fetch"])
                    .with_step(record(&log, "base"))
                    .with_step(Step::Invoke("docs".to_string())),
            )
            .unwrap();
        registry
            .define(Task::symbolic("fetch").with_step(record(&log, "fetch")))
            .unwrap();
        registry
            .define(Task::symbolic("docs").with_run(Run::guarded(
                vec![When::new(WhenCondition::Enabled("DOCTOOLS".to_string()))],
                vec![record(&log, "docs")],
            )))
            .unwrap();

        let mut env = HashMap::new();
        env.insert("DOCTOOLS".to_string(), "sometimes".to_string());
        let mut ctx = context(&dir)
            .with_options(OptionResolver::with_environment(Environment::Fixed(env)));

        let mut engine = Engine::new(&registry);
        let err = engine.invoke(&["deps"], &mut ctx).unwrap_err();
        assert!(matches!(
            err,
            DrakeError::EnvOption(OptionError::Invalid { ref name, .. }) if name == "DOCTOOLS"
        ));
        assert!(log.borrow().is_empty());
        assert!(engine.outcomes().is_empty());
    }

    #[test]
    fn test_plan_errors_stop_before_any_action() {
        let dir = TempDir::new().unwrap();
        let log: Log = Rc::default();
        let mut registry = Registry::new();
        registry
            .define(
                Task::symbolic("a")
                    .with_prerequisites(["ok", "b"])
                    .with_step(record(&log, "a")),
            )
            .unwrap();
        registry
            .define(Task::symbolic("ok").with_step(record(&log, "ok")))
            .unwrap();
        registry
            .define(Task::symbolic("b").with_prerequisites(["a"]))
            .unwrap();

        let mut ctx = context(&dir);
        assert!(matches!(
            Engine::new(&registry).invoke(&["a"], &mut ctx),
            Err(DrakeError::Plan(PlanError::DependencyCycle(_)))
        ));
        assert!(log.borrow().is_empty());
    }
}
