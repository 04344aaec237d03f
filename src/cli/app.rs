//! Main CLI application

use crate::config::{
    load_config_tree, parse_config_auto, Config, LoadedConfig, OptionResolver, OptionSpec,
};
use crate::error::{ConfigError, DrakeError};
use crate::logging::init_logging;
use crate::runner::{Context, Engine, Registry, Verbosity};
use crate::ui;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use clap_complete::{generate, Shell};
use regex::Regex;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

const PROGRAM: &str = "drake";

/// CLI application
pub struct App {
    /// Root task file
    config: Config,
    /// Config file path
    config_path: PathBuf,
    /// Every loaded task file, root first
    configs: Vec<LoadedConfig>,
    registry: Registry,
}

impl App {
    /// Create a new app by searching for drake.yml upward from the current directory
    pub fn new() -> Result<Self, DrakeError> {
        let (configs, config_path) = parse_config_auto()?;
        Self::from_loaded(configs, config_path)
    }

    /// Create app with a specific config file
    pub fn with_config_file(path: PathBuf) -> Result<Self, DrakeError> {
        if !path.is_file() {
            return Err(ConfigError::NotFound(path.display().to_string()).into());
        }
        let configs = load_config_tree(&path)?;
        Self::from_loaded(configs, path)
    }

    fn from_loaded(configs: Vec<LoadedConfig>, config_path: PathBuf) -> Result<Self, DrakeError> {
        let registry = Registry::from_configs(&configs)?;
        let config = configs
            .first()
            .map(|loaded| loaded.config.clone())
            .unwrap_or_default();

        Ok(App {
            config,
            config_path,
            configs,
            registry,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn program(&self) -> &str {
        self.config.name.as_deref().unwrap_or(PROGRAM)
    }

    /// Directory relative paths and commands are resolved against
    pub fn working_dir(&self) -> PathBuf {
        match self.config_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Task run when none is named: `default:`, else a task called `default`
    pub fn default_task(&self) -> Option<String> {
        self.config.default.clone().or_else(|| {
            self.registry
                .contains("default")
                .then(|| "default".to_string())
        })
    }

    /// Build the execution context for a run
    pub fn context(
        &self,
        verbosity: Verbosity,
        overrides: &[(String, String)],
    ) -> Result<Context, DrakeError> {
        let working_dir = self.working_dir();
        let mut options = OptionResolver::new();

        for loaded in &self.configs {
            for (name, decl) in &loaded.config.options {
                options.declare(OptionSpec {
                    name: name.clone(),
                    kind: decl.kind,
                    fallback: decl.fallback.clone(),
                    default: decl.default.clone(),
                });
            }
        }

        if let Some(dotenv) = &self.config.dotenv {
            let path = working_dir.join(dotenv);
            options.load_dotenv(&path).map_err(|e| {
                ConfigError::Invalid(format!("Failed to load {}: {}", path.display(), e))
            })?;
        }

        let mut ctx = Context::new()
            .with_working_dir(working_dir)
            .with_verbosity(verbosity)
            .with_options(options);

        if let Some(interpreter) = &self.config.interpreter {
            ctx = ctx.with_interpreter(interpreter.clone());
        }

        for (name, value) in overrides {
            ctx.set_override(name, value);
        }

        Ok(ctx)
    }

    /// Run the application with parsed command line arguments
    pub fn run(&self, matches: &ArgMatches) -> Result<(), DrakeError> {
        let verbosity = get_verbosity(matches);

        if matches.get_flag("tasks") {
            print!("{}", ui::task_list(&self.registry, self.program()));
            return Ok(());
        }
        if matches.get_flag("prereqs") {
            print!("{}", ui::prerequisite_list(&self.registry, self.program()));
            return Ok(());
        }

        let words: Vec<String> = matches
            .get_many::<String>("targets")
            .map(|values| values.cloned().collect())
            .unwrap_or_default();
        let (overrides, mut tasks) = split_targets(&words);

        if tasks.is_empty() {
            match self.default_task() {
                Some(task) => tasks.push(task),
                None => {
                    build_command(Some(&self.config)).print_help()?;
                    println!();
                    return Ok(());
                }
            }
        }

        let mut ctx = self.context(verbosity, &overrides)?;
        tracing::debug!(tasks = ?tasks, overrides = overrides.len(), "starting run");

        let mut engine = Engine::new(&self.registry).with_dry_run(matches.get_flag("dry-run"));
        engine.invoke(&tasks, &mut ctx)
    }
}

/// Build the clap command; the task file may supply the name and about text
pub fn build_command(config: Option<&Config>) -> Command {
    let name = config
        .and_then(|c| c.name.clone())
        .unwrap_or_else(|| PROGRAM.to_string());
    let about = config
        .and_then(|c| c.usage.clone())
        .unwrap_or_else(|| "A small make-style task engine with file targets".to_string());

    Command::new(name)
        .version(env!("CARGO_PKG_VERSION"))
        .about(about)
        .arg(
            Arg::new("targets")
                .value_name("TASK|NAME=value")
                .help("Tasks to run and NAME=value option overrides")
                .num_args(1..)
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("file")
                .short('f')
                .long("file")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("Path to drake.yml task file"),
        )
        .arg(
            Arg::new("tasks")
                .short('T')
                .long("tasks")
                .help("List tasks with descriptions")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("prereqs")
                .short('P')
                .long("prereqs")
                .help("List every task with its prerequisites")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("dry-run")
                .short('n')
                .long("dry-run")
                .help("Print commands without running them")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Only print command output and errors")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("silent")
                .short('s')
                .long("silent")
                .help("Print no output")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Print verbose output")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("completions")
                .long("completions")
                .value_name("SHELL")
                .value_parser(value_parser!(Shell))
                .help("Print shell completions"),
        )
}

/// Get verbosity level from matches
fn get_verbosity(matches: &ArgMatches) -> Verbosity {
    if matches.get_flag("silent") {
        Verbosity::Silent
    } else if matches.get_flag("quiet") {
        Verbosity::Quiet
    } else if matches.get_flag("verbose") {
        Verbosity::Verbose
    } else {
        Verbosity::Normal
    }
}

fn override_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)=(.*)$").expect("valid override regex")
    })
}

/// Split positional words into `NAME=value` overrides and task names
fn split_targets(words: &[String]) -> (Vec<(String, String)>, Vec<String>) {
    let mut overrides = Vec::new();
    let mut tasks = Vec::new();

    for word in words {
        match override_pattern().captures(word) {
            Some(caps) => overrides.push((caps[1].to_string(), caps[2].to_string())),
            None => tasks.push(word.clone()),
        }
    }

    (overrides, tasks)
}

/// Run the CLI application with the process arguments
pub fn run() -> Result<(), DrakeError> {
    run_from(std::env::args_os())
}

/// Run the CLI application with explicit arguments
pub fn run_from<I, T>(args: I) -> Result<(), DrakeError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = build_command(None).get_matches_from(args);
    init_logging(get_verbosity(&matches));

    if let Some(shell) = matches.get_one::<Shell>("completions") {
        generate(*shell, &mut build_command(None), PROGRAM, &mut io::stdout());
        return Ok(());
    }

    let app = match matches.get_one::<PathBuf>("file") {
        Some(path) => App::with_config_file(path.clone())?,
        None => App::new()?,
    };
    tracing::debug!(config = %app.config_path.display(), tasks = app.registry.len(), "task file loaded");

    app.run(&matches)
}

/// Load an app from a task file path
pub fn load(path: &Path) -> Result<App, DrakeError> {
    App::with_config_file(path.to_path_buf())
}
