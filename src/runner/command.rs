//! Command execution
//!
//! This module handles executing shell commands through the configured
//! interpreter.

use crate::error::{ExecutionError, ExecutionResult};
use crate::runner::{Command, Context};
use std::process::{Command as StdCommand, Stdio};

fn interpolated(ctx: &Context, name: &str, value: &str) -> ExecutionResult<String> {
    ctx.interpolate(value)
        .map_err(|e| ExecutionError::InvalidValue {
            name: name.to_string(),
            error: e.to_string(),
        })
}

/// Build the interpreter invocation for `exec_str`, with run variables exported
fn shell(ctx: &Context, exec_str: &str) -> StdCommand {
    let (program, args) = match ctx.interpreter.split_first() {
        Some((program, args)) => (program.as_str(), args),
        None => ("sh", &[][..]),
    };

    let mut command = StdCommand::new(program);
    command.args(args);
    command.arg(exec_str);
    command.current_dir(&ctx.working_dir);
    command.envs(&ctx.vars);
    command
}

/// Execute step `step` (1-based) of `task`.
///
/// A non-zero exit becomes [`ExecutionError::ActionFailed`] carrying the
/// command's exit code.
pub fn execute_command(cmd: &Command, ctx: &Context, task: &str, step: usize) -> ExecutionResult<()> {
    let exec_str = interpolated(ctx, "command", cmd.exec())?;

    if !cmd.is_quiet() {
        let print_str = ctx
            .interpolate(cmd.print())
            .unwrap_or_else(|_| cmd.print().to_string());
        ctx.print_run(&print_str);
    }
    if ctx.dry_run {
        return Ok(());
    }

    let mut command = shell(ctx, &exec_str);

    if let Some(dir) = cmd.dir() {
        let dir = interpolated(ctx, "dir", dir)?;
        command.current_dir(ctx.working_dir.join(dir));
    }

    command.stdin(Stdio::inherit());
    command.stdout(Stdio::inherit());
    command.stderr(Stdio::inherit());

    tracing::debug!(task, step, command = %exec_str, "spawning command");
    let status = command.status().map_err(|source| ExecutionError::SpawnFailed {
        task: task.to_string(),
        step,
        command: exec_str.clone(),
        source,
    })?;

    if !status.success() {
        return Err(ExecutionError::ActionFailed {
            task: task.to_string(),
            step,
            command: exec_str,
            code: status.code(),
        });
    }

    Ok(())
}

/// Check if a command succeeds (for when conditions)
pub fn check_command(cmd_str: &str, ctx: &Context) -> ExecutionResult<bool> {
    let exec_str = interpolated(ctx, "command", cmd_str)?;

    let mut command = shell(ctx, &exec_str);
    command.stdout(Stdio::null());
    command.stderr(Stdio::null());

    // A command that cannot be started counts as failing
    match command.status() {
        Ok(status) => Ok(status.success()),
        Err(e) => {
            tracing::debug!(command = %exec_str, error = %e, "condition command did not start");
            Ok(false)
        }
    }
}

/// Run a command and capture its standard output.
///
/// Returns `None` when the command cannot be started or exits unsuccessfully.
pub fn capture_command(cmd_str: &str, ctx: &Context) -> ExecutionResult<Option<String>> {
    let exec_str = interpolated(ctx, "command", cmd_str)?;

    let mut command = shell(ctx, &exec_str);
    command.stdin(Stdio::null());
    command.stderr(Stdio::null());

    match command.output() {
        Ok(output) if output.status.success() => {
            Ok(Some(String::from_utf8_lossy(&output.stdout).into_owned()))
        }
        Ok(output) => {
            tracing::debug!(command = %exec_str, code = ?output.status.code(), "capture failed");
            Ok(None)
        }
        Err(e) => {
            tracing::debug!(command = %exec_str, error = %e, "capture did not start");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::Verbosity;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn quiet() -> Context {
        Context::new().with_verbosity(Verbosity::Silent)
    }

    #[test]
    fn test_execute_simple_command() {
        let ctx = quiet();
        let cmd = Command::Simple("echo test".to_string());

        assert!(execute_command(&cmd, &ctx, "t", 1).is_ok());
    }

    #[test]
    fn test_execute_command_exports_vars() {
        let temp_dir = TempDir::new().unwrap();
        let mut vars = HashMap::new();
        vars.insert("GREETING".to_string(), "world".to_string());

        let ctx = quiet()
            .with_working_dir(temp_dir.path().to_path_buf())
            .with_vars(vars);
        let cmd = Command::Simple("printf '%s' \"$GREETING\" > out.txt".to_string());

        execute_command(&cmd, &ctx, "t", 1).unwrap();
        assert_eq!(
            std::fs::read_to_string(temp_dir.path().join("out.txt")).unwrap(),
            "world"
        );
    }

    #[test]
    fn test_execute_failing_command_reports_step_and_code() {
        let ctx = quiet();
        let cmd = Command::Simple("exit 3".to_string());

        match execute_command(&cmd, &ctx, "build", 2) {
            Err(ExecutionError::ActionFailed {
                task, step, code, ..
            }) => {
                assert_eq!(task, "build");
                assert_eq!(step, 2);
                assert_eq!(code, Some(3));
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_dry_run_does_not_execute() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = quiet()
            .with_working_dir(temp_dir.path().to_path_buf())
            .with_dry_run(true);
        let cmd = Command::Simple("touch created".to_string());

        execute_command(&cmd, &ctx, "t", 1).unwrap();
        assert!(!temp_dir.path().join("created").exists());
    }

    #[test]
    fn test_command_dir_is_relative_to_working_dir() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir(temp_dir.path().join("sub")).unwrap();
        let ctx = quiet().with_working_dir(temp_dir.path().to_path_buf());
        let cmd = Command::Complex {
            exec: "touch here".to_string(),
            print: "touch here".to_string(),
            quiet: true,
            dir: Some("sub".to_string()),
        };

        execute_command(&cmd, &ctx, "t", 1).unwrap();
        assert!(temp_dir.path().join("sub/here").exists());
    }

    #[test]
    fn test_check_command() {
        let ctx = quiet();
        assert!(check_command("true", &ctx).unwrap());
        assert!(!check_command("false", &ctx).unwrap());
    }

    #[test]
    fn test_check_command_with_variable() {
        let mut vars = HashMap::new();
        vars.insert("cmd".to_string(), "true".to_string());

        let ctx = quiet().with_vars(vars);
        assert!(check_command("${cmd}", &ctx).unwrap());
    }

    #[test]
    fn test_capture_command() {
        let ctx = quiet();
        assert_eq!(
            capture_command("echo 'Bundler version 1.10.6'", &ctx).unwrap(),
            Some("Bundler version 1.10.6\n".to_string())
        );
        assert_eq!(capture_command("exit 1", &ctx).unwrap(), None);
    }
}
