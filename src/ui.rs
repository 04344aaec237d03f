//! Terminal output
//!
//! Status lines go to stderr so task output on stdout stays clean. Listings
//! are built as strings and printed by the caller.

use crate::runner::Registry;
use colored::Colorize;

pub fn error(message: &str) {
    eprintln!("{} {}", "Error:".red().bold(), message);
}

pub fn debug(message: &str) {
    eprintln!("{} {}", "[DEBUG]".dimmed(), message);
}

/// Echo a command; dry runs are marked
pub fn run(command: &str, dry_run: bool) {
    let tag = if dry_run { "[DRY]" } else { "[RUN]" };
    eprintln!("{} {}", tag.green().bold(), command);
}

/// Described tasks with their descriptions, names aligned
pub fn task_list(registry: &Registry, program: &str) -> String {
    let width = registry
        .described()
        .map(|t| t.name.len())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for task in registry.described() {
        let description = task.description.as_deref().unwrap_or_default();
        let name = format!("{:<width$}", task.name, width = width);
        out.push_str(&format!("{} {}  # {}\n", program, name.cyan(), description));
    }
    out
}

/// Every task followed by its prerequisites, one per line
pub fn prerequisite_list(registry: &Registry, program: &str) -> String {
    let mut out = String::new();
    for task in registry.iter() {
        out.push_str(&format!("{} {}\n", program, task.name.bold()));
        for prerequisite in &task.prerequisites {
            out.push_str(&format!("    {}\n", prerequisite));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::Task;

    fn registry() -> Registry {
        colored::control::set_override(false);
        let mut registry = Registry::new();
        registry
            .define(
                Task::symbolic("test")
                    .with_description("Run all tests")
                    .with_prerequisites(["test:oxt", "test:cxx"]),
            )
            .unwrap();
        registry
            .define(Task::symbolic("test:oxt").with_description("Run oxt tests"))
            .unwrap();
        registry.define(Task::symbolic("test:cxx")).unwrap();
        registry
    }

    #[test]
    fn test_task_list_only_described() {
        let listing = task_list(&registry(), "drake");
        assert_eq!(
            listing,
            "drake test      # Run all tests\ndrake test:oxt  # Run oxt tests\n"
        );
    }

    #[test]
    fn test_prerequisite_list() {
        let listing = prerequisite_list(&registry(), "drake");
        assert!(listing.starts_with("drake test\n    test:oxt\n    test:cxx\n"));
        assert!(listing.contains("drake test:cxx\n"));
    }
}
