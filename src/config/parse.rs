//! Configuration file parsing and discovery

use crate::config::types::Config;
use crate::error::{ConfigError, ConfigResult, DrakeError};
use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Default configuration file names to search for
const CONFIG_FILE_NAMES: &[&str] = &["drake.yml", "drake.yaml"];

/// A parsed task file together with where it came from
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub path: PathBuf,
    pub config: Config,
}

/// Find the configuration file by searching current and parent directories
pub fn find_config_file() -> ConfigResult<PathBuf> {
    find_config_file_from(env::current_dir().map_err(|e| {
        ConfigError::Invalid(format!("Failed to get current directory: {}", e))
    })?)
}

/// Find the configuration file starting from a specific directory
pub fn find_config_file_from(start_dir: PathBuf) -> ConfigResult<PathBuf> {
    let mut current_dir = start_dir;
    let mut searched_paths = Vec::new();

    loop {
        for file_name in CONFIG_FILE_NAMES {
            let config_path = current_dir.join(file_name);
            searched_paths.push(config_path.display().to_string());

            if config_path.is_file() {
                return Ok(config_path);
            }
        }

        match current_dir.parent() {
            Some(parent) => current_dir = parent.to_path_buf(),
            None => return Err(ConfigError::NotFound(searched_paths.join(", "))),
        }
    }
}

/// Parse a configuration file from a path
pub fn parse_config_file(path: &Path) -> Result<Config, DrakeError> {
    let contents = fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read {}: {}", path.display(), e)))?;

    parse_config(&contents)
}

/// Parse configuration from a string
pub fn parse_config(yaml: &str) -> Result<Config, DrakeError> {
    let config: Config = serde_yaml::from_str(yaml)?;
    Ok(config)
}

/// Load a task file and everything it imports, in registration order.
///
/// Import paths are relative to the importing file. A file reached twice is
/// loaded once.
pub fn load_config_tree(root: &Path) -> Result<Vec<LoadedConfig>, DrakeError> {
    let mut loaded = Vec::new();
    let mut seen = HashSet::new();
    load_recursive(root, &mut loaded, &mut seen)?;
    Ok(loaded)
}

fn load_recursive(
    path: &Path,
    loaded: &mut Vec<LoadedConfig>,
    seen: &mut HashSet<PathBuf>,
) -> Result<(), DrakeError> {
    let canonical = path.canonicalize().map_err(|e| ConfigError::IncludeFile {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;
    if !seen.insert(canonical) {
        return Ok(());
    }

    let config = parse_config_file(path).map_err(|e| match e {
        DrakeError::Yaml(err) => DrakeError::Config(ConfigError::IncludeFile {
            path: path.to_path_buf(),
            error: err.to_string(),
        }),
        other => other,
    })?;

    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let imports: Vec<PathBuf> = config.imports.iter().map(|i| base_dir.join(i)).collect();

    tracing::debug!(path = %path.display(), tasks = config.tasks.len(), "loaded task file");
    loaded.push(LoadedConfig {
        path: path.to_path_buf(),
        config,
    });

    for import in imports {
        load_recursive(&import, loaded, seen)?;
    }

    Ok(())
}

/// Parse configuration with automatic file discovery
pub fn parse_config_auto() -> Result<(Vec<LoadedConfig>, PathBuf), DrakeError> {
    let config_path = find_config_file()?;
    let configs = load_config_tree(&config_path)?;
    Ok((configs, config_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_simple_config() {
        let yaml = r#"
tasks:
  hello:
    desc: Say hello
    run: echo "hello"
"#;
        let config = parse_config(yaml).unwrap();
        assert_eq!(config.tasks.len(), 1);
        assert!(config.tasks.contains_key("hello"));
    }

    #[test]
    fn test_find_config_in_current_dir() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("drake.yml");
        fs::write(&config_path, "tasks: {}\n").unwrap();

        let found = find_config_file_from(temp_dir.path().to_path_buf()).unwrap();
        assert_eq!(found, config_path);
    }

    #[test]
    fn test_find_config_in_parent_dir() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("drake.yaml");
        let sub_dir = temp_dir.path().join("subdir");

        fs::create_dir(&sub_dir).unwrap();
        fs::write(&config_path, "tasks: {}\n").unwrap();

        let found = find_config_file_from(sub_dir).unwrap();
        assert_eq!(found, config_path);
    }

    #[test]
    fn test_config_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let result = find_config_file_from(temp_dir.path().to_path_buf());
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_parse_config_with_interpreter_and_default() {
        let yaml = r#"
default: test
interpreter:
  - bash
  - -c
tasks:
  test:
    run: echo "hello"
"#;
        let config = parse_config(yaml).unwrap();
        assert_eq!(config.default, Some("test".to_string()));
        assert_eq!(
            config.interpreter,
            Some(vec!["bash".to_string(), "-c".to_string()])
        );
    }

    #[test]
    fn test_load_config_tree_follows_imports_once() {
        let temp_dir = TempDir::new().unwrap();
        let build_dir = temp_dir.path().join("build");
        fs::create_dir(&build_dir).unwrap();

        let root = temp_dir.path().join("drake.yml");
        fs::write(
            &root,
            "imports: [build/test.yml, build/docs.yml]\ntasks:\n  a:\n    run: echo a\n",
        )
        .unwrap();
        fs::write(
            build_dir.join("test.yml"),
            "imports: [docs.yml]\ntasks:\n  b:\n    run: echo b\n",
        )
        .unwrap();
        fs::write(build_dir.join("docs.yml"), "tasks:\n  c:\n    run: echo c\n").unwrap();

        let loaded = load_config_tree(&root).unwrap();
        let names: Vec<&str> = loaded
            .iter()
            .flat_map(|l| l.config.tasks.keys().map(|k| k.as_str()))
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_missing_import_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("drake.yml");
        fs::write(&root, "imports: [nope.yml]\n").unwrap();

        let result = load_config_tree(&root);
        assert!(matches!(
            result,
            Err(DrakeError::Config(ConfigError::IncludeFile { .. }))
        ));
    }
}
