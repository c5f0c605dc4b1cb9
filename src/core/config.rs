// src/core/config.rs

//! # Config
//!
//! Layered application settings for `hr`. Each layer overrides the previous
//! one:
//!
//! 1. built-in defaults (`./scripts`, not quiet),
//! 2. the global file `<config_dir>/hr/config.toml`,
//! 3. the project file `./hr.toml`,
//! 4. the `HR_TASK_DIRECTORY` and `HR_QUIET` environment variables.
use crate::constants::{
    DEFAULT_TASK_DIRECTORY, ENV_QUIET, ENV_TASK_DIRECTORY, GLOBAL_CONFIG_DIR, GLOBAL_CONFIG_FILENAME,
    PROJECT_CONFIG_FILENAME,
};
use serde::Deserialize;
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read configuration file '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Could not parse configuration file '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Could not expand task directory '{value}': {message}")]
    Expand { value: String, message: String },
    #[error("Invalid value '{value}' for {name}: expected true or false")]
    InvalidFlag { name: String, value: String },
}

/// One configuration file. Every key is optional.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigLayer {
    #[serde(alias = "taskDirectory")]
    pub task_directory: Option<String>,
    pub quiet: Option<bool>,
}

/// The resolved settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Where task files are looked up.
    pub task_directory: PathBuf,
    /// Suppresses the success marker and command echo.
    pub quiet: bool,
}

impl AppConfig {
    /// The built-in defaults for a process running in `cwd`.
    pub fn defaults(cwd: &Path) -> Self {
        Self {
            task_directory: cwd.join(DEFAULT_TASK_DIRECTORY),
            quiet: false,
        }
    }

    /// Loads every layer for a process running in `cwd`, reading the real
    /// global config directory and process environment.
    pub fn load(cwd: &Path) -> Result<Self, ConfigError> {
        let global = dirs::config_dir().map(|dir| dir.join(GLOBAL_CONFIG_DIR).join(GLOBAL_CONFIG_FILENAME));
        Self::load_from(cwd, global.as_deref(), |name| std::env::var(name).ok())
    }

    /// Loads every layer from explicit sources.
    ///
    /// # Arguments
    ///
    /// * `cwd` - The working directory; relative paths are resolved against it.
    /// * `global` - The global config file, if the platform has a config directory.
    /// * `env` - Looks up an environment variable by name.
    pub fn load_from<F>(cwd: &Path, global: Option<&Path>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::defaults(cwd);
        let project = cwd.join(PROJECT_CONFIG_FILENAME);

        for path in global.into_iter().chain(std::iter::once(project.as_path())) {
            if let Some(layer) = read_layer(path)? {
                log::debug!("Applying configuration layer {}", path.display());
                config.apply(cwd, layer)?;
            }
        }

        let overrides = ConfigLayer {
            task_directory: env(ENV_TASK_DIRECTORY).filter(|value| !value.trim().is_empty()),
            quiet: env(ENV_QUIET).map(|value| parse_flag(ENV_QUIET, &value)).transpose()?,
        };
        config.apply(cwd, overrides)?;

        Ok(config)
    }

    /// Overrides the settings present in `layer`.
    pub fn apply(&mut self, cwd: &Path, layer: ConfigLayer) -> Result<(), ConfigError> {
        if let Some(directory) = layer.task_directory {
            self.task_directory = expand_directory(cwd, &directory)?;
        }
        if let Some(quiet) = layer.quiet {
            self.quiet = quiet;
        }
        Ok(())
    }
}

/// Reads a config file, or `None` if it does not exist.
fn read_layer(path: &Path) -> Result<Option<ConfigLayer>, ConfigError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    toml::from_str(&contents)
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

fn expand_directory(cwd: &Path, value: &str) -> Result<PathBuf, ConfigError> {
    let expanded = shellexpand::full(value).map_err(|e| ConfigError::Expand {
        value: value.to_string(),
        message: e.to_string(),
    })?;
    Ok(cwd.join(expanded.as_ref()))
}

fn parse_flag(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag {
            name: name.to_string(),
            value: value.to_string(),
        }),
    }
}

// MARK: --- UNIT TESTS ---

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults() {
        let dir = tempdir().unwrap();
        let config = AppConfig::load_from(dir.path(), None, no_env).unwrap();
        assert_eq!(config, AppConfig::defaults(dir.path()));
        assert_eq!(config.task_directory, dir.path().join("scripts"));
        assert!(!config.quiet);
    }

    #[test]
    fn test_layers_override_in_order() {
        let dir = tempdir().unwrap();
        let global = dir.path().join("global.toml");
        fs::write(&global, "task_directory = \"from-global\"\nquiet = true\n").unwrap();
        fs::write(dir.path().join("hr.toml"), "taskDirectory = \"tasks\"\n").unwrap();

        let config = AppConfig::load_from(dir.path(), Some(&global), no_env).unwrap();
        assert_eq!(config.task_directory, dir.path().join("tasks"));
        assert!(config.quiet);
    }

    #[test]
    fn test_environment_wins() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("hr.toml"), "quiet = true\n").unwrap();
        let env: HashMap<&str, &str> = [(ENV_TASK_DIRECTORY, "/opt/tasks"), (ENV_QUIET, "0")].into();

        let config = AppConfig::load_from(dir.path(), None, |name| env.get(name).map(|v| v.to_string())).unwrap();
        assert_eq!(config.task_directory, PathBuf::from("/opt/tasks"));
        assert!(!config.quiet);
    }

    #[test]
    fn test_invalid_flag() {
        let dir = tempdir().unwrap();
        let err = AppConfig::load_from(dir.path(), None, |name| {
            (name == ENV_QUIET).then(|| "maybe".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFlag { .. }));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("hr.toml"), "tasks_dir = \"x\"\n").unwrap();
        let err = AppConfig::load_from(dir.path(), None, no_env).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_missing_global_file_is_skipped() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope").join("config.toml");
        assert!(AppConfig::load_from(dir.path(), Some(&missing), no_env).is_ok());
    }
}
