// src/cli/app.rs

use crate::cli::{
    Cli,
    handler::{Handler, task_file_list_help, task_list_help},
};
use crate::core::{
    arg_parser::{TokenizationError, parse_options},
    config::{AppConfig, ConfigError},
    dispatch::{DispatchError, Invocation, execute_task},
    options::Environment,
    task_file::{ResolutionError, TaskFileError, load_task_file, resolve_task_file},
};
use crate::system::utilities::TaskUtilities;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Could not determine the working directory: {0}")]
    WorkingDirectory(#[source] std::io::Error),
    #[error("Task file name is required")]
    MissingTaskFile,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Load(#[from] TaskFileError),
    #[error("Failed to execute task\n{0}")]
    Options(#[from] TokenizationError),
    #[error("Task name is required.")]
    MissingTaskName,
    #[error("Task file '{base}' does not export '{name}'\nResolved to: {}", .path.display())]
    TaskNotFound {
        base: String,
        name: String,
        path: PathBuf,
    },
    #[error(transparent)]
    Execution(DispatchError),
}

/// Runs one `hr` invocation. Help text is written through `handler`; the
/// caller reports the returned error.
pub async fn run(cli: Cli, handler: &Handler) -> Result<(), AppError> {
    log::debug!("CLI args parsed: {:?}", cli);

    let cwd = std::env::current_dir().map_err(AppError::WorkingDirectory)?;
    let config = AppConfig::load(&cwd)?;
    log::debug!("Resolved configuration: {:?}", config);

    let Some(identifier) = cli.task_file() else {
        handler.write(&task_file_list_help(&config));
        return Err(AppError::MissingTaskFile);
    };

    let path = resolve_task_file(&config.task_directory.join(identifier))?;
    let file = load_task_file(&path)?;
    let options = parse_options(cli.task_args())?;

    let invocation = Invocation {
        file_name: file.name(),
        task_name: cli.task_name().unwrap_or_default().to_string(),
        options,
        environment: Environment::capture(),
    };
    let utilities = TaskUtilities::new().echo(!config.quiet);

    match execute_task(&file.collection, invocation, utilities).await {
        Ok(output) => log::debug!("Task returned: {}", output),
        Err(DispatchError::MissingTaskName) => {
            handler.write(&task_list_help(&file));
            return Err(AppError::MissingTaskName);
        }
        Err(DispatchError::TaskNotFound { name }) => {
            handler.write(&task_list_help(&file));
            return Err(AppError::TaskNotFound {
                base: file.base(),
                name,
                path: file.path.clone(),
            });
        }
        Err(other) => return Err(AppError::Execution(other)),
    }

    if !config.quiet {
        handler.success("Success");
    }
    Ok(())
}

// MARK: --- UNIT TESTS ---

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_failures_keep_their_own_header() {
        let error = AppError::Execution(DispatchError::NotAFunction {
            specifier: "build::version".to_string(),
            name: "version".to_string(),
        });
        assert_eq!(
            error.to_string(),
            "Failed to execute build::version\nExported value 'version' is not a function"
        );
    }

    #[test]
    fn test_tokenizer_failures_get_task_header() {
        let error = AppError::from(TokenizationError::MissingValue {
            option: "--name".to_string(),
        });
        assert_eq!(
            error.to_string(),
            "Failed to execute task\nExpected option --name to be followed by a value"
        );
    }
}
