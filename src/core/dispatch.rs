// src/core/dispatch.rs

use crate::constants::ENV_KEY;
use crate::core::{
    arg_parser::ParsedOptions,
    options::{Environment, Options},
    task::{Export, TaskCollection, TaskError},
};
use crate::system::utilities::TaskUtilities;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Task name is required.")]
    MissingTaskName,
    #[error("Task '{name}' was not found.")]
    TaskNotFound { name: String },
    #[error("Failed to execute {specifier}\nExported value '{name}' is not a function")]
    NotAFunction { specifier: String, name: String },
    #[error("Failed to execute {specifier}\n{source}")]
    Failed {
        specifier: String,
        #[source]
        source: TaskError,
    },
}

/// Everything needed to run one task from a loaded collection.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// The task file name without extension, used in messages.
    pub file_name: String,
    pub task_name: String,
    pub options: ParsedOptions,
    pub environment: Environment,
}

impl Invocation {
    /// `<file>::<task>`, as shown in failure messages.
    pub fn specifier(&self) -> String {
        format!("{}::{}", self.file_name, self.task_name)
    }

    /// The record handed to the task: the parsed options plus `env`.
    pub fn options_record(&self) -> Options {
        let mut record = match self.options.to_value() {
            Value::Object(record) => record,
            _ => serde_json::Map::new(),
        };
        record.insert(ENV_KEY.to_string(), self.environment.to_value());
        Options::from_value(Value::Object(record))
    }
}

/// Looks up `invocation.task_name` in `collection` and runs it.
///
/// Plain functions and loose tasks receive the raw record. Strict tasks
/// validate it first and receive the validated value.
pub async fn execute_task(
    collection: &TaskCollection,
    invocation: Invocation,
    utilities: TaskUtilities,
) -> Result<Value, DispatchError> {
    if invocation.task_name.is_empty() {
        return Err(DispatchError::MissingTaskName);
    }

    let export = collection
        .get(&invocation.task_name)
        .ok_or_else(|| DispatchError::TaskNotFound {
            name: invocation.task_name.clone(),
        })?;

    let specifier = invocation.specifier();
    let options = invocation.options_record();
    log::debug!("Dispatching {} with {} option(s).", specifier, options.as_map().len());

    let outcome = match export {
        Export::Value(_) => {
            return Err(DispatchError::NotAFunction {
                specifier,
                name: invocation.task_name,
            });
        }
        Export::Function(body) => body
            .call(options, utilities)
            .await
            .map_err(TaskError::Failed),
        Export::Task(task) => task.call(options, utilities).await,
    };

    outcome.map_err(|source| DispatchError::Failed { specifier, source })
}

// MARK: --- UNIT TESTS ---

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::arg_parser::parse_options;
    use crate::core::schema::{Field, FieldKind, ObjectSchema};
    use crate::core::task::{TaskBody, strict_task_sync, task_sync};
    use serde_json::json;

    fn collection() -> TaskCollection {
        let mut collection = TaskCollection::new();
        collection.insert(
            "echo".to_string(),
            TaskBody::from_fn(|options: Options, _| Ok(options.into_value())).into(),
        );
        collection.insert(
            "loose".to_string(),
            task_sync(|options: Options, _| Ok(options.positionals().len())).into(),
        );
        collection.insert(
            "strict".to_string(),
            strict_task_sync(
                ObjectSchema::new().field(Field::new("count", FieldKind::integer().at_least(1.0))),
                |options: Options, _| Ok(options.get("count").cloned()),
            )
            .into(),
        );
        collection.insert("version".to_string(), Export::Value(json!("1.0.0")));
        collection
    }

    fn invocation(task_name: &str, args: &[&str]) -> Invocation {
        Invocation {
            file_name: "build".to_string(),
            task_name: task_name.to_string(),
            options: parse_options(args).unwrap(),
            environment: [("HOME", "/home/ada")].into_iter().collect(),
        }
    }

    async fn run(task_name: &str, args: &[&str]) -> Result<Value, DispatchError> {
        execute_task(&collection(), invocation(task_name, args), TaskUtilities::new()).await
    }

    #[tokio::test]
    async fn test_plain_function_gets_raw_record_with_env() {
        let output = run("echo", &["a", "--flag", "x"]).await.unwrap();
        assert_eq!(
            output,
            json!({ "_": ["a"], "flag": "x", "env": { "HOME": "/home/ada" } })
        );
    }

    #[tokio::test]
    async fn test_loose_task() {
        assert_eq!(run("loose", &["a", "b"]).await.unwrap(), json!(2));
    }

    #[tokio::test]
    async fn test_strict_task_coerces() {
        assert_eq!(run("strict", &["--count", "3"]).await.unwrap(), json!(3));
    }

    #[tokio::test]
    async fn test_strict_task_validation_failure() {
        let err = run("strict", &["--count", "0"]).await.unwrap_err();
        let DispatchError::Failed { specifier, source } = &err else {
            panic!("expected a task failure, got {err:?}");
        };
        assert_eq!(specifier, "build::strict");
        assert!(matches!(source, TaskError::Validation(_)));
        assert!(err.to_string().starts_with("Failed to execute build::strict\n"));
    }

    #[tokio::test]
    async fn test_missing_and_unknown_tasks() {
        assert!(matches!(run("", &[]).await, Err(DispatchError::MissingTaskName)));
        assert!(matches!(
            run("nope", &[]).await,
            Err(DispatchError::TaskNotFound { name }) if name == "nope"
        ));
    }

    #[tokio::test]
    async fn test_non_function_export() {
        let err = run("version", &[]).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to execute build::version\nExported value 'version' is not a function"
        );
    }
}
