// src/core/task.rs

//! Task branding.
//!
//! A task file exports a collection of named values. Plain functions run with
//! the raw options record; functions branded with [`task`] behave the same but
//! are recognized as tasks; functions branded with [`strict_task`] validate
//! their options against a schema before the body runs.

use crate::core::{
    issues::ValidationError,
    options::Options,
    schema::{ExtendSchema, Schema, Validation},
};
use crate::system::utilities::TaskUtilities;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::{fmt, future::Future, pin::Pin, sync::Arc};
use thiserror::Error;

pub type TaskFuture = Pin<Box<dyn Future<Output = anyhow::Result<Value>> + Send>>;

type SyncBody = dyn Fn(Options, TaskUtilities) -> anyhow::Result<Value> + Send + Sync;
type AsyncBody = dyn Fn(Options, TaskUtilities) -> TaskFuture + Send + Sync;

/// A callable task body. Whatever it returns is serialized to JSON.
#[derive(Clone)]
pub enum TaskBody {
    Sync(Arc<SyncBody>),
    Async(Arc<AsyncBody>),
}

impl TaskBody {
    pub fn from_fn<F, R>(body: F) -> Self
    where
        F: Fn(Options, TaskUtilities) -> anyhow::Result<R> + Send + Sync + 'static,
        R: Serialize + 'static,
    {
        TaskBody::Sync(Arc::new(
            move |options: Options, utilities: TaskUtilities| -> anyhow::Result<Value> {
                let output = body(options, utilities)?;
                Ok(serde_json::to_value(output)?)
            },
        ))
    }

    pub fn from_async<F, Fut, R>(body: F) -> Self
    where
        F: Fn(Options, TaskUtilities) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
        R: Serialize + 'static,
    {
        TaskBody::Async(Arc::new(
            move |options: Options, utilities: TaskUtilities| -> TaskFuture {
                let pending = body(options, utilities);
                Box::pin(async move {
                    let output = pending.await?;
                    Ok::<Value, anyhow::Error>(serde_json::to_value(output)?)
                })
            },
        ))
    }

    pub async fn call(&self, options: Options, utilities: TaskUtilities) -> anyhow::Result<Value> {
        match self {
            TaskBody::Sync(body) => body(options, utilities),
            TaskBody::Async(body) => body(options, utilities).await,
        }
    }
}

impl fmt::Debug for TaskBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskBody::Sync(_) => f.write_str("TaskBody::Sync(..)"),
            TaskBody::Async(_) => f.write_str("TaskBody::Async(..)"),
        }
    }
}

/// The brand carried by a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Task,
    StrictTask,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Task => "task",
            TaskKind::StrictTask => "strictTask",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum TaskError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0:#}")]
    Failed(anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct LooseTask {
    body: TaskBody,
    description: Option<String>,
}

impl LooseTask {
    pub async fn call(&self, options: Options, utilities: TaskUtilities) -> Result<Value, TaskError> {
        self.body
            .call(options, utilities)
            .await
            .map_err(TaskError::Failed)
    }
}

/// A task whose options are validated against a closed schema first.
#[derive(Debug, Clone)]
pub struct StrictTask {
    body: TaskBody,
    schema: Arc<dyn Schema>,
    description: Option<String>,
}

impl StrictTask {
    /// The merged schema: `_`, `env` and the declared options, closed to
    /// undeclared keys.
    pub fn schema(&self) -> &dyn Schema {
        self.schema.as_ref()
    }

    pub fn safe_parse(&self, input: &Value) -> Validation {
        self.schema.validate(input)
    }

    pub fn parse(&self, input: &Value) -> Result<Options, ValidationError> {
        self.safe_parse(input)
            .map(Options::from_value)
            .map_err(ValidationError::new)
    }

    /// Validates `options` and, only if that succeeds, runs the body with the
    /// validated value.
    pub async fn call(&self, options: Options, utilities: TaskUtilities) -> Result<Value, TaskError> {
        let validated = self.parse(&options.into_value())?;
        self.body
            .call(validated, utilities)
            .await
            .map_err(TaskError::Failed)
    }
}

/// A branded task.
#[derive(Debug, Clone)]
pub enum Task {
    Loose(LooseTask),
    Strict(StrictTask),
}

impl Task {
    pub fn kind(&self) -> TaskKind {
        match self {
            Task::Loose(_) => TaskKind::Task,
            Task::Strict(_) => TaskKind::StrictTask,
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            Task::Loose(task) => task.description.as_deref(),
            Task::Strict(task) => task.description.as_deref(),
        }
    }

    pub fn with_description(mut self, text: impl Into<String>) -> Self {
        let text = Some(text.into());
        match &mut self {
            Task::Loose(task) => task.description = text,
            Task::Strict(task) => task.description = text,
        }
        self
    }

    pub fn schema(&self) -> Option<&dyn Schema> {
        match self {
            Task::Loose(_) => None,
            Task::Strict(task) => Some(task.schema()),
        }
    }

    pub fn as_strict(&self) -> Option<&StrictTask> {
        match self {
            Task::Strict(task) => Some(task),
            Task::Loose(_) => None,
        }
    }

    pub async fn call(&self, options: Options, utilities: TaskUtilities) -> Result<Value, TaskError> {
        match self {
            Task::Loose(task) => task.call(options, utilities).await,
            Task::Strict(task) => task.call(options, utilities).await,
        }
    }
}

/// Brands an async function as a task.
pub fn task<F, Fut, R>(body: F) -> Task
where
    F: Fn(Options, TaskUtilities) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
    R: Serialize + 'static,
{
    brand_loose(TaskBody::from_async(body))
}

/// Brands a synchronous function as a task.
pub fn task_sync<F, R>(body: F) -> Task
where
    F: Fn(Options, TaskUtilities) -> anyhow::Result<R> + Send + Sync + 'static,
    R: Serialize + 'static,
{
    brand_loose(TaskBody::from_fn(body))
}

/// Brands an async function as a strict task validated by `schema`.
pub fn strict_task<S, F, Fut, R>(schema: S, body: F) -> Task
where
    S: ExtendSchema + 'static,
    F: Fn(Options, TaskUtilities) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
    R: Serialize + 'static,
{
    brand_strict(schema, TaskBody::from_async(body))
}

/// Brands a synchronous function as a strict task validated by `schema`.
pub fn strict_task_sync<S, F, R>(schema: S, body: F) -> Task
where
    S: ExtendSchema + 'static,
    F: Fn(Options, TaskUtilities) -> anyhow::Result<R> + Send + Sync + 'static,
    R: Serialize + 'static,
{
    brand_strict(schema, TaskBody::from_fn(body))
}

pub(crate) fn brand_loose(body: TaskBody) -> Task {
    Task::Loose(LooseTask {
        body,
        description: None,
    })
}

pub(crate) fn brand_strict<S: ExtendSchema + 'static>(schema: S, body: TaskBody) -> Task {
    let merged = S::baseline().merge(&schema).reject_undeclared();
    let description = merged.description().map(str::to_string);
    Task::Strict(StrictTask {
        body,
        schema: Arc::new(merged),
        description,
    })
}

/// One named value exported by a task file.
#[derive(Debug, Clone)]
pub enum Export {
    /// An unbranded function.
    Function(TaskBody),
    Task(Task),
    /// Anything that cannot be called.
    Value(Value),
}

impl Export {
    pub fn is_branded_task(&self) -> bool {
        matches!(self, Export::Task(_))
    }

    pub fn is_strict_task(&self) -> bool {
        matches!(self, Export::Task(Task::Strict(_)))
    }

    pub fn as_task(&self) -> Option<&Task> {
        match self {
            Export::Task(task) => Some(task),
            _ => None,
        }
    }
}

impl From<Task> for Export {
    fn from(task: Task) -> Self {
        Export::Task(task)
    }
}

impl From<TaskBody> for Export {
    fn from(body: TaskBody) -> Self {
        Export::Function(body)
    }
}

/// The exports of one task file, in declaration order.
pub type TaskCollection = IndexMap<String, Export>;

// MARK: --- UNIT TESTS ---
