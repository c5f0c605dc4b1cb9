// src/lib.rs

pub mod cli;
pub mod constants;
pub mod core;
pub mod models;
pub mod system;

pub use crate::core::{
    arg_parser::{ParsedOptions, TokenizationError, parse_options, tokenize},
    dispatch::{DispatchError, Invocation, execute_task},
    issues::{ValidationError, ValidationIssue, format_issues},
    options::{Environment, Options},
    properties::list_properties,
    schema::{ExtendSchema, Field, FieldKind, ObjectSchema, Schema, UndeclaredKeys},
    task::{
        Export, Task, TaskBody, TaskCollection, TaskError, TaskKind, strict_task, strict_task_sync,
        task, task_sync,
    },
};
pub use crate::system::utilities::TaskUtilities;
