// src/cli/handler.rs

use crate::core::{
    config::AppConfig,
    properties::list_properties,
    task::{Export, Task},
    task_file::{TaskFile, list_task_files},
};
use colored::Colorize;
use std::fmt::Display;

/// The only place the CLI writes to the terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct Handler;

impl Handler {
    /// Writes `message` and a newline to stdout.
    pub fn write(&self, message: &str) {
        println!("{message}");
    }

    /// Prints a green success marker to stderr.
    pub fn success(&self, text: &str) {
        eprintln!("{} {}", "✔".green().bold(), text);
    }

    /// Prints `message` after a red failure marker and exits with status 1.
    pub fn fail_with(&self, message: impl Display) -> ! {
        eprintln!("{}", failure_text(message));
        std::process::exit(1);
    }
}

pub fn failure_text(message: impl Display) -> String {
    format!("{} {}", "✖".red().bold(), message)
}

/// `Usage: hr <action> [task]`, with `<action>` replaced by the task file name
/// when one is known.
pub fn usage(task_file: Option<&str>) -> String {
    format!(
        "Usage: {} {} [task]",
        "hr".yellow(),
        task_file.unwrap_or("<action>")
    )
}

/// The help shown when a task file is known but the task is missing or unknown.
pub fn task_list_help(file: &TaskFile) -> String {
    let entries: Vec<String> = file
        .collection
        .iter()
        .filter(|(_, export)| !matches!(export, Export::Value(serde_json::Value::Null)))
        .map(|(name, export)| format!("  {}", task_line(name, export)))
        .collect();

    format!(
        "{}\n\nAvailable tasks:\n\n{}\n",
        usage(Some(&file.name())),
        entries.join("\n")
    )
}

/// `name<TAB>{ properties }<TAB>description`, skipping empty columns.
fn task_line(name: &str, export: &Export) -> String {
    let formatted_name = name.bold().to_string();
    let (properties, description) = match export {
        Export::Task(task @ Task::Strict(_)) => (
            task.schema().map(list_properties).unwrap_or_default(),
            task.description().unwrap_or_default().to_string(),
        ),
        Export::Task(task) => (String::new(), task.description().unwrap_or_default().to_string()),
        Export::Function(_) | Export::Value(_) => (String::new(), String::new()),
    };

    [formatted_name, properties, description]
        .into_iter()
        .filter(|column| !column.is_empty())
        .collect::<Vec<_>>()
        .join("\t")
}

/// The help shown when no task file was given.
pub fn task_file_list_help(config: &AppConfig) -> String {
    let files = list_task_files(&config.task_directory);
    let mut lines = vec![usage(None), String::new()];

    if files.is_empty() {
        lines.push(format!(
            "No task files found in {}",
            config.task_directory.display()
        ));
    } else {
        lines.push(format!(
            "Available task files in {}:",
            config.task_directory.display()
        ));
        lines.push(String::new());
        lines.extend(files.iter().filter_map(|path| {
            path.file_name()
                .map(|name| format!("  {}", name.to_string_lossy()))
        }));
    }
    lines.push(String::new());
    lines.join("\n")
}

// MARK: --- UNIT TESTS ---
