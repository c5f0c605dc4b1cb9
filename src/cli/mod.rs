// src/cli/mod.rs

use clap::Parser;

pub mod app;
pub mod handler;

/// hr: run a named task from a task file.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    override_usage = "hr <TASK_FILE> [TASK] [--option value ...] [-- positional ...]",
    styles = clap::builder::Styles::styled()
        .header(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .usage(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .literal(clap::builder::styling::AnsiColor::Cyan.on_default().bold())
        .placeholder(clap::builder::styling::AnsiColor::Green.on_default()),
)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// The task file, the task name, then the task's options.
    /// Everything after the task name is passed to the task untouched.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "ARGS")]
    pub args: Vec<String>,
}

impl Cli {
    /// The task file identifier, if given.
    pub fn task_file(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }

    /// The task name, if given.
    pub fn task_name(&self) -> Option<&str> {
        self.args.get(1).map(String::as_str)
    }

    /// Everything after the task name.
    pub fn task_args(&self) -> &[String] {
        self.args.get(2..).unwrap_or_default()
    }
}

// MARK: --- UNIT TESTS ---
