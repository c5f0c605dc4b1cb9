// src/system/utilities.rs

use crate::core::{options::Options, template};
use crate::system::executor::{self, CommandOutput, ExecutionError, SplitCommand};
use colored::Colorize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

/// Process helpers handed to every task body.
///
/// Holds the working directory and extra environment that every command the
/// task spawns should see.
#[derive(Debug, Clone, Default)]
pub struct TaskUtilities {
    cwd: Option<PathBuf>,
    env_vars: HashMap<String, String>,
    echo: bool,
}

impl TaskUtilities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.insert(name.into(), value.into());
        self
    }

    /// Print each line passed to [`TaskUtilities::run_line`] before running it.
    pub fn echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    pub fn is_echoing(&self) -> bool {
        self.echo
    }

    /// Runs a command line and captures its output. A non-zero exit is an error.
    pub async fn script(&self, command_line: &str) -> Result<CommandOutput, ExecutionError> {
        let split = executor::split_command_line(command_line)?.ok_or(ExecutionError::EmptyCommand)?;
        executor::execute_captured(&split, self.cwd(), &self.env_vars).await
    }

    /// Renders `{{placeholders}}` in `template` against `options`, then runs it
    /// like [`TaskUtilities::script`].
    pub async fn script_with(
        &self,
        template: &str,
        options: &Options,
    ) -> Result<CommandOutput, ExecutionError> {
        let rendered = template::render(template, options)?;
        self.script(&rendered).await
    }

    /// Runs `program` with `args` directly, without any shell-like splitting,
    /// and captures its output.
    pub async fn command<I, S>(&self, program: &str, args: I) -> Result<CommandOutput, ExecutionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let split = direct_command(program, args);
        executor::execute_captured(&split, self.cwd(), &self.env_vars).await
    }

    /// Runs `program` with `args` attached to the terminal.
    pub async fn exec<I, S>(&self, program: &str, args: I) -> Result<ExitStatus, ExecutionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let split = direct_command(program, args);
        executor::execute_inherited(&split, self.cwd(), &self.env_vars).await
    }

    /// Runs one line of a command-list task attached to the terminal.
    /// A leading `-` ignores a non-zero exit. Blank lines are skipped.
    pub async fn run_line(&self, command_line: &str) -> Result<(), ExecutionError> {
        let (command_line, ignore_errors) = executor::strip_ignore_prefix(command_line);
        self.run_attached(command_line, ignore_errors).await
    }

    /// Like [`TaskUtilities::run_line`] for a template line. The `-` prefix is
    /// read before rendering, so option values can never switch it on.
    pub async fn run_template_line(
        &self,
        template: &str,
        options: &Options,
    ) -> Result<(), ExecutionError> {
        let (template, ignore_errors) = executor::strip_ignore_prefix(template);
        let rendered = template::render(template, options)?;
        self.run_attached(&rendered, ignore_errors).await
    }

    async fn run_attached(&self, command_line: &str, ignore_errors: bool) -> Result<(), ExecutionError> {
        let Some(words) = executor::split_words(command_line)? else {
            return Ok(());
        };

        if self.echo {
            let prefix = if ignore_errors { "-" } else { "" };
            eprintln!("{} {}{}", "→".blue(), prefix.green(), command_line.trim().green());
        }
        log::info!("Running: {}", words.join(" "));

        let split = SplitCommand {
            words,
            ignore_errors,
        };
        executor::execute_inherited(&split, self.cwd(), &self.env_vars).await?;
        Ok(())
    }
}

fn direct_command<I, S>(program: &str, args: I) -> SplitCommand
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let words = std::iter::once(program.to_string())
        .chain(args.into_iter().map(Into::into))
        .collect();
    SplitCommand {
        words,
        ignore_errors: false,
    }
}

// MARK: --- UNIT TESTS ---

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_script_captures_output() {
        let utils = TaskUtilities::new();
        let output = utils.script("echo 'hello world'").await.unwrap();
        assert_eq!(output.stdout, "hello world");
    }

    #[tokio::test]
    async fn test_script_with_renders_options() {
        let options = Options::from_value(json!({ "name": "Ada; rm -rf /" }));
        let output = TaskUtilities::new()
            .script_with("echo {{name}}", &options)
            .await
            .unwrap();
        assert_eq!(output.stdout, "Ada; rm -rf /");
    }

    #[tokio::test]
    async fn test_command_runs_in_cwd_with_env() {
        let dir = tempfile::tempdir().unwrap();
        let utils = TaskUtilities::new()
            .with_cwd(dir.path())
            .with_env("HRUN_TEST_VALUE", "42");

        let pwd = utils.command("pwd", Vec::<String>::new()).await.unwrap();
        let expected = dir.path().canonicalize().unwrap();
        assert_eq!(Path::new(&pwd.stdout).canonicalize().unwrap(), expected);

        let env = utils
            .command("sh", ["-c", "echo $HRUN_TEST_VALUE"])
            .await
            .unwrap();
        assert_eq!(env.stdout, "42");
    }

    #[tokio::test]
    async fn test_run_line_ignores_marked_failures() {
        let utils = TaskUtilities::new();
        assert!(utils.run_line("-false").await.is_ok());
        assert!(utils.run_line("   ").await.is_ok());
        assert!(matches!(
            utils.run_line("false").await,
            Err(ExecutionError::NonZeroExitStatus { .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_script_is_an_error() {
        assert!(matches!(
            TaskUtilities::new().script("").await,
            Err(ExecutionError::EmptyCommand)
        ));
    }
}
