// src/system/executor.rs

use crate::core::template::TemplateError;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use thiserror::Error;
use tokio::process::Command;

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Command could not be parsed: {0}")]
    CommandParse(String),
    #[error("No command specified to run.")]
    EmptyCommand,
    #[error("Command '{0}' could not be executed: {1}")]
    CommandFailed(String, std::io::Error),
    #[error("Command '{command}' exited with a non-zero status ({status}).{}", stderr_suffix(.stderr))]
    NonZeroExitStatus {
        command: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("Command '{command}' produced output that was not valid UTF-8")]
    InvalidUtf8Output {
        command: String,
        #[source]
        source: std::string::FromUtf8Error,
    },
    #[error(transparent)]
    Template(#[from] TemplateError),
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim_end();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("\n{trimmed}")
    }
}

/// The captured result of a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: ExitStatus,
    /// Standard output with the final newline removed.
    pub stdout: String,
    /// Standard error with the final newline removed.
    pub stderr: String,
}

impl CommandOutput {
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }
}

/// A command line split into words, plus whether a leading `-` asked for
/// failures to be ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitCommand {
    pub words: Vec<String>,
    pub ignore_errors: bool,
}

impl SplitCommand {
    fn program_and_args(&self) -> Result<(&str, &[String]), ExecutionError> {
        self.words
            .split_first()
            .map(|(program, args)| (program.as_str(), args))
            .ok_or(ExecutionError::EmptyCommand)
    }
}

/// Strips a leading `-`, which asks for a non-zero exit to be ignored.
pub fn strip_ignore_prefix(command_line: &str) -> (&str, bool) {
    let trimmed_command = command_line.trim();
    match trimmed_command.strip_prefix('-') {
        Some(rest) => (rest.trim(), true),
        None => (trimmed_command, false),
    }
}

/// Splits a command line with shell-like quoting rules, without looking at
/// a `-` prefix. Returns `None` for blank lines.
pub fn split_words(command_line: &str) -> Result<Option<Vec<String>>, ExecutionError> {
    let command_line = command_line.trim();
    if command_line.is_empty() {
        return Ok(None);
    }

    let words = shlex::split(command_line)
        .ok_or_else(|| ExecutionError::CommandParse(command_line.to_string()))?;
    Ok((!words.is_empty()).then_some(words))
}

/// Splits a command line with shell-like quoting rules.
/// Returns `None` for blank lines.
pub fn split_command_line(command_line: &str) -> Result<Option<SplitCommand>, ExecutionError> {
    let (final_command_line, ignore_errors) = strip_ignore_prefix(command_line);
    Ok(split_words(final_command_line)?.map(|words| SplitCommand {
        words,
        ignore_errors,
    }))
}

fn build_command(
    program: &str,
    args: &[String],
    cwd: Option<&Path>,
    env_vars: &HashMap<String, String>,
) -> Command {
    let mut command = Command::new(program);
    command.args(args).envs(env_vars);
    if let Some(cwd) = cwd {
        command.current_dir(dunce::simplified(cwd));
    }
    command
}

/// Runs a command with the parent's stdio streams and waits for it.
pub async fn execute_inherited(
    split: &SplitCommand,
    cwd: Option<&Path>,
    env_vars: &HashMap<String, String>,
) -> Result<ExitStatus, ExecutionError> {
    let (program, args) = split.program_and_args()?;
    let display_line = split.words.join(" ");

    let mut command = build_command(program, args, cwd, env_vars);
    command
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());

    // Built-in commands like `echo` only exist inside `cmd` on Windows.
    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) if e.kind() == ErrorKind::NotFound && cfg!(target_os = "windows") => {
            log::debug!("Command '{}' not found. Retrying with cmd /C.", program);
            let mut fallback_args = vec!["/C".to_string()];
            fallback_args.extend(split.words.iter().cloned());
            let mut fallback = build_command("cmd", &fallback_args, cwd, env_vars);
            fallback
                .stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit())
                .spawn()
                .map_err(|e| ExecutionError::CommandFailed(display_line.clone(), e))?
        }
        Err(e) => return Err(ExecutionError::CommandFailed(display_line, e)),
    };

    let status = child
        .wait()
        .await
        .map_err(|e| ExecutionError::CommandFailed(display_line.clone(), e))?;

    if !status.success() && !split.ignore_errors {
        return Err(ExecutionError::NonZeroExitStatus {
            command: display_line,
            status,
            stderr: String::new(),
        });
    }
    if !status.success() {
        log::debug!("Ignoring failure of '{}' ({}).", display_line, status);
    }
    Ok(status)
}

/// Runs a command and captures its standard output and error.
pub async fn execute_captured(
    split: &SplitCommand,
    cwd: Option<&Path>,
    env_vars: &HashMap<String, String>,
) -> Result<CommandOutput, ExecutionError> {
    let (program, args) = split.program_and_args()?;
    let display_line = split.words.join(" ");

    let output = build_command(program, args, cwd, env_vars)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| ExecutionError::CommandFailed(display_line.clone(), e))?;

    let decode = |bytes: Vec<u8>| {
        String::from_utf8(bytes)
            .map(|text| text.trim_end_matches(['\n', '\r']).to_string())
            .map_err(|source| ExecutionError::InvalidUtf8Output {
                command: display_line.clone(),
                source,
            })
    };
    let stdout = decode(output.stdout)?;
    let stderr = decode(output.stderr)?;

    if !output.status.success() && !split.ignore_errors {
        return Err(ExecutionError::NonZeroExitStatus {
            command: display_line,
            status: output.status,
            stderr,
        });
    }

    Ok(CommandOutput {
        status: output.status,
        stdout,
        stderr,
    })
}

// MARK: --- UNIT TESTS ---

#[cfg(test)]
mod tests {
    use super::*;

    fn words(line: &str) -> Vec<String> {
        split_command_line(line).unwrap().unwrap().words
    }

    #[test]
    fn test_split_handles_quotes() {
        assert_eq!(words("echo 'hello world' \"x y\""), vec!["echo", "hello world", "x y"]);
    }

    #[test]
    fn test_split_ignore_errors_prefix() {
        let split = split_command_line("  - false --flag ").unwrap().unwrap();
        assert!(split.ignore_errors);
        assert_eq!(split.words, vec!["false", "--flag"]);
    }

    #[test]
    fn test_split_words_keeps_leading_dash() {
        assert_eq!(split_words(" -x --flag ").unwrap(), Some(vec!["-x".to_string(), "--flag".to_string()]));
        assert_eq!(strip_ignore_prefix("-  make test"), ("make test", true));
        assert_eq!(strip_ignore_prefix(" make -k"), ("make -k", false));
    }

    #[test]
    fn test_split_blank_lines() {
        assert_eq!(split_command_line("   ").unwrap(), None);
        assert_eq!(split_command_line(" - ").unwrap(), None);
    }

    #[test]
    fn test_split_unbalanced_quotes() {
        assert!(matches!(
            split_command_line("echo 'oops"),
            Err(ExecutionError::CommandParse(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_captures_stdout() {
        let split = split_command_line("echo hello").unwrap().unwrap();
        let output = execute_captured(&split, None, &HashMap::new()).await.unwrap();
        assert_eq!(output.stdout, "hello");
        assert_eq!(output.code(), Some(0));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_an_error_unless_ignored() {
        let split = split_command_line("false").unwrap().unwrap();
        let err = execute_captured(&split, None, &HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::NonZeroExitStatus { .. }));

        let ignored = split_command_line("-false").unwrap().unwrap();
        let status = execute_inherited(&ignored, None, &HashMap::new()).await.unwrap();
        assert!(!status.success());
    }

    #[tokio::test]
    async fn test_missing_program() {
        let split = split_command_line("definitely-not-a-real-program-hrun").unwrap().unwrap();
        let err = execute_captured(&split, None, &HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::CommandFailed(..)));
    }
}
