// src/core/issues.rs

//! Validation issues and their user-facing rendering.

use crate::constants::{ENV_KEY, POSITIONALS_KEY};
use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// What went wrong with a single value.
#[derive(Debug, Clone, PartialEq)]
pub enum IssueKind {
    /// A required field was absent.
    Missing { expected: String },
    /// The value has the wrong shape or cannot be coerced.
    WrongType { expected: String, actual: String },
    BelowMinimum { minimum: f64, actual: f64 },
    AboveMaximum { maximum: f64, actual: f64 },
    TooShort { minimum: usize, actual: usize, unit: LengthUnit },
    TooLong { maximum: usize, actual: usize, unit: LengthUnit },
    /// A string did not match the declared pattern.
    PatternMismatch { pattern: String, actual: String },
    /// A string was not one of the allowed choices.
    InvalidChoice { choices: Vec<String>, actual: String },
    /// The key is not declared by a closed schema.
    UnrecognizedKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthUnit {
    Characters,
    Elements,
}

impl IssueKind {
    /// A stable discriminator for the kind of failure.
    pub fn code(&self) -> &'static str {
        match self {
            IssueKind::Missing { .. } => "missing",
            IssueKind::WrongType { .. } => "wrong-type",
            IssueKind::BelowMinimum { .. }
            | IssueKind::AboveMaximum { .. }
            | IssueKind::TooShort { .. }
            | IssueKind::TooLong { .. } => "out-of-range",
            IssueKind::PatternMismatch { .. } | IssueKind::InvalidChoice { .. } => "invalid-value",
            IssueKind::UnrecognizedKey => "unrecognized-key",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueKind::Missing { expected } => write!(f, "must be {expected} (was missing)"),
            IssueKind::WrongType { expected, actual } => {
                write!(f, "must be {expected} (was {actual})")
            }
            IssueKind::BelowMinimum { minimum, actual } => {
                write!(f, "must be at least {minimum} (was {actual})")
            }
            IssueKind::AboveMaximum { maximum, actual } => {
                write!(f, "must be at most {maximum} (was {actual})")
            }
            IssueKind::TooShort {
                minimum,
                actual,
                unit: LengthUnit::Elements,
            } => write!(f, "must contain at least {minimum} element(s) (was {actual})"),
            IssueKind::TooShort {
                minimum,
                actual,
                unit: LengthUnit::Characters,
            } => write!(f, "must be at least {minimum} character(s) long (was {actual})"),
            IssueKind::TooLong {
                maximum,
                actual,
                unit: LengthUnit::Elements,
            } => write!(f, "must contain at most {maximum} element(s) (was {actual})"),
            IssueKind::TooLong {
                maximum,
                actual,
                unit: LengthUnit::Characters,
            } => write!(f, "must be at most {maximum} character(s) long (was {actual})"),
            IssueKind::PatternMismatch { pattern, actual } => {
                write!(f, "must match /{pattern}/ (was {actual})")
            }
            IssueKind::InvalidChoice { choices, actual } => {
                let choices = choices
                    .iter()
                    .map(|choice| format!("\"{choice}\""))
                    .collect::<Vec<_>>()
                    .join(" | ");
                write!(f, "must be one of {choices} (was {actual})")
            }
            IssueKind::UnrecognizedKey => write!(f, "must be removed"),
        }
    }
}

/// One failed check, located by its path inside the validated input.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationIssue {
    pub path: Vec<String>,
    pub kind: IssueKind,
}

impl ValidationIssue {
    pub fn new(path: Vec<String>, kind: IssueKind) -> Self {
        Self { path, kind }
    }

    /// The path joined with dots, e.g. `env.SOME_FLAG`.
    pub fn dotted_path(&self) -> String {
        self.path.join(".")
    }
}

/// Renders the issue as `<dotted.path> <description>`.
impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{} {}", self.dotted_path(), self.kind)
        }
    }
}

/// Raised by strict tasks when their options fail validation.
/// Displays as the formatted, newline-separated list of issues.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{}", format_issues(.issues))]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn new(issues: Vec<ValidationIssue>) -> Self {
        Self { issues }
    }
}

/// Converts issues into user-facing messages, one line per issue, in the order
/// they were produced.
///
/// Field names are rendered the way the user typed them: `Positionals` for
/// `_`, `Environment variable 'NAME'` for `env.NAME`, and `--name` for
/// anything else. Names are highlighted to set them apart from the message.
pub fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(format_issue)
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_issue(issue: &ValidationIssue) -> String {
    let description = issue.to_string();
    let Some(property) = issue.path.first() else {
        return description;
    };

    let field_name = match property.as_str() {
        POSITIONALS_KEY => "Positionals".to_string(),
        ENV_KEY => match issue.path.get(1) {
            Some(variable) => format!("Environment variable '{variable}'"),
            None => "Environment variables".to_string(),
        },
        other => format!("--{other}"),
    };

    if issue.kind == IssueKind::UnrecognizedKey {
        return format!("{}: unknown option", field_name.red());
    }

    let dotted_path = issue.dotted_path();
    let message = description
        .strip_prefix(dotted_path.as_str())
        .map(str::trim_start)
        .unwrap_or(&description);

    format!("{}: {}", field_name.red(), message)
}

// MARK: --- UNIT TESTS ---

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(path: &[&str], kind: IssueKind) -> ValidationIssue {
        ValidationIssue::new(path.iter().map(|s| s.to_string()).collect(), kind)
    }

    fn missing_string() -> IssueKind {
        IssueKind::Missing {
            expected: "a string".to_string(),
        }
    }

    #[test]
    fn test_display_prefixes_dotted_path() {
        let issue = issue(&["env", "SOME_FLAG"], missing_string());
        assert_eq!(
            issue.to_string(),
            "env.SOME_FLAG must be a string (was missing)"
        );
    }

    #[test]
    fn test_format_named_option() {
        colored::control::set_override(false);
        let formatted = format_issues(&[issue(
            &["armorClass"],
            IssueKind::BelowMinimum {
                minimum: 1.0,
                actual: 0.0,
            },
        )]);
        assert_eq!(formatted, "--armorClass: must be at least 1 (was 0)");
    }

    #[test]
    fn test_format_positionals() {
        colored::control::set_override(false);
        let formatted = format_issues(&[issue(
            &["_"],
            IssueKind::TooShort {
                minimum: 1,
                actual: 0,
                unit: LengthUnit::Elements,
            },
        )]);
        assert_eq!(
            formatted,
            "Positionals: must contain at least 1 element(s) (was 0)"
        );
    }

    #[test]
    fn test_format_environment_variable() {
        colored::control::set_override(false);
        let formatted = format_issues(&[issue(&["env", "SOME_FLAG"], missing_string())]);
        assert_eq!(
            formatted,
            "Environment variable 'SOME_FLAG': must be a string (was missing)"
        );
        assert!(!formatted.contains("--SOME_FLAG"));
    }

    #[test]
    fn test_format_unknown_option() {
        colored::control::set_override(false);
        let formatted = format_issues(&[issue(&["verbose"], IssueKind::UnrecognizedKey)]);
        assert_eq!(formatted, "--verbose: unknown option");
    }

    #[test]
    fn test_format_joins_issues_in_order() {
        colored::control::set_override(false);
        let formatted = format_issues(&[
            issue(&["name"], missing_string()),
            issue(&["extra"], IssueKind::UnrecognizedKey),
            issue(
                &["mode"],
                IssueKind::InvalidChoice {
                    choices: vec!["fast".to_string(), "slow".to_string()],
                    actual: "\"medium\"".to_string(),
                },
            ),
        ]);
        let lines: Vec<_> = formatted.lines().collect();
        assert_eq!(
            lines,
            vec![
                "--name: must be a string (was missing)",
                "--extra: unknown option",
                "--mode: must be one of \"fast\" | \"slow\" (was \"medium\")",
            ]
        );
    }

    #[test]
    fn test_format_issue_without_path() {
        let formatted = format_issues(&[issue(
            &[],
            IssueKind::WrongType {
                expected: "an object".to_string(),
                actual: "a string".to_string(),
            },
        )]);
        assert_eq!(formatted, "must be an object (was a string)");
    }

    #[test]
    fn test_issue_codes() {
        assert_eq!(missing_string().code(), "missing");
        assert_eq!(IssueKind::UnrecognizedKey.code(), "unrecognized-key");
        assert_eq!(
            IssueKind::AboveMaximum {
                maximum: 3.0,
                actual: 4.0
            }
            .code(),
            "out-of-range"
        );
    }

    #[test]
    fn test_validation_error_displays_formatted_issues() {
        colored::control::set_override(false);
        let error = ValidationError::new(vec![issue(&["port"], missing_string())]);
        assert_eq!(error.to_string(), "--port: must be a string (was missing)");
    }
}
