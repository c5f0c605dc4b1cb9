// src/core/template.rs

use crate::core::options::Options;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde_json::Value;
use thiserror::Error;

lazy_static! {
    static ref PLACEHOLDER_RE: Regex =
        Regex::new(r"\{\{\s*([A-Za-z0-9_][A-Za-z0-9_.\-]*)\s*\}\}").expect("valid placeholder regex");
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Value of '{{{{{placeholder}}}}}' cannot be quoted for the shell (it contains a NUL byte)")]
    Unquotable { placeholder: String },
}

/// Renders `{{path}}` placeholders in a command line against `options`.
///
/// - `{{name}}` → the value of `--name`,
/// - `{{_}}` → every positional, each quoted, separated by spaces,
/// - `{{_.0}}`, `{{env.HOME}}`, `{{record.key}}` → nested values.
///
/// Strings are shell-quoted so the rendered line splits back into the same
/// words. Absent values render as nothing.
pub fn render(template: &str, options: &Options) -> Result<String, TemplateError> {
    let mut failure = None;

    let rendered = PLACEHOLDER_RE.replace_all(template, |caps: &Captures<'_>| {
        let path = caps.get(1).map_or("", |m| m.as_str());
        match options.lookup(path) {
            Some(value) => render_value(value).unwrap_or_else(|| {
                failure.get_or_insert_with(|| TemplateError::Unquotable {
                    placeholder: path.to_string(),
                });
                String::new()
            }),
            None => {
                log::debug!("Placeholder '{{{{{}}}}}' has no value; rendering it empty.", path);
                String::new()
            }
        }
    });

    match failure {
        Some(error) => Err(error),
        None => Ok(rendered.into_owned()),
    }
}

/// Renders a single value, or `None` if a string cannot be quoted.
fn render_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::String(text) => quote(text),
        Value::Array(values) => values
            .iter()
            .map(render_value)
            .collect::<Option<Vec<_>>>()
            .map(|parts| parts.join(" ")),
        Value::Object(_) => quote(&value.to_string()),
    }
}

fn quote(text: &str) -> Option<String> {
    shlex::try_quote(text).ok().map(|quoted| quoted.into_owned())
}

// MARK: --- UNIT TESTS ---
