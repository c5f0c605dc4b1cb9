// src/core/arg_parser.rs

use crate::constants::{OPTION_TERMINATOR, POSITIONALS_KEY, is_reserved};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenizationError {
    #[error("Expected option {option} to be followed by a value")]
    MissingValue { option: String },
    #[error("Expected value for option {option}, found {found}")]
    ExpectedValue { option: String, found: String },
    #[error("Reserved name '{name}' cannot be used as option")]
    ReservedName { name: String },
}

/// A lexical token of an argv-like list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// `--name`, `--name=value`, `-n` or one letter of a `-abc` group.
    Option {
        name: String,
        raw_name: String,
        inline_value: Option<String>,
    },
    Positional(String),
    /// The first bare `--`.
    Terminator,
}

impl Token {
    fn raw(&self) -> &str {
        match self {
            Token::Option { raw_name, .. } => raw_name,
            Token::Positional(value) => value,
            Token::Terminator => OPTION_TERMINATOR,
        }
    }
}

/// Options parsed from the command line: positionals plus one string value per
/// named option. A repeated option keeps its last value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedOptions {
    pub positionals: Vec<String>,
    pub named: IndexMap<String, String>,
}

impl ParsedOptions {
    /// Returns the value given for `--name`, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.named.get(name).map(String::as_str)
    }

    /// Converts the options into the record handed to tasks:
    /// `{ "_": [...], "name": "value", ... }`.
    pub fn to_value(&self) -> Value {
        let mut record = Map::with_capacity(self.named.len() + 1);
        record.insert(
            POSITIONALS_KEY.to_string(),
            Value::Array(
                self.positionals
                    .iter()
                    .cloned()
                    .map(Value::String)
                    .collect(),
            ),
        );
        for (name, value) in &self.named {
            record.insert(name.clone(), Value::String(value.clone()));
        }
        Value::Object(record)
    }
}

/// Splits raw arguments into tokens.
///
/// # Logic:
/// - The first `--` is a terminator; every token after it is positional.
/// - `--name` is a long option, `--name=value` carries its value inline.
/// - `-x` is a short option and `-xyz` expands into `-x -y -z`.
/// - A lone `-` and anything else is positional.
pub fn tokenize<S: AsRef<str>>(args: &[S]) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(args.len());
    let mut terminated = false;

    for arg in args.iter().map(AsRef::as_ref) {
        if terminated {
            tokens.push(Token::Positional(arg.to_string()));
            continue;
        }

        if arg == OPTION_TERMINATOR {
            terminated = true;
            tokens.push(Token::Terminator);
        } else if let Some(body) = arg.strip_prefix("--") {
            let (name, inline_value) = match body.split_once('=') {
                Some((name, value)) => (name, Some(value.to_string())),
                None => (body, None),
            };
            tokens.push(Token::Option {
                name: name.to_string(),
                raw_name: format!("--{name}"),
                inline_value,
            });
        } else if let Some(group) = arg.strip_prefix('-').filter(|rest| !rest.is_empty()) {
            for letter in group.chars() {
                tokens.push(Token::Option {
                    name: letter.to_string(),
                    raw_name: format!("-{letter}"),
                    inline_value: None,
                });
            }
        } else {
            tokens.push(Token::Positional(arg.to_string()));
        }
    }

    tokens
}

/// Parses task arguments into [`ParsedOptions`].
///
/// Every option must be given a value: either inline (`--name=value`) or as
/// the next token. There are no boolean flags; coercion is left to the task's
/// schema.
pub fn parse_options<S: AsRef<str>>(args: &[S]) -> Result<ParsedOptions, TokenizationError> {
    let mut options = ParsedOptions::default();
    let mut tokens = tokenize(args).into_iter().peekable();

    while let Some(token) = tokens.next() {
        match token {
            Token::Terminator => continue,
            Token::Positional(value) => options.positionals.push(value),
            Token::Option {
                name,
                raw_name,
                inline_value,
            } => {
                if is_reserved(&name) {
                    return Err(TokenizationError::ReservedName { name });
                }

                let value = match inline_value {
                    Some(value) => value,
                    None => match tokens.next_if(|next| matches!(next, Token::Positional(_))) {
                        Some(Token::Positional(value)) => value,
                        _ => {
                            return Err(match tokens.peek() {
                                Some(other) => TokenizationError::ExpectedValue {
                                    option: raw_name,
                                    found: other.raw().to_string(),
                                },
                                None => TokenizationError::MissingValue { option: raw_name },
                            });
                        }
                    },
                };

                if options.named.contains_key(&name) {
                    log::debug!("Option '{}' given more than once; keeping the last value.", raw_name);
                }
                options.named.insert(name, value);
            }
        }
    }

    Ok(options)
}

// MARK: --- UNIT TESTS ---
