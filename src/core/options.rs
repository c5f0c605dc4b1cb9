// src/core/options.rs

use crate::constants::{ENV_KEY, POSITIONALS_KEY};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A read-only snapshot of environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment(BTreeMap<String, String>);

impl Environment {
    /// Captures the current process environment. Variables whose name or
    /// value is not valid UTF-8 are converted lossily.
    pub fn capture() -> Self {
        std::env::vars_os()
            .map(|(name, value)| {
                (
                    name.to_string_lossy().into_owned(),
                    value.to_string_lossy().into_owned(),
                )
            })
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(name, value)| (name.clone(), Value::String(value.clone())))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Environment {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }
}

/// The options record a task body receives.
///
/// Loose tasks see the raw strings from the command line plus `_` and `env`;
/// strict tasks see the validated value with defaults and coercions applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Options(Map<String, Value>);

impl Options {
    /// Wraps `value`. Anything other than an object yields empty options.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(record) => Self(record),
            other => {
                log::warn!("Task options must be an object, got: {}", other);
                Self::default()
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The value of `key` if it is a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Positional arguments, skipping any non-string entries.
    pub fn positionals(&self) -> Vec<&str> {
        self.get(POSITIONALS_KEY)
            .and_then(Value::as_array)
            .map(|values| values.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// An environment variable from the attached `env` record.
    pub fn env_var(&self, name: &str) -> Option<&Value> {
        self.get(ENV_KEY).and_then(|env| env.get(name))
    }

    /// Looks up a dotted path such as `env.HOME` or `_.0`.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        segments.try_fold(self.get(first)?, |current, segment| match current {
            Value::Array(values) => segment
                .parse::<usize>()
                .ok()
                .and_then(|index| values.get(index)),
            Value::Object(record) => record.get(segment),
            _ => None,
        })
    }

    /// Deserializes the options into a typed struct.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.0.clone()))
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

// MARK: --- UNIT TESTS ---
