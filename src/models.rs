// src/models.rs

use crate::core::schema::UndeclaredKeys;
use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

// --- TASK FILE MODELS ---
// These are what the user writes in `scripts/<name>.toml` (or `.json`).

/// One command line or a sequence of them.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum Runnable {
    Sequence(Vec<String>),
    Single(String),
}

impl Runnable {
    pub fn lines(&self) -> Vec<String> {
        match self {
            Runnable::Sequence(lines) => lines.clone(),
            Runnable::Single(line) => vec![line.clone()],
        }
    }
}

/// A binding with a `run` key.
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct TaskDefinition {
    pub run: Runnable,
    #[serde(default, alias = "desc")]
    pub description: Option<String>,
    /// Working directory for the commands, relative to where `hr` runs.
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    /// Per-platform replacements for `run`.
    #[serde(default)]
    pub windows: Option<Runnable>,
    #[serde(default)]
    pub linux: Option<Runnable>,
    #[serde(default)]
    pub macos: Option<Runnable>,
    /// Declared options. Present means the task is strict.
    #[serde(default)]
    pub options: Option<IndexMap<String, Value>>,
}

impl TaskDefinition {
    /// The command lines to run on the current platform.
    pub fn lines_for_current_platform(&self) -> Vec<String> {
        let platform = if cfg!(target_os = "windows") {
            &self.windows
        } else if cfg!(target_os = "macos") {
            &self.macos
        } else if cfg!(target_os = "linux") {
            &self.linux
        } else {
            &None
        };
        platform.as_ref().unwrap_or(&self.run).lines()
    }
}

/// The declared type of an option.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Any,
    String,
    Number,
    Integer,
    Boolean,
    Date,
    Choice,
    List,
    Record,
}

impl FieldType {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "any" => FieldType::Any,
            "string" => FieldType::String,
            "number" => FieldType::Number,
            "integer" => FieldType::Integer,
            "boolean" => FieldType::Boolean,
            "date" => FieldType::Date,
            "list" => FieldType::List,
            "record" => FieldType::Record,
            _ => return None,
        })
    }
}

/// An option declaration: `"string?"` or a full table.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum FieldDefinition {
    Short(String),
    Detailed(Box<DetailedField>),
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct DetailedField {
    #[serde(rename = "type")]
    pub kind: Option<FieldType>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub default: Option<Value>,
    /// Numeric bounds.
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Length bounds, in characters for strings and elements for lists.
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<String>,
    #[serde(default)]
    pub choices: Vec<String>,
    pub items: Option<FieldDefinition>,
    #[serde(default)]
    pub fields: IndexMap<String, FieldDefinition>,
    pub undeclared: Option<UndeclaredKeys>,
    #[serde(default, alias = "desc")]
    pub description: Option<String>,
}

lazy_static! {
    // `type`, `type?`, `type[]`, `type[]?`
    static ref SHORT_TYPE_RE: Regex =
        Regex::new(r"^\s*([a-z]+)\s*(\[\])?\s*(\?)?\s*$").expect("valid short type regex");
}

/// A short type string, parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortType {
    pub kind: FieldType,
    /// `Some(item)` for `item[]`.
    pub item: Option<FieldType>,
    pub optional: bool,
}

impl ShortType {
    pub fn parse(text: &str) -> Option<Self> {
        let caps = SHORT_TYPE_RE.captures(text)?;
        let named = FieldType::from_name(caps.get(1)?.as_str())?;
        let optional = caps.get(3).is_some();
        if caps.get(2).is_some() {
            return Some(Self {
                kind: FieldType::List,
                item: Some(named),
                optional,
            });
        }
        Some(Self {
            kind: named,
            item: None,
            optional,
        })
    }
}

// MARK: --- UNIT TESTS ---
