// src/core/schema.rs

//! # Schema Merge & Validation Engine
//!
//! Strict tasks describe their options with a schema. The engine depends only
//! on two capability traits:
//!
//! - **`Schema`**: validate a candidate value and list declared fields.
//! - **`ExtendSchema`**: build the baseline (`_` and `env`), merge a task's
//!   declaration over it, and close it so undeclared keys are rejected.
//!
//! `ObjectSchema` is the built-in implementation. Coercions (numeric strings,
//! `"true"`/`"false"`, dates) are declared per field through `FieldKind`, never
//! hardcoded by the engine, and they are idempotent: validating an already
//! validated value yields the same value.

use crate::constants::{ENV_KEY, POSITIONALS_KEY};
use crate::core::issues::{IssueKind, LengthUnit, ValidationIssue};
use chrono::{DateTime, NaiveDate};
use indexmap::IndexMap;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Number, Value, json};
use std::fmt;

/// The outcome of a validation run: the coerced value, or every issue found.
pub type Validation = Result<Value, Vec<ValidationIssue>>;

/// A declared property, as exposed for help output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    pub name: String,
    pub optional: bool,
    pub description: Option<String>,
}

/// Validation capability shared by every schema backend.
pub trait Schema: fmt::Debug + Send + Sync {
    /// Validates `input`, collecting all issues instead of stopping at the first.
    fn validate(&self, input: &Value) -> Validation;

    /// The declared fields, in declaration order. Empty for schemas that do
    /// not describe an object.
    fn fields(&self) -> Vec<FieldInfo>;

    fn description(&self) -> Option<&str> {
        None
    }
}

/// Merge capability used to build the schema of a strict task.
pub trait ExtendSchema: Schema + Sized {
    /// The fields every task receives: `_` and `env`.
    fn baseline() -> Self;

    /// Unions `extension` into `self`; on a name collision the extension wins.
    fn merge(&self, extension: &Self) -> Self;

    /// Makes the schema closed: any undeclared key becomes an issue.
    fn reject_undeclared(self) -> Self;
}

/// What an object schema does with keys it does not declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UndeclaredKeys {
    /// Pass them through to the output.
    #[default]
    Keep,
    /// Drop them silently.
    Strip,
    /// Report each one as an unrecognized key.
    Reject,
}

/// Optional inclusive bounds.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds<T> {
    pub min: Option<T>,
    pub max: Option<T>,
}

/// The constraint (and coercion) applied to a single value.
#[derive(Debug, Clone)]
pub enum FieldKind {
    Any,
    String {
        length: Bounds<usize>,
        pattern: Option<Regex>,
    },
    /// Accepts numbers and numeric strings.
    Number { range: Bounds<f64> },
    /// Like `Number`, but only integral values.
    Integer { range: Bounds<f64> },
    /// Accepts booleans and the strings `true`/`false` (any case).
    Boolean,
    /// Accepts `YYYY-MM-DD` or RFC 3339 strings and normalizes them.
    Date,
    Choice(Vec<String>),
    List {
        item: Box<FieldKind>,
        length: Bounds<usize>,
    },
    Record(ObjectSchema),
}

impl FieldKind {
    pub fn string() -> Self {
        FieldKind::String {
            length: Bounds::default(),
            pattern: None,
        }
    }

    pub fn number() -> Self {
        FieldKind::Number {
            range: Bounds::default(),
        }
    }

    pub fn integer() -> Self {
        FieldKind::Integer {
            range: Bounds::default(),
        }
    }

    pub fn choice<I, S>(choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldKind::Choice(choices.into_iter().map(Into::into).collect())
    }

    pub fn list(item: FieldKind) -> Self {
        FieldKind::List {
            item: Box::new(item),
            length: Bounds::default(),
        }
    }

    pub fn record(schema: ObjectSchema) -> Self {
        FieldKind::Record(schema)
    }

    /// Lower bound for numbers.
    pub fn at_least(mut self, minimum: f64) -> Self {
        if let FieldKind::Number { range } | FieldKind::Integer { range } = &mut self {
            range.min = Some(minimum);
        }
        self
    }

    /// Upper bound for numbers.
    pub fn at_most(mut self, maximum: f64) -> Self {
        if let FieldKind::Number { range } | FieldKind::Integer { range } = &mut self {
            range.max = Some(maximum);
        }
        self
    }

    /// Minimum length of strings (characters) or lists (elements).
    pub fn min_len(mut self, minimum: usize) -> Self {
        if let FieldKind::String { length, .. } | FieldKind::List { length, .. } = &mut self {
            length.min = Some(minimum);
        }
        self
    }

    /// Maximum length of strings (characters) or lists (elements).
    pub fn max_len(mut self, maximum: usize) -> Self {
        if let FieldKind::String { length, .. } | FieldKind::List { length, .. } = &mut self {
            length.max = Some(maximum);
        }
        self
    }

    pub fn matching(mut self, regex: Regex) -> Self {
        if let FieldKind::String { pattern, .. } = &mut self {
            *pattern = Some(regex);
        }
        self
    }

    /// A noun phrase for what this kind accepts, used in issue messages.
    pub fn expected(&self) -> String {
        match self {
            FieldKind::Any => "defined".to_string(),
            FieldKind::String { .. } => "a string".to_string(),
            FieldKind::Number { .. } => "a number".to_string(),
            FieldKind::Integer { .. } => "an integer".to_string(),
            FieldKind::Boolean => "a boolean".to_string(),
            FieldKind::Date => "a date".to_string(),
            FieldKind::Choice(choices) => {
                let choices = choices
                    .iter()
                    .map(|choice| format!("\"{choice}\""))
                    .collect::<Vec<_>>()
                    .join(" | ");
                format!("one of {choices}")
            }
            FieldKind::List { .. } => "an array".to_string(),
            FieldKind::Record(_) => "an object".to_string(),
        }
    }

    /// Checks `value` at `path`. Returns the coerced value, or `None` after
    /// pushing at least one issue.
    fn check(&self, value: &Value, path: &[String], issues: &mut Vec<ValidationIssue>) -> Option<Value> {
        let mut fail = |kind: IssueKind| {
            issues.push(ValidationIssue::new(path.to_vec(), kind));
            None
        };
        let wrong_type = |expected: String| IssueKind::WrongType {
            expected,
            actual: describe_value(value),
        };

        match self {
            FieldKind::Any => Some(value.clone()),
            FieldKind::String { length, pattern } => {
                let Value::String(text) = value else {
                    return fail(wrong_type(self.expected()));
                };
                let count = text.chars().count();
                if let Some(minimum) = length.min.filter(|minimum| count < *minimum) {
                    return fail(IssueKind::TooShort {
                        minimum,
                        actual: count,
                        unit: LengthUnit::Characters,
                    });
                }
                if let Some(maximum) = length.max.filter(|maximum| count > *maximum) {
                    return fail(IssueKind::TooLong {
                        maximum,
                        actual: count,
                        unit: LengthUnit::Characters,
                    });
                }
                if let Some(regex) = pattern.as_ref().filter(|regex| !regex.is_match(text)) {
                    return fail(IssueKind::PatternMismatch {
                        pattern: regex.as_str().to_string(),
                        actual: describe_value(value),
                    });
                }
                Some(value.clone())
            }
            FieldKind::Number { range } | FieldKind::Integer { range } => {
                let Some(number) = coerce_number(value) else {
                    return fail(wrong_type(self.expected()));
                };
                if matches!(self, FieldKind::Integer { .. }) && !(number.is_i64() || number.is_u64()) {
                    return fail(wrong_type(self.expected()));
                }
                let Some(actual) = number.as_f64() else {
                    return fail(wrong_type(self.expected()));
                };
                if let Some(minimum) = range.min.filter(|minimum| actual < *minimum) {
                    return fail(IssueKind::BelowMinimum { minimum, actual });
                }
                if let Some(maximum) = range.max.filter(|maximum| actual > *maximum) {
                    return fail(IssueKind::AboveMaximum { maximum, actual });
                }
                Some(Value::Number(number))
            }
            FieldKind::Boolean => match value {
                Value::Bool(_) => Some(value.clone()),
                Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
                    "true" => Some(Value::Bool(true)),
                    "false" => Some(Value::Bool(false)),
                    _ => fail(wrong_type(self.expected())),
                },
                _ => fail(wrong_type(self.expected())),
            },
            FieldKind::Date => match value.as_str().and_then(normalize_date) {
                Some(date) => Some(Value::String(date)),
                None => fail(wrong_type(self.expected())),
            },
            FieldKind::Choice(choices) => match value {
                Value::String(text) if choices.contains(text) => Some(value.clone()),
                _ => fail(IssueKind::InvalidChoice {
                    choices: choices.clone(),
                    actual: describe_value(value),
                }),
            },
            FieldKind::List { item, length } => {
                let Value::Array(elements) = value else {
                    return fail(wrong_type(self.expected()));
                };
                let before = issues.len();
                let count = elements.len();
                if let Some(minimum) = length.min.filter(|minimum| count < *minimum) {
                    issues.push(ValidationIssue::new(
                        path.to_vec(),
                        IssueKind::TooShort {
                            minimum,
                            actual: count,
                            unit: LengthUnit::Elements,
                        },
                    ));
                }
                if let Some(maximum) = length.max.filter(|maximum| count > *maximum) {
                    issues.push(ValidationIssue::new(
                        path.to_vec(),
                        IssueKind::TooLong {
                            maximum,
                            actual: count,
                            unit: LengthUnit::Elements,
                        },
                    ));
                }
                let output: Vec<Value> = elements
                    .iter()
                    .enumerate()
                    .filter_map(|(index, element)| {
                        item.check(element, &child_path(path, &index.to_string()), issues)
                    })
                    .collect();
                (issues.len() == before).then_some(Value::Array(output))
            }
            FieldKind::Record(schema) => schema.check_object(value, path, issues),
        }
    }
}

impl Schema for FieldKind {
    fn validate(&self, input: &Value) -> Validation {
        let mut issues = Vec::new();
        match self.check(input, &[], &mut issues) {
            Some(value) if issues.is_empty() => Ok(value),
            _ => Err(issues),
        }
    }

    fn fields(&self) -> Vec<FieldInfo> {
        match self {
            FieldKind::Record(schema) => schema.fields(),
            _ => Vec::new(),
        }
    }
}

/// A named property of an [`ObjectSchema`].
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    kind: FieldKind,
    optional: bool,
    default: Option<Value>,
    description: Option<String>,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            optional: false,
            default: None,
            description: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Value inserted when the field is absent from the input.
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// A field may be omitted if it is optional or has a default.
    pub fn is_optional(&self) -> bool {
        self.optional || self.default.is_some()
    }
}

/// An object-shaped schema: ordered fields plus a policy for undeclared keys.
#[derive(Debug, Clone, Default)]
pub struct ObjectSchema {
    fields: IndexMap<String, Field>,
    undeclared: UndeclaredKeys,
    values: Option<Box<FieldKind>>,
    description: Option<String>,
}

impl ObjectSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `field`, replacing any earlier field with the same name.
    pub fn field(mut self, field: Field) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }

    pub fn undeclared(mut self, policy: UndeclaredKeys) -> Self {
        self.undeclared = policy;
        self
    }

    /// Constraint applied to undeclared keys that are kept.
    pub fn values(mut self, kind: FieldKind) -> Self {
        self.values = Some(Box::new(kind));
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn declared(&self) -> impl Iterator<Item = &Field> {
        self.fields.values()
    }

    pub fn undeclared_policy(&self) -> UndeclaredKeys {
        self.undeclared
    }

    fn check_object(
        &self,
        value: &Value,
        path: &[String],
        issues: &mut Vec<ValidationIssue>,
    ) -> Option<Value> {
        let Value::Object(input) = value else {
            issues.push(ValidationIssue::new(
                path.to_vec(),
                IssueKind::WrongType {
                    expected: "an object".to_string(),
                    actual: describe_value(value),
                },
            ));
            return None;
        };

        let before = issues.len();
        let mut output = Map::with_capacity(input.len().max(self.fields.len()));

        for (name, field) in &self.fields {
            let field_path = child_path(path, name);
            match input.get(name) {
                Some(candidate) => {
                    if let Some(coerced) = field.kind.check(candidate, &field_path, issues) {
                        output.insert(name.clone(), coerced);
                    }
                }
                None => match &field.default {
                    // Defaults go through the same coercion as supplied values.
                    Some(default) => {
                        if let Some(coerced) = field.kind.check(default, &field_path, issues) {
                            output.insert(name.clone(), coerced);
                        }
                    }
                    None if field.optional => {}
                    None => issues.push(ValidationIssue::new(
                        field_path,
                        IssueKind::Missing {
                            expected: field.kind.expected(),
                        },
                    )),
                },
            }
        }

        for (name, candidate) in input.iter().filter(|(name, _)| !self.fields.contains_key(*name)) {
            match self.undeclared {
                UndeclaredKeys::Keep => {
                    let kept = match &self.values {
                        Some(kind) => kind.check(candidate, &child_path(path, name), issues),
                        None => Some(candidate.clone()),
                    };
                    if let Some(kept) = kept {
                        output.insert(name.clone(), kept);
                    }
                }
                UndeclaredKeys::Strip => {
                    log::trace!("Stripping undeclared key '{}'.", name);
                }
                UndeclaredKeys::Reject => issues.push(ValidationIssue::new(
                    child_path(path, name),
                    IssueKind::UnrecognizedKey,
                )),
            }
        }

        (issues.len() == before).then_some(Value::Object(output))
    }
}

impl Schema for ObjectSchema {
    fn validate(&self, input: &Value) -> Validation {
        let mut issues = Vec::new();
        let outcome = self.check_object(input, &[], &mut issues);
        log::debug!("Validation finished with {} issue(s).", issues.len());
        match outcome {
            Some(value) if issues.is_empty() => Ok(value),
            _ => Err(issues),
        }
    }

    fn fields(&self) -> Vec<FieldInfo> {
        self.fields
            .values()
            .map(|field| FieldInfo {
                name: field.name.clone(),
                optional: field.is_optional(),
                description: field.description.clone(),
            })
            .collect()
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

impl ExtendSchema for ObjectSchema {
    fn baseline() -> Self {
        let positionals = Field::new(POSITIONALS_KEY, FieldKind::list(FieldKind::string()))
            .with_default(json!([]));
        let environment = Field::new(
            ENV_KEY,
            FieldKind::record(ObjectSchema::new().values(FieldKind::string())),
        )
        .with_default(json!({}));

        ObjectSchema::new().field(positionals).field(environment)
    }

    fn merge(&self, extension: &Self) -> Self {
        let mut merged = self.clone();
        for field in extension.fields.values() {
            merged.fields.insert(field.name.clone(), field.clone());
        }
        if extension.description.is_some() {
            merged.description = extension.description.clone();
        }
        merged
    }

    fn reject_undeclared(self) -> Self {
        self.undeclared(UndeclaredKeys::Reject)
    }
}

fn child_path(path: &[String], segment: &str) -> Vec<String> {
    let mut child = Vec::with_capacity(path.len() + 1);
    child.extend_from_slice(path);
    child.push(segment.to_string());
    child
}

fn describe_value(value: &Value) -> String {
    match value {
        Value::Array(_) => "an array".to_string(),
        Value::Object(_) => "an object".to_string(),
        scalar => scalar.to_string(),
    }
}

fn coerce_number(value: &Value) -> Option<Number> {
    match value {
        Value::Number(number) => Some(number.clone()),
        Value::String(text) => {
            let text = text.trim();
            if text.is_empty() {
                return None;
            }
            if let Ok(integer) = text.parse::<i64>() {
                return Some(Number::from(integer));
            }
            text.parse::<f64>().ok().and_then(Number::from_f64)
        }
        _ => None,
    }
}

fn normalize_date(text: &str) -> Option<String> {
    let text = text.trim();
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date.format("%Y-%m-%d").to_string());
    }
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|datetime| datetime.to_rfc3339())
}

// MARK: --- UNIT TESTS ---
