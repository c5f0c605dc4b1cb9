// src/core/task_file.rs

use crate::constants::{ENV_KEY, TASK_FILE_EXTENSIONS};
use crate::core::{
    options::Options,
    schema::{Field, FieldKind, ObjectSchema, Schema},
    task::{Export, TaskBody, TaskCollection, brand_loose, brand_strict},
};
use crate::models::{DetailedField, FieldDefinition, FieldType, ShortType, TaskDefinition};
use crate::system::utilities::TaskUtilities;
use regex::Regex;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::{fs, io};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error(
        "Found multiple task files with the name '{name}'\nRename the ambiguous files or specify an extension and try again\n{}",
        indented(.candidates)
    )]
    Ambiguous {
        name: String,
        candidates: Vec<PathBuf>,
    },
    #[error("Task file '{name}' was not found. Tried:\n{}", indented(.tried))]
    NotFound { name: String, tried: Vec<PathBuf> },
}

#[derive(Error, Debug)]
pub enum TaskFileError {
    #[error("Failed to load task file at path {}\n{source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to load task file at path {}\n{message}", .path.display())]
    Parse { path: PathBuf, message: String },
    #[error("Failed to load task file at path {}\nUnsupported extension (expected one of: {})", .path.display(), TASK_FILE_EXTENSIONS.join(", "))]
    UnsupportedExtension { path: PathBuf },
    #[error("Failed to load task file at path {}\nTask '{task}' is invalid: {message}", .path.display())]
    InvalidTask {
        path: PathBuf,
        task: String,
        message: String,
    },
    #[error("Failed to load task file at path {}\nTask '{task}' declares an invalid option '{option}': {message}", .path.display())]
    InvalidOption {
        path: PathBuf,
        task: String,
        option: String,
        message: String,
    },
}

fn indented(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| format!("    {}", path.display()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A loaded task file.
#[derive(Debug, Clone)]
pub struct TaskFile {
    pub path: PathBuf,
    pub collection: TaskCollection,
}

impl TaskFile {
    /// The file name without extension, e.g. `build`.
    pub fn name(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// The file name with extension, e.g. `build.toml`.
    pub fn base(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }
}

fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| TASK_FILE_EXTENSIONS.contains(&ext))
}

/// Resolves a task file identifier (a path with or without extension).
///
/// An identifier that already ends in a supported extension is returned as
/// is; otherwise every `<path>.<ext>` that exists is a candidate and exactly
/// one must exist.
pub fn resolve_task_file(path: &Path) -> Result<PathBuf, ResolutionError> {
    let name = path.to_string_lossy().into_owned();
    if has_supported_extension(path) {
        return if path.is_file() {
            Ok(path.to_path_buf())
        } else {
            Err(ResolutionError::NotFound {
                name,
                tried: vec![path.to_path_buf()],
            })
        };
    }

    let tried: Vec<PathBuf> = TASK_FILE_EXTENSIONS
        .iter()
        .map(|ext| {
            let mut candidate = path.as_os_str().to_owned();
            candidate.push(".");
            candidate.push(ext);
            PathBuf::from(candidate)
        })
        .collect();

    let mut candidates: Vec<PathBuf> = tried.iter().filter(|path| path.is_file()).cloned().collect();
    log::debug!("Task file '{}' candidates: {:?}", name, candidates);

    match candidates.len() {
        0 => Err(ResolutionError::NotFound { name, tried }),
        1 => Ok(candidates.remove(0)),
        _ => Err(ResolutionError::Ambiguous { name, candidates }),
    }
}

/// Lists the task files directly inside `dir`, sorted by name.
pub fn list_task_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| has_supported_extension(path))
        .collect();
    files.sort();
    files
}

/// Reads and parses the task file at `path`.
pub fn load_task_file(path: &Path) -> Result<TaskFile, TaskFileError> {
    let contents = fs::read_to_string(path).map_err(|source| TaskFileError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_task_file(path, &contents)
}

/// Parses task file `contents`; the format is chosen by the extension of `path`.
pub fn parse_task_file(path: &Path, contents: &str) -> Result<TaskFile, TaskFileError> {
    let parse_error = |message: String| TaskFileError::Parse {
        path: path.to_path_buf(),
        message,
    };

    let document: Value = match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => toml::from_str::<toml::Table>(contents)
            .map(|table| toml_to_json(toml::Value::Table(table)))
            .map_err(|e| parse_error(e.to_string()))?,
        Some("json") => serde_json::from_str(contents).map_err(|e| parse_error(e.to_string()))?,
        _ => {
            return Err(TaskFileError::UnsupportedExtension {
                path: path.to_path_buf(),
            });
        }
    };

    let Value::Object(bindings) = document else {
        return Err(parse_error("The top level must be a table of tasks".to_string()));
    };

    let mut collection = TaskCollection::new();
    for (name, value) in bindings {
        let export = build_export(path, &name, value)?;
        collection.insert(name, export);
    }
    log::debug!("Loaded {} export(s) from {}", collection.len(), path.display());

    Ok(TaskFile {
        path: path.to_path_buf(),
        collection,
    })
}

/// Converts a TOML document to JSON. Datetimes become their TOML text, so
/// `default = 2024-01-01` reads the same as `default = "2024-01-01"`.
fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(text) => Value::String(text),
        toml::Value::Integer(integer) => Value::from(integer),
        toml::Value::Float(float) => serde_json::Number::from_f64(float).map_or(Value::Null, Value::Number),
        toml::Value::Boolean(flag) => Value::Bool(flag),
        toml::Value::Datetime(datetime) => Value::String(datetime.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(key, item)| (key, toml_to_json(item)))
                .collect(),
        ),
    }
}

fn is_task_table(value: &Value) -> bool {
    value.as_object().is_some_and(|table| table.contains_key("run"))
}

fn build_export(path: &Path, name: &str, value: Value) -> Result<Export, TaskFileError> {
    if !is_task_table(&value) {
        return Ok(Export::Value(value));
    }

    let definition: TaskDefinition =
        serde_json::from_value(value).map_err(|e| TaskFileError::InvalidTask {
            path: path.to_path_buf(),
            task: name.to_string(),
            message: e.to_string(),
        })?;

    let body = command_body(definition.lines_for_current_platform(), definition.cwd.clone());

    let task = match &definition.options {
        None => brand_loose(body),
        Some(options) => {
            let mut schema = ObjectSchema::new();
            for (option, raw) in options {
                let field = build_option(option, raw).map_err(|message| TaskFileError::InvalidOption {
                    path: path.to_path_buf(),
                    task: name.to_string(),
                    option: option.clone(),
                    message,
                })?;
                schema = schema.field(field);
            }
            brand_strict(schema, body)
        }
    };

    Ok(match definition.description {
        Some(description) => Export::Task(task.with_description(description)),
        None => Export::Task(task),
    })
}

/// Runs each line with placeholders rendered against the task's options.
fn command_body(lines: Vec<String>, cwd: Option<PathBuf>) -> TaskBody {
    let lines = Arc::new(lines);
    TaskBody::from_async(move |options: Options, utilities: TaskUtilities| {
        let lines = Arc::clone(&lines);
        let utilities = match &cwd {
            Some(dir) => {
                let dir = utilities.cwd().map_or_else(|| dir.clone(), |base| base.join(dir));
                utilities.with_cwd(dir)
            }
            None => utilities,
        };
        async move {
            for line in lines.iter() {
                utilities.run_template_line(line, &options).await?;
            }
            Ok::<(), anyhow::Error>(())
        }
    })
}

fn build_option(name: &str, raw: &Value) -> Result<Field, String> {
    if name == ENV_KEY
        && let Value::Object(table) = raw
        && !table.contains_key("type")
    {
        return build_env_shorthand(table);
    }

    let definition: FieldDefinition =
        serde_json::from_value(raw.clone()).map_err(|_| format!("unrecognized definition {raw}"))?;
    build_field(name, &definition)
}

/// `env = { CI = "boolean?" }`: declared variables are checked, the rest are
/// kept and must be strings.
fn build_env_shorthand(table: &Map<String, Value>) -> Result<Field, String> {
    let mut schema = ObjectSchema::new().values(FieldKind::string());
    for (variable, raw) in table {
        let definition: FieldDefinition = serde_json::from_value(raw.clone())
            .map_err(|_| format!("unrecognized definition for '{variable}': {raw}"))?;
        schema = schema.field(build_field(variable, &definition)?);
    }
    Ok(Field::new(ENV_KEY, FieldKind::record(schema)))
}

fn build_field(name: &str, definition: &FieldDefinition) -> Result<Field, String> {
    match definition {
        FieldDefinition::Short(text) => {
            let (kind, optional) = short_kind(text)?;
            let field = Field::new(name, kind);
            Ok(if optional { field.optional() } else { field })
        }
        FieldDefinition::Detailed(detail) => {
            let kind = detailed_kind(detail)?;
            let mut field = Field::new(name, kind.clone());
            if detail.optional {
                field = field.optional();
            }
            if let Some(default) = &detail.default {
                let coerced = kind.validate(default).map_err(|issues| {
                    let reasons: Vec<String> = issues.iter().map(ToString::to_string).collect();
                    format!("invalid default {default}: {}", reasons.join("; "))
                })?;
                field = field.with_default(coerced);
            }
            if let Some(description) = &detail.description {
                field = field.describe(description.clone());
            }
            Ok(field)
        }
    }
}

fn definition_kind(definition: &FieldDefinition) -> Result<FieldKind, String> {
    match definition {
        FieldDefinition::Short(text) => short_kind(text).map(|(kind, _)| kind),
        FieldDefinition::Detailed(detail) => detailed_kind(detail),
    }
}

fn short_kind(text: &str) -> Result<(FieldKind, bool), String> {
    let short = ShortType::parse(text).ok_or_else(|| format!("unknown type '{text}'"))?;
    let kind = match short.item {
        Some(item) => FieldKind::list(plain_kind(item)?),
        None => plain_kind(short.kind)?,
    };
    Ok((kind, short.optional))
}

fn plain_kind(kind: FieldType) -> Result<FieldKind, String> {
    Ok(match kind {
        FieldType::Any => FieldKind::Any,
        FieldType::String => FieldKind::string(),
        FieldType::Number => FieldKind::number(),
        FieldType::Integer => FieldKind::integer(),
        FieldType::Boolean => FieldKind::Boolean,
        FieldType::Date => FieldKind::Date,
        FieldType::List => FieldKind::list(FieldKind::string()),
        FieldType::Record => FieldKind::record(ObjectSchema::new()),
        FieldType::Choice => return Err("type 'choice' needs a list of 'choices'".to_string()),
    })
}

fn detailed_kind(detail: &DetailedField) -> Result<FieldKind, String> {
    let declared = match detail.kind {
        Some(kind) => kind,
        None if !detail.choices.is_empty() => FieldType::Choice,
        None if !detail.fields.is_empty() => FieldType::Record,
        None => return Err("missing 'type'".to_string()),
    };

    let mut kind = match declared {
        FieldType::Choice if detail.choices.is_empty() => {
            return Err("type 'choice' needs a list of 'choices'".to_string());
        }
        FieldType::Choice => FieldKind::choice(detail.choices.iter().cloned()),
        FieldType::List => match &detail.items {
            Some(items) => FieldKind::list(definition_kind(items)?),
            None => FieldKind::list(FieldKind::string()),
        },
        FieldType::Record => {
            let mut schema = ObjectSchema::new().undeclared(detail.undeclared.unwrap_or_default());
            for (name, definition) in &detail.fields {
                schema = schema.field(build_field(name, definition)?);
            }
            FieldKind::record(schema)
        }
        other => plain_kind(other)?,
    };

    if let Some(minimum) = detail.min {
        kind = kind.at_least(minimum);
    }
    if let Some(maximum) = detail.max {
        kind = kind.at_most(maximum);
    }
    if let Some(minimum) = detail.min_length {
        kind = kind.min_len(minimum);
    }
    if let Some(maximum) = detail.max_length {
        kind = kind.max_len(maximum);
    }
    if let Some(pattern) = &detail.pattern {
        let regex = Regex::new(pattern).map_err(|e| format!("invalid pattern '{pattern}': {e}"))?;
        kind = kind.matching(regex);
    }
    Ok(kind)
}

// MARK: --- UNIT TESTS ---

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::task::{Task, TaskKind};
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    const BUILD_TOML: &str = r#"
version = "1.2.3"

[hello]
run = "echo hello {{name}}"
description = "Say hello"

[hello.options]
name = "string"
loud = "boolean?"

[clean]
run = ["-rm -rf target", "echo cleaned"]
desc = "Remove build output"

[meta]
owner = "ada"
"#;

    fn parse(name: &str, contents: &str) -> Result<TaskFile, TaskFileError> {
        parse_task_file(Path::new(name), contents)
    }

    fn strict_fields(file: &TaskFile, task: &str) -> Vec<(String, bool)> {
        file.collection[task]
            .as_task()
            .and_then(Task::schema)
            .map(|schema| {
                schema
                    .fields()
                    .into_iter()
                    .map(|field| (field.name, field.optional))
                    .collect()
            })
            .unwrap_or_default()
    }

    #[test]
    fn test_parses_tasks_and_values() {
        let file = parse("scripts/build.toml", BUILD_TOML).unwrap();
        assert_eq!(file.name(), "build");
        assert_eq!(file.base(), "build.toml");

        let names: Vec<&String> = file.collection.keys().collect();
        assert_eq!(names, vec!["version", "hello", "clean", "meta"]);

        assert!(matches!(&file.collection["version"], Export::Value(v) if v == &json!("1.2.3")));
        assert!(matches!(&file.collection["meta"], Export::Value(_)));

        let hello = file.collection["hello"].as_task().unwrap();
        assert_eq!(hello.kind(), TaskKind::StrictTask);
        assert_eq!(hello.description(), Some("Say hello"));

        let clean = file.collection["clean"].as_task().unwrap();
        assert_eq!(clean.kind(), TaskKind::Task);
        assert_eq!(clean.description(), Some("Remove build output"));
    }

    #[test]
    fn test_strict_schema_from_definitions() {
        let file = parse("scripts/build.toml", BUILD_TOML).unwrap();
        assert_eq!(
            strict_fields(&file, "hello"),
            vec![
                ("_".to_string(), true),
                ("env".to_string(), true),
                ("name".to_string(), false),
                ("loud".to_string(), true),
            ]
        );
    }

    #[test]
    fn test_json_task_file_with_detailed_options() {
        let file = parse(
            "deploy.json",
            r#"{
                "deploy": {
                    "run": "echo {{target}} {{replicas}}",
                    "options": {
                        "target": { "type": "choice", "choices": ["staging", "prod"] },
                        "replicas": { "type": "integer", "min": 1, "max": 9, "default": "2" },
                        "_": { "type": "list", "max_length": 1 }
                    }
                }
            }"#,
        )
        .unwrap();

        let strict = file.collection["deploy"]
            .as_task()
            .and_then(Task::as_strict)
            .unwrap();
        let parsed = strict
            .parse(&json!({ "_": [], "env": {}, "target": "prod" }))
            .unwrap();
        assert_eq!(parsed.get("replicas"), Some(&json!(2)));

        let issues = strict
            .safe_parse(&json!({ "_": ["a", "b"], "env": {}, "target": "dev" }))
            .unwrap_err();
        let paths: Vec<String> = issues.iter().map(|issue| issue.dotted_path()).collect();
        assert_eq!(paths, vec!["_", "target"]);
    }

    #[test]
    fn test_env_shorthand() {
        let file = parse(
            "ci.toml",
            r#"
            [check]
            run = "echo {{env.CI}}"
            options.env = { CI = "boolean" }
            "#,
        )
        .unwrap();
        let strict = file.collection["check"]
            .as_task()
            .and_then(Task::as_strict)
            .unwrap();

        let parsed = strict
            .parse(&json!({ "env": { "CI": "TRUE", "HOME": "/root" } }))
            .unwrap();
        assert_eq!(parsed.lookup("env.CI"), Some(&json!(true)));
        assert_eq!(parsed.lookup("env.HOME"), Some(&json!("/root")));

        let issues = strict.safe_parse(&json!({ "env": {} })).unwrap_err();
        assert_eq!(issues[0].dotted_path(), "env.CI");
    }

    #[test]
    fn test_invalid_definitions_are_reported() {
        let unknown = parse("x.toml", "[a]\nrun = \"echo\"\noptions = { n = \"strng\" }").unwrap_err();
        assert!(matches!(
            unknown,
            TaskFileError::InvalidOption { ref task, ref option, .. } if task == "a" && option == "n"
        ));

        let bad_default = parse(
            "x.toml",
            "[a]\nrun = \"echo\"\noptions = { n = { type = \"number\", default = \"many\" } }",
        )
        .unwrap_err();
        assert!(bad_default.to_string().contains("invalid default"));

        let bad_run = parse("x.toml", "[a]\nrun = 3").unwrap_err();
        assert!(matches!(bad_run, TaskFileError::InvalidTask { .. }));

        let bad_syntax = parse("x.toml", "[a\nrun = 1").unwrap_err();
        assert!(bad_syntax.to_string().starts_with("Failed to load task file at path x.toml"));

        let not_a_table = parse("x.json", "[1, 2]").unwrap_err();
        assert!(matches!(not_a_table, TaskFileError::Parse { .. }));

        assert!(matches!(
            parse("x.yaml", "a: 1"),
            Err(TaskFileError::UnsupportedExtension { .. })
        ));
    }

    #[test]
    fn test_resolution() {
        let dir = tempdir().unwrap();
        let scripts = dir.path();
        fs::write(scripts.join("build.toml"), "").unwrap();
        fs::write(scripts.join("both.toml"), "").unwrap();
        fs::write(scripts.join("both.json"), "{}").unwrap();

        assert_eq!(
            resolve_task_file(&scripts.join("build")).unwrap(),
            scripts.join("build.toml")
        );
        assert_eq!(
            resolve_task_file(&scripts.join("both.json")).unwrap(),
            scripts.join("both.json")
        );

        let ambiguous = resolve_task_file(&scripts.join("both")).unwrap_err();
        let ResolutionError::Ambiguous { candidates, .. } = &ambiguous else {
            panic!("expected ambiguity");
        };
        assert_eq!(candidates.len(), 2);
        assert!(
            ambiguous
                .to_string()
                .starts_with("Found multiple task files with the name")
        );

        assert!(matches!(
            resolve_task_file(&scripts.join("missing")),
            Err(ResolutionError::NotFound { tried, .. }) if tried.len() == 2
        ));
    }

    #[test]
    fn test_list_task_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.toml"), "").unwrap();
        fs::write(dir.path().join("a.json"), "{}").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        fs::create_dir(dir.path().join("nested.toml")).unwrap();

        let names: Vec<String> = list_task_files(dir.path())
            .iter()
            .filter_map(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.json", "b.toml"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_task_runs_commands() {
        let dir = tempdir().unwrap();
        let file = parse(
            "touch.toml",
            r#"
            [make]
            run = ["touch {{_.0}}", "-false"]
            "#,
        )
        .unwrap();
        let task = file.collection["make"].as_task().unwrap();
        task.call(
            Options::from_value(json!({ "_": ["made.txt"], "env": {} })),
            TaskUtilities::new().with_cwd(dir.path()),
        )
        .await
        .unwrap();
        assert!(dir.path().join("made.txt").is_file());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_positional_cannot_mark_line_as_ignored() {
        let file = parse(
            "relay.toml",
            r#"
            [relay]
            run = "{{_.0}}"
            "#,
        )
        .unwrap();
        let task = file.collection["relay"].as_task().unwrap();
        let result = task
            .call(
                Options::from_value(json!({ "_": ["-false"], "env": {} })),
                TaskUtilities::new().echo(false),
            )
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_native_toml_dates_become_strings() {
        let file = parse(
            "release.toml",
            r#"
            released = 2024-01-01

            [ship]
            run = "echo {{day}}"
            options.day = { type = "date", default = 2024-01-01 }
            "#,
        )
        .unwrap();
        assert!(matches!(&file.collection["released"], Export::Value(v) if v == &json!("2024-01-01")));

        let strict = file.collection["ship"]
            .as_task()
            .and_then(Task::as_strict)
            .unwrap();
        let parsed = strict.parse(&json!({ "_": [], "env": {} })).unwrap();
        assert_eq!(parsed.get("day"), Some(&json!("2024-01-01")));
    }
}
