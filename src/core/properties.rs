// src/core/properties.rs

use crate::{constants::is_reserved, core::schema::Schema};
use colored::Colorize;

/// Lists the user-declared properties of `schema` for help output, e.g.
/// `{ name, [flag] }`.
///
/// Required properties come first, then optional ones (wrapped in `[...]` and
/// dimmed), each group in declaration order. The reserved `_` and `env` fields
/// are never listed. Returns an empty string when nothing is declared.
pub fn list_properties(schema: &dyn Schema) -> String {
    let (required, optional): (Vec<_>, Vec<_>) = schema
        .fields()
        .into_iter()
        .filter(|field| !is_reserved(&field.name))
        .partition(|field| !field.optional);

    if required.is_empty() && optional.is_empty() {
        return String::new();
    }

    let names: Vec<String> = required
        .into_iter()
        .map(|field| field.name)
        .chain(
            optional
                .into_iter()
                .map(|field| format!("[{}]", field.name).dimmed().to_string()),
        )
        .collect();

    format!("{{ {} }}", names.join(", "))
}

// MARK: --- UNIT TESTS ---
