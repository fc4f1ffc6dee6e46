//! Conversion from TOML leaves to configuration literals.

use crossflow_core::{Literal, PresetBody, SchemaError};
use toml::{Table, Value};

/// Convert a TOML value to a [`Literal`].
///
/// Arrays become per-channel lists. Nested arrays, tables and datetimes
/// have no literal form and are rejected.
pub fn literal(context: &str, value: &Value) -> Result<Literal, SchemaError> {
    match value {
        Value::Boolean(b) => Ok(Literal::Bool(*b)),
        Value::Integer(i) => Ok(Literal::Int(*i)),
        Value::Float(x) => Ok(Literal::Float(*x)),
        Value::String(s) => Ok(Literal::String(s.clone())),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Array(_) => Err(SchemaError::syntax(context, "nested lists are not supported")),
                other => literal(context, other),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Literal::List),
        Value::Table(_) => Err(SchemaError::syntax(context, "expected a value, found a table")),
        Value::Datetime(_) => Err(SchemaError::syntax(context, "datetimes are not supported")),
    }
}

/// Convert a table of `var-label = literal` pairs to a [`PresetBody`].
///
/// Entry order is preserved.
pub fn preset_body(context: &str, table: &Table) -> Result<PresetBody, SchemaError> {
    table
        .iter()
        .map(|(var, value)| {
            Ok::<_, SchemaError>((var.as_str(), literal(&format!("{context}.{var}"), value)?))
        })
        .collect()
}

/// The table stored under `key`, if any.
pub(crate) fn sub_table<'a>(
    context: &str,
    table: &'a Table,
    key: &str,
) -> Result<Option<&'a Table>, SchemaError> {
    match table.get(key) {
        None => Ok(None),
        Some(Value::Table(t)) => Ok(Some(t)),
        Some(other) => Err(SchemaError::syntax(
            format!("{context}.{key}"),
            format!("expected a table, found {}", other.type_str()),
        )),
    }
}
