//! Reading documents and variable files from disk.
//!
//! Documents arrive as TOML-serialized syntax trees:
//!
//! ```toml
//! source_name = "schema.hcl"   # optional
//! [[blocks]]
//! type = "table"
//! labels = ["users"]
//! attributes = [{ name = "comment", expr = { literal = '"people"' } }]
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use codespan_reporting::files::SimpleFiles;

use evaluator::Value;
use schemacfg::Document;

/// Load a document and register it in the codespan file database.
pub fn load_document(
    path: &Path,
    files: &mut SimpleFiles<String, String>,
) -> Result<Document, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read '{}': {}", path.display(), e))?;
    let mut document: Document = toml::from_str(&content)
        .map_err(|e| format!("invalid document '{}': {}", path.display(), e))?;
    let name = document
        .source_name
        .clone()
        .unwrap_or_else(|| path.display().to_string());
    document.source_id = files.add(name, document.source.clone().unwrap_or_default());
    Ok(document)
}

/// Load input variable overrides from a flat TOML table.
pub fn load_overrides(path: &Path) -> Result<BTreeMap<String, Value>, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read '{}': {}", path.display(), e))?;
    let table: toml::Table = toml::from_str(&content)
        .map_err(|e| format!("invalid variables file '{}': {}", path.display(), e))?;
    Ok(table
        .iter()
        .map(|(name, value)| (name.clone(), toml_to_value(value)))
        .collect())
}

pub fn toml_to_value(val: &toml::Value) -> Value {
    match val {
        toml::Value::Integer(n) => Value::Number(*n as f64),
        toml::Value::Float(f) => Value::Number(*f),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::String(s) => Value::String(s.clone()),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::list(items.iter().map(toml_to_value).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .iter()
                .map(|(k, v)| (k.clone(), toml_to_value(v)))
                .collect(),
        ),
    }
}
