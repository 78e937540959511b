use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;

use crate::model::Report;

pub const NOTES: [&str; 2] = [
    "This audit is conservative. Anything ambiguous is treated as referenced.",
    "Review safeDelete list; only those are intended for automatic deletion in safe mode.",
];

/// Writes the audit report with sorted keys. The file is replaced, never merged.
pub fn write_report(path: &Path, report: &Report) -> Result<()> {
    let value = sort_keys(serde_json::to_value(report)?);
    write_json(path, &value)
}

/// Recursively orders object keys, independent of serde_json's map backend.
pub fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map.into_iter().map(|(k, v)| (k, sort_keys(v))).collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// Pretty-prints `value` to `path` with a trailing newline, creating parent
/// directories as needed. Key order is whatever `value` serializes with.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("failed creating {}", parent.display()))?;
    }
    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');
    fs::write(path, text).with_context(|| format!("failed writing {}", path.display()))
}
