#![forbid(unsafe_code)]

//! Initial state loading from JSON or TOML.
//!
//! The only configuration a store takes is its initial state mapping. This
//! module reads that mapping from a document whose top level is an object
//! (JSON) or a table (TOML). Values are kept as [`serde_json::Value`].
//!
//! A JSON `null` declares a field without a value. TOML has no null, so
//! every TOML key starts with a value.
//!
//! ```
//! use storesync_runtime::config::from_json_str;
//!
//! let initial = from_json_str(r#"{ "user": { "name": "Vaibhav Shinde" }, "data": null }"#).unwrap();
//! assert!(initial.contains("data"));
//! assert_eq!(initial.get("data"), None);
//! assert_eq!(initial.get("user").unwrap()["name"], "Vaibhav Shinde");
//! ```

use std::path::Path;

use serde_json::{Map, Value};

use crate::error::SyncError;
use crate::reactive::InitialState;

/// Parse an initial state from a JSON object.
///
/// # Errors
///
/// Returns [`SyncError::Config`] if the text is not JSON or the top level is
/// not an object.
pub fn from_json_str(text: &str) -> Result<InitialState<Value>, SyncError> {
    let value: Value = serde_json::from_str(text).map_err(|e| SyncError::Config(e.to_string()))?;
    match value {
        Value::Object(map) => Ok(from_map(map)),
        other => Err(SyncError::Config(format!(
            "expected a JSON object at the top level, found {}",
            kind(&other)
        ))),
    }
}

/// Parse an initial state from a TOML table.
///
/// # Errors
///
/// Returns [`SyncError::Config`] if the text is not valid TOML.
pub fn from_toml_str(text: &str) -> Result<InitialState<Value>, SyncError> {
    let map: Map<String, Value> = toml::from_str(text).map_err(|e| SyncError::Config(e.to_string()))?;
    Ok(from_map(map))
}

/// Load an initial state file, choosing the format by extension
/// (`.json` or `.toml`).
///
/// # Errors
///
/// Returns [`SyncError::Io`] if the file cannot be read and
/// [`SyncError::Config`] for an unknown extension or invalid contents.
pub fn load_path(path: impl AsRef<Path>) -> Result<InitialState<Value>, SyncError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| SyncError::Io(format!("{}: {e}", path.display())))?;
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    let initial = match extension.as_deref() {
        Some("json") => from_json_str(&text)?,
        Some("toml") => from_toml_str(&text)?,
        _ => {
            return Err(SyncError::Config(format!(
                "unsupported initial state format: {}",
                path.display()
            )));
        }
    };
    tracing::debug!(
        target: "storesync",
        path = %path.display(),
        fields = initial.len(),
        "initial state loaded"
    );
    Ok(initial)
}

fn from_map(map: Map<String, Value>) -> InitialState<Value> {
    map.into_iter()
        .map(|(field, value)| match value {
            Value::Null => (field, None),
            value => (field, Some(value)),
        })
        .collect()
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
