//! Metadata shape checks
//!
//! Document metadata is schema-free: any JSON object is accepted. Search
//! filters are objects too, but every value must be a string.

use std::collections::BTreeMap;

use crate::error::AppError;
use crate::models::Metadata;

/// Convert caller-supplied JSON into document metadata. Must be an object.
pub fn metadata_from_value(value: serde_json::Value) -> Result<Metadata, AppError> {
    match value {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(AppError::Validation(format!(
            "Metadata must be a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

/// Convert a caller-supplied metadata search filter.
pub fn search_filter_from_value(
    value: serde_json::Value,
) -> Result<BTreeMap<String, String>, AppError> {
    let object = match value {
        serde_json::Value::Object(map) => map,
        other => {
            return Err(AppError::Validation(format!(
                "Metadata filter must be a JSON object, got {}",
                json_kind(&other)
            )))
        }
    };

    let mut filter = BTreeMap::new();
    for (key, value) in object {
        match value {
            serde_json::Value::String(s) => {
                filter.insert(key, s);
            }
            other => {
                return Err(AppError::Validation(format!(
                    "Metadata filter value for '{}' must be a string, got {}",
                    key,
                    json_kind(&other)
                )))
            }
        }
    }
    Ok(filter)
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
