use armdeploy_core::Parameters;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::debug;

use crate::error::LoadError;

/// Load a parameter file and normalize it to the flat `{name: value}` form.
pub async fn load_parameters(path: &Path) -> Result<Parameters, LoadError> {
    if !tokio::fs::try_exists(path).await? {
        return Err(LoadError::NotFound(path.to_path_buf()));
    }

    let content = tokio::fs::read_to_string(path).await?;
    let document: Value = serde_json::from_str(&content)?;
    let parameters = normalize_parameters(document)?;

    debug!(path = %path.display(), count = parameters.len(), "Loaded parameters");
    Ok(parameters)
}

/// Accepts either a deployment parameter file
/// (`{"parameters": {"name": {"value": v}}}`) or a flat mapping
/// (`{"name": v}`), which is returned unchanged.
pub fn normalize_parameters(document: Value) -> Result<Parameters, LoadError> {
    let mut top = match document {
        Value::Object(map) => map,
        other => {
            return Err(LoadError::Shape(format!(
                "expected a JSON object, found {}",
                kind(&other)
            )))
        }
    };

    match top.remove("parameters") {
        Some(Value::Object(wrapped)) => unwrap_values(wrapped),
        Some(other) => {
            top.insert("parameters".to_string(), other);
            Ok(Parameters::from(top))
        }
        None => Ok(Parameters::from(top)),
    }
}

fn unwrap_values(wrapped: Map<String, Value>) -> Result<Parameters, LoadError> {
    wrapped
        .into_iter()
        .map(|(name, entry)| match entry {
            Value::Object(mut entry) => Ok((name, entry.remove("value").unwrap_or(Value::Null))),
            other => Err(LoadError::Shape(format!(
                "parameter '{}' must be an object with a 'value', found {}",
                name,
                kind(&other)
            ))),
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
