//! Row validation errors.

use thiserror::Error;

/// Errors raised when a raw backend row does not match the expected record shape.
#[derive(Debug, Error)]
pub enum RowError {
    /// The row was valid JSON but not an object.
    #[error("Row is not a JSON object (found {0})")]
    NotAnObject(&'static str),

    /// A field was missing or had the wrong type.
    #[error("Row decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Result type for row validation.
pub type Result<T> = std::result::Result<T, RowError>;

/// Decodes a raw JSON row into a typed record.
pub(crate) fn decode_row<T: serde::de::DeserializeOwned>(row: serde_json::Value) -> Result<T> {
    let kind = match &row {
        serde_json::Value::Object(_) => return Ok(serde_json::from_value(row)?),
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
    };
    Err(RowError::NotAnObject(kind))
}
