//! # Input Module
//!
//! Classifies arbitrary user data into one of the three supported input formats and
//! exposes it through the [`Accessor`](accessor::Accessor).
//!
//! - **Row records**: a sequence of `{column: value}` mappings
//! - **Column arrays**: a mapping from column name to a sequence of values
//! - **Schema**: a mapping from column name to a type name, without data
use crate::database::column::ColumnType;
use serde_json::Value;
use thiserror::Error;

pub mod accessor;
pub mod validator;

/// Errors raised while classifying or reading input data.
#[derive(Error, Debug, PartialEq)]
pub enum InputError {
    /// The input has none of the supported shapes. No table is created.
    #[error("Unsupported input format: {0}")]
    UnsupportedInputFormat(String),
}

/// Shape of the data handed to a table load or update.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InputFormat {
    /// Ordered sequence of key/value mappings
    RowRecords,
    /// Mapping from column name to an ordered sequence of values
    ColumnArrays,
    /// Mapping from column name to a declared type, without rows
    Schema,
}

impl InputFormat {
    pub const fn as_str(&self) -> &'static str {
        match self {
            InputFormat::RowRecords => "records",
            InputFormat::ColumnArrays => "columns",
            InputFormat::Schema => "schema",
        }
    }
}

/// Detects the format of raw input data.
///
/// A sequence is row records. A mapping is column arrays when any of its values is a
/// sequence (every value then has to be one), and a schema when every value names a
/// known column type. An empty mapping is column arrays without columns. Anything
/// else fails with [`InputError::UnsupportedInputFormat`].
pub fn detect(data: &Value) -> Result<InputFormat, InputError> {
    match data {
        Value::Array(_) => Ok(InputFormat::RowRecords),
        Value::Object(map) if map.is_empty() => Ok(InputFormat::ColumnArrays),
        Value::Object(map) if map.values().any(Value::is_array) => {
            match map.iter().find(|(_, value)| !value.is_array()) {
                Some((name, _)) => Err(InputError::UnsupportedInputFormat(format!(
                    "column '{name}' must be a list of values"
                ))),
                None => Ok(InputFormat::ColumnArrays),
            }
        }
        Value::Object(map) => {
            let is_type_name = |value: &Value| {
                value
                    .as_str()
                    .map(|name| ColumnType::parse(name).is_ok())
                    .unwrap_or(false)
            };
            match map.iter().find(|(_, value)| !is_type_name(value)) {
                Some((name, value)) => Err(InputError::UnsupportedInputFormat(format!(
                    "column '{name}' must be a list of values or a type name, got {value}"
                ))),
                None => Ok(InputFormat::Schema),
            }
        }
        other => Err(InputError::UnsupportedInputFormat(format!(
            "expected a list of records or a mapping of columns, got {other}"
        ))),
    }
}
