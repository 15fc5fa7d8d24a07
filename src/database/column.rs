use crate::input::validator::DateValidator;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Errors related to column type parsing and validation.
#[derive(Error, Debug)]
pub enum ColumnError {
    #[error("Invalid column type '{0}'")]
    TypeError(String),
}

/// Supported column data types of an engine table.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// Boolean values (true/false)
    Boolean,
    /// 64-bit signed integers
    Integer,
    /// Double-precision floating point numbers
    Float,
    /// Variable-length strings
    String,
    /// Date without time component
    Date,
    /// Date and time with millisecond precision
    DateTime,
}

/// Represents a column of a table with name and data type.
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Column data type
    pub kind: ColumnType,
}

impl Column {
    pub fn new(name: &str, kind: ColumnType) -> Self {
        Self {
            name: name.to_owned(),
            kind,
        }
    }
}

impl ColumnType {
    /// Returns the external type name, as reported by table and view schemas.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Boolean => "boolean",
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::String => "string",
            ColumnType::Date => "date",
            ColumnType::DateTime => "datetime",
        }
    }

    /// Parses a column type from a type name.
    /// Supports various aliases for each type.
    pub fn parse(name: &str) -> Result<Self, ColumnError> {
        match name.trim().to_ascii_uppercase().as_str() {
            "BOOL" | "BOOL8" | "BOOLEAN" => Ok(Self::Boolean),
            "INT" | "INT8" | "INT16" | "INT32" | "INT64" | "BIGINT" | "INTEGER" => Ok(Self::Integer),
            "FLOAT" | "FLOAT32" | "FLOAT64" | "DOUBLE" | "DECIMAL" | "NUMERIC" => Ok(Self::Float),
            "STR" | "TEXT" | "STRING" | "VARCHAR" => Ok(Self::String),
            "DATE" => Ok(Self::Date),
            "DATETIME" | "DATETIME64" | "TIMESTAMP" => Ok(Self::DateTime),
            _ => Err(ColumnError::TypeError(name.to_string())),
        }
    }

    /// Infers a column type from a single raw value.
    /// Returns `None` for nulls and values that say nothing about the type.
    pub fn infer(value: &Value, validator: &DateValidator) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(ColumnType::Boolean),
            Value::Number(number) if number.is_i64() || number.is_u64() => Some(ColumnType::Integer),
            Value::Number(_) => Some(ColumnType::Float),
            Value::String(text) if validator.is_valid(text) => Some(ColumnType::DateTime),
            Value::String(text) if Self::is_boolean_literal(text) => Some(ColumnType::Boolean),
            Value::String(_) => Some(ColumnType::String),
            Value::Array(_) | Value::Object(_) => Some(ColumnType::String),
        }
    }

    /// Detects the column type from a sample of values: the first value with an
    /// opinion wins, and a column without one falls back to string.
    pub fn detect<'a>(values: impl IntoIterator<Item = &'a Value>, validator: &DateValidator) -> ColumnType {
        values
            .into_iter()
            .find_map(|value| Self::infer(value, validator))
            .unwrap_or(ColumnType::String)
    }

    /// Checks if a string spells a boolean, ignoring case.
    pub(crate) fn is_boolean_literal(text: &str) -> bool {
        text.eq_ignore_ascii_case("true") || text.eq_ignore_ascii_case("false")
    }

    /// Returns true if this column type represents boolean values.
    #[inline]
    pub fn is_boolean(&self) -> bool {
        matches!(self, ColumnType::Boolean)
    }

    /// Returns true if this column type represents numeric values (integer or floating point).
    #[inline]
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }

    /// Returns true if this column type represents strings.
    #[inline]
    pub fn is_string(&self) -> bool {
        matches!(self, ColumnType::String)
    }

    /// Returns true if this column type represents date/time related values.
    #[inline]
    pub fn is_temporal(&self) -> bool {
        matches!(self, ColumnType::Date | ColumnType::DateTime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_aliases() {
        assert_eq!(ColumnType::parse("int").unwrap(), ColumnType::Integer);
        assert_eq!(ColumnType::parse("Float64").unwrap(), ColumnType::Float);
        assert_eq!(ColumnType::parse("str").unwrap(), ColumnType::String);
        assert_eq!(ColumnType::parse("bool").unwrap(), ColumnType::Boolean);
        assert_eq!(ColumnType::parse("timestamp").unwrap(), ColumnType::DateTime);
        assert_eq!(ColumnType::parse("date").unwrap(), ColumnType::Date);
        assert!(ColumnType::parse("complex").is_err());
    }

    #[test]
    fn parse_accepts_own_names() {
        for kind in [
            ColumnType::Boolean,
            ColumnType::Integer,
            ColumnType::Float,
            ColumnType::String,
            ColumnType::Date,
            ColumnType::DateTime,
        ] {
            assert_eq!(ColumnType::parse(kind.as_str()).unwrap(), kind);
        }
    }

    #[test]
    fn infer_from_values() {
        let validator = DateValidator::default();
        assert_eq!(ColumnType::infer(&json!(null), &validator), None);
        assert_eq!(ColumnType::infer(&json!(true), &validator), Some(ColumnType::Boolean));
        assert_eq!(ColumnType::infer(&json!(0), &validator), Some(ColumnType::Integer));
        assert_eq!(ColumnType::infer(&json!(20000), &validator), Some(ColumnType::Integer));
        assert_eq!(ColumnType::infer(&json!(1.5), &validator), Some(ColumnType::Float));
        assert_eq!(ColumnType::infer(&json!("FALSE"), &validator), Some(ColumnType::Boolean));
        assert_eq!(ColumnType::infer(&json!("2019-07-11"), &validator), Some(ColumnType::DateTime));
        assert_eq!(ColumnType::infer(&json!("abc"), &validator), Some(ColumnType::String));
        assert_eq!(ColumnType::infer(&json!("3"), &validator), Some(ColumnType::String));
    }

    #[test]
    fn detect_skips_nulls() {
        let validator = DateValidator::default();
        let values = [json!(null), json!(null), json!(2.5)];
        assert_eq!(ColumnType::detect(values.iter(), &validator), ColumnType::Float);
        let values = [json!(null)];
        assert_eq!(ColumnType::detect(values.iter(), &validator), ColumnType::String);
    }
}
