use crate::database::column::ColumnType;
use crate::helpers::path::number_to_string;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt::Display;

/// A typed cell value, as handed to the engine after marshalling.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub enum Scalar {
    #[default]
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Returns the column type this value belongs to, `None` for nulls.
    pub fn kind(&self) -> Option<ColumnType> {
        match self {
            Scalar::Null => None,
            Scalar::Boolean(_) => Some(ColumnType::Boolean),
            Scalar::Integer(_) => Some(ColumnType::Integer),
            Scalar::Float(_) => Some(ColumnType::Float),
            Scalar::String(_) => Some(ColumnType::String),
            Scalar::Date(_) => Some(ColumnType::Date),
            Scalar::DateTime(_) => Some(ColumnType::DateTime),
        }
    }

    /// Numeric view of the value, used by aggregates and numeric filters.
    /// Datetimes count as epoch milliseconds.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Integer(value) => Some(*value as f64),
            Scalar::Float(value) => Some(*value),
            Scalar::DateTime(value) => Some(value.and_utc().timestamp_millis() as f64),
            _ => None,
        }
    }

    /// Converts the value to its wire representation.
    /// Dates become ISO strings and datetimes epoch milliseconds.
    pub fn to_value(&self) -> Value {
        match self {
            Scalar::Null => Value::Null,
            Scalar::Boolean(value) => Value::Bool(*value),
            Scalar::Integer(value) => Value::from(*value),
            Scalar::Float(value) => serde_json::Number::from_f64(*value)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Scalar::String(value) => Value::String(value.to_owned()),
            Scalar::Date(value) => Value::String(value.format("%Y-%m-%d").to_string()),
            Scalar::DateTime(value) => Value::from(value.and_utc().timestamp_millis()),
        }
    }

    /// Total order used for sorting and pivot keys: nulls first, then by value,
    /// mixed kinds by kind rank.
    pub fn total_cmp(&self, other: &Scalar) -> Ordering {
        match (self, other) {
            (Scalar::Null, Scalar::Null) => Ordering::Equal,
            (Scalar::Null, _) => Ordering::Less,
            (_, Scalar::Null) => Ordering::Greater,
            (Scalar::Boolean(x), Scalar::Boolean(y)) => x.cmp(y),
            (Scalar::String(x), Scalar::String(y)) => x.cmp(y),
            (Scalar::Date(x), Scalar::Date(y)) => x.cmp(y),
            (Scalar::DateTime(x), Scalar::DateTime(y)) => x.cmp(y),
            (Scalar::Integer(x), Scalar::Integer(y)) => x.cmp(y),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                _ => self.rank().cmp(&other.rank()),
            },
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Scalar::Null => 0,
            Scalar::Boolean(_) => 1,
            Scalar::Integer(_) | Scalar::Float(_) => 2,
            Scalar::Date(_) => 3,
            Scalar::DateTime(_) => 4,
            Scalar::String(_) => 5,
        }
    }
}

impl Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Null => write!(f, "null"),
            Scalar::Boolean(value) => write!(f, "{value}"),
            Scalar::Integer(value) => write!(f, "{value}"),
            Scalar::Float(value) => write!(f, "{}", number_to_string(*value)),
            Scalar::String(value) => write!(f, "{value}"),
            Scalar::Date(value) => write!(f, "{}", value.format("%Y-%m-%d")),
            Scalar::DateTime(value) => write!(f, "{}", value.format("%Y-%m-%d %H:%M:%S%.3f")),
        }
    }
}
