//! Stringification of pivot keys and column paths.
//! Row paths and flattened column names are built from these strings.

use serde_json::Value;

/// Default separator between the segments of a flattened column name.
pub const COLUMN_SEPARATOR: &str = "|";

/// Reserved key under which row paths are emitted.
pub const ROW_PATH_KEY: &str = "__ROW_PATH__";

/// Formats a float the way pivot keys show it: integral values without a fraction.
pub(crate) fn number_to_string(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Converts one wire value to its pivot key string.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_owned(),
        Value::Bool(value) => value.to_string(),
        Value::Number(number) => match number.as_i64() {
            Some(integer) => integer.to_string(),
            None => number.as_f64().map(number_to_string).unwrap_or_else(|| number.to_string()),
        },
        Value::String(text) => text.to_owned(),
        other => other.to_string(),
    }
}

/// Stringifies every segment of a path.
pub fn path_to_strings(path: &[Value]) -> Vec<String> {
    path.iter().map(value_to_string).collect()
}

/// Joins path segments into a flattened column name.
#[inline]
pub fn join_path(path: &[Value], separator: &str) -> String {
    path_to_strings(path).join(separator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_as_strings() {
        assert_eq!(value_to_string(&json!(1)), "1");
        assert_eq!(value_to_string(&json!(1.0)), "1");
        assert_eq!(value_to_string(&json!(0.25)), "0.25");
        assert_eq!(value_to_string(&json!("s1")), "s1");
        assert_eq!(value_to_string(&json!(false)), "false");
        assert_eq!(value_to_string(&json!(null)), "null");
    }

    #[test]
    fn join_with_separator() {
        assert_eq!(join_path(&[json!("s1"), json!(2), json!("a")], COLUMN_SEPARATOR), "s1|2|a");
        assert_eq!(join_path(&[json!("a")], "/"), "a");
        assert_eq!(join_path(&[], COLUMN_SEPARATOR), "");
    }
}
