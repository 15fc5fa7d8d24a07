use crate::database::column::ColumnType;
use crate::database::scalar::Scalar;
use crate::database::table::TableSchema;
use crate::helpers::path::value_to_string;
use crate::input::detect;
use crate::input::validator::DateValidator;
use crate::input::InputError;
use crate::input::InputFormat;
use crate::logging::log_debug;
use crate::logging::log_warn;
use chrono::DateTime;
use serde_json::Map;
use serde_json::Value;

/// Name of the implicit primary-key column.
pub const INDEX_COLUMN: &str = "__INDEX__";

/// Rows scanned for keys missing from the first record; doubles whenever new keys show up.
const KEY_SCAN_ROWS: usize = 50;

/// Rows sampled per column by type inference.
const INFER_ROWS: usize = 100;

/// Parsed input, one variant per [`InputFormat`].
#[derive(Debug)]
enum Input {
    RowRecords(Vec<Map<String, Value>>),
    ColumnArrays(Vec<Vec<Value>>),
    Schema(Vec<ColumnType>),
}

/// Uniform `(column index, row index)` access over detected input data.
///
/// Built once per load or update and handed to the engine, which pulls every cell through
/// [`Accessor::marshal`]. Column names are fixed at construction.
#[derive(Debug)]
pub struct Accessor {
    input: Input,
    names: Vec<String>,
    types: Vec<ColumnType>,
    row_count: usize,
    validator: DateValidator,
}

impl Accessor {
    /// Detects the input format and takes ownership of the data.
    pub fn new(data: Value) -> Result<Self, InputError> {
        let format = detect(&data)?;
        let (input, names) = match (format, data) {
            (InputFormat::RowRecords, Value::Array(rows)) => {
                let rows = rows
                    .into_iter()
                    .enumerate()
                    .map(|(index, row)| match row {
                        Value::Object(record) => Ok(record),
                        other => Err(InputError::UnsupportedInputFormat(format!(
                            "record {index} is not a mapping: {other}"
                        ))),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let names = Self::record_names(&rows);
                (Input::RowRecords(rows), names)
            }
            (InputFormat::ColumnArrays, Value::Object(columns)) => {
                let mut names = Vec::with_capacity(columns.len());
                let mut values = Vec::with_capacity(columns.len());
                for (name, column) in columns {
                    names.push(name);
                    values.push(match column {
                        Value::Array(column) => column,
                        _ => Vec::new(),
                    });
                }
                (Input::ColumnArrays(values), names)
            }
            (InputFormat::Schema, Value::Object(declarations)) => {
                let mut names = Vec::with_capacity(declarations.len());
                let mut types = Vec::with_capacity(declarations.len());
                for (name, declared) in declarations {
                    let kind = ColumnType::parse(declared.as_str().unwrap_or_default())
                        .map_err(|e| InputError::UnsupportedInputFormat(e.to_string()))?;
                    if name == INDEX_COLUMN {
                        log_warn!(component = "accessor", event = "schema_declares_index", column = INDEX_COLUMN);
                    }
                    names.push(name);
                    types.push(kind);
                }
                (Input::Schema(types), names)
            }
            (format, other) => {
                return Err(InputError::UnsupportedInputFormat(format!(
                    "{} input cannot be read from {other}",
                    format.as_str()
                )))
            }
        };

        let row_count = match &input {
            Input::RowRecords(rows) => rows.len(),
            Input::ColumnArrays(columns) => columns.iter().map(Vec::len).max().unwrap_or(0),
            Input::Schema(_) => 0,
        };

        Ok(Self {
            input,
            names,
            types: Vec::new(),
            row_count,
            validator: DateValidator,
        })
    }

    /// Collects record keys: the first row's keys, extended by keys found in later rows.
    fn record_names(rows: &[Map<String, Value>]) -> Vec<String> {
        let Some(first) = rows.first() else {
            return Vec::new();
        };
        let mut names: Vec<String> = first.keys().cloned().collect();
        let mut window = KEY_SCAN_ROWS;
        let mut index = 1;
        while index < window.min(rows.len()) {
            let missing: Vec<String> = rows[index]
                .keys()
                .filter(|key| !names.contains(*key))
                .cloned()
                .collect();
            if !missing.is_empty() {
                log_warn!(
                    component = "accessor",
                    event = "record_keys_extended",
                    row = index,
                    keys = ?missing
                );
                names.extend(missing);
                window *= 2;
            }
            index += 1;
        }
        names
    }

    /// Seeds the declared column types, replacing inference.
    pub fn with_types(mut self, types: Vec<ColumnType>) -> Self {
        self.types = types;
        self
    }

    /// Seeds declared types from an existing table schema, matching columns by name.
    /// Columns the schema does not know keep their inferred type.
    pub fn with_schema(self, schema: &TableSchema) -> Self {
        let inferred = self.infer_types();
        let types = self
            .names
            .iter()
            .zip(inferred)
            .map(|(name, kind)| schema.kind_of(name).unwrap_or(kind))
            .collect();
        self.with_types(types)
    }

    pub fn format(&self) -> InputFormat {
        match self.input {
            Input::RowRecords(_) => InputFormat::RowRecords,
            Input::ColumnArrays(_) => InputFormat::ColumnArrays,
            Input::Schema(_) => InputFormat::Schema,
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Declared column types; empty until seeded.
    pub fn types(&self) -> &[ColumnType] {
        &self.types
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn date_validator(&self) -> &DateValidator {
        &self.validator
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|column| column == name)
    }

    /// Returns the raw value at `(cidx, ridx)`, `None` when no value is populated there.
    pub fn get(&self, cidx: usize, ridx: usize) -> Option<&Value> {
        match &self.input {
            Input::RowRecords(rows) => rows.get(ridx)?.get(self.names.get(cidx)?),
            Input::ColumnArrays(columns) => columns.get(cidx)?.get(ridx),
            Input::Schema(_) => None,
        }
    }

    /// Returns the value at `(cidx, ridx)` coerced to `kind`.
    /// Missing cells, nulls and values that do not coerce are `None`.
    pub fn marshal(&self, cidx: usize, ridx: usize, kind: ColumnType) -> Option<Scalar> {
        coerce(self.get(cidx, ridx)?, kind, &self.validator)
    }

    /// Column types to load the data with: the seeded types when present, the declared
    /// types of a schema, or types inferred from the first non-null sampled value.
    pub fn infer_types(&self) -> Vec<ColumnType> {
        if !self.types.is_empty() {
            return self.types.clone();
        }
        match &self.input {
            Input::Schema(types) => types.clone(),
            _ => (0..self.names.len())
                .map(|cidx| {
                    let sample = (0..self.row_count.min(INFER_ROWS)).filter_map(|ridx| self.get(cidx, ridx));
                    ColumnType::detect(sample, &self.validator)
                })
                .collect(),
        }
    }
}

/// Parses the leading integer of a string, ignoring whatever follows it.
fn leading_integer(text: &str) -> Option<i64> {
    let text = text.trim();
    let end = text
        .char_indices()
        .find(|(index, char)| !(char.is_ascii_digit() || (*index == 0 && *char == '-')))
        .map(|(index, _)| index)
        .unwrap_or(text.len());
    text[..end].parse().ok()
}

/// Coerces one raw value to a column type. `None` means absent.
pub fn coerce(value: &Value, kind: ColumnType, validator: &DateValidator) -> Option<Scalar> {
    let scalar = match (kind, value) {
        (_, Value::Null) => return None,
        (ColumnType::Boolean, Value::Bool(value)) => Scalar::Boolean(*value),
        (ColumnType::Boolean, Value::String(text)) if ColumnType::is_boolean_literal(text) => {
            Scalar::Boolean(text.eq_ignore_ascii_case("true"))
        }
        (ColumnType::Boolean, Value::Number(number)) => Scalar::Boolean(number.as_f64()? != 0.0),
        (ColumnType::Integer, Value::Number(number)) => match number.as_i64() {
            Some(integer) => Scalar::Integer(integer),
            None => Scalar::Integer(number.as_f64()?.trunc() as i64),
        },
        (ColumnType::Integer, Value::String(text)) => Scalar::Integer(leading_integer(text)?),
        (ColumnType::Integer, Value::Bool(value)) => Scalar::Integer(i64::from(*value)),
        (ColumnType::Float, Value::Number(number)) => Scalar::Float(number.as_f64()?),
        (ColumnType::Float, Value::String(text)) => Scalar::Float(text.trim().parse().ok()?),
        (ColumnType::String, Value::String(text)) => Scalar::String(text.to_owned()),
        (ColumnType::String, other) => Scalar::String(value_to_string(other)),
        (ColumnType::Date, Value::String(text)) => match validator.parse_date(text) {
            Ok(date) => Scalar::Date(date),
            Err(e) => {
                log_debug!(component = "accessor", event = "coercion_failed", kind = "date", error = %e);
                return None;
            }
        },
        (ColumnType::DateTime, Value::String(text)) => match validator.parse(text) {
            Ok(datetime) => Scalar::DateTime(datetime),
            Err(e) => {
                log_debug!(component = "accessor", event = "coercion_failed", kind = "datetime", error = %e);
                return None;
            }
        },
        (ColumnType::DateTime, Value::Number(number)) => {
            Scalar::DateTime(DateTime::from_timestamp_millis(number.as_i64()?)?.naive_utc())
        }
        _ => return None,
    };
    Some(scalar)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn records_names_and_row_count() {
        let accessor = Accessor::new(json!([{"a": 1, "b": 2}, {"a": 3, "b": 4}])).unwrap();
        assert_eq!(accessor.format(), InputFormat::RowRecords);
        assert_eq!(accessor.names(), ["a", "b"]);
        assert_eq!(accessor.row_count(), 2);
        assert_eq!(accessor.get(1, 1), Some(&json!(4)));
        assert_eq!(accessor.get(2, 0), None);
        assert_eq!(accessor.get(0, 2), None);
    }

    #[test]
    fn records_missing_keys_are_absent() {
        let accessor = Accessor::new(json!([{"a": 1, "b": 2}, {"a": 3}])).unwrap();
        assert_eq!(accessor.get(1, 1), None);
        assert_eq!(accessor.marshal(1, 1, ColumnType::Integer), None);
    }

    #[test]
    fn records_extra_keys_extend_names() {
        let accessor = Accessor::new(json!([{"a": 1}, {"a": 2, "c": 3}, {"b": 4, "a": 5}])).unwrap();
        assert_eq!(accessor.names(), ["a", "c", "b"]);
        assert_eq!(accessor.get(2, 2), Some(&json!(4)));
    }

    #[test]
    fn columns_jagged() {
        let accessor = Accessor::new(json!({"a": [1, 2, 3], "b": ["x"]})).unwrap();
        assert_eq!(accessor.format(), InputFormat::ColumnArrays);
        assert_eq!(accessor.names(), ["a", "b"]);
        assert_eq!(accessor.row_count(), 3);
        assert_eq!(accessor.get(1, 0), Some(&json!("x")));
        assert_eq!(accessor.get(1, 2), None);
    }

    #[test]
    fn schema_has_no_rows() {
        let accessor = Accessor::new(json!({"a": "integer", "b": "date"})).unwrap();
        assert_eq!(accessor.format(), InputFormat::Schema);
        assert_eq!(accessor.row_count(), 0);
        assert_eq!(accessor.get(0, 0), None);
        assert_eq!(accessor.infer_types(), vec![ColumnType::Integer, ColumnType::Date]);
    }

    #[test]
    fn empty_inputs() {
        let records = Accessor::new(json!([])).unwrap();
        assert_eq!(records.row_count(), 0);
        assert!(records.names().is_empty());
        let columns = Accessor::new(json!({})).unwrap();
        assert_eq!(columns.row_count(), 0);
        assert!(columns.names().is_empty());
    }

    #[test]
    fn non_mapping_record_rejected() {
        assert!(matches!(
            Accessor::new(json!([{"a": 1}, 2])),
            Err(InputError::UnsupportedInputFormat(_))
        ));
    }

    #[test]
    fn infer_from_first_non_null() {
        let accessor = Accessor::new(json!({
            "i": [null, 1, 2.5],
            "f": [1.5, 2],
            "s": ["x"],
            "d": ["2019-07-11"],
            "b": ["True", "false"],
            "n": [null, null],
        }))
        .unwrap();
        assert_eq!(
            accessor.infer_types(),
            vec![
                ColumnType::Integer,
                ColumnType::Float,
                ColumnType::String,
                ColumnType::DateTime,
                ColumnType::Boolean,
                ColumnType::String,
            ]
        );
    }

    #[test]
    fn seeded_types_win_over_inference() {
        let schema = TableSchema::new(&["a".to_owned()], &[ColumnType::Float]);
        let accessor = Accessor::new(json!([{"b": "x", "a": 1}])).unwrap().with_schema(&schema);
        assert_eq!(accessor.types(), [ColumnType::String, ColumnType::Float]);
        assert_eq!(accessor.marshal(1, 0, ColumnType::Float), Some(Scalar::Float(1.0)));
    }

    #[test]
    fn marshal_dates() {
        let accessor = Accessor::new(json!({"d": ["2019-07-11", "bogus", 1562803201000i64]})).unwrap();
        let date = NaiveDate::from_ymd_opt(2019, 7, 11).unwrap();
        assert_eq!(accessor.marshal(0, 0, ColumnType::Date), Some(Scalar::Date(date)));
        assert_eq!(
            accessor.marshal(0, 0, ColumnType::DateTime),
            Some(Scalar::DateTime(date.and_hms_opt(0, 0, 0).unwrap()))
        );
        assert_eq!(accessor.marshal(0, 1, ColumnType::Date), None);
        assert_eq!(accessor.marshal(0, 1, ColumnType::DateTime), None);
        assert_eq!(
            accessor.marshal(0, 2, ColumnType::DateTime),
            Some(Scalar::DateTime(date.and_hms_opt(0, 0, 1).unwrap()))
        );
    }

    #[test]
    fn marshal_scalars() {
        let validator = DateValidator;
        assert_eq!(coerce(&json!("TRUE"), ColumnType::Boolean, &validator), Some(Scalar::Boolean(true)));
        assert_eq!(coerce(&json!("yes"), ColumnType::Boolean, &validator), None);
        assert_eq!(coerce(&json!(2.7), ColumnType::Integer, &validator), Some(Scalar::Integer(2)));
        assert_eq!(coerce(&json!("42abc"), ColumnType::Integer, &validator), Some(Scalar::Integer(42)));
        assert_eq!(coerce(&json!("-7"), ColumnType::Integer, &validator), Some(Scalar::Integer(-7)));
        assert_eq!(coerce(&json!("abc"), ColumnType::Integer, &validator), None);
        assert_eq!(coerce(&json!("1.25"), ColumnType::Float, &validator), Some(Scalar::Float(1.25)));
        assert_eq!(coerce(&json!(3), ColumnType::String, &validator), Some(Scalar::String("3".to_owned())));
        assert_eq!(coerce(&json!(null), ColumnType::String, &validator), None);
    }
}
