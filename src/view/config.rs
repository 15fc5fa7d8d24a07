//! # View Configuration
//!
//! Normalizes a user-supplied pivot/filter/sort/aggregate request into a [`ViewConfig`].
//! Every key is read through a [`NamedParam`] handler; dashed and underscored spellings
//! of a key are both accepted.
use crate::database::column::ColumnType;
use crate::database::table::TableSchema;
use crate::input::validator::DateValidator;
use crate::logging::log_warn;
use serde::Serialize;
use serde::Serializer;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

/// Errors raised while reading or validating a view configuration.
#[derive(Error, Debug, PartialEq)]
pub enum ViewError {
    /// A configuration key holds a value of the wrong shape
    #[error("Invalid parameter '{name}': {message}")]
    InvalidParameter { name: String, message: String },

    /// Unknown column, sort direction, operator or aggregate
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Aggregates accepted on numeric columns.
pub const NUMBER_AGGREGATES: &[&str] = &[
    "any",
    "avg",
    "count",
    "distinct count",
    "dominant",
    "first by index",
    "last by index",
    "last",
    "high",
    "low",
    "mean",
    "mean by count",
    "median",
    "pct sum parent",
    "pct sum grand total",
    "sum",
    "sum abs",
    "sum not null",
    "unique",
];

/// Aggregates accepted on string, date and datetime columns.
pub const STRING_AGGREGATES: &[&str] = &[
    "any",
    "count",
    "distinct count",
    "distinct leaf",
    "dominant",
    "first by index",
    "last by index",
    "last",
    "mean by count",
    "unique",
];

/// Aggregates accepted on boolean columns.
pub const BOOLEAN_AGGREGATES: &[&str] = &[
    "any",
    "count",
    "distinct count",
    "distinct leaf",
    "dominant",
    "first by index",
    "last by index",
    "last",
    "mean by count",
    "unique",
    "and",
    "or",
];

/// Returns the aggregates a column of the given type accepts.
pub fn aggregates_for(kind: ColumnType) -> &'static [&'static str] {
    match kind {
        ColumnType::Integer | ColumnType::Float => NUMBER_AGGREGATES,
        ColumnType::Boolean => BOOLEAN_AGGREGATES,
        ColumnType::String | ColumnType::Date | ColumnType::DateTime => STRING_AGGREGATES,
    }
}

/// Sort direction of one sort entry.
///
/// `col` directions order column-pivot bands instead of rows; `abs` directions compare
/// absolute values.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SortDirection {
    None,
    Asc,
    Desc,
    ColAsc,
    ColDesc,
    AscAbs,
    DescAbs,
    ColAscAbs,
    ColDescAbs,
}

impl SortDirection {
    pub fn parse(name: &str) -> Result<Self, ViewError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            "col asc" => Ok(Self::ColAsc),
            "col desc" => Ok(Self::ColDesc),
            "asc abs" => Ok(Self::AscAbs),
            "desc abs" => Ok(Self::DescAbs),
            "col asc abs" => Ok(Self::ColAscAbs),
            "col desc abs" => Ok(Self::ColDescAbs),
            _ => Err(ViewError::InvalidConfiguration(format!(
                "unknown sort direction '{name}'"
            ))),
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Asc => "asc",
            Self::Desc => "desc",
            Self::ColAsc => "col asc",
            Self::ColDesc => "col desc",
            Self::AscAbs => "asc abs",
            Self::DescAbs => "desc abs",
            Self::ColAscAbs => "col asc abs",
            Self::ColDescAbs => "col desc abs",
        }
    }

    /// Fixed ordinal code handed to the engine.
    pub const fn ordinal(&self) -> u8 {
        match self {
            Self::Asc | Self::ColAsc => 0,
            Self::Desc | Self::ColDesc => 1,
            Self::None => 2,
            Self::AscAbs | Self::ColAscAbs => 3,
            Self::DescAbs | Self::ColDescAbs => 4,
        }
    }

    #[inline]
    pub fn is_column_sort(&self) -> bool {
        matches!(self, Self::ColAsc | Self::ColDesc | Self::ColAscAbs | Self::ColDescAbs)
    }

    #[inline]
    pub fn is_descending(&self) -> bool {
        self.ordinal() == 1 || self.ordinal() == 4
    }

    #[inline]
    pub fn is_abs(&self) -> bool {
        self.ordinal() >= 3
    }
}

impl Serialize for SortDirection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Comparison operator of a filter term.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FilterOperator {
    LessThan,
    GreaterThan,
    Equals,
    LessThanOrEquals,
    GreaterThanOrEquals,
    NotEquals,
    IsNull,
    IsNotNull,
    And,
    Or,
    BitwiseAnd,
    BitwiseOr,
    Contains,
    In,
    NotIn,
    BeginsWith,
    EndsWith,
}

impl FilterOperator {
    pub fn parse(name: &str) -> Result<Self, ViewError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "<" => Ok(Self::LessThan),
            ">" => Ok(Self::GreaterThan),
            "==" => Ok(Self::Equals),
            "<=" => Ok(Self::LessThanOrEquals),
            ">=" => Ok(Self::GreaterThanOrEquals),
            "!=" => Ok(Self::NotEquals),
            "is null" => Ok(Self::IsNull),
            "is not null" => Ok(Self::IsNotNull),
            "and" => Ok(Self::And),
            "or" => Ok(Self::Or),
            "&" => Ok(Self::BitwiseAnd),
            "|" => Ok(Self::BitwiseOr),
            "contains" => Ok(Self::Contains),
            "in" => Ok(Self::In),
            "not in" => Ok(Self::NotIn),
            "begins with" => Ok(Self::BeginsWith),
            "ends with" => Ok(Self::EndsWith),
            _ => Err(ViewError::InvalidConfiguration(format!(
                "unknown filter operator '{name}'"
            ))),
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::LessThan => "<",
            Self::GreaterThan => ">",
            Self::Equals => "==",
            Self::LessThanOrEquals => "<=",
            Self::GreaterThanOrEquals => ">=",
            Self::NotEquals => "!=",
            Self::IsNull => "is null",
            Self::IsNotNull => "is not null",
            Self::And => "and",
            Self::Or => "or",
            Self::BitwiseAnd => "&",
            Self::BitwiseOr => "|",
            Self::Contains => "contains",
            Self::In => "in",
            Self::NotIn => "not in",
            Self::BeginsWith => "begins with",
            Self::EndsWith => "ends with",
        }
    }

    /// Checks whether a column of the given type accepts this operator.
    pub fn allowed_for(&self, kind: ColumnType) -> bool {
        use FilterOperator::*;
        match (self, kind) {
            (IsNull | IsNotNull | Equals | NotEquals, _) => true,
            (And | Or | BitwiseAnd | BitwiseOr, ColumnType::Boolean) => true,
            (LessThan | GreaterThan | LessThanOrEquals | GreaterThanOrEquals, kind) => {
                kind.is_numeric() || kind.is_temporal()
            }
            (Contains | In | NotIn | BeginsWith | EndsWith, ColumnType::String) => true,
            _ => false,
        }
    }

    /// Operators comparing against nothing.
    #[inline]
    pub fn is_unary(&self) -> bool {
        matches!(self, Self::IsNull | Self::IsNotNull)
    }
}

impl Serialize for FilterOperator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// How filter terms combine.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    #[default]
    And,
    Or,
}

/// One `(column, operator, value)` filter entry.
#[derive(Clone, Debug, PartialEq)]
pub struct FilterTerm {
    pub column: String,
    pub operator: FilterOperator,
    pub value: Value,
}

impl Serialize for FilterTerm {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (&self.column, self.operator, &self.value).serialize(serializer)
    }
}

impl FilterTerm {
    /// Checks that the comparison value suits the operator and column type.
    fn is_valid(&self, kind: ColumnType, validator: &DateValidator) -> bool {
        if self.operator.is_unary() {
            return true;
        }
        match (&self.value, self.operator) {
            (Value::Null, _) => false,
            (Value::Array(_), FilterOperator::In | FilterOperator::NotIn) => true,
            (_, FilterOperator::In | FilterOperator::NotIn) => false,
            (Value::String(text), _) if kind.is_temporal() => validator.is_valid(text),
            (Value::Number(_), _) if kind.is_temporal() => true,
            (_, _) if kind.is_temporal() => false,
            _ => true,
        }
    }
}

/// Normalized, immutable view configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ViewConfig {
    /// Row pivot column names, outermost first
    #[serde(rename = "row-pivots")]
    pub row_pivots: Vec<String>,
    /// Column pivot column names, outermost first
    #[serde(rename = "column-pivots")]
    pub column_pivots: Vec<String>,
    /// Visible columns; the table fills in all of its columns when left empty
    pub columns: Vec<String>,
    /// Aggregate per column, in declaration order
    pub aggregates: Vec<(String, String)>,
    /// Sort entries; earlier entries take precedence
    pub sort: Vec<(String, SortDirection)>,
    pub filter: Vec<FilterTerm>,
    pub filter_op: FilterOp,
    /// Partial expansion depth, never set
    #[serde(skip)]
    pub row_pivot_depth: Option<usize>,
    /// Partial expansion depth, never set
    #[serde(skip)]
    pub column_pivot_depth: Option<usize>,
}

// Named parameter handling

/// Trait for reading one named key of a JSON parameter map.
///
/// # Type Parameters
///
/// * `T` - The type of the parameter value
pub trait NamedParam<T> {
    /// Returns the canonical key name
    fn name() -> &'static str;

    /// Returns alternative spellings of the key
    fn aliases() -> &'static [&'static str] {
        &[]
    }

    /// Looks up the raw value under the name or any alias; `null` counts as absent.
    fn lookup(params: &Map<String, Value>) -> Option<&Value> {
        std::iter::once(Self::name())
            .chain(Self::aliases().iter().copied())
            .find_map(|key| params.get(key))
            .filter(|value| !value.is_null())
    }

    /// Extracts the parameter value, `Ok(None)` when not provided
    fn read(params: &Map<String, Value>) -> Result<Option<T>, ViewError>;

    /// Builds the error for a malformed value
    fn invalid(message: impl Into<String>) -> ViewError {
        ViewError::InvalidParameter {
            name: Self::name().to_string(),
            message: message.into(),
        }
    }
}

/// Row pivots parameter handler
pub(crate) struct RowPivotsParam;

/// Column pivots parameter handler
pub(crate) struct ColumnPivotsParam;

/// Visible columns parameter handler
pub(crate) struct ColumnsParam;

/// Aggregates parameter handler
pub(crate) struct AggregatesParam;

/// Sort parameter handler
pub(crate) struct SortParam;

/// Filter parameter handler
pub(crate) struct FilterParam;

/// Filter combination parameter handler
pub(crate) struct FilterOpParam;

/// Reads a list of column names; a single name counts as a one-element list.
fn read_names<P: NamedParam<Vec<String>>>(params: &Map<String, Value>) -> Result<Option<Vec<String>>, ViewError> {
    let Some(value) = P::lookup(params) else {
        return Ok(None);
    };
    match value {
        Value::String(name) => Ok(Some(vec![name.to_owned()])),
        Value::Array(names) => names
            .iter()
            .map(|name| {
                name.as_str()
                    .map(str::to_owned)
                    .ok_or_else(|| P::invalid(format!("{name} is not a column name")))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        other => Err(P::invalid(format!("expected a list of column names, got {other}"))),
    }
}

impl NamedParam<Vec<String>> for RowPivotsParam {
    fn name() -> &'static str {
        "row-pivots"
    }

    fn aliases() -> &'static [&'static str] {
        &["row_pivots"]
    }

    fn read(params: &Map<String, Value>) -> Result<Option<Vec<String>>, ViewError> {
        read_names::<Self>(params)
    }
}

impl NamedParam<Vec<String>> for ColumnPivotsParam {
    fn name() -> &'static str {
        "column-pivots"
    }

    fn aliases() -> &'static [&'static str] {
        &["column_pivots"]
    }

    fn read(params: &Map<String, Value>) -> Result<Option<Vec<String>>, ViewError> {
        read_names::<Self>(params)
    }
}

impl NamedParam<Vec<String>> for ColumnsParam {
    fn name() -> &'static str {
        "columns"
    }

    fn read(params: &Map<String, Value>) -> Result<Option<Vec<String>>, ViewError> {
        read_names::<Self>(params)
    }
}

impl NamedParam<Vec<(String, String)>> for AggregatesParam {
    fn name() -> &'static str {
        "aggregates"
    }

    /// Accepts a `{column: aggregate}` mapping or a list of `[column, aggregate]` pairs.
    fn read(params: &Map<String, Value>) -> Result<Option<Vec<(String, String)>>, ViewError> {
        let Some(value) = Self::lookup(params) else {
            return Ok(None);
        };
        let entry = |column: &Value, aggregate: &Value| match (column.as_str(), aggregate.as_str()) {
            (Some(column), Some(aggregate)) => Ok((column.to_owned(), aggregate.to_owned())),
            _ => Err(Self::invalid(format!("{column}: {aggregate} is not an aggregate"))),
        };
        let aggregates = match value {
            Value::Object(map) => map
                .iter()
                .map(|(column, aggregate)| entry(&Value::from(column.as_str()), aggregate))
                .collect::<Result<Vec<_>, _>>()?,
            Value::Array(pairs) => pairs
                .iter()
                .map(|pair| match pair.as_array().map(Vec::as_slice) {
                    Some([column, aggregate]) => entry(column, aggregate),
                    _ => Err(Self::invalid(format!("{pair} is not a [column, aggregate] pair"))),
                })
                .collect::<Result<Vec<_>, _>>()?,
            other => return Err(Self::invalid(format!("expected a mapping, got {other}"))),
        };
        Ok(Some(aggregates))
    }
}

impl NamedParam<Vec<(String, SortDirection)>> for SortParam {
    fn name() -> &'static str {
        "sort"
    }

    fn read(params: &Map<String, Value>) -> Result<Option<Vec<(String, SortDirection)>>, ViewError> {
        let Some(value) = Self::lookup(params) else {
            return Ok(None);
        };
        let entries = value
            .as_array()
            .ok_or_else(|| Self::invalid(format!("expected a list of sort entries, got {value}")))?;
        entries
            .iter()
            .map(|entry| match entry.as_array().map(Vec::as_slice) {
                Some([Value::String(column), Value::String(direction)]) => {
                    Ok((column.to_owned(), SortDirection::parse(direction)?))
                }
                _ => Err(Self::invalid(format!("{entry} is not a [column, direction] pair"))),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }
}

impl NamedParam<Vec<FilterTerm>> for FilterParam {
    fn name() -> &'static str {
        "filter"
    }

    fn read(params: &Map<String, Value>) -> Result<Option<Vec<FilterTerm>>, ViewError> {
        let Some(value) = Self::lookup(params) else {
            return Ok(None);
        };
        let entries = value
            .as_array()
            .ok_or_else(|| Self::invalid(format!("expected a list of filter entries, got {value}")))?;
        entries
            .iter()
            .map(|entry| match entry.as_array().map(Vec::as_slice) {
                Some([Value::String(column), Value::String(operator)]) => Ok(FilterTerm {
                    column: column.to_owned(),
                    operator: FilterOperator::parse(operator)?,
                    value: Value::Null,
                }),
                Some([Value::String(column), Value::String(operator), value]) => Ok(FilterTerm {
                    column: column.to_owned(),
                    operator: FilterOperator::parse(operator)?,
                    value: value.to_owned(),
                }),
                _ => Err(Self::invalid(format!("{entry} is not a [column, operator, value] entry"))),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }
}

impl NamedParam<FilterOp> for FilterOpParam {
    fn name() -> &'static str {
        "filter_op"
    }

    fn aliases() -> &'static [&'static str] {
        &["filter-op"]
    }

    fn read(params: &Map<String, Value>) -> Result<Option<FilterOp>, ViewError> {
        let Some(value) = Self::lookup(params) else {
            return Ok(None);
        };
        match value.as_str().map(str::to_ascii_lowercase).as_deref() {
            Some("and") => Ok(Some(FilterOp::And)),
            Some("or") => Ok(Some(FilterOp::Or)),
            _ => Err(ViewError::InvalidConfiguration(format!(
                "unknown filter combination {value}"
            ))),
        }
    }
}

impl TryFrom<&Map<String, Value>> for ViewConfig {
    type Error = ViewError;

    /// Reads every known key, applying defaults for the missing ones.
    fn try_from(params: &Map<String, Value>) -> Result<Self, Self::Error> {
        Ok(Self {
            row_pivots: RowPivotsParam::read(params)?.unwrap_or_default(),
            column_pivots: ColumnPivotsParam::read(params)?.unwrap_or_default(),
            columns: ColumnsParam::read(params)?.unwrap_or_default(),
            aggregates: AggregatesParam::read(params)?.unwrap_or_default(),
            sort: SortParam::read(params)?.unwrap_or_default(),
            filter: FilterParam::read(params)?.unwrap_or_default(),
            filter_op: FilterOpParam::read(params)?.unwrap_or_default(),
            row_pivot_depth: None,
            column_pivot_depth: None,
        })
    }
}

impl TryFrom<&Value> for ViewConfig {
    type Error = ViewError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Object(params) => Self::try_from(params),
            other => Err(ViewError::InvalidConfiguration(format!(
                "expected a mapping, got {other}"
            ))),
        }
    }
}

impl ViewConfig {
    /// Checks every column reference against the table schema.
    ///
    /// Unknown columns, operators a column type does not accept and aggregates outside a
    /// column type's list are errors. Filter terms whose comparison value cannot apply
    /// are dropped with a warning.
    pub fn validate(mut self, schema: &TableSchema, validator: &DateValidator) -> Result<Self, ViewError> {
        let kind_of = |column: &str, usage: &str| {
            schema.kind_of(column).ok_or_else(|| {
                ViewError::InvalidConfiguration(format!("unknown column '{column}' in {usage}"))
            })
        };

        for column in &self.row_pivots {
            kind_of(column, "row-pivots")?;
        }
        for column in &self.column_pivots {
            kind_of(column, "column-pivots")?;
        }
        for column in &self.columns {
            kind_of(column, "columns")?;
        }
        for (column, _) in &self.sort {
            kind_of(column, "sort")?;
        }
        for (column, aggregate) in &self.aggregates {
            let kind = kind_of(column, "aggregates")?;
            if !aggregates_for(kind).contains(&aggregate.as_str()) {
                return Err(ViewError::InvalidConfiguration(format!(
                    "aggregate '{aggregate}' is not available for {} column '{column}'",
                    kind.as_str()
                )));
            }
        }

        let mut filter = Vec::with_capacity(self.filter.len());
        for term in self.filter {
            let kind = kind_of(&term.column, "filter")?;
            if !term.operator.allowed_for(kind) {
                return Err(ViewError::InvalidConfiguration(format!(
                    "filter operator '{}' is not available for {} column '{}'",
                    term.operator.as_str(),
                    kind.as_str(),
                    term.column
                )));
            }
            if term.is_valid(kind, validator) {
                filter.push(term);
            } else {
                log_warn!(
                    component = "view_config",
                    event = "filter_term_dropped",
                    column = %term.column,
                    operator = term.operator.as_str(),
                    value = %term.value
                );
            }
        }
        self.filter = filter;
        Ok(self)
    }

    /// Aggregate configured for a column, if any.
    pub fn aggregate_of(&self, column: &str) -> Option<&str> {
        self.aggregates
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, aggregate)| aggregate.as_str())
    }

    /// Sort columns missing from the visible columns, in first-seen order.
    /// The engine computes them after the visible columns of each band.
    pub fn hidden_columns(&self) -> Vec<String> {
        let mut hidden: Vec<String> = Vec::new();
        for (column, _) in &self.sort {
            if !self.columns.contains(column) && !hidden.contains(column) {
                hidden.push(column.to_owned());
            }
        }
        hidden
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> TableSchema {
        TableSchema::new(
            &["a".to_owned(), "b".to_owned(), "s".to_owned(), "d".to_owned(), "f".to_owned()],
            &[
                ColumnType::Integer,
                ColumnType::Float,
                ColumnType::String,
                ColumnType::DateTime,
                ColumnType::Boolean,
            ],
        )
    }

    #[test]
    fn defaults() {
        let config = ViewConfig::try_from(&json!({})).unwrap();
        assert_eq!(config, ViewConfig::default());
        assert_eq!(config.filter_op, FilterOp::And);
        assert_eq!(config.row_pivot_depth, None);
        assert_eq!(ViewConfig::try_from(&json!(null)).unwrap(), ViewConfig::default());
    }

    #[test]
    fn read_both_spellings() {
        let dashed = ViewConfig::try_from(&json!({"row-pivots": ["a"], "column-pivots": ["s"], "filter-op": "or"})).unwrap();
        let underscored = ViewConfig::try_from(&json!({"row_pivots": ["a"], "column_pivots": ["s"], "filter_op": "OR"})).unwrap();
        assert_eq!(dashed, underscored);
        assert_eq!(dashed.row_pivots, vec!["a"]);
        assert_eq!(dashed.filter_op, FilterOp::Or);
    }

    #[test]
    fn read_sort_and_filter() {
        let config = ViewConfig::try_from(&json!({
            "sort": [["b", "desc"], ["a", "col asc abs"]],
            "filter": [["a", ">", 1], ["s", "is null"]],
            "aggregates": {"b": "avg", "a": "sum"},
        }))
        .unwrap();
        assert_eq!(config.sort, vec![("b".to_owned(), SortDirection::Desc), ("a".to_owned(), SortDirection::ColAscAbs)]);
        assert_eq!(config.filter[0].operator, FilterOperator::GreaterThan);
        assert_eq!(config.filter[1].value, Value::Null);
        assert_eq!(config.aggregate_of("b"), Some("avg"));
        assert_eq!(config.aggregates[1], ("a".to_owned(), "sum".to_owned()));
    }

    #[test]
    fn aggregates_as_pairs() {
        let config = ViewConfig::try_from(&json!({"aggregates": [["a", "count"]]})).unwrap();
        assert_eq!(config.aggregates, vec![("a".to_owned(), "count".to_owned())]);
    }

    #[test]
    fn sort_ordinals() {
        let names = ["none", "asc", "desc", "col asc", "col desc", "asc abs", "desc abs", "col asc abs", "col desc abs"];
        let ordinals: Vec<u8> = names.iter().map(|name| SortDirection::parse(name).unwrap().ordinal()).collect();
        assert_eq!(ordinals, vec![2, 0, 1, 0, 1, 3, 4, 3, 4]);
        for name in names {
            assert_eq!(SortDirection::parse(name).unwrap().as_str(), name);
        }
        assert!(SortDirection::parse("col desc").unwrap().is_column_sort());
        assert!(SortDirection::parse("desc abs").unwrap().is_descending());
    }

    #[test]
    fn unknown_literals_rejected() {
        assert!(matches!(
            ViewConfig::try_from(&json!({"sort": [["a", "sideways"]]})),
            Err(ViewError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            ViewConfig::try_from(&json!({"filter": [["a", "~=", 1]]})),
            Err(ViewError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            ViewConfig::try_from(&json!({"sort": ["a"]})),
            Err(ViewError::InvalidParameter { .. })
        ));
        assert!(matches!(
            ViewConfig::try_from(&json!({"filter_op": "xor"})),
            Err(ViewError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn operators_gated_by_type() {
        assert!(FilterOperator::And.allowed_for(ColumnType::Boolean));
        assert!(!FilterOperator::And.allowed_for(ColumnType::Integer));
        assert!(FilterOperator::LessThan.allowed_for(ColumnType::Date));
        assert!(!FilterOperator::LessThan.allowed_for(ColumnType::String));
        assert!(FilterOperator::BeginsWith.allowed_for(ColumnType::String));
        assert!(!FilterOperator::Contains.allowed_for(ColumnType::Float));
        assert!(FilterOperator::IsNotNull.allowed_for(ColumnType::Boolean));

        let config = ViewConfig::try_from(&json!({"filter": [["s", "<", "x"]]})).unwrap();
        assert!(matches!(
            config.validate(&schema(), &DateValidator),
            Err(ViewError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn unknown_columns_rejected() {
        for raw in [
            json!({"row-pivots": ["zz"]}),
            json!({"sort": [["zz", "asc"]]}),
            json!({"filter": [["zz", "==", 1]]}),
            json!({"aggregates": {"zz": "sum"}}),
        ] {
            let config = ViewConfig::try_from(&raw).unwrap();
            assert!(matches!(
                config.validate(&schema(), &DateValidator),
                Err(ViewError::InvalidConfiguration(_))
            ));
        }
    }

    #[test]
    fn aggregates_gated_by_type() {
        let config = ViewConfig::try_from(&json!({"aggregates": {"s": "sum"}})).unwrap();
        assert!(config.validate(&schema(), &DateValidator).is_err());
        let config = ViewConfig::try_from(&json!({"aggregates": {"f": "and", "a": "median"}})).unwrap();
        assert!(config.validate(&schema(), &DateValidator).is_ok());
    }

    #[test]
    fn invalid_terms_dropped() {
        let config = ViewConfig::try_from(&json!({
            "filter": [
                ["a", "==", null],
                ["d", ">", "not a date"],
                ["d", ">", "2019-07-11"],
                ["s", "in", "x"],
                ["s", "in", ["x", "y"]],
                ["b", "is null"],
            ]
        }))
        .unwrap();
        let config = config.validate(&schema(), &DateValidator).unwrap();
        let kept: Vec<&str> = config.filter.iter().map(|term| term.column.as_str()).collect();
        assert_eq!(kept, vec!["d", "s", "b"]);
    }

    #[test]
    fn hidden_sort_columns() {
        let config = ViewConfig::try_from(&json!({
            "columns": ["a"],
            "sort": [["b", "asc"], ["a", "desc"], ["b", "desc"]],
        }))
        .unwrap();
        assert_eq!(config.hidden_columns(), vec!["b"]);
    }

    #[test]
    fn serialize_round_trips_keys() {
        let config = ViewConfig::try_from(&json!({"row-pivots": ["a"], "sort": [["a", "asc abs"]], "filter": [["a", ">", 1]]})).unwrap();
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["row-pivots"], json!(["a"]));
        assert_eq!(value["sort"], json!([["a", "asc abs"]]));
        assert_eq!(value["filter"], json!([["a", ">", 1]]));
        assert_eq!(value["filter_op"], json!("and"));
        assert_eq!(ViewConfig::try_from(&value).unwrap(), config);
    }
}
