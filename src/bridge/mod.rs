//! # Engine Bridge
//!
//! The narrow contract through which tables and views drive the external columnar engine.
//! Engine table and view handles are opaque resources owned by this crate's [`Table`] and
//! [`View`] wrappers; every call is synchronous and engine failures propagate unchanged.
//!
//! [`Table`]: crate::table::Table
//! [`View`]: crate::view::View
use crate::database::table::TableSchema;
use crate::helpers::path::COLUMN_SEPARATOR;
use crate::input::accessor::Accessor;
use crate::input::validator::DateValidator;
use crate::view::config::NamedParam;
use crate::view::config::ViewConfig;
use crate::view::config::ViewError;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

/// Failures reported by the engine.
#[derive(Error, Debug, PartialEq)]
pub enum EngineError {
    #[error("Column '{0}' does not exist")]
    UnknownColumn(String),

    #[error("Aggregate '{0}' is not supported")]
    UnsupportedAggregate(String),

    #[error("{0}")]
    Failure(String),
}

/// What a table load does with the accessor's rows.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    Insert,
    Delete,
}

/// Table construction options.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableOptions {
    /// Maximum number of rows kept; older rows are overwritten first
    pub limit: usize,
    /// Column whose values identify rows for updates and removals
    pub index: Option<String>,
    /// Separator of flattened column-pivot names
    pub separator: String,
}

impl TableOptions {
    pub const DEFAULT_LIMIT: usize = 4_294_967_295;
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            limit: Self::DEFAULT_LIMIT,
            index: None,
            separator: COLUMN_SEPARATOR.to_owned(),
        }
    }
}

/// Row limit parameter handler
struct LimitParam;

/// Index column parameter handler
struct IndexParam;

/// Column separator parameter handler
struct SeparatorParam;

impl NamedParam<usize> for LimitParam {
    fn name() -> &'static str {
        "limit"
    }

    fn read(params: &Map<String, Value>) -> Result<Option<usize>, ViewError> {
        Self::lookup(params)
            .map(|value| {
                value
                    .as_u64()
                    .filter(|limit| *limit > 0)
                    .map(|limit| limit as usize)
                    .ok_or_else(|| Self::invalid(format!("{value} is not a positive row count")))
            })
            .transpose()
    }
}

impl NamedParam<String> for IndexParam {
    fn name() -> &'static str {
        "index"
    }

    /// An empty index name means no index.
    fn read(params: &Map<String, Value>) -> Result<Option<String>, ViewError> {
        match Self::lookup(params) {
            None => Ok(None),
            Some(Value::String(name)) if name.is_empty() => Ok(None),
            Some(Value::String(name)) => Ok(Some(name.to_owned())),
            Some(other) => Err(Self::invalid(format!("{other} is not a column name"))),
        }
    }
}

impl NamedParam<String> for SeparatorParam {
    fn name() -> &'static str {
        "separator"
    }

    fn read(params: &Map<String, Value>) -> Result<Option<String>, ViewError> {
        match Self::lookup(params) {
            None => Ok(None),
            Some(Value::String(separator)) => Ok(Some(separator.to_owned())),
            Some(other) => Err(Self::invalid(format!("{other} is not a string"))),
        }
    }
}

impl TryFrom<&Map<String, Value>> for TableOptions {
    type Error = ViewError;

    fn try_from(params: &Map<String, Value>) -> Result<Self, Self::Error> {
        let defaults = Self::default();
        Ok(Self {
            limit: LimitParam::read(params)?.unwrap_or(defaults.limit),
            index: IndexParam::read(params)?,
            separator: SeparatorParam::read(params)?.unwrap_or(defaults.separator),
        })
    }
}

/// A columnar engine able to store tables and evaluate pivoted views over them.
pub trait Engine {
    type Table: EngineTable;
    type View: EngineView;

    /// Loads the accessor's rows into `existing`, or into a new table when `None`.
    fn make_table(
        &self,
        existing: Option<&Self::Table>,
        accessor: &Accessor,
        options: &TableOptions,
        operation: Operation,
        is_update: bool,
        is_partial: bool,
    ) -> Result<Self::Table, EngineError>;

    /// Builds an unpivoted view.
    fn make_view_zero(
        &self,
        table: &Self::Table,
        session_key: &str,
        separator: &str,
        config: &ViewConfig,
        validator: &DateValidator,
    ) -> Result<Self::View, EngineError>;

    /// Builds a view pivoted by rows only.
    fn make_view_one(
        &self,
        table: &Self::Table,
        session_key: &str,
        separator: &str,
        config: &ViewConfig,
        validator: &DateValidator,
    ) -> Result<Self::View, EngineError>;

    /// Builds a view pivoted by columns, and possibly rows.
    fn make_view_two(
        &self,
        table: &Self::Table,
        session_key: &str,
        separator: &str,
        config: &ViewConfig,
        validator: &DateValidator,
    ) -> Result<Self::View, EngineError>;

    /// Picks the entry point matching the view's sidedness.
    fn make_view(
        &self,
        sides: u8,
        table: &Self::Table,
        session_key: &str,
        separator: &str,
        config: &ViewConfig,
        validator: &DateValidator,
    ) -> Result<Self::View, EngineError> {
        match sides {
            0 => self.make_view_zero(table, session_key, separator, config, validator),
            1 => self.make_view_one(table, session_key, separator, config, validator),
            _ => self.make_view_two(table, session_key, separator, config, validator),
        }
    }
}

/// Engine-side table handle.
pub trait EngineTable {
    /// Number of stored rows.
    fn size(&self) -> usize;

    fn schema(&self) -> TableSchema;
}

/// Engine-side view handle. Every call re-materializes against the current table state.
pub trait EngineView {
    type Slice: DataSlice;

    fn num_rows(&self) -> usize;

    /// Number of data columns, hidden sort columns included, row path slot excluded.
    fn num_columns(&self) -> usize;

    /// Output type per visible column.
    fn schema(&self) -> TableSchema;

    /// Materializes the cells of `[start_row, end_row) x [start_col, end_col)`.
    /// Column indices count the row path slot of sided views.
    fn get_data(
        &self,
        start_row: usize,
        end_row: usize,
        start_col: usize,
        end_col: usize,
    ) -> Result<Self::Slice, EngineError>;
}

/// Engine-produced cursor over one rectangular result window.
/// Indices are absolute view coordinates.
pub trait DataSlice {
    /// Pivot keys leading to row `ridx`; empty for totals and unpivoted rows.
    fn row_path(&self, ridx: usize) -> Vec<Value>;

    /// Column-pivot keys of column `cidx`, followed by its underlying column name.
    fn column_path(&self, cidx: usize) -> Vec<Value>;

    fn get_zero(&self, ridx: usize, cidx: usize) -> Value;

    fn get_one(&self, ridx: usize, cidx: usize) -> Value;

    fn get_two(&self, ridx: usize, cidx: usize) -> Value;

    /// Reads a cell through the accessor matching the view's sidedness.
    fn get(&self, sides: u8, ridx: usize, cidx: usize) -> Value {
        match sides {
            0 => self.get_zero(ridx, cidx),
            1 => self.get_one(ridx, cidx),
            _ => self.get_two(ridx, cidx),
        }
    }
}
