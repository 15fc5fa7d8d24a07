//! # Result Flattener
//!
//! Reshapes a rectangular engine result slice into the external output formats:
//!
//! - **records**: one `{column name: value}` map per row
//! - **columns**: one `column name -> [values]` map
//! - **array**: one `[values]` list per row
//!
//! Sided views carry a leading row-path pseudo-column, emitted under `__ROW_PATH__` when
//! requested. Columns that exist only to satisfy a sort on a non-visible column are never
//! emitted.
use crate::bridge::DataSlice;
use crate::helpers::path::join_path;
use crate::helpers::path::path_to_strings;
use crate::helpers::path::ROW_PATH_KEY;
use serde_json::Map;
use serde_json::Value;

/// Checks whether result column `cidx` only carries a hidden sort dependency.
///
/// The engine lays out every column-pivot band as the visible columns followed by the
/// hidden ones, after `side_offset` leading pseudo-columns. Pseudo-columns are never hidden.
pub fn is_hidden_column(cidx: usize, visible: usize, hidden: usize, side_offset: usize) -> bool {
    if hidden == 0 || cidx < side_offset {
        return false;
    }
    (cidx - side_offset) % (visible + hidden) >= visible
}

/// Resolved window and flags of one flatten call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlattenOptions {
    pub start_row: usize,
    pub end_row: usize,
    pub start_col: usize,
    pub end_col: usize,
    /// Emit the row path under `__ROW_PATH__`
    pub has_row_path: bool,
    /// Skip subtotal rows whose row path is shorter than the row pivots
    pub leaves_only: bool,
}

/// Shape of the view a slice was taken from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SliceShape<'a> {
    pub sides: u8,
    pub row_pivots: usize,
    pub visible: usize,
    pub hidden: usize,
    pub separator: &'a str,
}

impl SliceShape<'_> {
    /// Number of leading pseudo-columns: the row path slot of sided views.
    #[inline]
    pub fn side_offset(&self) -> usize {
        usize::from(self.sides > 0)
    }
}

/// Receives flattened rows and builds one output format.
pub trait FormatSink {
    type Output;

    /// Starts a retained row.
    fn begin_row(&mut self);

    /// Places the value of column `name` in the current row.
    fn push(&mut self, name: &str, value: Value);

    /// Finishes the output.
    fn finish(self, has_row_path: bool) -> Self::Output;
}

/// Builds an ordered sequence of row maps.
#[derive(Default)]
pub struct RecordsSink {
    rows: Vec<Map<String, Value>>,
}

impl FormatSink for RecordsSink {
    type Output = Vec<Map<String, Value>>;

    fn begin_row(&mut self) {
        self.rows.push(Map::new());
    }

    fn push(&mut self, name: &str, value: Value) {
        if let Some(row) = self.rows.last_mut() {
            row.insert(name.to_owned(), value);
        }
    }

    fn finish(self, _has_row_path: bool) -> Self::Output {
        self.rows
    }
}

/// Builds a mapping from column name to its values.
#[derive(Default)]
pub struct ColumnsSink {
    columns: Map<String, Value>,
}

impl FormatSink for ColumnsSink {
    type Output = Map<String, Value>;

    fn begin_row(&mut self) {}

    fn push(&mut self, name: &str, value: Value) {
        let column = self
            .columns
            .entry(name.to_owned())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(values) = column {
            values.push(value);
        }
    }

    fn finish(mut self, has_row_path: bool) -> Self::Output {
        if !has_row_path {
            self.columns.remove(ROW_PATH_KEY);
        }
        self.columns
    }
}

/// Builds an ordered sequence of value rows.
#[derive(Default)]
pub struct ArraySink {
    rows: Vec<Vec<Value>>,
}

impl FormatSink for ArraySink {
    type Output = Vec<Vec<Value>>;

    fn begin_row(&mut self) {
        self.rows.push(Vec::new());
    }

    fn push(&mut self, _name: &str, value: Value) {
        if let Some(row) = self.rows.last_mut() {
            row.push(value);
        }
    }

    fn finish(self, _has_row_path: bool) -> Self::Output {
        self.rows
    }
}

/// Walks `[start_row, end_row) x [start_col, end_col)` of a slice into a sink.
pub fn flatten<D, S>(options: &FlattenOptions, shape: &SliceShape, slice: &D, mut sink: S) -> S::Output
where
    D: DataSlice + ?Sized,
    S: FormatSink,
{
    let side_offset = shape.side_offset();
    for ridx in options.start_row..options.end_row {
        let row_path = if options.has_row_path || options.leaves_only {
            slice.row_path(ridx)
        } else {
            Vec::new()
        };
        if options.leaves_only && row_path.len() < shape.row_pivots {
            continue;
        }

        sink.begin_row();
        for cidx in options.start_col..options.end_col {
            if is_hidden_column(cidx, shape.visible, shape.hidden, side_offset) {
                continue;
            }
            if cidx == options.start_col && shape.sides > 0 {
                if options.has_row_path {
                    let path = path_to_strings(&row_path).into_iter().map(Value::String).collect();
                    sink.push(ROW_PATH_KEY, Value::Array(path));
                }
                continue;
            }
            let name = join_path(&slice.column_path(cidx), shape.separator);
            sink.push(&name, slice.get(shape.sides, ridx, cidx));
        }
    }
    sink.finish(options.has_row_path)
}
