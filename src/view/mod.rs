//! # View Module
//!
//! A [`View`] is a live, read-only projection of a table under one [`ViewConfig`]. It is
//! not a snapshot: row and column counts, the schema and every serialized output are
//! re-materialized by the engine on demand, so they reflect all table updates so far.
use crate::bridge::EngineView;
use crate::error::Result;
use crate::logging::log_debug;
use crate::view::config::ViewConfig;
use crate::view::formatter::flatten;
use crate::view::formatter::ArraySink;
use crate::view::formatter::ColumnsSink;
use crate::view::formatter::FlattenOptions;
use crate::view::formatter::FormatSink;
use crate::view::formatter::RecordsSink;
use crate::view::formatter::SliceShape;
use serde::Deserialize;
use serde_json::Map;
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;
use std::rc::Weak;

pub mod config;
pub mod formatter;

/// Number of pivoted sides of a configuration: 2 with column pivots, 1 with row pivots
/// only, 0 otherwise.
pub fn sides(config: &ViewConfig) -> u8 {
    if !config.column_pivots.is_empty() {
        2
    } else if !config.row_pivots.is_empty() {
        1
    } else {
        0
    }
}

/// Caller-facing serialization window; unset fields cover the whole view.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FormatOptions {
    pub start_row: Option<usize>,
    pub end_row: Option<usize>,
    pub start_col: Option<usize>,
    pub end_col: Option<usize>,
    /// Defaults to true for pivoted views
    pub has_row_path: Option<bool>,
    pub leaves_only: Option<bool>,
}

type Callback = Box<dyn Fn()>;

/// State shared between a [`View`] and the weak reference its table keeps.
pub(crate) struct ViewInner<H> {
    handle: H,
    config: ViewConfig,
    sides: u8,
    session_key: String,
    separator: String,
    callbacks: RefCell<Vec<Callback>>,
}

impl<H> ViewInner<H> {
    /// Runs every registered update callback.
    pub(crate) fn notify(&self) {
        for callback in self.callbacks.borrow().iter() {
            callback();
        }
    }
}

/// A pivoted query over a table.
pub struct View<H: EngineView> {
    inner: Rc<ViewInner<H>>,
}

impl<H: EngineView> View<H> {
    pub(crate) fn new(handle: H, config: ViewConfig, session_key: String, separator: &str) -> Self {
        let sides = sides(&config);
        log_debug!(component = "view", event = "view_created", session_key = %session_key, sides = sides);
        Self {
            inner: Rc::new(ViewInner {
                handle,
                config,
                sides,
                session_key,
                separator: separator.to_owned(),
                callbacks: RefCell::new(Vec::new()),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> Weak<ViewInner<H>> {
        Rc::downgrade(&self.inner)
    }

    pub fn sides(&self) -> u8 {
        self.inner.sides
    }

    pub fn config(&self) -> &ViewConfig {
        &self.inner.config
    }

    /// Key identifying this view among the live views of its table.
    pub fn session_key(&self) -> &str {
        &self.inner.session_key
    }

    /// Number of aggregated rows, totals included.
    pub fn num_rows(&self) -> usize {
        self.inner.handle.num_rows()
    }

    /// Number of data columns the engine computes. Hidden sort columns are counted, the
    /// row path slot is not.
    pub fn num_columns(&self) -> usize {
        self.inner.handle.num_columns()
    }

    /// Output type per visible column, as a `name -> type name` map.
    pub fn schema(&self) -> Map<String, Value> {
        self.inner.handle.schema().to_map()
    }

    /// Registers a callback invoked after every update of the underlying table.
    pub fn on_update(&self, callback: impl Fn() + 'static) {
        self.inner.callbacks.borrow_mut().push(Box::new(callback));
    }

    /// Serializes the view as an ordered sequence of row maps.
    pub fn to_records(&self, options: &FormatOptions) -> Result<Vec<Map<String, Value>>> {
        self.to_format(options, RecordsSink::default())
    }

    /// Serializes the view as a mapping from column name to its values.
    pub fn to_columns(&self, options: &FormatOptions) -> Result<Map<String, Value>> {
        self.to_format(options, ColumnsSink::default())
    }

    /// Serializes the view as an ordered sequence of value rows.
    pub fn to_array(&self, options: &FormatOptions) -> Result<Vec<Vec<Value>>> {
        self.to_format(options, ArraySink::default())
    }

    fn to_format<S: FormatSink>(&self, options: &FormatOptions, sink: S) -> Result<S::Output> {
        let inner = &self.inner;
        let side_offset = usize::from(inner.sides > 0);
        let num_rows = inner.handle.num_rows();
        let num_columns = inner.handle.num_columns() + side_offset;

        let end_row = options.end_row.unwrap_or(num_rows).min(num_rows);
        let end_col = options.end_col.unwrap_or(num_columns).min(num_columns);
        let options = FlattenOptions {
            start_row: options.start_row.unwrap_or(0).min(end_row),
            end_row,
            start_col: options.start_col.unwrap_or(0).min(end_col),
            end_col,
            has_row_path: options.has_row_path.unwrap_or(inner.sides > 0),
            leaves_only: options.leaves_only.unwrap_or(false),
        };
        let slice = inner
            .handle
            .get_data(options.start_row, options.end_row, options.start_col, options.end_col)?;
        let shape = SliceShape {
            sides: inner.sides,
            row_pivots: inner.config.row_pivots.len(),
            visible: inner.config.columns.len(),
            hidden: inner.config.hidden_columns().len(),
            separator: &inner.separator,
        };
        Ok(flatten(&options, &shape, &slice, sink))
    }

    /// Releases the view; it no longer receives updates.
    pub fn delete(self) {
        log_debug!(component = "view", event = "view_released", session_key = %self.inner.session_key);
    }
}
