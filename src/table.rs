//! # Table Module
//!
//! A [`Table`] owns the engine table handle built from user data, the accessor it was last
//! loaded from, and weak references to every [`View`] it spawned.
use crate::bridge::Engine;
use crate::bridge::EngineTable;
use crate::bridge::Operation;
use crate::bridge::TableOptions;
use crate::database::table::TableSchema;
use crate::error::Result;
use crate::error::ResultMessage;
use crate::error::RustyPivotError;
use crate::input::accessor::Accessor;
use crate::logging::log_info;
use crate::view::config::ViewConfig;
use crate::view::View;
use crate::view::ViewInner;
use serde_json::Map;
use serde_json::Value;
use std::cell::Cell;
use std::cell::RefCell;
use std::rc::Rc;
use std::rc::Weak;
use thiserror::Error;

/// Errors related to table operations.
#[derive(Error, Debug, PartialEq)]
pub enum TableError {
    #[error("Cannot remove rows from a table without an index column")]
    IndexRequired,
}

/// Tabular data loaded into the engine.
pub struct Table<E: Engine> {
    engine: Rc<E>,
    handle: E::Table,
    accessor: Accessor,
    options: TableOptions,
    view_counter: Cell<usize>,
    views: RefCell<Vec<Weak<ViewInner<E::View>>>>,
}

impl<E: Engine> Table<E> {
    /// Loads row records, column arrays or a schema into a new engine table.
    pub fn new(engine: Rc<E>, data: Value, options: TableOptions) -> Result<Self> {
        let accessor = Accessor::new(data)?;
        let types = accessor.infer_types();
        let accessor = accessor.with_types(types);
        let handle = engine
            .make_table(None, &accessor, &options, Operation::Insert, false, false)
            .map_err(RustyPivotError::from)
            .with_prefix("Create table failed")?;
        log_info!(
            component = "table",
            event = "table_created",
            format = accessor.format().as_str(),
            rows = handle.size(),
            columns = accessor.names().len()
        );
        Ok(Self {
            engine,
            handle,
            accessor,
            options,
            view_counter: Cell::new(0),
            views: RefCell::new(Vec::new()),
        })
    }

    /// Number of stored rows.
    pub fn size(&self) -> usize {
        self.handle.size()
    }

    pub fn schema(&self) -> Map<String, Value> {
        self.handle.schema().to_map()
    }

    /// Column names, in table order.
    pub fn columns(&self) -> Vec<String> {
        self.handle.schema().names()
    }

    pub fn options(&self) -> &TableOptions {
        &self.options
    }

    /// Appends rows, or upserts them by index when the table has one.
    /// New values coerce to the types the table already has.
    pub fn update(&mut self, data: Value) -> Result<()> {
        let accessor = Accessor::new(data)?.with_schema(&self.handle.schema());
        let is_partial = self.options.index.is_some();
        self.handle = self
            .engine
            .make_table(Some(&self.handle), &accessor, &self.options, Operation::Insert, true, is_partial)
            .map_err(RustyPivotError::from)
            .with_prefix("Update table failed")?;
        log_info!(
            component = "table",
            event = "table_updated",
            rows = accessor.row_count(),
            size = self.handle.size()
        );
        self.accessor = accessor;
        self.notify_views();
        Ok(())
    }

    /// Removes the rows whose index column holds one of `keys`.
    pub fn remove(&mut self, keys: Vec<Value>) -> Result<()> {
        let index = self.options.index.clone().ok_or(TableError::IndexRequired)?;
        let mut data = Map::new();
        data.insert(index, Value::Array(keys));
        let accessor = Accessor::new(Value::Object(data))?.with_schema(&self.handle.schema());
        self.handle = self
            .engine
            .make_table(Some(&self.handle), &accessor, &self.options, Operation::Delete, true, true)
            .map_err(RustyPivotError::from)
            .with_prefix("Remove rows failed")?;
        log_info!(
            component = "table",
            event = "table_rows_removed",
            keys = accessor.row_count(),
            size = self.handle.size()
        );
        self.accessor = accessor;
        self.notify_views();
        Ok(())
    }

    /// Creates a view over this table.
    ///
    /// Missing `columns` default to every table column. The configuration is validated
    /// against the current schema before the engine sees it.
    pub fn view(&self, config: &Value) -> Result<View<E::View>> {
        let schema = self.handle.schema();
        let config = self.normalize(config, &schema)?;
        let session_key = self.next_session_key();
        let handle = self.engine.make_view(
            crate::view::sides(&config),
            &self.handle,
            &session_key,
            &self.options.separator,
            &config,
            self.accessor.date_validator(),
        )?;
        let view = View::new(handle, config, session_key, &self.options.separator);
        self.views.borrow_mut().push(view.downgrade());
        Ok(view)
    }

    fn normalize(&self, config: &Value, schema: &TableSchema) -> Result<ViewConfig> {
        let mut config = ViewConfig::try_from(config)?;
        if config.columns.is_empty() {
            config.columns = schema.names();
        }
        Ok(config.validate(schema, self.accessor.date_validator())?)
    }

    fn next_session_key(&self) -> String {
        let id = self.view_counter.get();
        self.view_counter.set(id + 1);
        format!("view_{id}")
    }

    /// Number of views still alive.
    pub fn num_views(&self) -> usize {
        self.views.borrow().iter().filter(|view| view.strong_count() > 0).count()
    }

    /// Fans an update out to every live view, forgetting released ones.
    fn notify_views(&self) {
        let live: Vec<Rc<ViewInner<E::View>>> = {
            let mut views = self.views.borrow_mut();
            views.retain(|view| view.strong_count() > 0);
            views.iter().filter_map(Weak::upgrade).collect()
        };
        for view in live {
            view.notify();
        }
    }

    /// Releases the table. Views spawned from it keep their own engine handles.
    pub fn delete(self) {
        log_info!(component = "table", event = "table_deleted", views = self.num_views());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryEngine;
    use crate::view::FormatOptions;
    use serde_json::json;

    fn table(data: Value) -> Table<MemoryEngine> {
        Table::new(Rc::new(MemoryEngine), data, TableOptions::default()).unwrap()
    }

    fn indexed(data: Value, index: &str) -> Table<MemoryEngine> {
        let options = TableOptions {
            index: Some(index.to_owned()),
            ..TableOptions::default()
        };
        Table::new(Rc::new(MemoryEngine), data, options).unwrap()
    }

    fn all() -> FormatOptions {
        FormatOptions::default()
    }

    #[test]
    fn records_round_trip() {
        let data = json!([{"a": 1, "b": "x"}, {"a": 2, "b": "y"}]);
        let table = table(data.clone());
        assert_eq!(table.size(), 2);
        assert_eq!(table.columns(), vec!["a", "b"]);
        let view = table.view(&json!({})).unwrap();
        assert_eq!(Value::from(view.to_records(&all()).unwrap()), data);
    }

    #[test]
    fn column_arrays_to_every_format() {
        let table = table(json!({"a": [1, 3], "b": [2, 4]}));
        let view = table.view(&Value::Null).unwrap();
        assert_eq!(view.sides(), 0);
        assert_eq!(Value::Object(view.to_columns(&all()).unwrap()), json!({"a": [1, 3], "b": [2, 4]}));
        assert_eq!(Value::from(view.to_array(&all()).unwrap()), json!([[1, 2], [3, 4]]));
        let window = FormatOptions {
            start_row: Some(1),
            start_col: Some(1),
            ..FormatOptions::default()
        };
        assert_eq!(Value::from(view.to_records(&window).unwrap()), json!([{"b": 4}]));
    }

    #[test]
    fn row_pivot_emits_row_paths() {
        let table = table(json!([{"a": 1, "b": 2}]));
        let view = table.view(&json!({"row-pivots": ["a"]})).unwrap();
        assert_eq!(view.sides(), 1);
        assert_eq!(view.num_rows(), 2);
        assert_eq!(
            Value::Object(view.to_columns(&all()).unwrap()),
            json!({"__ROW_PATH__": [[], ["1"]], "a": [1, 1], "b": [2, 2]})
        );
        let leaves = FormatOptions {
            leaves_only: Some(true),
            ..FormatOptions::default()
        };
        assert_eq!(
            Value::from(view.to_records(&leaves).unwrap()),
            json!([{"__ROW_PATH__": ["1"], "a": 1, "b": 2}])
        );
        let bare = FormatOptions {
            has_row_path: Some(false),
            ..FormatOptions::default()
        };
        assert_eq!(Value::Object(view.to_columns(&bare).unwrap()), json!({"a": [1, 1], "b": [2, 2]}));
    }

    #[test]
    fn hidden_sort_column_is_never_exposed() {
        let table = table(json!({"a": [1, 3], "b": [2, 4]}));
        let view = table.view(&json!({"columns": ["a"], "sort": [["b", "desc"]]})).unwrap();
        assert_eq!(view.num_columns(), 2);
        assert_eq!(Value::from(view.to_records(&all()).unwrap()), json!([{"a": 3}, {"a": 1}]));
        assert_eq!(Value::Object(view.to_columns(&all()).unwrap()), json!({"a": [3, 1]}));
        assert_eq!(Value::from(view.to_array(&all()).unwrap()), json!([[3], [1]]));
    }

    #[test]
    fn hidden_sort_column_skipped_under_row_pivot() {
        let table = table(json!({"a": [1, 3], "b": [2, 4]}));
        let view = table
            .view(&json!({"row-pivots": ["a"], "columns": ["a"], "sort": [["b", "desc"]]}))
            .unwrap();
        assert_eq!(view.num_columns(), 2);
        assert_eq!(
            Value::from(view.to_records(&all()).unwrap()),
            json!([
                {"__ROW_PATH__": [], "a": 4},
                {"__ROW_PATH__": ["3"], "a": 3},
                {"__ROW_PATH__": ["1"], "a": 1}
            ])
        );
        assert_eq!(
            Value::Object(view.to_columns(&all()).unwrap()),
            json!({"__ROW_PATH__": [[], ["3"], ["1"]], "a": [4, 3, 1]})
        );
        assert_eq!(
            Value::from(view.to_array(&all()).unwrap()),
            json!([[[], 4], [["3"], 3], [["1"], 1]])
        );
    }

    #[test]
    fn row_pivot_groups_equal_keys() {
        let table = table(json!([{"a": 1, "b": "s1"}, {"a": 1, "b": "s2"}]));
        let view = table.view(&json!({"row-pivots": ["a"]})).unwrap();
        assert_eq!(view.num_rows(), 2);
        assert_eq!(
            Value::from(view.to_records(&all()).unwrap()),
            json!([
                {"__ROW_PATH__": [], "a": 2, "b": 2},
                {"__ROW_PATH__": ["1"], "a": 2, "b": 2}
            ])
        );
    }

    #[test]
    fn overflowing_sums_do_not_panic() {
        let largest = table(json!([{"k": "x", "a": i64::MAX}, {"k": "x", "a": 1}]));
        let view = largest.view(&json!({"row-pivots": ["k"], "columns": ["a"]})).unwrap();
        let records = view.to_records(&all()).unwrap();
        assert_eq!(records[1]["a"], json!(i64::MAX as f64 + 1.0));

        let smallest = table(json!([{"k": "x", "a": i64::MIN}]));
        let view = smallest
            .view(&json!({"row-pivots": ["k"], "columns": ["a"], "aggregates": {"a": "sum abs"}}))
            .unwrap();
        assert_eq!(view.to_records(&all()).unwrap()[0]["a"], json!(-(i64::MIN as f64)));
    }

    #[test]
    fn empty_pivot_intersection_is_null() {
        let table = table(json!([{"a": 1, "b": 2, "c": "x"}, {"a": 3, "b": 1, "c": "y"}]));
        let view = table
            .view(&json!({"row-pivots": ["c"], "column-pivots": ["c"], "columns": ["a"]}))
            .unwrap();
        let records = view.to_records(&all()).unwrap();
        assert_eq!(
            Value::Object(records[1].clone()),
            json!({"__ROW_PATH__": ["x"], "x|a": 1, "y|a": null})
        );
    }

    #[test]
    fn schema_input_then_temporal_updates() {
        let mut table = table(json!({"d": "date", "t": "datetime", "n": "float"}));
        assert_eq!(table.size(), 0);
        assert_eq!(Value::Object(table.schema()), json!({"d": "date", "t": "datetime", "n": "float"}));
        table
            .update(json!([{"d": "2019-07-11", "t": "2019-07-11 12:30:00", "n": "1.5"}]))
            .unwrap();
        let view = table.view(&json!({})).unwrap();
        assert_eq!(
            Value::from(view.to_records(&all()).unwrap()),
            json!([{"d": "2019-07-11", "t": 1562848200000_i64, "n": 1.5}])
        );
    }

    #[test]
    fn updates_reach_live_views() {
        let mut table = table(json!([{"a": 1}]));
        let view = table.view(&json!({})).unwrap();
        let released = table.view(&json!({})).unwrap();
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        view.on_update(move || counter.set(counter.get() + 1));
        assert_eq!(table.num_views(), 2);
        released.delete();
        assert_eq!(table.num_views(), 1);

        table.update(json!({"a": [2, 3]})).unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(view.num_rows(), 3);
        assert_eq!(Value::from(view.to_array(&all()).unwrap()), json!([[1], [2], [3]]));
    }

    #[test]
    fn indexed_update_and_remove() {
        let mut table = indexed(json!([{"id": 1, "v": "x"}, {"id": 2, "v": "y"}]), "id");
        table.update(json!([{"id": 2, "v": "z"}])).unwrap();
        assert_eq!(table.size(), 2);
        table.remove(vec![json!(1)]).unwrap();
        let view = table.view(&json!({})).unwrap();
        assert_eq!(Value::from(view.to_records(&all()).unwrap()), json!([{"id": 2, "v": "z"}]));
    }

    #[test]
    fn remove_requires_index() {
        let mut table = table(json!([{"a": 1}]));
        assert!(matches!(
            table.remove(vec![json!(1)]),
            Err(RustyPivotError::TableError(TableError::IndexRequired))
        ));
    }

    #[test]
    fn invalid_configurations_rejected() {
        let table = table(json!([{"a": 1, "s": "x"}]));
        assert!(matches!(
            table.view(&json!({"row-pivots": ["zz"]})),
            Err(RustyPivotError::ViewError(_))
        ));
        assert!(matches!(
            table.view(&json!({"aggregates": {"s": "sum"}})),
            Err(RustyPivotError::ViewError(_))
        ));
        assert!(matches!(
            table.view(&json!({"filter": [["s", ">", 1]]})),
            Err(RustyPivotError::ViewError(_))
        ));
        assert!(table.view(&json!({"row-pivots": 7})).is_err());
    }

    #[test]
    fn unsupported_input_rejected() {
        let result = Table::new(Rc::new(MemoryEngine), json!(42), TableOptions::default());
        assert!(matches!(result, Err(RustyPivotError::InputError(_))));
    }

    #[test]
    fn session_keys_are_unique() {
        let table = table(json!([{"a": 1}]));
        let first = table.view(&json!({})).unwrap();
        let second = table.view(&json!({})).unwrap();
        assert_eq!(first.session_key(), "view_0");
        assert_eq!(second.session_key(), "view_1");
    }
}
