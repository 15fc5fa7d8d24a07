//! # In-Memory Engine
//!
//! A reference implementation of the engine contract that keeps tables as row-major
//! vectors of [`Scalar`]s and evaluates views on demand. Useful for tests and for
//! embedding without a native engine.
use crate::bridge::Engine;
use crate::bridge::EngineError;
use crate::bridge::EngineTable;
use crate::bridge::Operation;
use crate::bridge::TableOptions;
use crate::database::column::ColumnType;
use crate::database::scalar::Scalar;
use crate::database::table::TableSchema;
use crate::input::accessor::Accessor;
use crate::input::accessor::INDEX_COLUMN;
use crate::input::validator::DateValidator;
use crate::logging::log_debug;
use crate::view::config::ViewConfig;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

mod aggregate;
mod query;

pub use query::MemorySlice;
pub use query::MemoryView;

/// Engine storing every table in process memory.
#[derive(Clone, Copy, Debug, Default)]
pub struct MemoryEngine;

/// Stored rows of one table.
#[derive(Debug)]
pub(crate) struct TableState {
    pub(crate) schema: TableSchema,
    pub(crate) rows: Vec<Vec<Scalar>>,
    limit: usize,
    index: Option<usize>,
    /// Next slot to overwrite once `limit` rows are stored
    cursor: usize,
}

impl TableState {
    fn new(accessor: &Accessor, options: &TableOptions) -> Result<Self, EngineError> {
        let types = accessor.infer_types();
        let (names, types): (Vec<String>, Vec<ColumnType>) = accessor
            .names()
            .iter()
            .cloned()
            .zip(types)
            .filter(|(name, _)| name != INDEX_COLUMN)
            .unzip();
        let schema = TableSchema::new(&names, &types);
        let index = match &options.index {
            Some(name) => Some(
                names
                    .iter()
                    .position(|column| column == name)
                    .ok_or_else(|| EngineError::UnknownColumn(name.to_owned()))?,
            ),
            None => None,
        };
        Ok(Self {
            schema,
            rows: Vec::new(),
            limit: options.limit.max(1),
            index,
            cursor: 0,
        })
    }

    /// Marshals accessor row `ridx` into table column order.
    /// Columns the accessor lacks are `None`.
    fn marshal_row(&self, accessor: &Accessor, positions: &[Option<usize>], ridx: usize) -> Vec<Option<Scalar>> {
        self.schema
            .columns
            .iter()
            .zip(positions)
            .map(|(column, position)| {
                position.map(|cidx| accessor.marshal(cidx, ridx, column.kind).unwrap_or(Scalar::Null))
            })
            .collect()
    }

    fn find(&self, index: usize, key: &Scalar) -> Option<usize> {
        self.rows
            .iter()
            .position(|row| row[index].total_cmp(key) == Ordering::Equal)
    }

    fn insert(&mut self, accessor: &Accessor, is_partial: bool) {
        let positions: Vec<Option<usize>> = self
            .schema
            .columns
            .iter()
            .map(|column| accessor.column_index(&column.name))
            .collect();
        for ridx in 0..accessor.row_count() {
            let cells = self.marshal_row(accessor, &positions, ridx);
            let existing = self
                .index
                .and_then(|index| cells[index].as_ref().and_then(|key| self.find(index, key)));
            match existing {
                Some(position) => {
                    let row = &mut self.rows[position];
                    for (slot, cell) in row.iter_mut().zip(cells) {
                        match cell {
                            Some(cell) => *slot = cell,
                            None if !is_partial => *slot = Scalar::Null,
                            None => {}
                        }
                    }
                }
                None => {
                    let row = cells.into_iter().map(Option::unwrap_or_default).collect();
                    self.append(row);
                }
            }
        }
    }

    fn append(&mut self, row: Vec<Scalar>) {
        if self.rows.len() < self.limit {
            self.rows.push(row);
        } else {
            self.rows[self.cursor] = row;
            self.cursor = (self.cursor + 1) % self.limit;
        }
    }

    fn delete(&mut self, accessor: &Accessor) -> Result<(), EngineError> {
        let index = self
            .index
            .ok_or_else(|| EngineError::Failure("table has no index column".to_owned()))?;
        let column = &self.schema.columns[index];
        let position = accessor
            .column_index(&column.name)
            .ok_or_else(|| EngineError::UnknownColumn(column.name.to_owned()))?;
        let keys: Vec<Scalar> = (0..accessor.row_count())
            .filter_map(|ridx| accessor.marshal(position, ridx, column.kind))
            .collect();
        self.rows
            .retain(|row| !keys.iter().any(|key| row[index].total_cmp(key) == Ordering::Equal));
        self.cursor = 0;
        Ok(())
    }
}

/// Table handle sharing its rows with every view built from it.
#[derive(Clone, Debug)]
pub struct MemoryTable {
    state: Rc<RefCell<TableState>>,
}

impl EngineTable for MemoryTable {
    fn size(&self) -> usize {
        self.state.borrow().rows.len()
    }

    fn schema(&self) -> TableSchema {
        self.state.borrow().schema.clone()
    }
}

impl Engine for MemoryEngine {
    type Table = MemoryTable;
    type View = MemoryView;

    fn make_table(
        &self,
        existing: Option<&MemoryTable>,
        accessor: &Accessor,
        options: &TableOptions,
        operation: Operation,
        is_update: bool,
        is_partial: bool,
    ) -> Result<MemoryTable, EngineError> {
        let table = match existing {
            Some(table) => table.clone(),
            None => MemoryTable {
                state: Rc::new(RefCell::new(TableState::new(accessor, options)?)),
            },
        };
        {
            let mut state = table.state.borrow_mut();
            match operation {
                Operation::Insert => state.insert(accessor, is_partial),
                Operation::Delete => state.delete(accessor)?,
            }
        }
        log_debug!(
            component = "memory_engine",
            event = "table_loaded",
            operation = ?operation,
            is_update = is_update,
            rows = accessor.row_count()
        );
        Ok(table)
    }

    fn make_view_zero(
        &self,
        table: &MemoryTable,
        session_key: &str,
        separator: &str,
        config: &ViewConfig,
        validator: &DateValidator,
    ) -> Result<MemoryView, EngineError> {
        MemoryView::new(table.state.clone(), 0, session_key, separator, config, validator)
    }

    fn make_view_one(
        &self,
        table: &MemoryTable,
        session_key: &str,
        separator: &str,
        config: &ViewConfig,
        validator: &DateValidator,
    ) -> Result<MemoryView, EngineError> {
        MemoryView::new(table.state.clone(), 1, session_key, separator, config, validator)
    }

    fn make_view_two(
        &self,
        table: &MemoryTable,
        session_key: &str,
        separator: &str,
        config: &ViewConfig,
        validator: &DateValidator,
    ) -> Result<MemoryView, EngineError> {
        MemoryView::new(table.state.clone(), 2, session_key, separator, config, validator)
    }
}
