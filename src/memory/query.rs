use crate::bridge::DataSlice;
use crate::bridge::EngineError;
use crate::bridge::EngineView;
use crate::database::column::Column;
use crate::database::scalar::Scalar;
use crate::database::table::TableSchema;
use crate::helpers::path::ROW_PATH_KEY;
use crate::input::accessor::coerce;
use crate::input::validator::DateValidator;
use crate::logging::log_debug;
use crate::memory::aggregate::Aggregate;
use crate::memory::TableState;
use crate::view::config::FilterOp;
use crate::view::config::FilterOperator;
use crate::view::config::SortDirection;
use crate::view::config::ViewConfig;
use serde_json::Value;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

/// One filter term resolved against the table schema.
struct Predicate {
    column: usize,
    operator: FilterOperator,
    /// Comparison value coerced to the column type; `None` never matches
    term: Option<Scalar>,
    /// Values of `in` and `not in`
    terms: Vec<Scalar>,
}

impl Predicate {
    fn matches(&self, row: &[Scalar]) -> bool {
        use FilterOperator::*;
        let cell = &row[self.column];
        match self.operator {
            IsNull => return cell.is_null(),
            IsNotNull => return !cell.is_null(),
            _ if cell.is_null() => return false,
            In | NotIn => {
                let found = self.terms.iter().any(|term| cell.total_cmp(term) == Ordering::Equal);
                return (self.operator == In) == found;
            }
            _ => {}
        }
        let Some(term) = &self.term else {
            return false;
        };
        match (self.operator, cell, term) {
            (Contains, Scalar::String(text), Scalar::String(term)) => text.contains(term.as_str()),
            (BeginsWith, Scalar::String(text), Scalar::String(term)) => text.starts_with(term.as_str()),
            (EndsWith, Scalar::String(text), Scalar::String(term)) => text.ends_with(term.as_str()),
            (And | BitwiseAnd, Scalar::Boolean(x), Scalar::Boolean(y)) => *x && *y,
            (Or | BitwiseOr, Scalar::Boolean(x), Scalar::Boolean(y)) => *x || *y,
            (Equals, _, _) => cell.total_cmp(term) == Ordering::Equal,
            (NotEquals, _, _) => cell.total_cmp(term) != Ordering::Equal,
            (LessThan, _, _) => cell.total_cmp(term) == Ordering::Less,
            (GreaterThan, _, _) => cell.total_cmp(term) == Ordering::Greater,
            (LessThanOrEquals, _, _) => cell.total_cmp(term) != Ordering::Greater,
            (GreaterThanOrEquals, _, _) => cell.total_cmp(term) != Ordering::Less,
            _ => false,
        }
    }
}

/// Compares two values under a sort direction.
fn compare(x: &Scalar, y: &Scalar, direction: SortDirection) -> Ordering {
    let ordering = match (direction.is_abs(), x.as_f64(), y.as_f64()) {
        (true, Some(x), Some(y)) => x.abs().total_cmp(&y.abs()),
        _ => x.total_cmp(y),
    };
    if direction.is_descending() {
        ordering.reverse()
    } else {
        ordering
    }
}

/// Pivot keys are emitted as JSON values; dates keep their calendar spelling.
fn key_value(key: &Scalar) -> Value {
    match key {
        Scalar::Date(_) | Scalar::DateTime(_) => Value::String(key.to_string()),
        _ => key.to_value(),
    }
}

/// Fully materialized result of a view.
#[derive(Default)]
struct Grid {
    row_paths: Vec<Vec<Value>>,
    column_paths: Vec<Vec<Value>>,
    cells: Vec<Vec<Value>>,
}

/// One group of rows under a row-pivot key.
struct Group<'a> {
    key: Scalar,
    rows: Vec<&'a [Scalar]>,
    sort_keys: Vec<Scalar>,
}

/// View evaluated against the shared table rows on every call.
pub struct MemoryView {
    state: Rc<RefCell<TableState>>,
    sides: u8,
    session_key: String,
    separator: String,
    filter_op: FilterOp,
    predicates: Vec<Predicate>,
    row_pivots: Vec<usize>,
    column_pivots: Vec<usize>,
    /// Table positions of the visible columns, then the hidden sort columns
    columns: Vec<Column>,
    positions: Vec<usize>,
    aggregates: Vec<Aggregate>,
    visible: usize,
    /// Row sorts as (index into `columns`, direction)
    sorts: Vec<(usize, SortDirection)>,
    /// Band order per column-pivot level
    band_directions: Vec<SortDirection>,
}

impl MemoryView {
    pub(crate) fn new(
        state: Rc<RefCell<TableState>>,
        sides: u8,
        session_key: &str,
        separator: &str,
        config: &ViewConfig,
        validator: &DateValidator,
    ) -> Result<Self, EngineError> {
        let schema = state.borrow().schema.clone();
        let position = |name: &str| {
            schema
                .columns
                .iter()
                .position(|column| column.name == name)
                .ok_or_else(|| EngineError::UnknownColumn(name.to_owned()))
        };

        let mut names = config.columns.clone();
        let visible = names.len();
        names.extend(config.hidden_columns());
        let positions = names
            .iter()
            .map(|name| position(name.as_str()))
            .collect::<Result<Vec<_>, _>>()?;
        let columns: Vec<Column> = positions.iter().map(|at| schema.columns[*at].clone()).collect();
        let aggregates = columns
            .iter()
            .map(|column| match config.aggregate_of(&column.name) {
                Some(name) => Aggregate::parse(name),
                None => Ok(Aggregate::default_for(column.kind)),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let predicates = config
            .filter
            .iter()
            .map(|term| -> Result<Predicate, EngineError> {
                let column = position(term.column.as_str())?;
                let kind = schema.columns[column].kind;
                let terms = match &term.value {
                    Value::Array(values) => values
                        .iter()
                        .filter_map(|value| coerce(value, kind, validator))
                        .collect(),
                    _ => Vec::new(),
                };
                Ok(Predicate {
                    column,
                    operator: term.operator,
                    term: coerce(&term.value, kind, validator),
                    terms,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let sorts = config
            .sort
            .iter()
            .filter(|(_, direction)| *direction != SortDirection::None && !direction.is_column_sort())
            .filter_map(|(name, direction)| names.iter().position(|column| column == name).map(|at| (at, *direction)))
            .collect();
        let band_directions = config
            .column_pivots
            .iter()
            .map(|pivot| {
                config
                    .sort
                    .iter()
                    .find(|(name, direction)| name == pivot && direction.is_column_sort())
                    .map(|(_, direction)| *direction)
                    .unwrap_or(SortDirection::ColAsc)
            })
            .collect();

        log_debug!(component = "memory_engine", event = "view_built", session_key = session_key, sides = sides);
        Ok(Self {
            sides,
            session_key: session_key.to_owned(),
            separator: separator.to_owned(),
            filter_op: config.filter_op,
            predicates,
            row_pivots: config
                .row_pivots
                .iter()
                .map(|name| position(name.as_str()))
                .collect::<Result<Vec<_>, _>>()?,
            column_pivots: config
                .column_pivots
                .iter()
                .map(|name| position(name.as_str()))
                .collect::<Result<Vec<_>, _>>()?,
            columns,
            positions,
            aggregates,
            visible,
            sorts,
            band_directions,
            state,
        })
    }

    pub fn session_key(&self) -> &str {
        &self.session_key
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    fn keep(&self, row: &[Scalar]) -> bool {
        match self.filter_op {
            FilterOp::And => self.predicates.iter().all(|predicate| predicate.matches(row)),
            FilterOp::Or => {
                self.predicates.is_empty() || self.predicates.iter().any(|predicate| predicate.matches(row))
            }
        }
    }

    fn sort_rows(&self, rows: &mut [&[Scalar]]) {
        rows.sort_by(|x, y| {
            self.sorts
                .iter()
                .map(|(at, direction)| {
                    let position = self.positions[*at];
                    compare(&x[position], &y[position], *direction)
                })
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
    }

    /// Distinct column-pivot key combinations, in band order.
    fn bands(&self, rows: &[&[Scalar]]) -> Vec<Vec<Scalar>> {
        let mut bands: Vec<Vec<Scalar>> = Vec::new();
        for row in rows {
            let key: Vec<Scalar> = self.column_pivots.iter().map(|at| row[*at].clone()).collect();
            if !bands.iter().any(|band| Self::same_key(band, row, &self.column_pivots)) {
                bands.push(key);
            }
        }
        bands.sort_by(|x, y| {
            x.iter()
                .zip(y)
                .zip(&self.band_directions)
                .map(|((x, y), direction)| compare(x, y, *direction))
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
        bands
    }

    fn same_key(band: &[Scalar], row: &[Scalar], pivots: &[usize]) -> bool {
        band.iter()
            .zip(pivots)
            .all(|(key, at)| key.total_cmp(&row[*at]) == Ordering::Equal)
    }

    fn aggregate(&self, at: usize, rows: &[&[Scalar]]) -> Scalar {
        let position = self.positions[at];
        let cells: Vec<&Scalar> = rows.iter().map(|row| &row[position]).collect();
        self.aggregates[at].apply(self.columns[at].kind, &cells)
    }

    /// Cells of one pivoted row: the row path slot, then every column of every band.
    fn aggregate_row(&self, rows: &[&[Scalar]], bands: &[Vec<Scalar>]) -> Vec<Value> {
        let mut cells = vec![Value::Null];
        for band in bands {
            let members: Vec<&[Scalar]> = rows
                .iter()
                .copied()
                .filter(|row| Self::same_key(band, row, &self.column_pivots))
                .collect();
            if members.is_empty() {
                // no rows at this pivot intersection
                cells.extend((0..self.columns.len()).map(|_| Value::Null));
                continue;
            }
            cells.extend((0..self.columns.len()).map(|at| self.aggregate(at, &members).to_value()));
        }
        cells
    }

    /// Walks the row-pivot tree depth first: the group total, then its children.
    fn walk(&self, rows: Vec<&[Scalar]>, path: Vec<Scalar>, bands: &[Vec<Scalar>], grid: &mut Grid) {
        grid.cells.push(self.aggregate_row(&rows, bands));
        grid.row_paths.push(path.iter().map(key_value).collect());
        let depth = path.len();
        let Some(pivot) = self.row_pivots.get(depth) else {
            return;
        };

        let mut groups: Vec<Group> = Vec::new();
        for row in rows {
            match groups
                .iter_mut()
                .find(|group| group.key.total_cmp(&row[*pivot]) == Ordering::Equal)
            {
                Some(group) => group.rows.push(row),
                None => groups.push(Group {
                    key: row[*pivot].clone(),
                    rows: vec![row],
                    sort_keys: Vec::new(),
                }),
            }
        }
        for group in &mut groups {
            group.sort_keys = self.sorts.iter().map(|(at, _)| self.aggregate(*at, &group.rows)).collect();
        }
        groups.sort_by(|x, y| {
            x.sort_keys
                .iter()
                .zip(&y.sort_keys)
                .zip(&self.sorts)
                .map(|((x, y), (_, direction))| compare(x, y, *direction))
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or_else(|| x.key.total_cmp(&y.key))
        });

        for group in groups {
            let mut child = path.clone();
            child.push(group.key);
            self.walk(group.rows, child, bands, grid);
        }
    }

    fn column_paths(&self, bands: &[Vec<Scalar>]) -> Vec<Vec<Value>> {
        let mut paths = Vec::new();
        if self.sides > 0 {
            paths.push(vec![Value::from(ROW_PATH_KEY)]);
        }
        for band in bands {
            for column in &self.columns {
                let mut path: Vec<Value> = band.iter().map(key_value).collect();
                path.push(Value::from(column.name.as_str()));
                paths.push(path);
            }
        }
        paths
    }

    fn compute(&self) -> Grid {
        let state = self.state.borrow();
        let mut rows: Vec<&[Scalar]> = state
            .rows
            .iter()
            .map(Vec::as_slice)
            .filter(|row| self.keep(row))
            .collect();

        let mut grid = Grid::default();
        match self.sides {
            0 => {
                self.sort_rows(&mut rows);
                grid.column_paths = self.column_paths(&[Vec::new()]);
                for row in rows {
                    grid.row_paths.push(Vec::new());
                    grid.cells
                        .push(self.positions.iter().map(|at| row[*at].to_value()).collect());
                }
            }
            _ if self.sides > 1 && self.row_pivots.is_empty() => {
                // column-only: one row per source row, values placed in their band
                self.sort_rows(&mut rows);
                let bands = self.bands(&rows);
                grid.column_paths = self.column_paths(&bands);
                for row in rows {
                    let mut cells = vec![Value::Null];
                    for band in &bands {
                        let member = Self::same_key(band, row, &self.column_pivots);
                        cells.extend(self.positions.iter().map(|at| {
                            if member {
                                row[*at].to_value()
                            } else {
                                Value::Null
                            }
                        }));
                    }
                    grid.row_paths.push(Vec::new());
                    grid.cells.push(cells);
                }
            }
            _ => {
                let bands = if self.sides > 1 { self.bands(&rows) } else { vec![Vec::new()] };
                grid.column_paths = self.column_paths(&bands);
                self.walk(rows, Vec::new(), &bands, &mut grid);
            }
        }
        grid
    }

    fn band_count(&self) -> usize {
        if self.sides < 2 {
            return 1;
        }
        let state = self.state.borrow();
        let rows: Vec<&[Scalar]> = state
            .rows
            .iter()
            .map(Vec::as_slice)
            .filter(|row| self.keep(row))
            .collect();
        self.bands(&rows).len()
    }
}

fn window<T: Clone>(items: &[T], start: usize, end: usize) -> Vec<T> {
    let end = end.min(items.len());
    items.get(start.min(end)..end).map(<[T]>::to_vec).unwrap_or_default()
}

impl EngineView for MemoryView {
    type Slice = MemorySlice;

    fn num_rows(&self) -> usize {
        self.compute().cells.len()
    }

    fn num_columns(&self) -> usize {
        self.band_count() * self.columns.len()
    }

    fn schema(&self) -> TableSchema {
        let columns = self.columns[..self.visible]
            .iter()
            .zip(&self.aggregates)
            .map(|(column, aggregate)| match self.sides {
                0 => column.clone(),
                _ => Column::new(&column.name, aggregate.output_kind(column.kind)),
            })
            .collect();
        TableSchema { columns }
    }

    fn get_data(
        &self,
        start_row: usize,
        end_row: usize,
        start_col: usize,
        end_col: usize,
    ) -> Result<MemorySlice, EngineError> {
        let grid = self.compute();
        Ok(MemorySlice {
            start_row,
            start_col,
            row_paths: window(&grid.row_paths, start_row, end_row),
            column_paths: window(&grid.column_paths, start_col, end_col),
            cells: window(&grid.cells, start_row, end_row)
                .into_iter()
                .map(|row| window(&row, start_col, end_col))
                .collect(),
        })
    }
}

/// Materialized window of a [`MemoryView`]; indices are absolute view coordinates.
#[derive(Debug)]
pub struct MemorySlice {
    start_row: usize,
    start_col: usize,
    row_paths: Vec<Vec<Value>>,
    column_paths: Vec<Vec<Value>>,
    cells: Vec<Vec<Value>>,
}

impl MemorySlice {
    fn cell(&self, ridx: usize, cidx: usize) -> Value {
        ridx.checked_sub(self.start_row)
            .and_then(|ridx| self.cells.get(ridx))
            .zip(cidx.checked_sub(self.start_col))
            .and_then(|(row, cidx)| row.get(cidx))
            .cloned()
            .unwrap_or(Value::Null)
    }
}

impl DataSlice for MemorySlice {
    fn row_path(&self, ridx: usize) -> Vec<Value> {
        ridx.checked_sub(self.start_row)
            .and_then(|ridx| self.row_paths.get(ridx))
            .cloned()
            .unwrap_or_default()
    }

    fn column_path(&self, cidx: usize) -> Vec<Value> {
        cidx.checked_sub(self.start_col)
            .and_then(|cidx| self.column_paths.get(cidx))
            .cloned()
            .unwrap_or_default()
    }

    fn get_zero(&self, ridx: usize, cidx: usize) -> Value {
        self.cell(ridx, cidx)
    }

    fn get_one(&self, ridx: usize, cidx: usize) -> Value {
        self.cell(ridx, cidx)
    }

    fn get_two(&self, ridx: usize, cidx: usize) -> Value {
        self.cell(ridx, cidx)
    }
}
