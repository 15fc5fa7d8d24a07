use crate::database::column::Column;
use crate::database::column::ColumnType;
use serde_json::Map;
use serde_json::Value;

/// Ordered column definitions of an engine table or view.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TableSchema {
    /// Column definitions, in table order
    pub columns: Vec<Column>,
}

impl TableSchema {
    pub fn new(names: &[String], types: &[ColumnType]) -> Self {
        Self {
            columns: names
                .iter()
                .zip(types)
                .map(|(name, kind)| Column::new(name, *kind))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Column names, in table order.
    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|column| column.name.to_owned()).collect()
    }

    /// Column types, in table order.
    pub fn types(&self) -> Vec<ColumnType> {
        self.columns.iter().map(|column| column.kind).collect()
    }

    /// Looks up the type of a column by name.
    pub fn kind_of(&self, name: &str) -> Option<ColumnType> {
        self.columns
            .iter()
            .find(|column| column.name == name)
            .map(|column| column.kind)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.kind_of(name).is_some()
    }

    /// Renders the schema as an ordered `name -> type name` map.
    pub fn to_map(&self) -> Map<String, Value> {
        self.columns
            .iter()
            .map(|column| (column.name.to_owned(), Value::from(column.kind.as_str())))
            .collect()
    }
}
