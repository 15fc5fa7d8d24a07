//! # Session
//!
//! Per-connection state: the tables and views a client created, addressed by name, and a
//! JSON request handler driving them. Each connection owns its own [`Session`].
use crate::bridge::Engine;
use crate::bridge::TableOptions;
use crate::logging::log_debug;
use crate::table::Table;
use crate::view::FormatOptions;
use crate::view::View;
use anyhow::anyhow;
use anyhow::Context;
use anyhow::Result;
use serde::Deserialize;
use serde_json::Map;
use serde_json::Value;
use std::collections::HashMap;
use std::rc::Rc;

/// Commands understood by [`Session::handle`], tagged by `cmd`.
#[derive(Debug, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
enum Request {
    Table {
        name: String,
        data: Value,
        #[serde(default)]
        options: Map<String, Value>,
    },
    Update {
        table: String,
        data: Value,
    },
    Remove {
        table: String,
        keys: Vec<Value>,
    },
    View {
        table: String,
        name: String,
        #[serde(default)]
        config: Value,
    },
    DeleteView {
        view: String,
    },
    DeleteTable {
        table: String,
    },
    Size {
        table: String,
    },
    Schema {
        table: Option<String>,
        view: Option<String>,
    },
    Columns {
        table: String,
    },
    NumRows {
        view: String,
    },
    NumColumns {
        view: String,
    },
    Sides {
        view: String,
    },
    ToRecords {
        view: String,
        #[serde(default)]
        options: FormatOptions,
    },
    ToColumns {
        view: String,
        #[serde(default)]
        options: FormatOptions,
    },
    ToArray {
        view: String,
        #[serde(default)]
        options: FormatOptions,
    },
}

struct ViewEntry<E: Engine> {
    table: String,
    view: View<E::View>,
}

/// Named tables and views of one client.
pub struct Session<E: Engine> {
    engine: Rc<E>,
    tables: HashMap<String, Table<E>>,
    views: HashMap<String, ViewEntry<E>>,
}

impl<E: Engine> Session<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine: Rc::new(engine),
            tables: HashMap::new(),
            views: HashMap::new(),
        }
    }

    pub fn table(&self, name: &str) -> Option<&Table<E>> {
        self.tables.get(name)
    }

    pub fn view(&self, name: &str) -> Option<&View<E::View>> {
        self.views.get(name).map(|entry| &entry.view)
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut Table<E>> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| anyhow!("Table '{name}' not found"))
    }

    fn find_table(&self, name: &str) -> Result<&Table<E>> {
        self.table(name).ok_or_else(|| anyhow!("Table '{name}' not found"))
    }

    fn find_view(&self, name: &str) -> Result<&View<E::View>> {
        self.view(name).ok_or_else(|| anyhow!("View '{name}' not found"))
    }

    /// Executes one JSON command and returns its JSON result.
    /// Commands that only change state answer `null`.
    pub fn handle(&mut self, request: &Value) -> Result<Value> {
        let cmd = request.get("cmd").and_then(Value::as_str).unwrap_or_default();
        log_debug!(component = "session", event = "request", cmd = cmd);
        let request = Request::deserialize(request).context("Malformed request")?;
        match request {
            Request::Table { name, data, options } => {
                let options = TableOptions::try_from(&options)
                    .with_context(|| format!("Invalid options for table '{name}'"))?;
                let table = Table::new(self.engine.clone(), data, options)
                    .with_context(|| format!("Create table '{name}' failed"))?;
                self.tables.insert(name, table);
                Ok(Value::Null)
            }
            Request::Update { table, data } => {
                self.table_mut(&table)?
                    .update(data)
                    .with_context(|| format!("Update table '{table}' failed"))?;
                Ok(Value::Null)
            }
            Request::Remove { table, keys } => {
                self.table_mut(&table)?
                    .remove(keys)
                    .with_context(|| format!("Remove from table '{table}' failed"))?;
                Ok(Value::Null)
            }
            Request::View { table, name, config } => {
                let view = self
                    .find_table(&table)?
                    .view(&config)
                    .with_context(|| format!("Create view '{name}' on table '{table}' failed"))?;
                if let Some(previous) = self.views.insert(name, ViewEntry { table, view }) {
                    previous.view.delete();
                }
                Ok(Value::Null)
            }
            Request::DeleteView { view } => {
                let entry = self
                    .views
                    .remove(&view)
                    .ok_or_else(|| anyhow!("View '{view}' not found"))?;
                entry.view.delete();
                Ok(Value::Null)
            }
            Request::DeleteTable { table } => {
                let removed = self
                    .tables
                    .remove(&table)
                    .ok_or_else(|| anyhow!("Table '{table}' not found"))?;
                let names: Vec<String> = self
                    .views
                    .iter()
                    .filter(|(_, entry)| entry.table == table)
                    .map(|(name, _)| name.to_owned())
                    .collect();
                for name in names {
                    if let Some(entry) = self.views.remove(&name) {
                        entry.view.delete();
                    }
                }
                removed.delete();
                Ok(Value::Null)
            }
            Request::Size { table } => Ok(Value::from(self.find_table(&table)?.size())),
            Request::Schema { table, view } => match (table, view) {
                (_, Some(view)) => Ok(Value::Object(self.find_view(&view)?.schema())),
                (Some(table), None) => Ok(Value::Object(self.find_table(&table)?.schema())),
                (None, None) => Err(anyhow!("Schema needs a table or a view")),
            },
            Request::Columns { table } => Ok(Value::from(self.find_table(&table)?.columns())),
            Request::NumRows { view } => Ok(Value::from(self.find_view(&view)?.num_rows())),
            Request::NumColumns { view } => Ok(Value::from(self.find_view(&view)?.num_columns())),
            Request::Sides { view } => Ok(Value::from(self.find_view(&view)?.sides())),
            Request::ToRecords { view, options } => {
                let records = self
                    .find_view(&view)?
                    .to_records(&options)
                    .with_context(|| format!("Serialize view '{view}' failed"))?;
                Ok(Value::from(records))
            }
            Request::ToColumns { view, options } => {
                let columns = self
                    .find_view(&view)?
                    .to_columns(&options)
                    .with_context(|| format!("Serialize view '{view}' failed"))?;
                Ok(Value::Object(columns))
            }
            Request::ToArray { view, options } => {
                let rows = self
                    .find_view(&view)?
                    .to_array(&options)
                    .with_context(|| format!("Serialize view '{view}' failed"))?;
                Ok(Value::from(rows))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryEngine;
    use serde_json::json;

    fn session() -> Session<MemoryEngine> {
        let mut session = Session::new(MemoryEngine);
        session
            .handle(&json!({"cmd": "table", "name": "t", "data": [{"a": 1, "b": 2}, {"a": 3, "b": 4}]}))
            .unwrap();
        session
    }

    #[test]
    fn table_and_view_commands() {
        let mut session = session();
        assert_eq!(session.handle(&json!({"cmd": "size", "table": "t"})).unwrap(), json!(2));
        assert_eq!(session.handle(&json!({"cmd": "columns", "table": "t"})).unwrap(), json!(["a", "b"]));
        assert_eq!(
            session.handle(&json!({"cmd": "schema", "table": "t"})).unwrap(),
            json!({"a": "integer", "b": "integer"})
        );
        session
            .handle(&json!({"cmd": "view", "table": "t", "name": "v", "config": {"row-pivots": ["a"]}}))
            .unwrap();
        assert_eq!(session.handle(&json!({"cmd": "sides", "view": "v"})).unwrap(), json!(1));
        assert_eq!(session.handle(&json!({"cmd": "num_rows", "view": "v"})).unwrap(), json!(3));
        assert_eq!(
            session
                .handle(&json!({"cmd": "to_records", "view": "v", "options": {"leaves_only": true}}))
                .unwrap(),
            json!([{"__ROW_PATH__": ["1"], "a": 1, "b": 2}, {"__ROW_PATH__": ["3"], "a": 3, "b": 4}])
        );
    }

    #[test]
    fn update_and_array_output() {
        let mut session = session();
        session.handle(&json!({"cmd": "view", "table": "t", "name": "v"})).unwrap();
        session.handle(&json!({"cmd": "update", "table": "t", "data": {"a": [5], "b": [6]}})).unwrap();
        assert_eq!(
            session.handle(&json!({"cmd": "to_array", "view": "v", "options": {"start_row": 1}})).unwrap(),
            json!([[3, 4], [5, 6]])
        );
    }

    #[test]
    fn unknown_names_fail() {
        let mut session = session();
        assert!(session.handle(&json!({"cmd": "size", "table": "nope"})).is_err());
        assert!(session.handle(&json!({"cmd": "to_columns", "view": "nope"})).is_err());
        assert!(session.handle(&json!({"cmd": "fly"})).is_err());
        assert!(session.handle(&json!({"cmd": "remove", "table": "t", "keys": [1]})).is_err());
        let error = session
            .handle(&json!({"cmd": "view", "table": "t", "name": "v", "config": {"sort": [["zz", "asc"]]}}))
            .unwrap_err();
        assert!(format!("{error:#}").contains("unknown column 'zz'"));
    }

    #[test]
    fn delete_table_releases_views() {
        let mut session = session();
        session.handle(&json!({"cmd": "view", "table": "t", "name": "v"})).unwrap();
        session.handle(&json!({"cmd": "delete_table", "table": "t"})).unwrap();
        assert!(session.view("v").is_none());
        assert!(session.table("t").is_none());
    }
}
