//! # Rusty Pivot
//!
//! A data bridge between loosely typed tabular input and a columnar pivot engine.
//!
//! ## Features
//!
//! - **Input formats**: row records, column arrays, or a bare `name -> type` schema
//! - **Type inference**: booleans, integers, floats, strings, dates and datetimes detected
//!   from the first rows of each column
//! - **Coercion**: every value is marshalled to its column type before it reaches the engine
//! - **Pivoted views**: row and column pivots, aggregates, sorts and filters validated
//!   against the table schema
//! - **Flattening**: views serialize to records, columns or arrays over any row and column
//!   window, with row paths and pivoted column names
//! - **Engine contract**: the pivot engine sits behind the [`bridge::Engine`] trait; an
//!   in-memory implementation ships behind the `memory-engine` feature
//!
//! ## Example
//!
//! ```ignore
//! let mut session = Session::new(MemoryEngine);
//! session.handle(&json!({"cmd": "table", "name": "t", "data": [{"a": 1, "b": 2}]}))?;
//! session.handle(&json!({"cmd": "view", "table": "t", "name": "v", "config": {"row-pivots": ["a"]}}))?;
//! let records = session.handle(&json!({"cmd": "to_records", "view": "v"}))?;
//! ```

pub mod bridge;
pub mod database;
pub mod error;
pub mod helpers;
pub mod input;
mod logging;
#[cfg(any(test, feature = "memory-engine"))]
pub mod memory;
pub mod session;
pub mod table;
pub mod view;

pub use crate::bridge::Engine;
pub use crate::bridge::TableOptions;
pub use crate::error::Result;
pub use crate::error::RustyPivotError;
pub use crate::input::accessor::Accessor;
pub use crate::session::Session;
pub use crate::table::Table;
pub use crate::view::config::ViewConfig;
pub use crate::view::FormatOptions;
pub use crate::view::View;
