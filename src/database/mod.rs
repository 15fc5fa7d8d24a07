//! Column types, typed scalars and table schemas shared by the accessor, the views
//! and the engine contract.

pub mod column;
pub mod scalar;
pub mod table;
