//! Records, columns, row projection and the store that owns them

pub mod cell_value;
pub mod columns;
pub mod records;
pub mod row_model;
pub mod store;
