//! User interface layer
//!
//! The TUI application, the per-division panels and the virtualized table
//! renderer they draw through.

pub mod app;
pub mod grid_panel;
pub mod table_renderer;
pub mod virtualizer;
