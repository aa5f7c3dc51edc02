//! Utility functions and helpers
//!
//! Logging setup and small text helpers shared by the UI.

pub mod logging;
pub mod text;
