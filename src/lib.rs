pub mod api_client;
pub mod config;
pub mod data;
pub mod dragdrop;
pub mod error;
pub mod prefs;
pub mod services;
pub mod ui;
pub mod utils;
