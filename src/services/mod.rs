pub mod sync_service;

pub use sync_service::{run_persist_job, SyncEvent, SyncService};
