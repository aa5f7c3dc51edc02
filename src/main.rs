use anyhow::{Context, Result};
use scheduler_grid::api_client::{HttpSyncClient, InMemorySyncClient, SyncClient};
use scheduler_grid::config::Config;
use scheduler_grid::prefs::PreferenceStore;
use scheduler_grid::ui::app::{run_tui, SchedulerApp};
use scheduler_grid::utils::logging::init_tracing;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|pos| args.get(pos + 1))
        .map(String::as_str)
}

fn print_usage() {
    println!("scheduler-grid - assign courses to teachers");
    println!();
    println!("Usage:");
    println!("  scheduler-grid [options]");
    println!();
    println!("Options:");
    println!("  --api <url>            Backend base URL (overrides config)");
    println!("  --data <file.json>     Work offline on a {{\"teachers\", \"courses\"}} file");
    println!("  --config <path>        Use this config file");
    println!("  --generate-config      Write a commented default config and exit");
    println!("  --no-measure           Use the estimated row height for every row");
    println!("  --help                 Show this help");
    println!();
    println!("Keys:");
    println!("  ↑↓←→                   Move the cell cursor");
    println!("  Space                  Pick up / drop a course");
    println!("  Esc                    Cancel a drag, dismiss a notice");
    println!("  s                      Cycle sort on the current column");
    println!("  1-9                    Show/hide a course group");
    println!("  c                      Collapse/expand the current panel");
    println!("  Tab                    Switch panel");
    println!("  r                      Reload from the backend");
    println!("  F5                     Toggle the log panel");
    println!("  q                      Quit");
    println!();
    println!("Mouse: drag a course cell onto the same course column of another teacher.");
}

fn generate_config() -> Result<()> {
    let path = Config::get_config_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }
    std::fs::write(&path, Config::create_default_with_comments())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Configuration file created at: {}", path.display());
    Ok(())
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.contains(&"--help".to_string()) || args.contains(&"-h".to_string()) {
        print_usage();
        return Ok(());
    }
    if args.contains(&"--generate-config".to_string()) {
        return generate_config();
    }

    let mut config = match flag_value(&args, "--config") {
        Some(path) => Config::load_from(Path::new(path))?,
        None => Config::load().unwrap_or_else(|e| {
            eprintln!("Warning: using default config ({:#})", e);
            Config::default()
        }),
    };
    if let Some(url) = flag_value(&args, "--api") {
        config.api.base_url = url.to_string();
    }
    if args.contains(&"--no-measure".to_string()) {
        config.display.measure_rows = false;
    }

    let _log_buffer = init_tracing();

    let client: Arc<dyn SyncClient> = match flag_value(&args, "--data") {
        Some(path) => Arc::new(InMemorySyncClient::from_json_file(Path::new(path))?),
        None => Arc::new(HttpSyncClient::new(
            &config.api.base_url,
            Duration::from_secs(config.api.timeout_secs),
        )?),
    };

    let prefs = match PreferenceStore::default_path() {
        Ok(path) => PreferenceStore::open(&path),
        Err(e) => {
            tracing::warn!(target: "prefs", "preferences kept in memory: {:#}", e);
            PreferenceStore::in_memory()
        }
    };

    tracing::info!(target: "app", "starting against {}", config.api.base_url);
    let app = SchedulerApp::new(config, client, prefs)?;
    run_tui(app)
}
