//! Local key/value preferences (panel collapse state)
//!
//! Stored as a flat JSON object of string values in the data directory.
//! Keys are `{slugified-title}-collapsed` with `"true"`/`"false"` values.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::utils::text::slugify;

pub fn collapsed_key(title: &str) -> String {
    format!("{}-collapsed", slugify(title, "-"))
}

#[derive(Debug, Default)]
pub struct PreferenceStore {
    values: BTreeMap<String, String>,
    /// None keeps everything in memory
    path: Option<PathBuf>,
}

impl PreferenceStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// `~/.local/share/scheduler-grid/preferences.json`
    pub fn default_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Cannot determine data directory"))?
            .join("scheduler-grid");
        Ok(data_dir.join("preferences.json"))
    }

    /// Open the store at `path`. A missing or unreadable file starts empty.
    pub fn open(path: &Path) -> Self {
        let values = match fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                warn!(target: "prefs", "ignoring corrupt preferences {}: {}", path.display(), e);
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };
        debug!(target: "prefs", "loaded {} preferences from {}", values.len(), path.display());
        Self {
            values,
            path: Some(path.to_path_buf()),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        self.save()
    }

    fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(&self.values)?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write preferences: {}", path.display()))
    }

    pub fn is_collapsed(&self, title: &str) -> bool {
        self.get(&collapsed_key(title)) == Some("true")
    }

    pub fn set_collapsed(&mut self, title: &str, collapsed: bool) -> Result<()> {
        self.set(&collapsed_key(title), if collapsed { "true" } else { "false" })
    }
}
