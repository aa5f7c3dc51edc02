use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub display: DisplayConfig,
    pub behavior: BehaviorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the backend serving /teachers and /courses
    pub base_url: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Row height used before a row has been drawn, in lines
    pub estimated_row_height: u32,

    /// Extra rows rendered above and below the viewport
    pub overscan: usize,

    /// Correct row heights after drawing; disable for terminals that
    /// report wrapped cell heights wrongly
    pub measure_rows: bool,

    /// Use Unicode glyphs for sort indicators and checkboxes
    pub use_glyphs: bool,

    /// Height of an expanded panel as a share of the grid area
    pub panel_height_percent: u16,

    /// Width of each course column in characters
    pub course_column_width: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Reject drops that would take a teacher past max load
    pub enforce_capacity: bool,

    /// Reload teachers after every saved reassignment
    pub refetch_after_commit: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            timeout_secs: 10,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            estimated_row_height: 1,
            overscan: 5,
            measure_rows: true,
            use_glyphs: true,
            panel_height_percent: 42,
            course_column_width: 8,
        }
    }
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            enforce_capacity: false,
            refetch_after_commit: true,
        }
    }
}

impl Config {
    /// Load config from the default location, writing defaults if absent
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if !config_path.exists() {
            let default_config = Self::default();
            default_config.save_to(&config_path)?;
            return Ok(default_config);
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;

        Ok(())
    }

    /// Get the default config file path
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("scheduler-grid").join("config.toml"))
    }

    /// Create a default config file with comments
    pub fn create_default_with_comments() -> String {
        r#"# Scheduler Grid Configuration File
# Location: ~/.config/scheduler-grid/config.toml (Linux)

[api]
# Backend serving GET /teachers, GET /courses and PUT /teachers/{id}
base_url = "http://localhost:3000"

# Request timeout in seconds
timeout_secs = 10

[display]
# Row height (in lines) assumed before a row is drawn
estimated_row_height = 1

# Rows rendered beyond the visible area on each side
overscan = 5

# Measure real row heights after drawing.
# Set to false if rows jump around in your terminal.
measure_rows = true

# Unicode glyphs for sort arrows and checkboxes (false = ASCII)
use_glyphs = true

# Height of an expanded teacher panel, percent of the grid area
panel_height_percent = 42

# Width of each course column
course_column_width = 8

[behavior]
# Refuse moves that push a teacher past their max load
enforce_capacity = false

# Reload teachers from the backend after every saved move
refetch_after_commit = true
"#
        .to_string()
    }
}
