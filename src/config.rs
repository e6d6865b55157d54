// Runtime settings, read from an optional JSON file.
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::types::Category;

/// Env var naming a config file; takes precedence over [`DEFAULT_CONFIG_FILE`].
pub const CONFIG_ENV: &str = "DISASTER_DASHBOARD_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "dashboard.config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub data_path: PathBuf,
    /// Worksheet to read. Ignored for CSV input.
    pub sheet_name: String,
    /// Acceptable secondary grouping columns, most preferred first.
    pub grouping_fallback: Vec<Category>,
    pub recent_limit: usize,
    pub zero_fill_years: bool,
    pub cache_results: bool,
    pub default_year_start: i32,
    pub default_year_end: i32,
    pub export_dir: PathBuf,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig {
            data_path: PathBuf::from("emdat-country-profiles_2025_01_27.xlsx"),
            sheet_name: "EM-DAT Version 2025-01-27".to_string(),
            grouping_fallback: vec![Category::DisasterSubgroup, Category::DisasterType],
            recent_limit: 10,
            zero_fill_years: false,
            cache_results: true,
            default_year_start: 2000,
            default_year_end: 2024,
            export_dir: PathBuf::from("."),
        }
    }
}

impl DashboardConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The file named by [`CONFIG_ENV`] (which must exist), else
    /// [`DEFAULT_CONFIG_FILE`] if present, else built-in defaults.
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            let path = PathBuf::from(path);
            info!(path = %path.display(), "loading config from {}", CONFIG_ENV);
            return DashboardConfig::from_file(&path);
        }
        let default_path = Path::new(DEFAULT_CONFIG_FILE);
        if default_path.exists() {
            info!(path = %default_path.display(), "loading config");
            return DashboardConfig::from_file(default_path);
        }
        debug!("no config file, using defaults");
        Ok(DashboardConfig::default())
    }
}
