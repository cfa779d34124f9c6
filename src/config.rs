use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Settings file looked up in the working directory.
pub const SETTINGS_FILE: &str = "greenlens.json";

/// Dashboard settings. Every field has a default, so a partial file is fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Dataset opened at startup.
    pub data_path: PathBuf,
    /// How many of the most recent years are selected initially.
    pub default_year_count: usize,
    /// How many departments (in table order) are selected initially.
    pub default_department_count: usize,
    /// Reference value shown next to the governance index.
    pub industry_benchmark: f64,
    /// ESG policy coverage a department must reach to pass the gap tracker.
    pub policy_threshold_pct: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("greenlens_esg_dataset.csv"),
            default_year_count: 2,
            default_department_count: 3,
            industry_benchmark: 65.0,
            policy_threshold_pct: 70.0,
        }
    }
}

impl Settings {
    /// Read settings from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::warn!("{} not found, using default settings", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    /// Settings from the working directory, with the dataset path optionally
    /// overridden by the first command-line argument.
    pub fn from_env_args(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut settings = Self::load(Path::new(SETTINGS_FILE))?;
        if let Some(path) = args.into_iter().nth(1) {
            settings.data_path = PathBuf::from(path);
        }
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let settings = Settings::load(Path::new("/no/such/greenlens.json")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, r#"{ "industry_benchmark": 72.5, "data_path": "data/esg.parquet" }"#)
            .unwrap();
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.industry_benchmark, 72.5);
        assert_eq!(settings.data_path, PathBuf::from("data/esg.parquet"));
        assert_eq!(settings.default_year_count, 2);
        assert_eq!(settings.policy_threshold_pct, 70.0);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, "{ not json").unwrap();
        assert!(Settings::load(&path).is_err());
    }
}
