// SPDX-FileCopyrightText: 2025 dicomstore contributors
// SPDX-License-Identifier: MIT

use std::fs::read_to_string;
use std::path::{Path, PathBuf};

use dicomstore_db::{DbLocation, StoreOptions};
use dicomstore_series::{DEFAULT_MAX_FILES, DecayPolicy, ReadOptions, default_sort_preference};
use serde::Deserialize;

use crate::error::{CliError, IoContext, Result};

pub const CONFIG_ENV: &str = "DICOMSTORE_CONFIG";
pub const SETTINGS_FILE: &str = "dicomstore.toml";

fn default_database() -> String {
    "database.db".into()
}

fn default_table() -> String {
    "dicom".into()
}

fn default_apply_suv() -> bool {
    true
}

fn default_max_files() -> usize {
    DEFAULT_MAX_FILES
}

fn default_log_level() -> String {
    "info".into()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Database file, or `:memory:`
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_table")]
    pub table: String,
    /// Base folder of stored file references
    #[serde(default)]
    pub folder: Option<PathBuf>,
    /// Create columns for unknown keywords on insert
    #[serde(default)]
    pub implicit_columns: bool,
    #[serde(default = "default_sort_preference")]
    pub sort_preference: Vec<String>,
    #[serde(default = "default_apply_suv")]
    pub apply_suv: bool,
    /// Fail PET reads that lack decay inputs instead of skipping SUV scaling
    #[serde(default)]
    pub require_suv: bool,
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: default_database(),
            table: default_table(),
            folder: None,
            implicit_columns: false,
            sort_preference: default_sort_preference(),
            apply_suv: default_apply_suv(),
            require_suv: false,
            max_files: default_max_files(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = read_to_string(path)
            .io_context(|| format!("Failed to read config file at {}", path.display()))?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()
    }

    fn validate(self) -> Result<Self> {
        if self.max_files == 0 {
            return Err(CliError::config("max_files must be greater than 0"));
        }
        if self.table.trim().is_empty() {
            return Err(CliError::config("table must not be empty"));
        }
        if self.sort_preference.iter().any(|key| key.trim().is_empty()) {
            return Err(CliError::config("sort_preference keys must not be empty"));
        }
        Ok(self)
    }

    pub fn location(&self) -> DbLocation {
        DbLocation::from(self.database.as_str())
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            implicit_columns: self.implicit_columns,
            ..StoreOptions::default()
        }
    }

    pub fn read_options(&self) -> ReadOptions {
        ReadOptions {
            folder: self.folder.clone(),
            sort_preference: self.sort_preference.clone(),
            decay: if self.require_suv {
                DecayPolicy::Required
            } else {
                DecayPolicy::Optional
            },
            apply_suv: self.apply_suv,
            max_files: self.max_files,
        }
    }
}

/// Load from `$DICOMSTORE_CONFIG`, else `dicomstore.toml` in the working
/// directory, else defaults.
pub fn load() -> Result<Config> {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) => Config::from_file(Path::new(&path)),
        None => load_or_default(Path::new(SETTINGS_FILE)),
    }
}

fn load_or_default(settings_file: &Path) -> Result<Config> {
    if settings_file.exists() {
        Config::from_file(settings_file)
    } else {
        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn write(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_missing_settings_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_or_default(&dir.path().join(SETTINGS_FILE)).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.database, "database.db");
        assert_eq!(config.max_files, 5000);
        assert_eq!(config.sort_preference, ["SliceLocation", "InstanceNumber"]);
        assert_eq!(config.read_options().decay, DecayPolicy::Optional);
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            r#"
database = ":memory:"
folder = "/data/pet"
require_suv = true
sort_preference = ["InstanceNumber"]
"#,
        );
        let config = load_or_default(&path).unwrap();
        assert!(config.location().is_memory());
        assert_eq!(config.table, "dicom");

        let options = config.read_options();
        assert_eq!(options.folder, Some(PathBuf::from("/data/pet")));
        assert_eq!(options.decay, DecayPolicy::Required);
        assert_eq!(options.sort_preference, ["InstanceNumber"]);
        assert!(options.apply_suv);
    }

    #[rstest]
    #[case::unknown_key("databse = \"x.db\"")]
    #[case::wrong_type("max_files = \"many\"")]
    fn test_rejected_toml(#[case] contents: &str) {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, contents);
        assert!(matches!(Config::from_file(&path), Err(CliError::Toml(_))));
    }

    #[rstest]
    #[case::no_files("max_files = 0")]
    #[case::empty_table("table = \"\"")]
    #[case::empty_sort_key("sort_preference = [\"\"]")]
    fn test_invalid_values(#[case] contents: &str) {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, contents);
        assert!(matches!(Config::from_file(&path), Err(CliError::Config(_))));
    }

    #[test]
    fn test_unreadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::from_file(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, CliError::Io { .. }));
    }
}
