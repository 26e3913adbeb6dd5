//! Configuration management for the memscan CLI
//!
//! The exclusion set and target byte are extensible without a code
//! change through an optional TOML file:
//!
//! ```toml
//! target_byte = "0x41"
//! exclude = ["[vsyscall]", "/dev/dri/card0"]
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Config {
    /// Byte value to count, same forms as the --target-byte flag
    pub target_byte: Option<String>,

    /// Mapping paths appended to the default exclusion set
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl Config {
    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("memscan");

        Ok(config_dir.join("config.toml"))
    }

    /// Load configuration from the default location, or the default
    /// config if no file exists
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_an_error_only_when_explicit() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nope.toml");

        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_load_full_config() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            "target_byte = \"0x00\"\nexclude = [\"[vsyscall]\", \"/dev/mem\"]\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.target_byte.as_deref(), Some("0x00"));
        assert_eq!(config.exclude, vec!["[vsyscall]", "/dev/mem"]);
    }

    #[test]
    fn test_exclude_defaults_to_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "target_byte = \"A\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert!(config.exclude.is_empty());
    }

    #[test]
    fn test_bad_toml_is_an_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "exclude = 5\n").unwrap();

        assert!(Config::load_from(&path).is_err());
    }
}
