// src/config.rs

//! Configuration loading utilities.
//!
//! A run never falls back to defaults: a missing or invalid file stops the
//! process before any network call.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::models::Config;

/// Config file name inside the storage directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Path of the config file under `storage_dir`.
pub fn config_path(storage_dir: &Path) -> PathBuf {
    storage_dir.join(CONFIG_FILE)
}

/// Load configuration, apply `TRENDS_*` environment overrides and validate.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = Config::load(path)?;
    config.apply_env_overrides()?;
    config.validate()?;
    log::debug!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Write the built-in default configuration to `path` as TOML.
pub fn write_default_config(path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(&Config::default())
        .map_err(|e| crate::error::AppError::config(format!("cannot render defaults: {e}")))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[test]
    fn test_default_config_roundtrips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_path(dir.path());
        write_default_config(&path).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.groups.len(), 3);
        assert_eq!(config.engine.rate_limit_secs, 90);
        assert_eq!(config.groups[0].regions[3].extra_terms, vec!["baixar apk"]);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(&config_path(dir.path())).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        assert!(err.is_fatal_setup());
    }
}
