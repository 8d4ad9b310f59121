//! Core TOML config loading: read from path or platform default.

use std::path::Path;

use tracing::info;
use xdomain_common::ConfigError;

use crate::schema::DriverConfig;
use crate::validation;

use super::paths::default_config_path;

/// Load and validate config from a specific TOML file path.
///
/// Missing fields take their serde defaults.
pub fn load_from_path(path: &Path) -> Result<DriverConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ParseError(format!("failed to read {}: {e}", path.display())))?;

    let config: DriverConfig = toml::from_str(&content)
        .map_err(|e| ConfigError::ParseError(format!("failed to parse TOML: {e}")))?;

    validation::validate(&config)?;

    info!("loaded config from {}", path.display());
    Ok(config)
}

/// Load config from the platform-specific default path.
///
/// On Linux: `~/.config/xdomain/config.toml`
///
/// A missing file is not an error: defaults are returned.
pub fn load_default() -> Result<DriverConfig, ConfigError> {
    let path = default_config_path()?;

    match load_from_path(&path) {
        Ok(config) => Ok(config),
        Err(ConfigError::FileNotFound(_)) => {
            info!("no config found at {}, using defaults", path.display());
            Ok(DriverConfig::default())
        }
        Err(e) => Err(e),
    }
}
