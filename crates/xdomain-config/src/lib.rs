//! Driver configuration.
//!
//! TOML-based configuration with full validation. All sections use
//! defaults so partial configs work out of the box.

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{
    ChannelConfig, DriverConfig, LogLevel, LoggingConfig, PrimaryConfig, ViewportConfig,
    CONFIG_SCHEMA_VERSION,
};
pub use toml_loader::{load_default, load_from_path};

use std::path::Path;

use xdomain_common::ConfigError;

/// Load config from `path` if given, otherwise from the platform default
/// location.
pub fn load_config(path: Option<&Path>) -> Result<DriverConfig, ConfigError> {
    match path {
        Some(path) => load_from_path(path),
        None => load_default(),
    }
}

/// Serialize a config to a pretty-printed JSON string.
pub fn config_to_json(config: &DriverConfig) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}
