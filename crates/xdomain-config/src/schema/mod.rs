//! Configuration schema types for the driver.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod channel;
mod system;
mod viewport;

pub use channel::*;
pub use system::*;
pub use viewport::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct DriverConfig {
    pub viewport: ViewportConfig,
    pub channel: ChannelConfig,
    pub primary: PrimaryConfig,
    pub logging: LoggingConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_runner_defaults() {
        let config = DriverConfig::default();
        assert_eq!(config.viewport.default_width, 1000);
        assert_eq!(config.viewport.default_height, 660);
        assert_eq!(config.channel.command_timeout_ms, 4000);
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config: DriverConfig = toml::from_str("[viewport]\ndefault_width = 320\n").unwrap();
        assert_eq!(config.viewport.default_width, 320);
        assert_eq!(config.viewport.default_height, 660);
        assert_eq!(config.primary.url, "http://localhost:3500/");
    }

    #[test]
    fn zero_timeout_disables_it() {
        let mut channel = ChannelConfig::default();
        assert_eq!(
            channel.command_timeout(),
            Some(std::time::Duration::from_millis(4000))
        );
        channel.command_timeout_ms = 0;
        assert_eq!(channel.command_timeout(), None);
    }

    #[test]
    fn log_directive() {
        let logging = LoggingConfig {
            level: LogLevel::Debug,
        };
        assert_eq!(logging.directive(), "xdomain=debug");
    }
}
