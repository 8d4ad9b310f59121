//! Full configuration validation.
//!
//! Collects every range error into a single `ConfigError`.

mod helpers;


use xdomain_common::{ConfigError, Origin};

use crate::schema::DriverConfig;

use helpers::validate_range;

/// Largest window the headless runner accepts in either dimension.
pub const MAX_VIEWPORT_DIMENSION: u64 = 4000;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &DriverConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    validate_range(
        &mut errors,
        "viewport.default_width",
        u64::from(config.viewport.default_width),
        1,
        MAX_VIEWPORT_DIMENSION,
    );
    validate_range(
        &mut errors,
        "viewport.default_height",
        u64::from(config.viewport.default_height),
        1,
        MAX_VIEWPORT_DIMENSION,
    );
    validate_range(
        &mut errors,
        "channel.command_timeout_ms",
        config.channel.command_timeout_ms,
        0,
        600_000,
    );
    if let Err(e) = Origin::parse(&config.primary.url) {
        errors.push(format!("primary.url: {e}"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}
