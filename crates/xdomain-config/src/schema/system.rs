//! Primary context and logging configuration types.

use serde::{Deserialize, Serialize};

/// The context a test starts in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimaryConfig {
    /// Location the primary window is opened at.
    pub url: String,
}

impl Default for PrimaryConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:3500/".into(),
        }
    }
}

/// Log level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct LoggingConfig {
    pub level: LogLevel,
}

impl LoggingConfig {
    /// `tracing_subscriber` filter directive covering every xdomain crate.
    pub fn directive(&self) -> String {
        format!("xdomain={}", self.level.as_str())
    }
}
