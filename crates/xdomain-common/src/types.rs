use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::DriverError;

/// Name of the only event raised by the driver core.
pub const VIEWPORT_CHANGED: &str = "viewport:changed";

/// Window viewport size in CSS pixels. Both dimensions are always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Result<Self, DriverError> {
        if width == 0 || height == 0 {
            return Err(DriverError::InvalidViewport {
                width: f64::from(width),
                height: f64::from(height),
            });
        }
        Ok(Self { width, height })
    }

    /// Validate dimensions as they arrive from a test command, where they may
    /// be fractional, negative or not finite.
    pub fn from_dimensions(width: f64, height: f64) -> Result<Self, DriverError> {
        let valid = |v: f64| {
            v.is_finite() && v.fract() == 0.0 && (1.0..=f64::from(u32::MAX)).contains(&v)
        };
        if !valid(width) || !valid(height) {
            return Err(DriverError::InvalidViewport { width, height });
        }
        Ok(Self {
            width: width as u32,
            height: height as u32,
        })
    }
}

impl fmt::Display for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Lifecycle of an execution context. `Inactive` is the parked state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Inactive,
    Active,
    TornDown,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Inactive => "inactive",
            Self::Active => "active",
            Self::TornDown => "torn-down",
        };
        write!(f, "{name}")
    }
}
