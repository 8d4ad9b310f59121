//! Default window viewport.

use serde::{Deserialize, Serialize};
use xdomain_common::{DriverError, Viewport};

/// Size every window starts at, and the size restored at a test boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub default_width: u32,
    pub default_height: u32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            default_width: 1000,
            default_height: 660,
        }
    }
}

impl ViewportConfig {
    pub fn default_viewport(&self) -> Result<Viewport, DriverError> {
        Viewport::new(self.default_width, self.default_height)
    }
}
