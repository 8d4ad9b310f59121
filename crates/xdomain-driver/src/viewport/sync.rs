//! Viewport synchronizer.
//!
//! A context that changes its own viewport raises `viewport:changed` locally
//! and broadcasts the size. A context that receives a size applies it and
//! does nothing else: no event, no re-broadcast. Either way an unchanged size
//! is a no-op.

use serde_json::json;
use tracing::{debug, info};
use xdomain_bridge::ChannelMessage;
use xdomain_common::{ContextId, Lifecycle, Result, Viewport, VIEWPORT_CHANGED};

use crate::context::ContextState;

impl ContextState {
    /// Apply a viewport requested by a command running in this context.
    /// Returns false when the size was already current.
    pub fn set_viewport(&mut self, width: f64, height: f64) -> Result<bool> {
        self.ensure_active()?;
        let size = Viewport::from_dimensions(width, height)?;

        if self.store.is_current(size) {
            debug!(context = %self.id, %size, "viewport unchanged");
            return Ok(false);
        }

        self.window.set_viewport_size(size);
        self.store.record(size);
        info!(context = %self.id, width = size.width, height = size.height, "viewport changed");

        // Peers get the size before any forwarded event about it.
        let peers = self
            .hub
            .broadcast(&self.id, &ChannelMessage::viewport_sync(size, self.id.clone()))?;
        debug!(context = %self.id, peers, "viewport broadcast");
        self.raise(
            VIEWPORT_CHANGED,
            json!({ "width": size.width, "height": size.height }),
        )?;
        Ok(true)
    }

    /// Apply a size broadcast by `from`. Returns whether anything changed.
    pub fn apply_remote_viewport(&mut self, from: &ContextId, size: Viewport) -> bool {
        if from == &self.id || self.lifecycle == Lifecycle::TornDown {
            return false;
        }
        if self.store.is_current(size) {
            debug!(context = %self.id, from = %from, %size, "synced viewport already current");
            return false;
        }

        self.resize_quietly(size);
        debug!(context = %self.id, from = %from, %size, lifecycle = %self.lifecycle, "viewport synced");
        true
    }

    /// Restore `size` without raising events or broadcasting.
    pub(crate) fn reset_viewport(&mut self, size: Viewport) {
        if self.store.is_current(size) {
            return;
        }
        self.resize_quietly(size);
    }

    fn resize_quietly(&mut self, size: Viewport) {
        match self.lifecycle {
            Lifecycle::Active => {
                self.window.set_viewport_size(size);
                self.store.record(size);
            }
            // Parked: the window catches up when the context is reactivated.
            Lifecycle::Inactive => self.store.buffer(size),
            Lifecycle::TornDown => {}
        }
    }
}
