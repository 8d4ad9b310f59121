//! Per-context record of the last-applied viewport.

use xdomain_common::Viewport;

/// `current` is the authoritative size of the context. `pending_window` is
/// set while the context is parked and its window has not caught up yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportStore {
    current: Viewport,
    pending_window: Option<Viewport>,
}

impl ViewportStore {
    pub fn new(initial: Viewport) -> Self {
        Self {
            current: initial,
            pending_window: None,
        }
    }

    pub fn current(&self) -> Viewport {
        self.current
    }

    pub fn is_current(&self, size: Viewport) -> bool {
        self.current == size
    }

    /// Record a size that has already been applied to the window.
    pub fn record(&mut self, size: Viewport) {
        self.current = size;
        self.pending_window = None;
    }

    /// Record a size the window still has to be resized to.
    pub fn buffer(&mut self, size: Viewport) {
        self.current = size;
        self.pending_window = Some(size);
    }

    pub fn take_pending(&mut self) -> Option<Viewport> {
        self.pending_window.take()
    }

    pub fn has_pending(&self) -> bool {
        self.pending_window.is_some()
    }
}
