//! Window abstraction driven by each execution context.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;
use xdomain_common::{Origin, Viewport};

/// Result of a navigation, reported back to the owning context so it can
/// tell whether it left its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationChange {
    pub from: String,
    pub to: String,
}

/// The real window/document of an execution context.
pub trait ContextWindow: Send {
    fn viewport_size(&self) -> Viewport;
    fn set_viewport_size(&mut self, size: Viewport);
    fn location(&self) -> String;
    fn navigate(&mut self, url: &str) -> LocationChange;
}

/// Creates the window of each new secondary context.
pub trait WindowFactory: Send + Sync {
    fn create(&self, origin: &Origin, initial: Viewport) -> Box<dyn ContextWindow>;
}

#[derive(Debug)]
struct WindowState {
    size: Viewport,
    location: String,
    resizes: usize,
}

/// In-memory window. Clones share state, so a test can keep a clone and
/// inspect what the context did to its window.
#[derive(Debug, Clone)]
pub struct HeadlessWindow {
    state: Arc<Mutex<WindowState>>,
}

impl HeadlessWindow {
    pub fn new(location: impl Into<String>, size: Viewport) -> Self {
        Self {
            state: Arc::new(Mutex::new(WindowState {
                size,
                location: location.into(),
                resizes: 0,
            })),
        }
    }

    /// Number of `set_viewport_size` calls the window has received.
    pub fn resize_count(&self) -> usize {
        self.state.lock().resizes
    }
}

impl ContextWindow for HeadlessWindow {
    fn viewport_size(&self) -> Viewport {
        self.state.lock().size
    }

    fn set_viewport_size(&mut self, size: Viewport) {
        let mut state = self.state.lock();
        state.size = size;
        state.resizes += 1;
    }

    fn location(&self) -> String {
        self.state.lock().location.clone()
    }

    fn navigate(&mut self, url: &str) -> LocationChange {
        let mut state = self.state.lock();
        let from = std::mem::replace(&mut state.location, url.to_string());
        debug!(from = %from, to = %url, "headless window navigated");
        LocationChange {
            from,
            to: url.to_string(),
        }
    }
}

/// Factory for [`HeadlessWindow`]s. Keeps a handle to the latest window
/// created per origin.
#[derive(Debug, Clone, Default)]
pub struct HeadlessWindowFactory {
    created: Arc<Mutex<HashMap<Origin, HeadlessWindow>>>,
}

impl HeadlessWindowFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recent window created for `origin`.
    pub fn window(&self, origin: &Origin) -> Option<HeadlessWindow> {
        self.created.lock().get(origin).cloned()
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().len()
    }
}

impl WindowFactory for HeadlessWindowFactory {
    fn create(&self, origin: &Origin, initial: Viewport) -> Box<dyn ContextWindow> {
        let window = HeadlessWindow::new(format!("{origin}/"), initial);
        self.created.lock().insert(origin.clone(), window.clone());
        Box::new(window)
    }
}
