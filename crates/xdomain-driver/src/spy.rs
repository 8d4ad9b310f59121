//! Recording listeners.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::registry::{EventPayload, Listener};

/// A listener that records every payload it receives.
#[derive(Debug, Clone)]
pub struct Spy {
    calls: Arc<Mutex<Vec<EventPayload>>>,
    listener: Listener,
}

impl Spy {
    pub fn new() -> Self {
        let calls: Arc<Mutex<Vec<EventPayload>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        let listener = Listener::new(move |payload| sink.lock().push(payload.clone()));
        Self { calls, listener }
    }

    /// The listener to register. Always the same listener for one spy.
    pub fn listener(&self) -> Listener {
        self.listener.clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn was_called(&self) -> bool {
        self.call_count() > 0
    }

    pub fn calls(&self) -> Vec<EventPayload> {
        self.calls.lock().clone()
    }

    pub fn last_call(&self) -> Option<EventPayload> {
        self.calls.lock().last().cloned()
    }
}

impl Default for Spy {
    fn default() -> Self {
        Self::new()
    }
}
