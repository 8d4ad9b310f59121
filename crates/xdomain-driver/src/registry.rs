//! Event scoping registry.
//!
//! Each execution context owns one registry. A binding belongs to the context
//! that was active when it was registered, and an event only reaches bindings
//! whose context raised it. Scope never widens delivery: it only decides
//! whether a binding outlives a test boundary.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use xdomain_common::ContextId;

/// What a listener receives.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventPayload {
    pub name: String,
    /// Context that raised the event. Differs from the receiving context
    /// only for explicitly forwarded events.
    pub origin: ContextId,
    pub data: Value,
}

/// A callback registered with [`ListenerRegistry::on`]. Identity is the
/// allocation: clones of one `Listener` are the same listener for `off`.
#[derive(Clone)]
pub struct Listener(Arc<dyn Fn(&EventPayload) + Send + Sync>);

impl Listener {
    pub fn new(f: impl Fn(&EventPayload) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn same(&self, other: &Listener) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn call(&self, payload: &EventPayload) {
        (self.0)(payload)
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listener({:p})", Arc::as_ptr(&self.0))
    }
}

/// `Local` bindings are dropped at the end of each test; `Global` bindings
/// stay until removed with `off` or until their context is destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    #[default]
    Local,
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingId(u64);

#[derive(Debug, Clone)]
pub struct ListenerBinding {
    pub id: BindingId,
    pub event_name: String,
    pub listener: Listener,
    pub context_id: ContextId,
    pub scope: Scope,
}

#[derive(Debug)]
pub struct ListenerRegistry {
    owner: ContextId,
    bindings: Vec<ListenerBinding>,
    next_id: u64,
}

impl ListenerRegistry {
    pub fn new(owner: ContextId) -> Self {
        Self {
            owner,
            bindings: Vec::new(),
            next_id: 1,
        }
    }

    pub fn on(&mut self, event_name: &str, listener: Listener, scope: Scope) -> BindingId {
        let id = BindingId(self.next_id);
        self.next_id += 1;
        self.bindings.push(ListenerBinding {
            id,
            event_name: event_name.to_string(),
            listener,
            context_id: self.owner.clone(),
            scope,
        });
        debug!(context = %self.owner, event = event_name, ?scope, "listener registered");
        id
    }

    /// Remove every binding of `listener` for `event_name`. Returns how many
    /// were removed; removing an unknown listener is not an error.
    pub fn off(&mut self, event_name: &str, listener: &Listener) -> usize {
        let before = self.bindings.len();
        self.bindings
            .retain(|b| !(b.event_name == event_name && b.listener.same(listener)));
        let removed = before - self.bindings.len();
        debug!(context = %self.owner, event = event_name, removed, "listener removed");
        removed
    }

    /// Invoke the bindings for `payload.name` that belong to `raised_in`.
    /// Returns how many listeners ran.
    pub fn emit(&self, raised_in: &ContextId, payload: &EventPayload) -> usize {
        let targets: Vec<Listener> = self
            .bindings
            .iter()
            .filter(|b| b.event_name == payload.name && &b.context_id == raised_in)
            .map(|b| b.listener.clone())
            .collect();
        for listener in &targets {
            listener.call(payload);
        }
        targets.len()
    }

    /// Drop every `Local` binding. Returns how many were dropped.
    pub fn clear_local(&mut self) -> usize {
        let before = self.bindings.len();
        self.bindings.retain(|b| b.scope == Scope::Global);
        before - self.bindings.len()
    }

    pub fn clear(&mut self) {
        self.bindings.clear();
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn bindings(&self) -> &[ListenerBinding] {
        &self.bindings
    }
}
