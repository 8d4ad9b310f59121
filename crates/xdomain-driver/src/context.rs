//! State owned by one execution context.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, info};
use xdomain_bridge::{ChannelHub, ChannelMessage, ContextWindow};
use xdomain_common::{ContextId, DriverError, Lifecycle, Origin, Result, Viewport};

use crate::registry::{BindingId, EventPayload, Listener, ListenerRegistry, Scope};
use crate::script::ListenerSpec;
use crate::spy::Spy;
use crate::viewport::ViewportStore;

/// Everything that lives inside one context: its lifecycle, viewport, event
/// bindings, named globals and window. Nothing here is shared with another
/// context; the only way out is `hub`.
pub struct ContextState {
    pub(crate) id: ContextId,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) store: ViewportStore,
    pub(crate) window: Box<dyn ContextWindow>,
    pub(crate) hub: ChannelHub,
    registry: ListenerRegistry,
    spies: HashMap<String, Spy>,
    forwards: HashMap<String, Vec<ContextId>>,
    /// Forwarded events that arrived while parked.
    held: Vec<EventPayload>,
    invalidated: bool,
}

impl ContextState {
    /// A new, inactive context whose stored viewport is the window's size.
    pub fn new(id: ContextId, window: Box<dyn ContextWindow>, hub: ChannelHub) -> Self {
        let store = ViewportStore::new(window.viewport_size());
        Self {
            registry: ListenerRegistry::new(id.clone()),
            id,
            lifecycle: Lifecycle::Inactive,
            store,
            window,
            hub,
            spies: HashMap::new(),
            forwards: HashMap::new(),
            held: Vec::new(),
            invalidated: false,
        }
    }

    pub fn id(&self) -> &ContextId {
        &self.id
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn viewport(&self) -> Viewport {
        self.store.current()
    }

    pub fn window_size(&self) -> Viewport {
        self.window.viewport_size()
    }

    pub fn location(&self) -> String {
        self.window.location()
    }

    pub fn registry(&self) -> &ListenerRegistry {
        &self.registry
    }

    /// True once a secondary has navigated away from its origin.
    pub fn is_invalidated(&self) -> bool {
        self.invalidated
    }

    pub(crate) fn ensure_active(&self) -> Result<()> {
        match self.lifecycle {
            Lifecycle::Active => Ok(()),
            other => Err(DriverError::InvalidContext(format!(
                "{} is {other}, not the active context",
                self.id
            ))),
        }
    }

    /// Make this the running context. A window size buffered while parked
    /// is applied now, silently, then held forwarded events are delivered
    /// in arrival order.
    pub fn activate(&mut self) {
        if self.lifecycle == Lifecycle::TornDown {
            return;
        }
        self.lifecycle = Lifecycle::Active;
        if let Some(size) = self.store.take_pending() {
            self.window.set_viewport_size(size);
            debug!(context = %self.id, %size, "applied buffered viewport");
        }
        for payload in std::mem::take(&mut self.held) {
            let ran = self.registry.emit(&self.id, &payload);
            debug!(context = %self.id, event = %payload.name, from = %payload.origin, ran, "held event delivered");
        }
    }

    pub fn park(&mut self) {
        if self.lifecycle == Lifecycle::Active {
            self.lifecycle = Lifecycle::Inactive;
        }
    }

    /// Drop every binding and global and close the context's port.
    pub fn tear_down(&mut self) {
        if self.release() {
            self.hub.disconnect(&self.id);
        }
    }

    /// Like `tear_down`, for a context whose port was already closed by
    /// its owner. The port id may have been reused since.
    pub(crate) fn release(&mut self) -> bool {
        if self.lifecycle == Lifecycle::TornDown {
            return false;
        }
        self.lifecycle = Lifecycle::TornDown;
        self.registry.clear();
        self.spies.clear();
        self.forwards.clear();
        self.held.clear();
        info!(context = %self.id, "context torn down");
        true
    }

    pub fn on(&mut self, event: &str, listener: Listener, scope: Scope) -> Result<BindingId> {
        self.ensure_active()?;
        Ok(self.registry.on(event, listener, scope))
    }

    pub fn off(&mut self, event: &str, listener: &Listener) -> Result<usize> {
        self.ensure_active()?;
        Ok(self.registry.off(event, listener))
    }

    /// The named spy in this context's globals, created on first use.
    pub fn spy(&mut self, name: &str) -> Result<Spy> {
        self.ensure_active()?;
        Ok(self.spies.entry(name.to_string()).or_default().clone())
    }

    pub fn named_spy(&self, name: &str) -> Option<&Spy> {
        self.spies.get(name)
    }

    pub fn resolve_listener(&self, spec: &ListenerSpec) -> Result<Listener> {
        match spec {
            ListenerSpec::Host(listener) => Ok(listener.clone()),
            ListenerSpec::Named(name) => self
                .spies
                .get(name)
                .map(Spy::listener)
                .ok_or_else(|| {
                    DriverError::ScriptFailed(format!("no spy named `{name}` in {}", self.id))
                }),
        }
    }

    /// Deliver `event` raised here to `to` as well, in addition to this
    /// context's own bindings. `to` must exist already.
    pub fn forward(&mut self, event: &str, to: ContextId) -> Result<()> {
        self.ensure_active()?;
        if to == self.id {
            return Err(DriverError::InvalidContext(format!(
                "{} cannot forward events to itself",
                self.id
            )));
        }
        if !self.hub.is_connected(&to) {
            return Err(DriverError::ChannelClosed { context: to });
        }
        let targets = self.forwards.entry(event.to_string()).or_default();
        if !targets.contains(&to) {
            debug!(context = %self.id, event, to = %to, "event forward added");
            targets.push(to);
        }
        Ok(())
    }

    /// Raise an event in this context. Events raised while the context is
    /// not active are dropped. Returns how many local listeners ran, or the
    /// first forward that could not be sent.
    pub(crate) fn raise(&self, event: &str, data: Value) -> Result<usize> {
        if self.lifecycle != Lifecycle::Active {
            debug!(context = %self.id, event, "event dropped: context not active");
            return Ok(0);
        }

        let payload = EventPayload {
            name: event.to_string(),
            origin: self.id.clone(),
            data,
        };
        let ran = self.registry.emit(&self.id, &payload);

        for target in self.forwards.get(event).into_iter().flatten() {
            let message = ChannelMessage::Event {
                name: payload.name.clone(),
                payload: payload.data.clone(),
                origin_context_id: self.id.clone(),
            };
            self.hub.send(&self.id, target, &message)?;
        }
        Ok(ran)
    }

    /// Run this context's own bindings for an event forwarded from `origin`.
    /// A parked context holds the event until it is activated again.
    pub(crate) fn deliver_forwarded(&mut self, event: &str, data: Value, origin: ContextId) -> usize {
        let payload = EventPayload {
            name: event.to_string(),
            origin,
            data,
        };
        match self.lifecycle {
            Lifecycle::Active => self.registry.emit(&self.id, &payload),
            Lifecycle::Inactive => {
                debug!(context = %self.id, event, from = %payload.origin, "forwarded event held");
                self.held.push(payload);
                0
            }
            Lifecycle::TornDown => 0,
        }
    }

    /// Navigate the window. A secondary that leaves its origin is marked
    /// invalidated and is destroyed once its callback finishes.
    pub fn navigate(&mut self, url: &str) -> Result<()> {
        self.ensure_active()?;
        let change = self.window.navigate(url);
        info!(context = %self.id, from = %change.from, to = %change.to, "navigated");

        if let ContextId::Secondary(origin) = &self.id {
            let stays = Origin::parse(&change.to).is_ok_and(|to| &to == origin);
            if !stays {
                info!(context = %self.id, to = %change.to, "context left its origin");
                self.invalidated = true;
            }
        }
        Ok(())
    }

    /// Test boundary: restore `default` silently, drop local bindings,
    /// forwards and held events. Global bindings and named spies survive.
    pub(crate) fn reset(&mut self, default: Viewport) {
        if self.lifecycle == Lifecycle::TornDown {
            return;
        }
        let dropped = self.registry.clear_local();
        self.forwards.clear();
        self.held.clear();
        self.reset_viewport(default);
        debug!(context = %self.id, dropped, "context reset");
    }
}
