//! The test script's side of the driver.
//!
//! A [`Session`] runs in the primary context. It is the only place a test
//! issues commands from; everything it does in a secondary context goes
//! through [`Session::switch_to_domain`].

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};
use xdomain_bridge::{
    ChannelHub, ChannelMessage, ContextWindow, HeadlessWindow, HeadlessWindowFactory, LifecycleSignal,
    WindowFactory,
};
use xdomain_common::{ContextId, Origin, Result, Viewport};
use xdomain_config::DriverConfig;

use crate::context::ContextState;
use crate::coordinator::Coordinator;
use crate::registry::{BindingId, Listener, Scope};
use crate::runtime::ContextRuntime;
use crate::script::Script;
use crate::spy::Spy;

pub struct Session {
    runtime: ContextRuntime,
    coordinator: Coordinator,
}

impl Session {
    /// A session with headless windows.
    pub fn new(config: &DriverConfig) -> Result<Self> {
        Self::with_windows(config, Arc::new(HeadlessWindowFactory::new()))
    }

    /// A session whose secondary windows come from `windows`. The primary
    /// gets a headless window at `primary.url`.
    pub fn with_windows(config: &DriverConfig, windows: Arc<dyn WindowFactory>) -> Result<Self> {
        let window = HeadlessWindow::new(
            config.primary.url.clone(),
            config.viewport.default_viewport()?,
        );
        Self::with_primary_window(config, Box::new(window), windows)
    }

    pub fn with_primary_window(
        config: &DriverConfig,
        window: Box<dyn ContextWindow>,
        windows: Arc<dyn WindowFactory>,
    ) -> Result<Self> {
        let hub = ChannelHub::new();
        let coordinator = Coordinator::new(hub.clone(), windows, config)?;
        let inbox = hub.connect(ContextId::Primary);
        let mut state = ContextState::new(ContextId::Primary, window, hub);
        state.activate();
        coordinator.enter_primary()?;
        info!(url = %config.primary.url, "session started");

        Ok(Self {
            runtime: ContextRuntime::new(state, inbox, coordinator.clone()),
            coordinator,
        })
    }

    pub fn context_id(&self) -> &ContextId {
        self.runtime.state.id()
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn state(&self) -> &ContextState {
        &self.runtime.state
    }

    /// `cy.viewport` in the primary.
    pub fn viewport(&mut self, width: impl Into<f64>, height: impl Into<f64>) -> Result<()> {
        self.runtime.pump();
        self.runtime
            .state
            .set_viewport(width.into(), height.into())
            .map(|_| ())
    }

    /// The primary's stored viewport, after applying queued syncs.
    pub fn current_viewport(&mut self) -> Viewport {
        self.runtime.pump();
        self.runtime.state.viewport()
    }

    pub fn window_size(&mut self) -> Viewport {
        self.runtime.pump();
        self.runtime.state.window_size()
    }

    pub fn location(&self) -> String {
        self.runtime.state.location()
    }

    /// Bind `listener` until the end of the current test.
    pub fn on(&mut self, event: &str, listener: Listener) -> Result<BindingId> {
        self.runtime.pump();
        self.runtime.state.on(event, listener, Scope::Local)
    }

    /// Bind `listener` until it is removed.
    pub fn on_global(&mut self, event: &str, listener: Listener) -> Result<BindingId> {
        self.runtime.pump();
        self.runtime.state.on(event, listener, Scope::Global)
    }

    pub fn off(&mut self, event: &str, listener: &Listener) -> Result<usize> {
        self.runtime.pump();
        self.runtime.state.off(event, listener)
    }

    /// The named spy in the primary's globals, created on first use.
    pub fn spy(&mut self, name: &str) -> Result<Spy> {
        self.runtime.pump();
        self.runtime.state.spy(name)
    }

    /// Forward `event` raised in the primary to the context for `origin`,
    /// which must be live. It sees the event when it next runs.
    pub fn forward(&mut self, event: &str, origin: &str) -> Result<()> {
        self.runtime.pump();
        let to = ContextId::Secondary(Origin::parse(origin)?);
        self.runtime.state.forward(event, to)
    }

    pub fn navigate(&mut self, url: &str) -> Result<()> {
        self.runtime.pump();
        self.runtime.state.navigate(url)
    }

    /// Run `script` in the context for `origin` and return its captures.
    pub async fn switch_to_domain(&mut self, origin: &str, script: Script) -> Result<Value> {
        self.switch_to_domain_with_args(origin, script, Value::Null)
            .await
    }

    pub async fn switch_to_domain_with_args(
        &mut self,
        origin: &str,
        script: Script,
        args: Value,
    ) -> Result<Value> {
        self.runtime.pump();
        self.runtime.switch_to_domain(origin, &script, args).await
    }

    /// Run `script` in the primary itself. Host listeners are allowed here
    /// unless they end up inside a `switch_to_domain` step.
    pub async fn run(&mut self, script: &Script) -> Result<Value> {
        self.runtime.state.ensure_active()?;
        self.runtime.run_script(script, &Value::Null).await
    }

    /// Test boundary: restore the default viewport everywhere and drop
    /// local bindings. Global bindings and spies survive.
    pub fn end_test(&mut self) -> Result<()> {
        self.runtime.state.ensure_active()?;
        self.runtime.pump();
        let default = self.coordinator.default_viewport();
        self.runtime.state.reset(default);
        let reset = self.coordinator.hub().broadcast(
            self.runtime.state.id(),
            &ChannelMessage::Lifecycle {
                signal: LifecycleSignal::Reset,
            },
        )?;
        debug!(contexts = reset + 1, "test boundary");
        Ok(())
    }

    /// Permanently destroy the context for `origin`.
    pub fn destroy(&mut self, origin: &str) -> Result<bool> {
        Ok(self.coordinator.destroy(&Origin::parse(origin)?))
    }

    /// Destroy every context. Later commands fail with `InvalidContext`.
    pub fn shutdown(&mut self) {
        self.coordinator.destroy_all();
        self.runtime.state.tear_down();
        self.coordinator.exit_primary();
        info!("session shut down");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.coordinator.destroy_all();
    }
}
