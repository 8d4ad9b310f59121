//! Command execution inside one context.
//!
//! A runtime pairs a context's state with its inbox. Messages that arrive
//! while the context is busy are drained at safe points: before each step,
//! after a nested switch returns and after the script ends.

use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, warn};
use xdomain_bridge::{ChannelMessage, Envelope, Inbox, LifecycleSignal};
use xdomain_common::{DriverError, Origin, Result, Viewport};

use crate::context::ContextState;
use crate::coordinator::Coordinator;
use crate::script::{Probe, Script, Step};

pub(crate) struct ContextRuntime {
    pub(crate) state: ContextState,
    inbox: Inbox,
    coordinator: Coordinator,
    default_viewport: Viewport,
    stop_requested: bool,
}

impl ContextRuntime {
    pub(crate) fn new(state: ContextState, inbox: Inbox, coordinator: Coordinator) -> Self {
        Self {
            default_viewport: coordinator.default_viewport(),
            state,
            inbox,
            coordinator,
            stop_requested: false,
        }
    }

    /// Whether the context should be torn down once it is idle.
    pub(crate) fn should_stop(&self) -> bool {
        self.stop_requested || self.state.is_invalidated()
    }

    pub(crate) async fn next_envelope(&mut self) -> Option<Envelope> {
        self.inbox.recv().await
    }

    /// Handle every message already queued. Returns how many were handled.
    pub(crate) fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Some(envelope) = self.inbox.try_recv() {
            self.handle(envelope);
            handled += 1;
        }
        handled
    }

    /// Handle one inbound message that is not a callback to run now.
    pub(crate) fn handle(&mut self, envelope: Envelope) {
        let Envelope {
            from,
            correlation,
            message,
            responder,
        } = envelope;

        match message {
            ChannelMessage::ViewportSync {
                width,
                height,
                origin_context_id,
            } => match Viewport::new(width, height) {
                Ok(size) => {
                    self.state.apply_remote_viewport(&origin_context_id, size);
                }
                Err(e) => warn!(context = %self.state.id(), from = %from, error = %e, "invalid viewport sync"),
            },
            ChannelMessage::Event {
                name,
                payload,
                origin_context_id,
            } => {
                let ran = self.state.deliver_forwarded(&name, payload, origin_context_id);
                debug!(context = %self.state.id(), event = %name, ran, "forwarded event handled");
            }
            ChannelMessage::Lifecycle { signal } => match signal {
                LifecycleSignal::Reset => self.state.reset(self.default_viewport),
                LifecycleSignal::Shutdown => {
                    debug!(context = %self.state.id(), "shutdown requested");
                    self.stop_requested = true;
                }
            },
            ChannelMessage::RunCallback { .. } => {
                warn!(context = %self.state.id(), from = %from, %correlation, "callback refused: context busy");
                if let Some(responder) = responder {
                    let err = DriverError::InvalidContext(format!(
                        "{} is already running a callback",
                        self.state.id()
                    ));
                    responder.respond(&ChannelMessage::callback_err(err.to_remote()));
                }
            }
            ChannelMessage::CallbackResult { .. } => {
                warn!(context = %self.state.id(), from = %from, %correlation, "unexpected callback result");
            }
        }
    }

    /// Run a serialized callback and settle it as a `CallbackResult`.
    pub(crate) async fn run_callback(&mut self, serialized_fn: &str, args: &Value) -> ChannelMessage {
        self.state.activate();
        let result = match Script::from_transfer(serialized_fn) {
            Ok(script) => self.run_script(&script, args).await,
            Err(e) => Err(e),
        };
        self.state.park();

        match result {
            Ok(value) => ChannelMessage::callback_ok(value),
            Err(e) => {
                warn!(context = %self.state.id(), error = %e, "callback failed");
                ChannelMessage::callback_err(e.to_remote())
            }
        }
    }

    /// Execute `script` in order. The value is an object of everything the
    /// script captured.
    pub(crate) async fn run_script(&mut self, script: &Script, args: &Value) -> Result<Value> {
        let mut captures = Map::new();
        for step in &script.steps {
            self.pump();
            self.execute(step, args, &mut captures).await?;
        }
        self.pump();
        Ok(Value::Object(captures))
    }

    async fn execute(
        &mut self,
        step: &Step,
        args: &Value,
        captures: &mut Map<String, Value>,
    ) -> Result<()> {
        match step {
            Step::Viewport { width, height } => {
                let width = width.resolve(args)?;
                let height = height.resolve(args)?;
                self.state.set_viewport(width, height)?;
            }
            Step::Spy { name } => {
                self.state.spy(name)?;
            }
            Step::On {
                event,
                listener,
                scope,
            } => {
                let listener = self.state.resolve_listener(listener)?;
                self.state.on(event, listener, *scope)?;
            }
            Step::Off { event, listener } => {
                let listener = self.state.resolve_listener(listener)?;
                self.state.off(event, &listener)?;
            }
            Step::Forward { event, to } => self.state.forward(event, to.clone())?,
            Step::Capture { key, probe } => {
                let value = self.probe(probe, args)?;
                captures.insert(key.clone(), value);
            }
            Step::Navigate { url } => self.state.navigate(url)?,
            Step::Wait { ms } => tokio::time::sleep(Duration::from_millis(*ms)).await,
            Step::Fail { message } => return Err(DriverError::ScriptFailed(message.clone())),
            Step::SwitchToDomain {
                origin,
                script,
                args: nested_args,
                capture,
            } => {
                let value = self.switch_to_domain(origin, script, nested_args.clone()).await?;
                if let Some(key) = capture {
                    captures.insert(key.clone(), value);
                }
            }
        }
        Ok(())
    }

    fn probe(&self, probe: &Probe, args: &Value) -> Result<Value> {
        let value = match probe {
            Probe::Viewport => viewport_value(self.state.viewport()),
            Probe::Window => viewport_value(self.state.window_size()),
            Probe::Location => Value::String(self.state.location()),
            Probe::SpyCalls(name) => {
                let spy = self.state.named_spy(name).ok_or_else(|| {
                    DriverError::ScriptFailed(format!("no spy named `{name}` in {}", self.state.id()))
                })?;
                Value::from(spy.call_count())
            }
            Probe::Arg(name) => args.get(name).cloned().unwrap_or(Value::Null),
        };
        Ok(value)
    }

    /// Suspend this context while `script` runs in the context for `origin`.
    pub(crate) async fn switch_to_domain(
        &mut self,
        origin: &str,
        script: &Script,
        args: Value,
    ) -> Result<Value> {
        self.state.ensure_active()?;
        let origin = Origin::parse(origin)?;
        let callback = script.serialize_for_transfer()?;
        let caller = self.state.id().clone();
        let seed = self.state.viewport();

        self.state.park();
        let result = self
            .coordinator
            .switch_to_domain(&caller, &origin, seed, callback, args)
            .await;
        self.state.activate();
        self.pump();
        result
    }
}

fn viewport_value(size: Viewport) -> Value {
    serde_json::json!({ "width": size.width, "height": size.height })
}
