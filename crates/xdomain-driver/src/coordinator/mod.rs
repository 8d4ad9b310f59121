//! Cross-context command relay.
//!
//! The coordinator owns the secondary contexts of a session. A switch
//! pushes the target onto the context stack, creates the target on first
//! use, ships the serialized callback over the channel and waits for its
//! `CallbackResult`. The caller stays suspended until then.

mod secondary;
mod stack;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use xdomain_bridge::{ChannelHub, ChannelMessage, WindowFactory};
use xdomain_common::{ContextId, DriverError, ErrorKind, Origin, RemoteError, Result, Viewport};
use xdomain_config::DriverConfig;

use crate::context::ContextState;
use crate::runtime::ContextRuntime;
use crate::script::SerializedCallback;
use stack::{ActiveFrame, ContextStack};

/// A running secondary: its serving task and the token that stops it.
struct SecondaryHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

struct Inner {
    hub: ChannelHub,
    stack: Mutex<ContextStack>,
    secondaries: Mutex<HashMap<Origin, SecondaryHandle>>,
    windows: Arc<dyn WindowFactory>,
    default_viewport: Viewport,
    timeout: Option<Duration>,
}

/// Cheap to clone; every clone drives the same set of contexts.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

impl Coordinator {
    pub fn new(
        hub: ChannelHub,
        windows: Arc<dyn WindowFactory>,
        config: &DriverConfig,
    ) -> Result<Self> {
        Ok(Self {
            inner: Arc::new(Inner {
                hub,
                stack: Mutex::new(ContextStack::default()),
                secondaries: Mutex::new(HashMap::new()),
                windows,
                default_viewport: config.viewport.default_viewport()?,
                timeout: config.channel.command_timeout(),
            }),
        })
    }

    pub fn hub(&self) -> &ChannelHub {
        &self.inner.hub
    }

    pub fn default_viewport(&self) -> Viewport {
        self.inner.default_viewport
    }

    /// The context commands currently run in, if any.
    pub fn active_context(&self) -> Option<ContextId> {
        self.inner.stack.lock().active().cloned()
    }

    pub fn stack_depth(&self) -> usize {
        self.inner.stack.lock().depth()
    }

    /// Whether a live secondary exists for `origin`.
    pub fn is_live(&self, origin: &Origin) -> bool {
        self.inner.secondaries.lock().contains_key(origin)
            && self
                .inner
                .hub
                .is_connected(&ContextId::Secondary(origin.clone()))
    }

    pub fn live_origins(&self) -> Vec<Origin> {
        let mut origins: Vec<Origin> = self.inner.secondaries.lock().keys().cloned().collect();
        origins.retain(|origin| self.is_live(origin));
        origins.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        origins
    }

    pub(crate) fn enter_primary(&self) -> Result<()> {
        self.inner.stack.lock().push(ContextId::Primary).map(|_| ())
    }

    pub(crate) fn exit_primary(&self) {
        self.inner.stack.lock().pop(&ContextId::Primary);
    }

    /// Run `callback` in the context for `origin` on behalf of `caller` and
    /// return its value. `seed` is the viewport a newly created context
    /// starts with.
    pub async fn switch_to_domain(
        &self,
        caller: &ContextId,
        origin: &Origin,
        seed: Viewport,
        callback: SerializedCallback,
        args: Value,
    ) -> Result<Value> {
        let target = ContextId::Secondary(origin.clone());
        let _frame = ActiveFrame::enter(&self.inner.stack, caller, target.clone())?;
        let created = self.ensure_secondary(origin, seed);
        info!(caller = %caller, origin = %origin, created, "switching context");

        let message = ChannelMessage::RunCallback {
            serialized_fn: callback.into_inner(),
            args,
        };
        let request = self.inner.hub.request(caller, &target, &message);
        let reply = match self.inner.timeout {
            Some(limit) => match tokio::time::timeout(limit, request).await {
                Ok(reply) => reply,
                Err(_) => {
                    let ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
                    warn!(origin = %origin, ms, "callback timed out, destroying context");
                    let mut stopped = self.cancel_nested(origin);
                    stopped.extend(self.cancel_one(origin));
                    for task in stopped {
                        if let Err(e) = task.await {
                            warn!(origin = %origin, error = %e, "secondary task did not stop cleanly");
                        }
                    }
                    return Err(DriverError::Timeout {
                        context: target,
                        ms,
                    });
                }
            },
            None => request.await,
        };

        let reply = match reply {
            Ok(reply) => reply,
            Err(e) => {
                if matches!(e, DriverError::ChannelClosed { .. }) {
                    self.forget(origin);
                }
                return Err(e);
            }
        };
        if !self.inner.hub.is_connected(&target) {
            self.forget(origin);
        }

        match reply {
            ChannelMessage::CallbackResult {
                ok: true, value, ..
            } => Ok(value.unwrap_or(Value::Null)),
            ChannelMessage::CallbackResult { error, .. } => Err(DriverError::CrossContext {
                origin: origin.clone(),
                cause: error.unwrap_or_else(|| {
                    RemoteError::new(ErrorKind::ScriptFailed, "callback failed without an error")
                }),
            }),
            other => Err(DriverError::Serialization(format!(
                "unexpected {} reply to run_callback",
                other.kind()
            ))),
        }
    }

    /// Create and start the secondary for `origin` unless a live one exists.
    /// Returns whether one was created.
    fn ensure_secondary(&self, origin: &Origin, seed: Viewport) -> bool {
        let id = ContextId::Secondary(origin.clone());
        let mut secondaries = self.inner.secondaries.lock();
        if secondaries.contains_key(origin) && self.inner.hub.is_connected(&id) {
            return false;
        }

        let inbox = self.inner.hub.connect(id.clone());
        let window = self.inner.windows.create(origin, seed);
        let state = ContextState::new(id, window, self.inner.hub.clone());
        let runtime = ContextRuntime::new(state, inbox, self.clone());
        let cancel = CancellationToken::new();
        let task = tokio::spawn(secondary::serve(runtime, cancel.clone()));
        if let Some(stale) = secondaries.insert(origin.clone(), SecondaryHandle { cancel, task }) {
            stale.cancel.cancel();
        }
        true
    }

    /// Tear down the secondary for `origin` and every context it switched
    /// into that is still running. A callback still running there is
    /// abandoned and its caller fails with `ChannelClosed`.
    pub fn destroy(&self, origin: &Origin) -> bool {
        self.cancel_nested(origin);
        self.cancel_one(origin).is_some()
    }

    /// Cancel the contexts stacked above `origin`, innermost first.
    fn cancel_nested(&self, origin: &Origin) -> Vec<JoinHandle<()>> {
        let nested = self
            .inner
            .stack
            .lock()
            .above(&ContextId::Secondary(origin.clone()));
        nested
            .iter()
            .rev()
            .filter_map(|id| match id {
                ContextId::Secondary(inner) => {
                    debug!(origin = %origin, nested = %inner, "destroying nested context");
                    self.cancel_one(inner)
                }
                ContextId::Primary => None,
            })
            .collect()
    }

    fn cancel_one(&self, origin: &Origin) -> Option<JoinHandle<()>> {
        let handle = self.inner.secondaries.lock().remove(origin);
        self.inner
            .hub
            .disconnect(&ContextId::Secondary(origin.clone()));
        let handle = handle?;
        handle.cancel.cancel();
        info!(origin = %origin, "context destroyed");
        Some(handle.task)
    }

    pub fn destroy_all(&self) -> usize {
        let drained: Vec<(Origin, SecondaryHandle)> =
            self.inner.secondaries.lock().drain().collect();
        for (origin, handle) in &drained {
            self.inner
                .hub
                .disconnect(&ContextId::Secondary(origin.clone()));
            handle.cancel.cancel();
        }
        if !drained.is_empty() {
            info!(count = drained.len(), "all secondary contexts destroyed");
        }
        drained.len()
    }

    /// Drop the entry of a secondary that already stopped on its own.
    fn forget(&self, origin: &Origin) {
        if self.inner.secondaries.lock().remove(origin).is_some() {
            info!(origin = %origin, "secondary context is gone, entry removed");
        }
    }
}
