//! Messages exchanged between execution contexts.
//!
//! Every message crosses the context boundary as a JSON text frame, so
//! nothing but plain data can travel between contexts.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use xdomain_common::{ContextId, DriverError, RemoteError, Viewport};

/// Control signals sent by the session to its contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleSignal {
    /// A test finished: restore the default viewport, drop local listeners.
    Reset,
    /// Stop serving the channel and tear the context down.
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelMessage {
    /// Run a serialized callback in the receiving context.
    RunCallback {
        serialized_fn: String,
        #[serde(default)]
        args: Value,
    },
    /// Settlement of a `RunCallback`.
    CallbackResult {
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<RemoteError>,
    },
    /// A context applied a new viewport; peers apply it without echoing.
    ViewportSync {
        width: u32,
        height: u32,
        origin_context_id: ContextId,
    },
    /// An event explicitly forwarded out of the context that raised it.
    Event {
        name: String,
        payload: Value,
        origin_context_id: ContextId,
    },
    Lifecycle {
        signal: LifecycleSignal,
    },
}

impl ChannelMessage {
    pub fn callback_ok(value: Value) -> Self {
        Self::CallbackResult {
            ok: true,
            value: Some(value),
            error: None,
        }
    }

    pub fn callback_err(error: RemoteError) -> Self {
        Self::CallbackResult {
            ok: false,
            value: None,
            error: Some(error),
        }
    }

    pub fn viewport_sync(viewport: Viewport, origin: ContextId) -> Self {
        Self::ViewportSync {
            width: viewport.width,
            height: viewport.height,
            origin_context_id: origin,
        }
    }

    /// Short name used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RunCallback { .. } => "run_callback",
            Self::CallbackResult { .. } => "callback_result",
            Self::ViewportSync { .. } => "viewport_sync",
            Self::Event { .. } => "event",
            Self::Lifecycle { .. } => "lifecycle",
        }
    }

    pub fn to_json(&self) -> Result<String, DriverError> {
        serde_json::to_string(self).map_err(|e| DriverError::Serialization(e.to_string()))
    }

    pub fn from_json(raw: &str) -> Result<Self, DriverError> {
        serde_json::from_str(raw).map_err(|e| DriverError::Serialization(e.to_string()))
    }
}
