//! Callbacks that can cross a context boundary.
//!
//! A [`Script`] is a list of well-known [`Step`]s over plain data. It is
//! serialized to JSON before it is shipped to another context, so anything
//! that only exists in the sending context (a host [`Listener`]) makes the
//! serialization fail instead of being proxied.

use serde::de::Deserializer;
use serde::ser::{Error as _, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use xdomain_common::{ContextId, DriverError, Result};

use crate::registry::{Listener, Scope};
use crate::spy::Spy;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Step {
    /// Change the viewport of the running context.
    Viewport { width: Operand, height: Operand },
    /// Create (or reuse) a named spy in the context's globals.
    Spy { name: String },
    On {
        event: String,
        listener: ListenerSpec,
        #[serde(default)]
        scope: Scope,
    },
    Off {
        event: String,
        listener: ListenerSpec,
    },
    /// Forward events of this name raised here to another context.
    Forward { event: String, to: ContextId },
    /// Record a value into the callback's result object.
    Capture { key: String, probe: Probe },
    Navigate { url: String },
    Wait { ms: u64 },
    /// Fail the callback with a script error.
    Fail { message: String },
    SwitchToDomain {
        origin: String,
        script: Script,
        #[serde(default)]
        args: Value,
        /// Result key the nested callback's value is captured under.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        capture: Option<String>,
    },
}

/// A numeric argument: a literal, or a field of the callback's `args`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Operand {
    Number(f64),
    Arg { arg: String },
}

impl Operand {
    pub fn arg(name: impl Into<String>) -> Self {
        Self::Arg { arg: name.into() }
    }

    pub fn resolve(&self, args: &Value) -> Result<f64> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Arg { arg } => args.get(arg).and_then(Value::as_f64).ok_or_else(|| {
                DriverError::ScriptFailed(format!("missing numeric argument `{arg}`"))
            }),
        }
    }
}

impl From<u32> for Operand {
    fn from(n: u32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<i32> for Operand {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<f64> for Operand {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

/// What a `Capture` step records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Probe {
    /// The context's stored viewport.
    Viewport,
    /// The size of the context's real window.
    Window,
    Location,
    /// How many times the named spy has been called.
    SpyCalls(String),
    Arg(String),
}

/// The listener of an `On`/`Off` step. Only named spies serialize; a host
/// listener can be used in the context that owns it and nowhere else.
#[derive(Debug, Clone)]
pub enum ListenerSpec {
    Named(String),
    Host(Listener),
}

impl Serialize for ListenerSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Named(name) => serializer.serialize_str(name),
            Self::Host(_) => Err(S::Error::custom(
                "a host listener cannot cross a context boundary; \
                 create a named spy inside the callback instead",
            )),
        }
    }
}

impl<'de> Deserialize<'de> for ListenerSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::Named)
    }
}

impl From<&str> for ListenerSpec {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<String> for ListenerSpec {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl From<Listener> for ListenerSpec {
    fn from(listener: Listener) -> Self {
        Self::Host(listener)
    }
}

impl From<&Spy> for ListenerSpec {
    fn from(spy: &Spy) -> Self {
        Self::Host(spy.listener())
    }
}

/// A script in its transferable form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedCallback(String);

impl SerializedCallback {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn viewport(self, width: impl Into<Operand>, height: impl Into<Operand>) -> Self {
        self.push(Step::Viewport {
            width: width.into(),
            height: height.into(),
        })
    }

    pub fn spy(self, name: impl Into<String>) -> Self {
        self.push(Step::Spy { name: name.into() })
    }

    pub fn on(self, event: impl Into<String>, listener: impl Into<ListenerSpec>) -> Self {
        self.push(Step::On {
            event: event.into(),
            listener: listener.into(),
            scope: Scope::Local,
        })
    }

    pub fn on_global(self, event: impl Into<String>, listener: impl Into<ListenerSpec>) -> Self {
        self.push(Step::On {
            event: event.into(),
            listener: listener.into(),
            scope: Scope::Global,
        })
    }

    pub fn off(self, event: impl Into<String>, listener: impl Into<ListenerSpec>) -> Self {
        self.push(Step::Off {
            event: event.into(),
            listener: listener.into(),
        })
    }

    pub fn forward(self, event: impl Into<String>, to: ContextId) -> Self {
        self.push(Step::Forward {
            event: event.into(),
            to,
        })
    }

    pub fn capture(self, key: impl Into<String>, probe: Probe) -> Self {
        self.push(Step::Capture {
            key: key.into(),
            probe,
        })
    }

    pub fn navigate(self, url: impl Into<String>) -> Self {
        self.push(Step::Navigate { url: url.into() })
    }

    pub fn wait(self, ms: u64) -> Self {
        self.push(Step::Wait { ms })
    }

    pub fn fail(self, message: impl Into<String>) -> Self {
        self.push(Step::Fail {
            message: message.into(),
        })
    }

    pub fn switch_to_domain(self, origin: impl Into<String>, script: Script) -> Self {
        self.push(Step::SwitchToDomain {
            origin: origin.into(),
            script,
            args: Value::Null,
            capture: None,
        })
    }

    /// Nested switch whose result is recorded under `key`.
    pub fn switch_to_domain_capturing(
        self,
        origin: impl Into<String>,
        script: Script,
        key: impl Into<String>,
    ) -> Self {
        self.push(Step::SwitchToDomain {
            origin: origin.into(),
            script,
            args: Value::Null,
            capture: Some(key.into()),
        })
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Serialize for transfer. Fails with `Serialization` if the script
    /// references anything but plain data.
    pub fn serialize_for_transfer(&self) -> Result<SerializedCallback> {
        serde_json::to_string(self)
            .map(SerializedCallback)
            .map_err(|e| DriverError::Serialization(e.to_string()))
    }

    pub fn from_transfer(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| DriverError::Serialization(e.to_string()))
    }
}
