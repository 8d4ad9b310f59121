use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::id::{ContextId, Origin};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Stable identity of a failure, carried across context boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Serialization,
    InvalidContext,
    ChannelClosed,
    InvalidViewport,
    InvalidOrigin,
    Timeout,
    ScriptFailed,
    CrossContext,
    Config,
}

/// A failure raised in another execution context, in the form it travels
/// over the channel. `cause` holds the next error down the chain when the
/// remote failure was itself a failed nested switch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct RemoteError {
    pub kind: ErrorKind,
    pub message: String,
    #[source]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<RemoteError>>,
}

impl RemoteError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
        }
    }

    /// The innermost error of the chain: the one originally raised.
    pub fn root(&self) -> &RemoteError {
        let mut current = self;
        while let Some(next) = current.cause.as_deref() {
            current = next;
        }
        current
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid context: {0}")]
    InvalidContext(String),

    #[error("channel closed: {context} is no longer reachable")]
    ChannelClosed { context: ContextId },

    #[error("invalid viewport: {width} x {height} (dimensions must be positive integers)")]
    InvalidViewport { width: f64, height: f64 },

    #[error("invalid origin: {0}")]
    InvalidOrigin(String),

    #[error("timed out after {ms}ms waiting for {context}")]
    Timeout { context: ContextId, ms: u64 },

    #[error("script failed: {0}")]
    ScriptFailed(String),

    #[error("switch to {origin} failed: {cause}")]
    CrossContext {
        origin: Origin,
        #[source]
        cause: RemoteError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl DriverError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Serialization(_) => ErrorKind::Serialization,
            Self::InvalidContext(_) => ErrorKind::InvalidContext,
            Self::ChannelClosed { .. } => ErrorKind::ChannelClosed,
            Self::InvalidViewport { .. } => ErrorKind::InvalidViewport,
            Self::InvalidOrigin(_) => ErrorKind::InvalidOrigin,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::ScriptFailed(_) => ErrorKind::ScriptFailed,
            Self::CrossContext { .. } => ErrorKind::CrossContext,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    /// Convert into the wire form sent back in a `CallbackResult`.
    pub fn to_remote(&self) -> RemoteError {
        match self {
            Self::CrossContext { origin, cause } => RemoteError {
                kind: ErrorKind::CrossContext,
                message: format!("switch to {origin} failed"),
                cause: Some(Box::new(cause.clone())),
            },
            other => RemoteError::new(other.kind(), other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    fn foobar() -> Origin {
        Origin::parse("http://foobar.com:3500").unwrap()
    }

    #[test]
    fn config_error_display() {
        let err = ConfigError::FileNotFound(PathBuf::from("/tmp/missing.toml"));
        assert_eq!(err.to_string(), "config file not found: /tmp/missing.toml");

        let err = ConfigError::ValidationError("viewport.default_width = 0".into());
        assert_eq!(
            err.to_string(),
            "config validation error: viewport.default_width = 0"
        );
    }

    #[test]
    fn driver_error_display() {
        let err = DriverError::InvalidViewport {
            width: 320.5,
            height: 480.0,
        };
        assert_eq!(
            err.to_string(),
            "invalid viewport: 320.5 x 480 (dimensions must be positive integers)"
        );

        let err = DriverError::ChannelClosed {
            context: ContextId::Secondary(foobar()),
        };
        assert_eq!(
            err.to_string(),
            "channel closed: secondary:http://foobar.com:3500 is no longer reachable"
        );
    }

    #[test]
    fn kind_matches_variant() {
        assert_eq!(
            DriverError::Serialization("x".into()).kind(),
            ErrorKind::Serialization
        );
        assert_eq!(
            DriverError::InvalidContext("x".into()).kind(),
            ErrorKind::InvalidContext
        );
        let err: DriverError = ConfigError::ParseError("bad".into()).into();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn remote_error_keeps_kind_and_message() {
        let err = DriverError::ScriptFailed("boom".into());
        let remote = err.to_remote();
        assert_eq!(remote.kind, ErrorKind::ScriptFailed);
        assert_eq!(remote.message, "script failed: boom");
        assert!(remote.cause.is_none());
    }

    #[test]
    fn cross_context_nests_cause() {
        let inner = RemoteError::new(ErrorKind::InvalidViewport, "invalid viewport: 0 x 1");
        let err = DriverError::CrossContext {
            origin: foobar(),
            cause: inner.clone(),
        };

        let source = err.source().unwrap();
        assert_eq!(source.to_string(), "invalid viewport: 0 x 1");

        let remote = err.to_remote();
        assert_eq!(remote.kind, ErrorKind::CrossContext);
        assert_eq!(remote.cause.as_deref(), Some(&inner));
        assert_eq!(remote.root(), &inner);
    }

    #[test]
    fn remote_error_serialization() {
        let remote = RemoteError {
            kind: ErrorKind::CrossContext,
            message: "switch to http://idp.com failed".into(),
            cause: Some(Box::new(RemoteError::new(ErrorKind::Timeout, "late"))),
        };
        let json = serde_json::to_string(&remote).unwrap();
        assert!(json.contains("\"cross_context\""));
        let back: RemoteError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, remote);
    }
}
