use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::DriverError;

/// Short hex identifier used to correlate a request frame with its reply in logs.
pub fn new_correlation_id() -> String {
    let uuid = uuid::Uuid::new_v4();
    let bytes = uuid.as_bytes();
    format!(
        "{:02x}{:02x}{:02x}{:02x}",
        bytes[0], bytes[1], bytes[2], bytes[3]
    )
}

/// Scheme, host and port of a browsing context, in ASCII serialization
/// (`http://foobar.com:3500`; default ports are dropped).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Origin(String);

impl Origin {
    /// Parse an origin out of any absolute URL. Paths, queries and fragments
    /// are discarded.
    pub fn parse(input: &str) -> Result<Self, DriverError> {
        let url = url::Url::parse(input)
            .map_err(|e| DriverError::InvalidOrigin(format!("{input}: {e}")))?;
        match url.origin() {
            origin @ url::Origin::Tuple(..) => Ok(Self(origin.ascii_serialization())),
            url::Origin::Opaque(_) => Err(DriverError::InvalidOrigin(format!(
                "{input} has an opaque origin"
            ))),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Origin {
    type Error = DriverError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Origin> for String {
    fn from(origin: Origin) -> Self {
        origin.0
    }
}

/// Identity of an execution context: the primary one the test starts in, or
/// a secondary one bound to a cross-origin browsing context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ContextId {
    Primary,
    Secondary(Origin),
}

impl ContextId {
    pub fn origin(&self) -> Option<&Origin> {
        match self {
            Self::Primary => None,
            Self::Secondary(origin) => Some(origin),
        }
    }

    pub fn is_primary(&self) -> bool {
        matches!(self, Self::Primary)
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Secondary(origin) => write!(f, "secondary:{origin}"),
        }
    }
}

impl FromStr for ContextId {
    type Err = DriverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "primary" {
            return Ok(Self::Primary);
        }
        match s.strip_prefix("secondary:") {
            Some(origin) => Ok(Self::Secondary(Origin::parse(origin)?)),
            None => Err(DriverError::InvalidContext(format!(
                "`{s}` is not a context identifier"
            ))),
        }
    }
}

impl TryFrom<String> for ContextId {
    type Error = DriverError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ContextId> for String {
    fn from(id: ContextId) -> Self {
        id.to_string()
    }
}
