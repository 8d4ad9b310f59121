pub mod errors;
pub mod id;
pub mod types;

pub use errors::{ConfigError, DriverError, ErrorKind, RemoteError};
pub use id::{new_correlation_id, ContextId, Origin};
pub use types::{Lifecycle, Viewport, VIEWPORT_CHANGED};

pub type Result<T> = std::result::Result<T, DriverError>;
