//! Cross-context command relay and viewport synchronization.
//!
//! A [`Session`] drives the primary context. `switch_to_domain` ships a
//! serialized [`Script`] to the secondary context for an origin, creating
//! it on first use, and suspends the caller until the script settles.
//! Viewport changes made in any context are applied in every other one,
//! while `viewport:changed` only ever fires in the context that made the
//! change.

pub mod context;
pub mod coordinator;
pub mod registry;
mod runtime;
pub mod script;
pub mod session;
pub mod spy;
pub mod viewport;

#[cfg(test)]
mod tests;

pub use context::ContextState;
pub use coordinator::Coordinator;
pub use registry::{BindingId, EventPayload, Listener, ListenerBinding, ListenerRegistry, Scope};
pub use script::{ListenerSpec, Operand, Probe, Script, SerializedCallback, Step};
pub use session::Session;
pub use spy::Spy;
pub use viewport::ViewportStore;
