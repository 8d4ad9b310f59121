//! Transport between execution contexts.
//!
//! Provides:
//! - The tagged [`ChannelMessage`] union exchanged between contexts
//! - An in-memory [`ChannelHub`] with ordered fire-and-forget and
//!   request/response delivery, one port per context
//! - The [`ContextWindow`] abstraction each context drives, with an
//!   in-memory [`HeadlessWindow`]

pub mod channel;
pub mod message;
pub mod window;

pub use channel::{ChannelHub, Envelope, Inbox, Responder};
pub use message::{ChannelMessage, LifecycleSignal};
pub use window::{ContextWindow, HeadlessWindow, HeadlessWindowFactory, LocationChange, WindowFactory};
