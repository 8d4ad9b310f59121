//! Viewport state and its synchronization between contexts.

pub mod store;
mod sync;

pub use store::ViewportStore;
