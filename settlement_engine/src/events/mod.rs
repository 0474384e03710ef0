//! Fire-and-forget notifications.
//!
//! Components outside the engine (email, seller dashboards, the reconciliation desk) subscribe to settlement events
//! by registering [`EventHooks`]. Handlers run on their own tasks; the engine never waits for them.
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
