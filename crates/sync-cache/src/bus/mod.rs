//! Event distribution inside one client process.

mod event_bus;

pub use event_bus::{EventBus, SubscriptionId};
