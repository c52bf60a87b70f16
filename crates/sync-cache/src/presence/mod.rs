//! Presence and typing state shared across rooms.

mod presence_store;
mod typing;

pub use presence_store::PresenceStore;
pub use typing::{TypingChange, TypingTracker, TYPING_TIMEOUT};
