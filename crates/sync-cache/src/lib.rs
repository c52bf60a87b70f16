//! # sync-cache
//!
//! In-memory state shared by the sync engines.
//!
//! ## Features
//!
//! - **Event bus**: typed, synchronous, registration-ordered publish/subscribe
//! - **Presence**: one presence record per user, shared by every roster
//! - **Typing**: per-user typing indicators with automatic expiry
//!
//! ## Example
//!
//! ```ignore
//! use sync_cache::{EventBus, PresenceStore};
//!
//! let bus = EventBus::<GatewayEvent>::new_shared();
//! let presence = PresenceStore::new_shared();
//!
//! bus.subscribe(move |event| {
//!     if let GatewayEvent::PresenceUpdated(update) = event {
//!         presence.set_presence(update.to_presence());
//!     }
//! });
//! ```

pub mod bus;
pub mod presence;

pub use bus::{EventBus, SubscriptionId};
pub use presence::{PresenceStore, TypingChange, TypingTracker, TYPING_TIMEOUT};
