//! # sync-state
//!
//! Client-side state kept in sync with the gateway.
//!
//! ## Features
//!
//! - **Roster**: sparse member list patched by server operations
//! - **Timeline**: ordered, paginated message list of the active conversation
//! - **Members**: member records from lookups and member chunks
//! - **Conversations**: rooms, conversations, read-markers and mention counts
//! - **Session**: routes gateway events to all of the above

pub mod conversations;
pub mod members;
pub mod roster;
pub mod session;
pub mod timeline;

pub use conversations::ConversationRegistry;
pub use members::MemberDirectory;
pub use roster::{ApplyOutcome, RosterChange, RosterMember, RosterSlot, RosterSyncEngine};
pub use session::{ActiveView, SessionPorts, SyncSession};
pub use timeline::{PageOutcome, TimelineCache, TimelineChange, TimelineEntry, TimelineMessage};
