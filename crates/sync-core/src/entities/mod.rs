//! Domain entities - what the client keeps in memory

mod conversation;
mod member;
mod message;
mod presence;
mod reaction;
mod room;
mod user;

pub use conversation::{Conversation, ConversationKind};
pub use member::{Member, MemberGroup};
pub use message::Message;
pub use presence::{Activity, Presence, UserStatus};
pub use reaction::{Emoji, ReactionCount};
pub use room::Room;
pub use user::User;
