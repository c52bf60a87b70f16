//! # sync-core
//!
//! Domain layer of the sync client: entities and value objects mirrored from
//! the server, plus the ports (fetch, credentials, settings) the sync engines
//! depend on. No networking lives here.

pub mod entities;
pub mod error;
pub mod traits;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{
    Activity, Conversation, ConversationKind, Emoji, Member, MemberGroup, Message, Presence,
    ReactionCount, Room, User, UserStatus,
};
pub use error::FetchError;
pub use traits::{
    CredentialProvider, FetchResult, MemberQuery, MemberSource, MessageQuery, MessageSource,
    SettingsProvider,
};
pub use value_objects::{Snowflake, SnowflakeParseError};
