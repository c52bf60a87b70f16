//! Event payload definitions
//!
//! The `d` shapes of the dispatch events the client consumes. Entities that
//! arrive whole (messages, members, conversations) reuse the domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sync_core::{
    Activity, Conversation, Emoji, Member, MemberGroup, Message, Presence, Room, Snowflake, User,
    UserStatus,
};

use crate::subscription::MemberRange;

// === Connection Events ===

/// READY event payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyEvent {
    /// Gateway protocol version
    #[serde(default)]
    pub v: u8,

    /// The authenticated user
    pub user: User,

    /// Session ID
    pub session_id: String,

    #[serde(rename = "guilds", default)]
    pub rooms: Vec<Room>,

    /// Direct and group conversations
    #[serde(default)]
    pub private_channels: Vec<Conversation>,

    #[serde(default)]
    pub read_state: Vec<ReadStateEntry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_gateway_url: Option<String>,
}

impl ReadyEvent {
    /// Read-marker recorded for a conversation at login
    pub fn read_state_for(&self, conversation_id: Snowflake) -> Option<&ReadStateEntry> {
        self.read_state.iter().find(|r| r.id == conversation_id)
    }
}

/// Per-conversation read state in READY
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadStateEntry {
    /// Conversation id
    pub id: Snowflake,
    #[serde(default)]
    pub last_message_id: Option<Snowflake>,
    #[serde(default)]
    pub mention_count: u32,
}

/// One entry of SESSIONS_REPLACE
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    #[serde(default)]
    pub status: UserStatus,
}

// === Message Events ===

/// MESSAGE_CREATE event payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageCreateEvent {
    #[serde(flatten)]
    pub message: Message,

    #[serde(default)]
    pub mentions: Vec<User>,
}

impl MessageCreateEvent {
    pub fn mentions_user(&self, user_id: Snowflake) -> bool {
        self.mentions.iter().any(|u| u.id == user_id)
    }
}

/// MESSAGE_UPDATE event payload; only changed fields are present
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageUpdateEvent {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_timestamp: Option<DateTime<Utc>>,
}

/// MESSAGE_DELETE event payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDeleteEvent {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
}

/// MESSAGE_ACK event payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageAckEvent {
    pub channel_id: Snowflake,
    pub message_id: Snowflake,
}

// === Reaction Events ===

/// MESSAGE_REACTION_ADD / MESSAGE_REACTION_REMOVE event payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageReactionEvent {
    pub user_id: Snowflake,
    pub channel_id: Snowflake,
    pub message_id: Snowflake,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    pub emoji: Emoji,
}

/// MESSAGE_REACTION_REMOVE_ALL event payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionRemoveAllEvent {
    pub channel_id: Snowflake,
    pub message_id: Snowflake,
}

// === Roster Events ===

/// One roster item: a group heading or a member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListItem {
    Group(MemberGroup),
    Member(Member),
}

/// One patch operation of a GUILD_MEMBER_LIST_UPDATE batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberListOp {
    /// Write `items` into consecutive slots from `range.lo`
    Sync {
        range: MemberRange,
        #[serde(default)]
        items: Vec<ListItem>,
    },
    /// Blank the slots in `range`
    Invalidate { range: MemberRange },
    /// Insert a slot at `index`
    Insert { index: usize, item: ListItem },
    /// Overwrite the slot at `index`
    Update { index: usize, item: ListItem },
    /// Remove the slot at `index`
    Delete { index: usize },
}

impl MemberListOp {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Sync { .. } => "SYNC",
            Self::Invalidate { .. } => "INVALIDATE",
            Self::Insert { .. } => "INSERT",
            Self::Update { .. } => "UPDATE",
            Self::Delete { .. } => "DELETE",
        }
    }

    #[must_use]
    pub const fn is_sync(&self) -> bool {
        matches!(self, Self::Sync { .. })
    }
}

/// GUILD_MEMBER_LIST_UPDATE event payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberListUpdateEvent {
    /// Partition token the batch applies to
    #[serde(rename = "id")]
    pub list_id: String,
    #[serde(rename = "guild_id")]
    pub room_id: Snowflake,
    #[serde(default)]
    pub member_count: u32,
    #[serde(default)]
    pub online_count: u32,
    /// Group headings of the partition, when the server resends them
    #[serde(default)]
    pub groups: Option<Vec<MemberGroup>>,
    #[serde(default)]
    pub ops: Vec<MemberListOp>,
}

impl MemberListUpdateEvent {
    pub fn has_sync(&self) -> bool {
        self.ops.iter().any(MemberListOp::is_sync)
    }
}

/// GUILD_MEMBERS_CHUNK event payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembersChunkEvent {
    #[serde(rename = "guild_id")]
    pub room_id: Snowflake,
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default)]
    pub presences: Vec<PresenceUpdateEvent>,
    /// Requested user ids the room has no member for
    #[serde(default)]
    pub not_found: Vec<Snowflake>,
    #[serde(default)]
    pub chunk_index: u32,
    #[serde(default = "default_chunk_count")]
    pub chunk_count: u32,
}

fn default_chunk_count() -> u32 {
    1
}

impl MembersChunkEvent {
    pub fn is_last(&self) -> bool {
        self.chunk_index + 1 >= self.chunk_count
    }
}

// === Presence Events ===

/// User reference carrying only an id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserIdPayload {
    pub id: Snowflake,
}

/// PRESENCE_UPDATE event payload (also embedded in member chunks)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceUpdateEvent {
    pub user: UserIdPayload,
    #[serde(rename = "guild_id", default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<Snowflake>,
    #[serde(default)]
    pub status: UserStatus,
    #[serde(default)]
    pub activities: Vec<Activity>,
}

impl PresenceUpdateEvent {
    pub fn to_presence(&self) -> Presence {
        Presence {
            user_id: self.user.id,
            status: self.status,
            activities: self.activities.clone(),
        }
    }
}

/// TYPING_START event payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypingStartEvent {
    pub channel_id: Snowflake,
    pub user_id: Snowflake,
    #[serde(rename = "guild_id", default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<Snowflake>,
    /// Unix timestamp (seconds)
    #[serde(default)]
    pub timestamp: i64,
}
