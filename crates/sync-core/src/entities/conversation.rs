//! Conversation entity - a channel with its own timeline and read state

use serde::{Deserialize, Serialize};

use crate::value_objects::Snowflake;

/// Channel type as sent by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ConversationKind {
    /// Room text channel
    #[default]
    RoomText = 0,
    /// Direct message between two users
    Direct = 1,
    /// Direct message with several users
    Group = 3,
    /// Room category for organizing channels
    Category = 4,
}

impl ConversationKind {
    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Direct,
            3 => Self::Group,
            4 => Self::Category,
            _ => Self::RoomText,
        }
    }

    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Whether the conversation can hold messages
    #[must_use]
    pub const fn has_timeline(self) -> bool {
        !matches!(self, Self::Category)
    }
}

impl Serialize for ConversationKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for ConversationKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u8::deserialize(deserializer).map(Self::from_u8)
    }
}

/// A conversation and what the client knows about its position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Snowflake,
    #[serde(rename = "type", default)]
    pub kind: ConversationKind,
    #[serde(rename = "guild_id", default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<Snowflake>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Newest message the server has announced
    #[serde(default)]
    pub last_message_id: Option<Snowflake>,
    /// Read-marker
    #[serde(skip)]
    pub last_read_id: Option<Snowflake>,
    #[serde(skip)]
    pub mention_count: u32,
}

impl Conversation {
    pub fn new(id: Snowflake, room_id: Option<Snowflake>) -> Self {
        Self {
            id,
            kind: if room_id.is_some() {
                ConversationKind::RoomText
            } else {
                ConversationKind::Direct
            },
            room_id,
            name: None,
            last_message_id: None,
            last_read_id: None,
            mention_count: 0,
        }
    }

    /// Whether the read-marker is behind the newest announced message
    pub fn has_unread(&self) -> bool {
        match (self.last_message_id, self.last_read_id) {
            (Some(last), Some(read)) => read < last,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// Record a newly announced message; never moves backwards
    pub fn observe_message(&mut self, id: Snowflake) {
        if self.last_message_id.map_or(true, |last| id > last) {
            self.last_message_id = Some(id);
        }
    }

    /// Move the read-marker; clears mentions when it reaches the newest message
    pub fn mark_read(&mut self, id: Snowflake) {
        if self.last_read_id.map_or(true, |read| id > read) {
            self.last_read_id = Some(id);
        }
        if !self.has_unread() {
            self.mention_count = 0;
        }
    }
}
