//! Message entity - represents a chat message

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Emoji, ReactionCount, User};
use crate::value_objects::Snowflake;

/// Message entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    pub author: User,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "edited_timestamp", default)]
    pub edited_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reactions: Vec<ReactionCount>,
}

impl Message {
    /// Create a new Message; creation time comes from the id
    pub fn new(id: Snowflake, channel_id: Snowflake, author: User, content: impl Into<String>) -> Self {
        Self {
            id,
            channel_id,
            guild_id: None,
            author,
            content: content.into(),
            created_at: id.created_at(),
            edited_at: None,
            reactions: Vec::new(),
        }
    }

    #[inline]
    pub fn author_id(&self) -> Snowflake {
        self.author.id
    }

    #[inline]
    pub fn is_edited(&self) -> bool {
        self.edited_at.is_some()
    }

    /// Whether both messages were sent by the same account
    #[inline]
    pub fn same_sender(&self, other: &Message) -> bool {
        self.author.id == other.author.id
    }

    /// Replace the content after a server-side edit
    pub fn edit(&mut self, content: String, edited_at: Option<DateTime<Utc>>) {
        self.content = content;
        self.edited_at = Some(edited_at.unwrap_or_else(Utc::now));
    }

    /// Count one more reaction with `emoji`; `by_self` marks the local user's own
    pub fn add_reaction(&mut self, emoji: Emoji, by_self: bool) {
        if let Some(existing) = self.reactions.iter_mut().find(|r| r.emoji == emoji) {
            if by_self && existing.me {
                return;
            }
            existing.count += 1;
            existing.me |= by_self;
        } else {
            self.reactions.push(ReactionCount::new(emoji, 1, by_self));
        }
    }

    /// Count one fewer; the aggregate disappears when it reaches zero
    pub fn remove_reaction(&mut self, emoji: &Emoji, by_self: bool) {
        let Some(pos) = self.reactions.iter().position(|r| &r.emoji == emoji) else {
            return;
        };
        let reaction = &mut self.reactions[pos];
        if by_self {
            if !reaction.me {
                return;
            }
            reaction.me = false;
        }
        reaction.count = reaction.count.saturating_sub(1);
        if reaction.count == 0 {
            self.reactions.remove(pos);
        }
    }

    pub fn clear_reactions(&mut self) {
        self.reactions.clear();
    }

    /// Get a truncated preview of the message (for notifications)
    pub fn preview(&self, max_len: usize) -> &str {
        if self.content.len() <= max_len {
            &self.content
        } else {
            let mut end = max_len;
            while !self.content.is_char_boundary(end) && end > 0 {
                end -= 1;
            }
            &self.content[..end]
        }
    }
}
