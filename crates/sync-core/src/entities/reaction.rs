//! Reaction entities - emoji identity and the per-message aggregate

use serde::{Deserialize, Serialize};

use crate::value_objects::Snowflake;

/// Emoji identity. Unicode emoji have no id; custom emoji are keyed by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Emoji {
    #[serde(default)]
    pub id: Option<Snowflake>,
    #[serde(default)]
    pub name: Option<String>,
}

impl Emoji {
    pub fn unicode(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
        }
    }

    pub fn custom(id: Snowflake, name: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            name: Some(name.into()),
        }
    }
}

// Custom emoji compare by id alone; renames keep the same identity
impl PartialEq for Emoji {
    fn eq(&self, other: &Self) -> bool {
        match (self.id, other.id) {
            (Some(a), Some(b)) => a == b,
            (None, None) => self.name == other.name,
            _ => false,
        }
    }
}

impl Eq for Emoji {}

/// Aggregated reaction count for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionCount {
    pub emoji: Emoji,
    pub count: u32,
    #[serde(default)]
    pub me: bool,
}

impl ReactionCount {
    pub fn new(emoji: Emoji, count: u32, me: bool) -> Self {
        Self { emoji, count, me }
    }
}
