//! Member entity - a user's membership in a room, plus roster group headings

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Presence, User};
use crate::value_objects::Snowflake;

/// Room member as carried by roster operations and member chunks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub user: User,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nick: Option<String>,
    #[serde(default)]
    pub roles: Vec<Snowflake>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joined_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence: Option<Presence>,
}

impl Member {
    /// Create a member with no nickname, roles or presence
    pub fn new(user: User) -> Self {
        Self {
            user,
            nick: None,
            roles: Vec::new(),
            joined_at: None,
            presence: None,
        }
    }

    #[inline]
    pub fn id(&self) -> Snowflake {
        self.user.id
    }

    /// Nickname if set, otherwise the user's own display name
    pub fn display_name(&self) -> &str {
        self.nick.as_deref().unwrap_or_else(|| self.user.display_name())
    }

    #[inline]
    pub fn has_role(&self, role_id: Snowflake) -> bool {
        self.roles.contains(&role_id)
    }

    /// The embedded presence keyed to this member's identity.
    ///
    /// Roster items carry presence without a user id; the shared presence
    /// table needs one.
    pub fn presence_record(&self) -> Option<Presence> {
        self.presence.as_ref().map(|p| Presence {
            user_id: self.id(),
            ..p.clone()
        })
    }
}

/// Group heading inside a roster partition (a hoisted role, "online", "offline")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberGroup {
    /// Role id, or a well-known name such as `online` / `offline`
    pub id: String,
    /// Number of members listed under the heading
    #[serde(default)]
    pub count: u32,
}

impl MemberGroup {
    pub fn new(id: impl Into<String>, count: u32) -> Self {
        Self {
            id: id.into(),
            count,
        }
    }

    /// Slots the group occupies: its heading plus one per member
    #[inline]
    pub fn slot_span(&self) -> usize {
        self.count as usize + 1
    }
}
