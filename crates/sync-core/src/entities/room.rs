//! Room entity - a container of members and conversations

use serde::{Deserialize, Serialize};

use crate::value_objects::Snowflake;

/// Room (server) as announced in the ready payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: Snowflake,
    #[serde(default)]
    pub name: String,
    pub owner_id: Snowflake,
    #[serde(default)]
    pub member_count: u32,
}

impl Room {
    pub fn new(id: Snowflake, name: impl Into<String>, owner_id: Snowflake) -> Self {
        Self {
            id,
            name: name.into(),
            owner_id,
            member_count: 0,
        }
    }

    #[inline]
    pub fn is_owner(&self, user_id: Snowflake) -> bool {
        self.owner_id == user_id
    }
}
