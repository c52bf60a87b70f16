//! Presence - online status of a user, shared across every room they appear in

use serde::{Deserialize, Serialize};

use crate::value_objects::Snowflake;

/// User online status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    /// User is online and active
    Online,
    /// User is idle (away from keyboard)
    Idle,
    /// Do not disturb
    Dnd,
    /// Appears offline to others
    Invisible,
    /// User is offline
    #[default]
    Offline,
}

impl UserStatus {
    /// Whether other users see this user as present
    #[must_use]
    pub fn is_visible(&self) -> bool {
        !matches!(self, Self::Offline | Self::Invisible)
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Idle => "idle",
            Self::Dnd => "dnd",
            Self::Invisible => "invisible",
            Self::Offline => "offline",
        }
    }
}

impl std::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "online" => Ok(Self::Online),
            "idle" => Ok(Self::Idle),
            "dnd" => Ok(Self::Dnd),
            "invisible" => Ok(Self::Invisible),
            "offline" => Ok(Self::Offline),
            _ => Err(format!("Invalid status: {s}")),
        }
    }
}

/// Custom activity line shown under a member's name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

/// Presence record for one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presence {
    #[serde(default)]
    pub user_id: Snowflake,
    #[serde(default)]
    pub status: UserStatus,
    #[serde(default)]
    pub activities: Vec<Activity>,
}

impl Presence {
    #[must_use]
    pub fn new(user_id: Snowflake, status: UserStatus) -> Self {
        Self {
            user_id,
            status,
            activities: Vec::new(),
        }
    }

    /// Presence for a user the server has said nothing about
    #[must_use]
    pub fn offline(user_id: Snowflake) -> Self {
        Self::new(user_id, UserStatus::Offline)
    }

    /// First custom status text, if any
    pub fn custom_status(&self) -> Option<&str> {
        self.activities
            .iter()
            .find(|a| a.kind == Activity::CUSTOM)
            .and_then(|a| a.state.as_deref())
    }
}

impl Activity {
    /// Activity type code for a user-written status line
    pub const CUSTOM: u8 = 4;
}
