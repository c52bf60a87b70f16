//! Control payload definitions
//!
//! Payloads for the non-dispatch ops: what the client sends and the `Hello`
//! it receives first.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use sync_core::Snowflake;

use crate::subscription::{MemberRange, RoomSubscription};

/// Payload for op 10 (Hello)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Heartbeat interval in milliseconds
    pub heartbeat_interval: u64,
}

impl HelloPayload {
    /// Interval assumed when the server omits one (41.25 seconds)
    pub const DEFAULT_HEARTBEAT_INTERVAL: u64 = 41_250;
}

impl Default for HelloPayload {
    fn default() -> Self {
        Self {
            heartbeat_interval: Self::DEFAULT_HEARTBEAT_INTERVAL,
        }
    }
}

/// Payload for op 2 (Identify)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifyPayload {
    /// Bearer credential
    pub token: String,

    pub properties: IdentifyProperties,

    /// Ask the server for zlib-compressed dispatches
    #[serde(default)]
    pub compress: bool,
}

impl IdentifyPayload {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            properties: IdentifyProperties::default(),
            compress: false,
        }
    }
}

/// Client connection properties
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifyProperties {
    pub os: String,
    pub browser: String,
    pub device: String,
}

impl Default for IdentifyProperties {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            browser: env!("CARGO_PKG_NAME").to_string(),
            device: String::new(),
        }
    }
}

impl IdentifyProperties {
    /// Set device type
    #[must_use]
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = device.into();
        self
    }
}

/// Payload for op 8 (Request Guild Members)
///
/// Matching members arrive later as `GUILD_MEMBERS_CHUNK` dispatches keyed by
/// room id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestMembersPayload {
    /// Rooms to search
    #[serde(rename = "guild_id")]
    pub room_ids: Vec<Snowflake>,

    /// Username prefix; empty matches everyone
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,

    /// Maximum members to return; 0 means no limit
    pub limit: u32,

    /// Include presences in the chunks
    pub presences: bool,

    /// Look up specific users instead of searching
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_ids: Option<Vec<Snowflake>>,
}

impl RequestMembersPayload {
    /// Search `room_ids` for usernames starting with `query`
    #[must_use]
    pub fn search(room_ids: Vec<Snowflake>, query: impl Into<String>, limit: u32) -> Self {
        Self {
            room_ids,
            query: Some(query.into()),
            limit,
            presences: false,
            user_ids: None,
        }
    }

    /// Fetch the given users' memberships in one room
    #[must_use]
    pub fn users(room_id: Snowflake, user_ids: Vec<Snowflake>) -> Self {
        Self {
            room_ids: vec![room_id],
            query: None,
            limit: 0,
            presences: false,
            user_ids: Some(user_ids),
        }
    }

    #[must_use]
    pub fn with_presences(mut self, presences: bool) -> Self {
        self.presences = presences;
        self
    }
}

/// Payload for op 14 (Lazy Guild Subscribe)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LazySubscribePayload {
    #[serde(rename = "guild_id")]
    pub room_id: Snowflake,

    pub channels: BTreeMap<Snowflake, Vec<MemberRange>>,

    /// Receive typing events for the room
    pub typing: bool,

    /// Receive activity updates in presences
    pub activities: bool,
}

impl LazySubscribePayload {
    #[must_use]
    pub fn new(room_id: Snowflake, subscription: &RoomSubscription) -> Self {
        Self {
            room_id,
            channels: subscription.channels.clone(),
            typing: true,
            activities: true,
        }
    }
}
