//! Test fixtures and wire frames
//!
//! Frames are written as raw JSON so the tests exercise the same decoding
//! path as a live gateway.

use std::sync::Arc;

use serde_json::{json, Value};
use sync_cache::EventBus;
use sync_common::SyncConfig;
use sync_core::{Member, Snowflake, User};
use sync_gateway::{GatewayConnection, GatewayEvent};
use sync_state::{SessionPorts, SyncSession};

use crate::helpers::{InMemoryMembers, InMemoryMessages, ScriptedTransport, StaticCredentials};

pub const SELF_ID: Snowflake = Snowflake::new(42);
pub const OWNER_ID: Snowflake = Snowflake::new(7);
pub const ROOM_ID: Snowflake = Snowflake::new(1000);
pub const CONVERSATION_ID: Snowflake = Snowflake::new(2000);
pub const OTHER_CONVERSATION_ID: Snowflake = Snowflake::new(3000);

pub const TOKEN: &str = "test-token";

/// Config pointing at a fake gateway with defaults otherwise
pub fn sync_config() -> SyncConfig {
    SyncConfig::with_gateway_url("wss://gateway.test/?v=9&encoding=json")
}

// ============================================================================
// Frames
// ============================================================================

pub fn hello(interval_ms: u64) -> Value {
    json!({"op": 10, "d": {"heartbeat_interval": interval_ms}})
}

pub fn invalid_session(resumable: bool) -> Value {
    json!({"op": 9, "d": resumable})
}

pub fn dispatch(seq: u64, name: &str, data: Value) -> Value {
    json!({"op": 0, "s": seq, "t": name, "d": data})
}

pub fn ready(seq: u64) -> Value {
    dispatch(
        seq,
        "READY",
        json!({
            "v": 9,
            "user": user_json(SELF_ID),
            "session_id": "session-1",
            "guilds": [{"id": ROOM_ID, "name": "room", "owner_id": OWNER_ID, "member_count": 1000}],
            "private_channels": [],
            "read_state": [],
        }),
    )
}

pub fn user_json(id: Snowflake) -> Value {
    json!({"id": id, "username": format!("user{id}")})
}

pub fn conversation_created(seq: u64, id: Snowflake) -> Value {
    dispatch(
        seq,
        "CHANNEL_CREATE",
        json!({"id": id, "type": 0, "guild_id": ROOM_ID, "name": format!("conversation-{id}")}),
    )
}

pub fn message_created(seq: u64, id: Snowflake, conversation: Snowflake, author: Snowflake) -> Value {
    dispatch(
        seq,
        "MESSAGE_CREATE",
        json!({
            "id": id,
            "channel_id": conversation,
            "guild_id": ROOM_ID,
            "author": user_json(author),
            "content": format!("live {id}"),
            "timestamp": "2024-05-01T10:00:00+00:00",
            "mentions": [],
        }),
    )
}

pub fn member_item(id: Snowflake) -> Value {
    json!({"member": {"user": user_json(id), "roles": []}})
}

/// Member-list batch against the `everyone` partition
pub fn member_list_update(seq: u64, groups: Option<Value>, ops: Value) -> Value {
    let mut data = json!({
        "id": "everyone",
        "guild_id": ROOM_ID,
        "member_count": 1000,
        "online_count": 12,
        "ops": ops,
    });
    if let Some(groups) = groups {
        data["groups"] = groups;
    }
    dispatch(seq, "GUILD_MEMBER_LIST_UPDATE", data)
}

pub fn members_chunk(seq: u64, room: Snowflake, ids: &[Snowflake]) -> Value {
    let members: Vec<Value> = ids.iter().map(|id| json!({"user": user_json(*id)})).collect();
    dispatch(
        seq,
        "GUILD_MEMBERS_CHUNK",
        json!({"guild_id": room, "members": members, "chunk_index": 0, "chunk_count": 1}),
    )
}

pub fn member(id: Snowflake) -> Member {
    Member::new(User::new(id, format!("user{id}")))
}

// ============================================================================
// Assembled client
// ============================================================================

/// Connection, session and the fakes behind them
pub struct TestClient {
    pub bus: Arc<EventBus<GatewayEvent>>,
    pub transport: Arc<ScriptedTransport>,
    pub credentials: Arc<StaticCredentials>,
    pub messages: Arc<InMemoryMessages>,
    pub connection: Arc<GatewayConnection>,
    pub session: Arc<SyncSession>,
}

impl TestClient {
    pub fn new() -> Self {
        Self::with_config(&sync_config())
    }

    pub fn with_config(config: &SyncConfig) -> Self {
        let bus = EventBus::new_shared();
        let transport = ScriptedTransport::new();
        let credentials = StaticCredentials::new(Some(TOKEN));
        let messages = InMemoryMessages::new();

        let connection = GatewayConnection::new_shared(
            config.gateway.clone(),
            transport.clone(),
            credentials.clone(),
            bus.clone(),
        );
        let ports = SessionPorts {
            messages: messages.clone(),
            members: InMemoryMembers::new(Vec::new()),
            settings: Arc::new(config.clone()),
        };
        let session = SyncSession::attach(config, bus.clone(), connection.clone(), ports);

        Self {
            bus,
            transport,
            credentials,
            messages,
            connection,
            session,
        }
    }
}

impl Default for TestClient {
    fn default() -> Self {
        Self::new()
    }
}
