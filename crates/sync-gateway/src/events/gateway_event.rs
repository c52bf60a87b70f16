//! Typed gateway events
//!
//! Every inbound frame decodes into exactly one [`GatewayEvent`]. These are
//! what the connection publishes on the event bus.

use serde::de::DeserializeOwned;
use serde_json::Value;
use sync_core::{Conversation, Snowflake};
use thiserror::Error;

use super::payloads::{
    MemberListUpdateEvent, MembersChunkEvent, MessageAckEvent, MessageCreateEvent,
    MessageDeleteEvent, MessageReactionEvent, MessageUpdateEvent, PresenceUpdateEvent,
    ReactionRemoveAllEvent, ReadyEvent, SessionInfo, TypingStartEvent,
};
use super::GatewayEventType;
use crate::protocol::{CloseCode, GatewayFrame, HelloPayload, OpCode};

/// Frame decode failure
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Text was not a gateway frame at all
    #[error("Malformed frame: {0}")]
    Frame(#[from] serde_json::Error),

    /// Dispatch frame without an event name
    #[error("Dispatch frame without event name")]
    MissingEventName,

    /// Op the server never sends
    #[error("Unexpected op code from server: {0}")]
    UnexpectedOp(OpCode),

    /// Known event whose payload did not match its shape
    #[error("Invalid {event} payload: {source}")]
    Payload {
        event: GatewayEventType,
        #[source]
        source: serde_json::Error,
    },
}

/// Why the transport went away
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    /// Raw close code, if the close frame carried one
    pub code: Option<u16>,
    pub reason: String,
    /// The owner asked for the close
    pub initiated_by_client: bool,
}

impl CloseReason {
    pub fn from_server(code: Option<u16>, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
            initiated_by_client: false,
        }
    }

    pub fn client() -> Self {
        Self {
            code: Some(1000),
            reason: "closed by client".to_string(),
            initiated_by_client: true,
        }
    }

    /// Transport failed without a close frame
    pub fn lost(error: impl std::fmt::Display) -> Self {
        Self::from_server(None, error.to_string())
    }

    pub fn close_code(&self) -> Option<CloseCode> {
        self.code.and_then(CloseCode::from_u16)
    }

    /// Advice for the owner; the connection itself never reconnects
    pub fn should_reconnect(&self) -> bool {
        if self.initiated_by_client {
            return false;
        }
        self.close_code().map_or(true, CloseCode::should_reconnect)
    }
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.close_code() {
            Some(code) => write!(f, "{code}: {}", self.reason),
            None => match self.code {
                Some(raw) => write!(f, "{raw}: {}", self.reason),
                None => f.write_str(&self.reason),
            },
        }
    }
}

/// Typed inbound event
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    // Control
    Hello(HelloPayload),
    HeartbeatAck,
    /// Server asked for an immediate heartbeat
    HeartbeatRequested,
    /// Server asked the client to reconnect (op 7)
    ReconnectRequested,
    InvalidSession { resumable: bool },
    ConnectionClosed(CloseReason),

    // Session
    Ready(Box<ReadyEvent>),
    Resumed,
    SessionsReplaced(Vec<SessionInfo>),

    // Conversations
    ConversationCreated(Conversation),
    ConversationUpdated(Conversation),
    ConversationDeleted(Conversation),

    // Messages
    MessageCreated(Box<MessageCreateEvent>),
    MessageUpdated(MessageUpdateEvent),
    MessageDeleted(MessageDeleteEvent),
    MessageAcked(MessageAckEvent),
    ReactionAdded(MessageReactionEvent),
    ReactionRemoved(MessageReactionEvent),
    ReactionsCleared(ReactionRemoveAllEvent),

    // Roster and presence
    MemberListUpdate(MemberListUpdateEvent),
    MembersChunk(MembersChunkEvent),
    PresenceUpdated(PresenceUpdateEvent),
    TypingStarted(TypingStartEvent),

    /// Dispatch this client has no typed form for
    Unknown { name: String, data: Value },
}

fn payload<T: DeserializeOwned>(event: GatewayEventType, data: Value) -> Result<T, DecodeError> {
    serde_json::from_value(data).map_err(|source| DecodeError::Payload { event, source })
}

impl GatewayEvent {
    /// Decode one frame
    pub fn decode(frame: &GatewayFrame) -> Result<Self, DecodeError> {
        match frame.op {
            OpCode::Dispatch => Self::decode_dispatch(frame),
            OpCode::Hello => Ok(Self::Hello(frame.as_hello().unwrap_or_default())),
            OpCode::HeartbeatAck => Ok(Self::HeartbeatAck),
            OpCode::Heartbeat => Ok(Self::HeartbeatRequested),
            OpCode::Reconnect => Ok(Self::ReconnectRequested),
            OpCode::InvalidSession => Ok(Self::InvalidSession {
                resumable: frame.as_invalid_session().unwrap_or(false),
            }),
            op => Err(DecodeError::UnexpectedOp(op)),
        }
    }

    /// Parse and decode one text message
    pub fn decode_text(text: &str) -> Result<Self, DecodeError> {
        Self::decode(&GatewayFrame::from_json(text)?)
    }

    fn decode_dispatch(frame: &GatewayFrame) -> Result<Self, DecodeError> {
        let name = frame.t.as_deref().ok_or(DecodeError::MissingEventName)?;
        let data = frame.d.clone().unwrap_or(Value::Null);

        let Some(kind) = GatewayEventType::from_str(name) else {
            return Ok(Self::Unknown {
                name: name.to_string(),
                data,
            });
        };

        let event = match kind {
            GatewayEventType::Ready => Self::Ready(Box::new(payload(kind, data)?)),
            GatewayEventType::Resumed => Self::Resumed,
            GatewayEventType::SessionsReplace => Self::SessionsReplaced(payload(kind, data)?),
            GatewayEventType::ChannelCreate => Self::ConversationCreated(payload(kind, data)?),
            GatewayEventType::ChannelUpdate => Self::ConversationUpdated(payload(kind, data)?),
            GatewayEventType::ChannelDelete => Self::ConversationDeleted(payload(kind, data)?),
            GatewayEventType::MessageCreate => Self::MessageCreated(Box::new(payload(kind, data)?)),
            GatewayEventType::MessageUpdate => Self::MessageUpdated(payload(kind, data)?),
            GatewayEventType::MessageDelete => Self::MessageDeleted(payload(kind, data)?),
            GatewayEventType::MessageAck => Self::MessageAcked(payload(kind, data)?),
            GatewayEventType::MessageReactionAdd => Self::ReactionAdded(payload(kind, data)?),
            GatewayEventType::MessageReactionRemove => Self::ReactionRemoved(payload(kind, data)?),
            GatewayEventType::MessageReactionRemoveAll => {
                Self::ReactionsCleared(payload(kind, data)?)
            }
            GatewayEventType::GuildMemberListUpdate => Self::MemberListUpdate(payload(kind, data)?),
            GatewayEventType::GuildMembersChunk => Self::MembersChunk(payload(kind, data)?),
            GatewayEventType::PresenceUpdate => Self::PresenceUpdated(payload(kind, data)?),
            GatewayEventType::TypingStart => Self::TypingStarted(payload(kind, data)?),
        };
        Ok(event)
    }

    /// Short name for logs
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Hello(_) => "HELLO",
            Self::HeartbeatAck => "HEARTBEAT_ACK",
            Self::HeartbeatRequested => "HEARTBEAT",
            Self::ReconnectRequested => "RECONNECT",
            Self::InvalidSession { .. } => "INVALID_SESSION",
            Self::ConnectionClosed(_) => "CONNECTION_CLOSED",
            Self::Ready(_) => GatewayEventType::Ready.as_str(),
            Self::Resumed => GatewayEventType::Resumed.as_str(),
            Self::SessionsReplaced(_) => GatewayEventType::SessionsReplace.as_str(),
            Self::ConversationCreated(_) => GatewayEventType::ChannelCreate.as_str(),
            Self::ConversationUpdated(_) => GatewayEventType::ChannelUpdate.as_str(),
            Self::ConversationDeleted(_) => GatewayEventType::ChannelDelete.as_str(),
            Self::MessageCreated(_) => GatewayEventType::MessageCreate.as_str(),
            Self::MessageUpdated(_) => GatewayEventType::MessageUpdate.as_str(),
            Self::MessageDeleted(_) => GatewayEventType::MessageDelete.as_str(),
            Self::MessageAcked(_) => GatewayEventType::MessageAck.as_str(),
            Self::ReactionAdded(_) => GatewayEventType::MessageReactionAdd.as_str(),
            Self::ReactionRemoved(_) => GatewayEventType::MessageReactionRemove.as_str(),
            Self::ReactionsCleared(_) => GatewayEventType::MessageReactionRemoveAll.as_str(),
            Self::MemberListUpdate(_) => GatewayEventType::GuildMemberListUpdate.as_str(),
            Self::MembersChunk(_) => GatewayEventType::GuildMembersChunk.as_str(),
            Self::PresenceUpdated(_) => GatewayEventType::PresenceUpdate.as_str(),
            Self::TypingStarted(_) => GatewayEventType::TypingStart.as_str(),
            Self::Unknown { name, .. } => name,
        }
    }

    /// Conversation a timeline-relevant event targets
    pub fn conversation_id(&self) -> Option<Snowflake> {
        match self {
            Self::MessageCreated(e) => Some(e.message.channel_id),
            Self::MessageUpdated(e) => Some(e.channel_id),
            Self::MessageDeleted(e) => Some(e.channel_id),
            Self::MessageAcked(e) => Some(e.channel_id),
            Self::ReactionAdded(e) | Self::ReactionRemoved(e) => Some(e.channel_id),
            Self::ReactionsCleared(e) => Some(e.channel_id),
            Self::TypingStarted(e) => Some(e.channel_id),
            Self::ConversationCreated(c)
            | Self::ConversationUpdated(c)
            | Self::ConversationDeleted(c) => Some(c.id),
            _ => None,
        }
    }
}
