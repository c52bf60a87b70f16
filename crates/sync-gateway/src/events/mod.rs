//! Gateway events
//!
//! Dispatch payload shapes and the typed event every inbound frame becomes.

mod event_types;
mod gateway_event;
mod payloads;

pub use event_types::GatewayEventType;
pub use gateway_event::{CloseReason, DecodeError, GatewayEvent};
pub use payloads::{
    ListItem, MemberListOp, MemberListUpdateEvent, MembersChunkEvent, MessageAckEvent,
    MessageCreateEvent, MessageDeleteEvent, MessageReactionEvent, MessageUpdateEvent,
    PresenceUpdateEvent, ReactionRemoveAllEvent, ReadStateEntry, ReadyEvent, SessionInfo,
    TypingStartEvent, UserIdPayload,
};
