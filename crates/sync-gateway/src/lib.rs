//! # sync-gateway
//!
//! Client side of the real-time gateway.
//!
//! ## Features
//!
//! - **Protocol**: op codes, frame envelope, control payloads, close codes
//! - **Events**: every inbound frame decoded into one typed [`GatewayEvent`]
//! - **Transport**: framed-connection port plus a websocket implementation
//! - **Connection**: connect-with-retry, heartbeat, event publication
//! - **Subscriptions**: roster ranges and the planner that picks them

pub mod connection;
pub mod events;
pub mod protocol;
pub mod subscription;
pub mod transport;

pub use connection::{
    ConnectError, ConnectionState, GatewayCommands, GatewayConnection, GatewayError,
    HandshakeError,
};
pub use events::{CloseReason, DecodeError, GatewayEvent, GatewayEventType};
pub use protocol::{CloseCode, GatewayFrame, OpCode, RequestMembersPayload};
pub use subscription::{MemberRange, RoomSubscription, SubscriptionPlanner};
pub use transport::{FrameSink, FrameStream, InboundFrame, Transport, TransportError, WsTransport};
