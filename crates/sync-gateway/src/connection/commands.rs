//! Outbound command port
//!
//! Engines send through this trait rather than holding the connection, so
//! they can be driven without a network in tests.

use sync_core::Snowflake;

use super::GatewayError;
use crate::protocol::RequestMembersPayload;
use crate::subscription::RoomSubscription;

/// Fire-and-forget outbound requests. Both calls only queue a frame.
pub trait GatewayCommands: Send + Sync {
    /// Replace the roster ranges the server pushes for `room_id`
    fn update_subscription(
        &self,
        room_id: Snowflake,
        subscription: &RoomSubscription,
    ) -> Result<(), GatewayError>;

    /// Out-of-band member lookup; answered by a members chunk event
    fn request_members(&self, request: &RequestMembersPayload) -> Result<(), GatewayError>;
}
