//! Gateway frame envelope
//!
//! Every websocket text message, in either direction, is one of these.

use super::{HelloPayload, IdentifyPayload, LazySubscribePayload, OpCode, RequestMembersPayload};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Gateway frame format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayFrame {
    /// Operation code
    pub op: OpCode,

    /// Event name (op=0 Dispatch only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,

    /// Sequence number (op=0 Dispatch only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,

    /// Payload
    #[serde(default)]
    pub d: Option<Value>,
}

impl GatewayFrame {
    fn with_payload<T: Serialize>(op: OpCode, payload: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            op,
            t: None,
            s: None,
            d: Some(serde_json::to_value(payload)?),
        })
    }

    // === Client Frames ===

    /// Identify frame (op=2)
    pub fn identify(payload: &IdentifyPayload) -> Result<Self, serde_json::Error> {
        Self::with_payload(OpCode::Identify, payload)
    }

    /// Heartbeat frame (op=1) carrying the last dispatch sequence seen
    #[must_use]
    pub fn heartbeat(last_sequence: Option<u64>) -> Self {
        Self {
            op: OpCode::Heartbeat,
            t: None,
            s: None,
            d: last_sequence.map(|s| Value::Number(s.into())),
        }
    }

    /// Member lookup frame (op=8)
    pub fn request_members(payload: &RequestMembersPayload) -> Result<Self, serde_json::Error> {
        Self::with_payload(OpCode::RequestGuildMembers, payload)
    }

    /// Roster range subscription frame (op=14)
    pub fn lazy_subscribe(payload: &LazySubscribePayload) -> Result<Self, serde_json::Error> {
        Self::with_payload(OpCode::LazyGuildSubscribe, payload)
    }

    // === Server Frames ===

    /// Dispatch frame (op=0)
    #[must_use]
    pub fn dispatch(event_name: impl Into<String>, sequence: u64, data: Value) -> Self {
        Self {
            op: OpCode::Dispatch,
            t: Some(event_name.into()),
            s: Some(sequence),
            d: Some(data),
        }
    }

    /// Hello frame (op=10)
    #[must_use]
    pub fn hello(heartbeat_interval: u64) -> Self {
        Self {
            op: OpCode::Hello,
            t: None,
            s: None,
            d: Some(serde_json::json!({ "heartbeat_interval": heartbeat_interval })),
        }
    }

    /// Bare frame with no payload (Heartbeat ACK, Reconnect)
    #[must_use]
    pub fn bare(op: OpCode) -> Self {
        Self {
            op,
            t: None,
            s: None,
            d: None,
        }
    }

    /// Invalid Session frame (op=9)
    #[must_use]
    pub fn invalid_session(resumable: bool) -> Self {
        Self {
            op: OpCode::InvalidSession,
            t: None,
            s: None,
            d: Some(Value::Bool(resumable)),
        }
    }

    // === Parsing ===

    /// Parse the Hello payload (op=10); a missing payload yields the default interval
    pub fn as_hello(&self) -> Option<HelloPayload> {
        if self.op != OpCode::Hello {
            return None;
        }
        Some(
            self.d
                .as_ref()
                .and_then(|d| serde_json::from_value(d.clone()).ok())
                .unwrap_or_default(),
        )
    }

    /// Parse the resumable flag of an Invalid Session frame (op=9)
    pub fn as_invalid_session(&self) -> Option<bool> {
        if self.op != OpCode::InvalidSession {
            return None;
        }
        Some(self.d.as_ref().and_then(Value::as_bool).unwrap_or(false))
    }

    /// Name of a dispatch event, if this is one
    pub fn event_name(&self) -> Option<&str> {
        if self.op == OpCode::Dispatch {
            self.t.as_deref()
        } else {
            None
        }
    }

    // === Utilities ===

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl std::fmt::Display for GatewayFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(t) = &self.t {
            write!(f, "GatewayFrame(op={}, t={}", self.op, t)?;
            if let Some(s) = self.s {
                write!(f, ", s={s}")?;
            }
            write!(f, ")")
        } else {
            write!(f, "GatewayFrame(op={})", self.op)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heartbeat_frame() {
        assert_eq!(
            GatewayFrame::heartbeat(Some(41)).to_json().unwrap(),
            r#"{"op":1,"d":41}"#
        );
        assert_eq!(
            GatewayFrame::heartbeat(None).to_json().unwrap(),
            r#"{"op":1,"d":null}"#
        );
    }

    #[test]
    fn test_parse_hello() {
        let frame = GatewayFrame::from_json(r#"{"op":10,"d":{"heartbeat_interval":45000}}"#).unwrap();
        assert_eq!(frame.as_hello().unwrap().heartbeat_interval, 45_000);
        assert!(frame.as_invalid_session().is_none());

        let bare = GatewayFrame::bare(OpCode::Hello);
        assert_eq!(
            bare.as_hello().unwrap().heartbeat_interval,
            HelloPayload::DEFAULT_HEARTBEAT_INTERVAL
        );
    }

    #[test]
    fn test_parse_invalid_session() {
        let frame = GatewayFrame::from_json(r#"{"op":9,"d":false}"#).unwrap();
        assert_eq!(frame.as_invalid_session(), Some(false));
        assert_eq!(GatewayFrame::invalid_session(true).as_invalid_session(), Some(true));
    }

    #[test]
    fn test_dispatch_frame() {
        let frame = GatewayFrame::from_json(
            r#"{"op":0,"t":"MESSAGE_DELETE","s":7,"d":{"id":"1","channel_id":"2"}}"#,
        )
        .unwrap();
        assert_eq!(frame.event_name(), Some("MESSAGE_DELETE"));
        assert_eq!(frame.s, Some(7));
        assert_eq!(frame.to_string(), "GatewayFrame(op=Dispatch (0), t=MESSAGE_DELETE, s=7)");
        assert_eq!(GatewayFrame::bare(OpCode::HeartbeatAck).event_name(), None);
    }

    #[test]
    fn test_identify_frame() {
        let frame = GatewayFrame::identify(&IdentifyPayload::new("tok")).unwrap();
        assert_eq!(frame.op, OpCode::Identify);
        assert_eq!(frame.d.unwrap()["token"], "tok");
    }

    #[test]
    fn test_unknown_op_rejected() {
        assert!(GatewayFrame::from_json(r#"{"op":42}"#).is_err());
    }
}
