//! Connection error types

use sync_common::SyncError;
use thiserror::Error;

use crate::events::CloseReason;
use crate::transport::TransportError;

/// Why a single handshake attempt failed
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),

    /// Server closed before READY
    #[error("Closed during handshake ({0})")]
    Closed(CloseReason),

    #[error("Handshake timed out")]
    Timeout,

    #[error("Session invalidated")]
    InvalidSession { resumable: bool },
}

/// `connect` failure
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The credential provider had no token
    #[error("No credential available")]
    MissingCredential,

    #[error("Connection already active")]
    AlreadyConnected,

    /// The server rejected the credential; not retried
    #[error("Session invalidated during handshake")]
    SessionInvalidated,

    /// Every attempt failed
    #[error("Could not connect after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: HandshakeError,
    },
}

impl ConnectError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingCredential => "MISSING_CREDENTIAL",
            Self::AlreadyConnected => "ALREADY_CONNECTED",
            Self::SessionInvalidated => "SESSION_INVALIDATED",
            Self::Exhausted { .. } => "CONNECT_EXHAUSTED",
        }
    }
}

/// Failure to queue an outbound frame
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Not connected")]
    NotConnected,

    /// Outbound queue is at capacity
    #[error("Outbound queue full")]
    OutboundFull,

    #[error("Failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<ConnectError> for SyncError {
    fn from(err: ConnectError) -> Self {
        match err {
            ConnectError::SessionInvalidated => Self::SessionInvalidated,
            other => Self::Connection(other.to_string()),
        }
    }
}

impl From<GatewayError> for SyncError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::NotConnected => Self::NotConnected,
            other => Self::Connection(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_sync_error() {
        let err = ConnectError::Exhausted {
            attempts: 3,
            last: HandshakeError::Timeout,
        };
        assert_eq!(err.to_string(), "Could not connect after 3 attempts: Handshake timed out");
        assert!(matches!(SyncError::from(err), SyncError::Connection(_)));
        assert!(matches!(
            SyncError::from(ConnectError::SessionInvalidated),
            SyncError::SessionInvalidated
        ));
        assert!(matches!(
            SyncError::from(GatewayError::NotConnected),
            SyncError::NotConnected
        ));
    }
}
