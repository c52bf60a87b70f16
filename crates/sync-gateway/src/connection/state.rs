//! Connection lifecycle state

use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No transport session
    #[default]
    Disconnected,
    /// First handshake attempt in progress
    Connecting,
    /// Handshake completed, events flowing
    Connected,
    /// Server rejected the session; a fresh credential is needed
    Invalidated,
    /// A later handshake attempt in progress
    Reconnecting,
    /// Closed by the owner
    Closed,
}

impl ConnectionState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Invalidated => "invalidated",
            Self::Reconnecting => "reconnecting",
            Self::Closed => "closed",
        }
    }

    /// A handshake is running or the session is up
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected | Self::Reconnecting)
    }

    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
