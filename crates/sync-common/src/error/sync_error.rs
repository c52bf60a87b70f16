//! Top-level error taxonomy of the sync client
//!
//! Each layer keeps its own precise error enum; `SyncError` is what the
//! owning application sees once an error leaves the core.

use sync_core::FetchError;

use crate::config::ConfigError;

/// Client-wide error type
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Handshake or transport failure after the bounded retries ran out
    #[error("Unable to connect: {0}")]
    Connection(String),

    /// The server rejected the session; a fresh credential is needed
    #[error("Session invalidated")]
    SessionInvalidated,

    /// A pagination or member lookup failed
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// An incremental operation did not fit local state
    #[error("Protocol inconsistency: {0}")]
    ProtocolInconsistency(String),

    /// The gateway is not connected, so nothing can be sent
    #[error("Not connected")]
    NotConnected,

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl SyncError {
    /// Stable code for logs and UI mapping
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Connection(_) => "CONNECTION_ERROR",
            Self::SessionInvalidated => "SESSION_INVALIDATED",
            Self::Fetch(e) => e.code(),
            Self::ProtocolInconsistency(_) => "PROTOCOL_INCONSISTENCY",
            Self::NotConnected => "NOT_CONNECTED",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Whether the same operation may succeed when repeated later
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::NotConnected => true,
            Self::Fetch(e) => e.is_retryable(),
            Self::SessionInvalidated | Self::ProtocolInconsistency(_) | Self::Config(_) => false,
        }
    }

    /// Whether the user has to authenticate again before reconnecting
    #[must_use]
    pub fn requires_reauth(&self) -> bool {
        matches!(self, Self::SessionInvalidated | Self::Fetch(FetchError::Unauthorized))
    }
}

/// Result type alias using SyncError
pub type SyncResult<T> = Result<T, SyncError>;
