//! Fetch errors - failures of the bulk-fetch boundary

use thiserror::Error;

use crate::value_objects::Snowflake;

/// Failure of a page or member fetch
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    // =========================================================================
    // Not Found Errors
    // =========================================================================
    #[error("Conversation not found: {0}")]
    ConversationNotFound(Snowflake),

    #[error("Room not found: {0}")]
    RoomNotFound(Snowflake),

    // =========================================================================
    // Authorization Errors
    // =========================================================================
    #[error("Credential rejected")]
    Unauthorized,

    #[error("Missing access to {0}")]
    Forbidden(Snowflake),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Malformed response: {0}")]
    Decode(String),
}

impl FetchError {
    /// Stable code for logs and surfaced errors
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConversationNotFound(_) => "CONVERSATION_NOT_FOUND",
            Self::RoomNotFound(_) => "ROOM_NOT_FOUND",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::Transport(_) => "TRANSPORT",
            Self::Decode(_) => "DECODE",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ConversationNotFound(_) | Self::RoomNotFound(_))
    }

    /// Whether repeating the same request later may succeed.
    /// The core itself never retries fetches.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Transport(_))
    }
}
