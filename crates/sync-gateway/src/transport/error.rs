//! Transport error types

use thiserror::Error;

/// Failure at the framed-connection layer
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Could not open the connection
    #[error("Connect failed: {0}")]
    Connect(String),

    /// Writing a frame failed
    #[error("Send failed: {0}")]
    Send(String),

    /// Reading the stream failed
    #[error("Receive failed: {0}")]
    Receive(String),

    /// The peer is gone
    #[error("Connection closed")]
    Closed,
}

impl TransportError {
    /// Error code for logs
    pub fn code(&self) -> &'static str {
        match self {
            Self::Connect(_) => "TRANSPORT_CONNECT",
            Self::Send(_) => "TRANSPORT_SEND",
            Self::Receive(_) => "TRANSPORT_RECEIVE",
            Self::Closed => "TRANSPORT_CLOSED",
        }
    }
}
