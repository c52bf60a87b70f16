//! Framed connection port
//!
//! The connection only ever talks to these traits; tests script them.

use async_trait::async_trait;

use super::TransportError;

/// Frame received from the peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Text(String),
    Close { code: Option<u16>, reason: String },
}

/// Writing half of a connection
#[async_trait]
pub trait FrameSink: Send {
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Send a close frame and shut the write side
    async fn close(&mut self, code: Option<u16>) -> Result<(), TransportError>;
}

/// Reading half of a connection. `None` means the stream ended.
#[async_trait]
pub trait FrameStream: Send {
    async fn next_frame(&mut self) -> Option<Result<InboundFrame, TransportError>>;
}

pub type BoxedSink = Box<dyn FrameSink>;
pub type BoxedStream = Box<dyn FrameStream>;

/// Opens framed connections
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self, url: &str) -> Result<(BoxedSink, BoxedStream), TransportError>;
}
