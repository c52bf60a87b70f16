//! Framed transport
//!
//! [`Transport`] opens a bidirectional text-frame connection; [`WsTransport`]
//! is the websocket implementation.

mod error;
mod port;
mod websocket;

pub use error::TransportError;
pub use port::{BoxedSink, BoxedStream, FrameSink, FrameStream, InboundFrame, Transport};
pub use websocket::WsTransport;
