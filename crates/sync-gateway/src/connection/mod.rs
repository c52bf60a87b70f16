//! Gateway connection
//!
//! Connect-with-retry, heartbeating, and publication of decoded events.

mod commands;
mod error;
mod gateway;
mod state;

pub use commands::GatewayCommands;
pub use error::{ConnectError, GatewayError, HandshakeError};
pub use gateway::GatewayConnection;
pub use state::ConnectionState;
