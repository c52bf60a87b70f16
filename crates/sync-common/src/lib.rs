//! # sync-common
//!
//! Shared plumbing for the sync client: configuration, the top-level error
//! taxonomy, and tracing setup.

pub mod config;
pub mod error;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use config::{
    AppSettings, ConfigError, Environment, GatewayConfig, RosterConfig, SyncConfig,
    TimelineConfig, TypingConfig,
};
pub use error::{SyncError, SyncResult};
pub use telemetry::{
    init_tracing, init_tracing_with_config, try_init_tracing, try_init_tracing_with_config,
    TracingConfig, TracingError,
};
