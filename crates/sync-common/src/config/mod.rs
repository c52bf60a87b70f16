//! Configuration structs

mod sync_config;

pub use sync_config::{
    AppSettings, ConfigError, Environment, GatewayConfig, RosterConfig, SyncConfig,
    TimelineConfig, TypingConfig,
};
