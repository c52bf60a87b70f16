//! Client configuration
//!
//! Loads settings from the process environment (and a `.env` file when
//! present). Every knob except the gateway URL has a default.

use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use sync_core::SettingsProvider;

/// Main client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    pub app: AppSettings,
    pub gateway: GatewayConfig,
    pub timeline: TimelineConfig,
    pub roster: RosterConfig,
    pub typing: TypingConfig,
    /// Cached bearer token, normally supplied by the host application
    #[serde(default)]
    pub token: Option<String>,
    /// Suppress filler entries in timelines
    #[serde(default)]
    pub reduced_content_mode: bool,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default)]
    pub env: Environment,
    /// Force JSON log output regardless of environment
    #[serde(default)]
    pub log_json: bool,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "staging" => Ok(Self::Staging),
            "development" | "dev" => Ok(Self::Development),
            other => Err(format!("unknown environment {other:?}")),
        }
    }
}

/// Gateway connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Websocket endpoint, e.g. `wss://gateway.example.com/?v=9&encoding=json`
    pub url: String,
    /// Handshake attempts per `connect` call
    #[serde(default = "default_connect_retries")]
    pub connect_retries: u32,
    /// Capacity of the outbound frame queue
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
    /// Overrides the server-declared heartbeat interval
    #[serde(default)]
    pub heartbeat_interval_ms: Option<u64>,
}

impl GatewayConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_retries: default_connect_retries(),
            outbound_buffer: default_outbound_buffer(),
            heartbeat_interval_ms: None,
        }
    }
}

/// Timeline pagination settings
#[derive(Debug, Clone, Deserialize)]
pub struct TimelineConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Filler entry after every this many loaded messages
    #[serde(default = "default_filler_stride")]
    pub filler_stride: usize,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            filler_stride: default_filler_stride(),
        }
    }
}

/// Roster windowing settings
#[derive(Debug, Clone, Deserialize)]
pub struct RosterConfig {
    /// Width of one subscribed roster page
    #[serde(default = "default_page_width")]
    pub page_width: u32,
    /// Size of a member lookup page
    #[serde(default = "default_member_page_size")]
    pub member_page_size: usize,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            page_width: default_page_width(),
            member_page_size: default_member_page_size(),
        }
    }
}

/// Typing indicator settings
#[derive(Debug, Clone, Deserialize)]
pub struct TypingConfig {
    #[serde(default = "default_typing_timeout_secs")]
    pub timeout_secs: u64,
}

impl TypingConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_typing_timeout_secs(),
        }
    }
}

// Default value functions
fn default_app_name() -> String {
    "sync-client".to_string()
}

fn default_connect_retries() -> u32 {
    3
}

fn default_outbound_buffer() -> usize {
    128
}

fn default_page_size() -> usize {
    50
}

fn default_filler_stride() -> usize {
    10
}

fn default_page_width() -> u32 {
    100
}

fn default_member_page_size() -> usize {
    100
}

fn default_typing_timeout_secs() -> u64 {
    8
}

impl SyncConfig {
    /// Configuration pointing at `url` with every default applied
    pub fn with_gateway_url(url: impl Into<String>) -> Self {
        Self {
            app: AppSettings {
                name: default_app_name(),
                env: Environment::default(),
                log_json: false,
            },
            gateway: GatewayConfig::new(url),
            timeline: TimelineConfig::default(),
            roster: RosterConfig::default(),
            typing: TypingConfig::default(),
            token: None,
            reduced_content_mode: false,
        }
    }

    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if `GATEWAY_URL` is missing or a variable does not parse
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup("GATEWAY_URL")
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::MissingVar("GATEWAY_URL"))?;

        let mut config = Self::with_gateway_url(url);

        if let Some(name) = lookup("APP_NAME") {
            config.app.name = name;
        }
        config.app.env = parse_var(&lookup, "APP_ENV")?.unwrap_or_default();
        config.app.log_json = parse_var(&lookup, "LOG_JSON")?.unwrap_or(false);

        if let Some(retries) = parse_var::<u32, _>(&lookup, "GATEWAY_CONNECT_RETRIES")? {
            if retries == 0 {
                return Err(ConfigError::InvalidValue(
                    "GATEWAY_CONNECT_RETRIES",
                    "must be at least 1".to_string(),
                ));
            }
            config.gateway.connect_retries = retries;
        }
        if let Some(buffer) = parse_var(&lookup, "GATEWAY_OUTBOUND_BUFFER")? {
            config.gateway.outbound_buffer = buffer;
        }
        config.gateway.heartbeat_interval_ms = parse_var(&lookup, "GATEWAY_HEARTBEAT_INTERVAL_MS")?;

        if let Some(size) = parse_var(&lookup, "TIMELINE_PAGE_SIZE")? {
            config.timeline.page_size = size;
        }
        if let Some(stride) = parse_var(&lookup, "TIMELINE_FILLER_STRIDE")? {
            config.timeline.filler_stride = stride;
        }
        if let Some(width) = parse_var(&lookup, "ROSTER_PAGE_WIDTH")? {
            config.roster.page_width = width;
        }
        if let Some(size) = parse_var(&lookup, "ROSTER_MEMBER_PAGE_SIZE")? {
            config.roster.member_page_size = size;
        }
        if let Some(secs) = parse_var(&lookup, "TYPING_TIMEOUT_SECS")? {
            config.typing.timeout_secs = secs;
        }

        config.token = lookup("SYNC_TOKEN").filter(|t| !t.is_empty());
        config.reduced_content_mode = parse_var(&lookup, "REDUCED_CONTENT_MODE")?.unwrap_or(false);

        Ok(config)
    }
}

impl SettingsProvider for SyncConfig {
    fn reduced_content_mode(&self) -> bool {
        self.reduced_content_mode
    }
}

fn parse_var<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue(key, e.to_string())),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
