//! Collaborator ports for credentials and client settings

use async_trait::async_trait;

/// Supplies the bearer credential used to identify on the gateway
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Current token, if one is cached
    async fn token(&self) -> Option<String>;

    /// Forget the cached token after the server rejected the session
    async fn discard(&self);
}

/// Read-only view of user settings the core consults
pub trait SettingsProvider: Send + Sync {
    /// When set, no filler entries are interleaved into timelines
    fn reduced_content_mode(&self) -> bool;
}
