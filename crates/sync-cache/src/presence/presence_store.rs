//! Shared presence table.
//!
//! One record per user, no matter how many rooms or rosters mention them.
//! Roster writes, member chunks and presence events all land here.

use dashmap::DashMap;
use std::sync::Arc;
use sync_core::{Presence, Snowflake, UserStatus};

/// In-memory presence store keyed by user id
#[derive(Debug, Default)]
pub struct PresenceStore {
    entries: DashMap<Snowflake, Presence>,
}

impl PresenceStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Store a presence record. Returns true when it differs from what was held.
    pub fn set_presence(&self, presence: Presence) -> bool {
        if presence.user_id.is_zero() {
            tracing::debug!("Ignoring presence without a user id");
            return false;
        }
        let user_id = presence.user_id;
        let changed = self
            .entries
            .get(&user_id)
            .map_or(true, |current| *current != presence);
        if changed {
            tracing::trace!(user_id = %user_id, status = %presence.status, "Presence updated");
            self.entries.insert(user_id, presence);
        }
        changed
    }

    /// Get a copy of a user's presence record
    pub fn get_presence(&self, user_id: Snowflake) -> Option<Presence> {
        self.entries.get(&user_id).map(|p| p.clone())
    }

    /// Current status, offline when unknown
    pub fn status_of(&self, user_id: Snowflake) -> UserStatus {
        self.entries
            .get(&user_id)
            .map(|p| p.status)
            .unwrap_or_default()
    }

    pub fn remove_presence(&self, user_id: Snowflake) -> Option<Presence> {
        self.entries.remove(&user_id).map(|(_, p)| p)
    }

    /// Number of tracked users that are visibly online
    pub fn online_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.status.is_visible())
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every record, e.g. when the connection closes
    pub fn clear(&self) {
        self.entries.clear();
    }
}
