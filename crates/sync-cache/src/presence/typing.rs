//! Typing indicators.
//!
//! Each (conversation, user) pair gets a timer. A new typing signal restarts
//! it; when it fires the user is dropped from the conversation's typers.

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use sync_core::Snowflake;
use tokio::sync::broadcast;
use tokio::task::AbortHandle;

/// Default time a typing signal stays valid
pub const TYPING_TIMEOUT: Duration = Duration::from_secs(8);

/// Change in the set of typers of one conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingChange {
    Started {
        conversation_id: Snowflake,
        user_id: Snowflake,
    },
    Stopped {
        conversation_id: Snowflake,
        user_id: Snowflake,
    },
}

#[derive(Debug)]
struct TypingTimer {
    generation: u64,
    task: AbortHandle,
}

type TypingTable = DashMap<Snowflake, HashMap<Snowflake, TypingTimer>>;

/// Tracks who is typing where
#[derive(Debug)]
pub struct TypingTracker {
    timeout: Duration,
    typers: Arc<TypingTable>,
    generation: AtomicU64,
    changes: broadcast::Sender<TypingChange>,
}

impl TypingTracker {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            timeout,
            typers: Arc::new(DashMap::new()),
            generation: AtomicU64::new(0),
            changes,
        }
    }

    /// Start or refresh a user's typing timer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_typing(&self, conversation_id: Snowflake, user_id: Snowflake) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let task = tokio::spawn(expire(
            Arc::clone(&self.typers),
            self.changes.clone(),
            self.timeout,
            conversation_id,
            user_id,
            generation,
        ))
        .abort_handle();

        let previous = self
            .typers
            .entry(conversation_id)
            .or_default()
            .insert(user_id, TypingTimer { generation, task });

        match previous {
            Some(old) => old.task.abort(),
            None => {
                tracing::trace!(conversation_id = %conversation_id, user_id = %user_id, "User started typing");
                let _ = self.changes.send(TypingChange::Started {
                    conversation_id,
                    user_id,
                });
            }
        }
    }

    /// Remove a user immediately, e.g. once their message arrives
    pub fn stop_typing(&self, conversation_id: Snowflake, user_id: Snowflake) -> bool {
        let removed = self
            .typers
            .get_mut(&conversation_id)
            .and_then(|mut users| users.remove(&user_id));
        self.typers
            .remove_if(&conversation_id, |_, users| users.is_empty());

        match removed {
            Some(timer) => {
                timer.task.abort();
                let _ = self.changes.send(TypingChange::Stopped {
                    conversation_id,
                    user_id,
                });
                true
            }
            None => false,
        }
    }

    /// Users currently typing in a conversation, ordered by id
    pub fn typers(&self, conversation_id: Snowflake) -> Vec<Snowflake> {
        let mut users: Vec<Snowflake> = self
            .typers
            .get(&conversation_id)
            .map(|users| users.keys().copied().collect())
            .unwrap_or_default();
        users.sort_unstable();
        users
    }

    pub fn is_typing(&self, conversation_id: Snowflake, user_id: Snowflake) -> bool {
        self.typers
            .get(&conversation_id)
            .is_some_and(|users| users.contains_key(&user_id))
    }

    /// Forget every timer for a conversation without emitting changes
    pub fn clear_conversation(&self, conversation_id: Snowflake) {
        if let Some((_, users)) = self.typers.remove(&conversation_id) {
            for timer in users.into_values() {
                timer.task.abort();
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TypingChange> {
        self.changes.subscribe()
    }
}

impl Default for TypingTracker {
    fn default() -> Self {
        Self::new(TYPING_TIMEOUT)
    }
}

impl Drop for TypingTracker {
    fn drop(&mut self) {
        for users in self.typers.iter() {
            for timer in users.values() {
                timer.task.abort();
            }
        }
    }
}

async fn expire(
    typers: Arc<TypingTable>,
    changes: broadcast::Sender<TypingChange>,
    timeout: Duration,
    conversation_id: Snowflake,
    user_id: Snowflake,
    generation: u64,
) {
    tokio::time::sleep(timeout).await;

    // A refresh that raced the timer owns the slot now
    let expired = typers
        .get_mut(&conversation_id)
        .is_some_and(|mut users| {
            if users.get(&user_id).is_some_and(|t| t.generation == generation) {
                users.remove(&user_id);
                true
            } else {
                false
            }
        });
    typers.remove_if(&conversation_id, |_, users| users.is_empty());

    if expired {
        tracing::trace!(conversation_id = %conversation_id, user_id = %user_id, "Typing expired");
        let _ = changes.send(TypingChange::Stopped {
            conversation_id,
            user_id,
        });
    }
}
