//! Conversation registry
//!
//! Seeded from READY, then kept current by conversation and message events.
//! Read-markers from READY that name a conversation not yet known are held
//! until the conversation shows up.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use sync_core::{Conversation, ConversationKind, Room, Snowflake};
use sync_gateway::events::{MessageCreateEvent, ReadStateEntry, ReadyEvent};

#[derive(Debug, Default)]
pub struct ConversationRegistry {
    self_id: RwLock<Option<Snowflake>>,
    rooms: DashMap<Snowflake, Room>,
    conversations: DashMap<Snowflake, Conversation>,
    pending_read_state: DashMap<Snowflake, ReadStateEntry>,
}

impl ConversationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn self_id(&self) -> Option<Snowflake> {
        *self.self_id.read()
    }

    /// Replace everything with the READY snapshot
    pub fn load_ready(&self, ready: &ReadyEvent) {
        *self.self_id.write() = Some(ready.user.id);
        self.rooms.clear();
        self.conversations.clear();
        self.pending_read_state.clear();

        for room in &ready.rooms {
            self.rooms.insert(room.id, room.clone());
        }
        for entry in &ready.read_state {
            self.pending_read_state.insert(entry.id, entry.clone());
        }
        for conversation in &ready.private_channels {
            self.upsert(conversation.clone());
        }

        tracing::debug!(
            user_id = %ready.user.id,
            rooms = self.rooms.len(),
            conversations = self.conversations.len(),
            "Registry loaded from ready"
        );
    }

    // ========================================================================
    // Rooms
    // ========================================================================

    pub fn room(&self, room_id: Snowflake) -> Option<Room> {
        self.rooms.get(&room_id).map(|r| r.clone())
    }

    /// Rooms ordered by id
    pub fn rooms(&self) -> Vec<Room> {
        let mut rooms: Vec<Room> = self.rooms.iter().map(|r| r.clone()).collect();
        rooms.sort_by_key(|r| r.id);
        rooms
    }

    pub fn upsert_room(&self, room: Room) {
        self.rooms.insert(room.id, room);
    }

    // ========================================================================
    // Conversations
    // ========================================================================

    pub fn get(&self, conversation_id: Snowflake) -> Option<Conversation> {
        self.conversations.get(&conversation_id).map(|c| c.clone())
    }

    /// Insert or replace a conversation, keeping local read state
    pub fn upsert(&self, mut conversation: Conversation) {
        if let Some((_, entry)) = self.pending_read_state.remove(&conversation.id) {
            conversation.last_read_id = entry.last_message_id;
            conversation.mention_count = entry.mention_count;
        } else if let Some(existing) = self.conversations.get(&conversation.id) {
            conversation.last_read_id = existing.last_read_id;
            conversation.mention_count = existing.mention_count;
            if let Some(last) = existing.last_message_id {
                conversation.observe_message(last);
            }
        }
        self.conversations.insert(conversation.id, conversation);
    }

    pub fn remove(&self, conversation_id: Snowflake) -> Option<Conversation> {
        self.conversations.remove(&conversation_id).map(|(_, c)| c)
    }

    /// Conversations of a room, ordered by id
    pub fn in_room(&self, room_id: Snowflake) -> Vec<Conversation> {
        self.collect(|c| c.room_id == Some(room_id))
    }

    /// Direct and group conversations, ordered by id
    pub fn private(&self) -> Vec<Conversation> {
        self.collect(|c| c.room_id.is_none())
    }

    fn collect<F>(&self, filter: F) -> Vec<Conversation>
    where
        F: Fn(&Conversation) -> bool,
    {
        let mut found: Vec<Conversation> = self
            .conversations
            .iter()
            .filter(|c| filter(c))
            .map(|c| c.clone())
            .collect();
        found.sort_by_key(|c| c.id);
        found
    }

    // ========================================================================
    // Unread tracking
    // ========================================================================

    /// Account for a new message. Returns the updated conversation.
    ///
    /// Private conversations count every message from someone else as a
    /// mention; room conversations only count explicit mentions of self.
    pub fn observe_message(&self, event: &MessageCreateEvent) -> Option<Conversation> {
        let self_id = self.self_id();
        let message = &event.message;
        let mut conversation = self.conversations.get_mut(&message.channel_id)?;

        conversation.observe_message(message.id);
        if Some(message.author_id()) == self_id {
            conversation.mark_read(message.id);
        } else {
            let counts = matches!(conversation.kind, ConversationKind::Direct | ConversationKind::Group)
                || self_id.is_some_and(|id| event.mentions_user(id));
            if counts {
                conversation.mention_count += 1;
            }
        }
        Some(conversation.clone())
    }

    pub fn mark_read(&self, conversation_id: Snowflake, message_id: Snowflake) -> bool {
        match self.conversations.get_mut(&conversation_id) {
            Some(mut conversation) => {
                conversation.mark_read(message_id);
                true
            }
            None => false,
        }
    }

    /// Sum of mention counts over every conversation
    pub fn total_mentions(&self) -> u32 {
        self.conversations.iter().map(|c| c.mention_count).sum()
    }
}
