//! Timeline cache
//!
//! Holds the ordered message list of the one active conversation and pages
//! history in both directions through a [`MessageSource`].
//!
//! Every activation starts a new *context*: the epoch is bumped and a fresh
//! pagination guard is installed. Page loads hold their context's guard for
//! the whole fetch, so loads of one context never overlap, and any page that
//! completes after its context was replaced is dropped without touching state.
//! Live events mutate under the same state lock as page application.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use sync_common::TimelineConfig;
use sync_core::{
    Conversation, FetchError, Message, MessageQuery, MessageSource, SettingsProvider, Snowflake,
};
use sync_gateway::events::{MessageReactionEvent, MessageUpdateEvent};
use tokio::sync::broadcast;

use super::{TimelineEntry, TimelineMessage};

/// Capacity of the change broadcast
const CHANGE_BUFFER: usize = 256;

/// Result of a page operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// Messages were added; `authors` lists their distinct senders
    Loaded { count: usize, authors: Vec<Snowflake> },
    /// The source returned nothing new
    Empty,
    /// Already caught up; the read-marker was moved to this message
    Acknowledged(Snowflake),
    /// Not attempted; another load is in flight or there is nothing to load
    Skipped,
    /// The conversation was replaced while the page was in flight
    Superseded,
}

impl PageOutcome {
    pub fn loaded_count(&self) -> usize {
        match self {
            Self::Loaded { count, .. } => *count,
            _ => 0,
        }
    }
}

/// Change notification for timeline observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimelineChange {
    Reset(Option<Snowflake>),
    Prepended(usize),
    Appended(usize),
    Inserted(Snowflake),
    Removed(Snowflake),
    Updated(Snowflake),
    ReadMarker(Snowflake),
}

#[derive(Clone, Copy)]
enum Direction {
    Older,
    Newer,
}

struct TimelineState {
    conversation: Option<Conversation>,
    epoch: u64,
    entries: Vec<TimelineEntry>,
    loading_older: bool,
    loading_newer: bool,
    reached_oldest: bool,
    scroll_target: Option<Snowflake>,
    guard: Arc<tokio::sync::Mutex<()>>,
}

impl TimelineState {
    fn new() -> Self {
        Self {
            conversation: None,
            epoch: 0,
            entries: Vec::new(),
            loading_older: false,
            loading_newer: false,
            reached_oldest: false,
            scroll_target: None,
            guard: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    fn reset(&mut self, conversation: Option<Conversation>) {
        self.epoch += 1;
        self.conversation = conversation;
        self.entries.clear();
        self.loading_older = false;
        self.loading_newer = false;
        self.reached_oldest = false;
        self.scroll_target = None;
        self.guard = Arc::new(tokio::sync::Mutex::new(()));
    }

    fn conversation_id(&self) -> Option<Snowflake> {
        self.conversation.as_ref().map(|c| c.id)
    }

    fn is_active(&self, conversation_id: Snowflake) -> bool {
        self.conversation_id() == Some(conversation_id)
    }

    fn last_read_id(&self) -> Option<Snowflake> {
        self.conversation.as_ref().and_then(|c| c.last_read_id)
    }

    fn messages(&self) -> impl Iterator<Item = &TimelineMessage> {
        self.entries.iter().filter_map(TimelineEntry::as_message)
    }

    fn oldest_id(&self) -> Option<Snowflake> {
        self.messages().next().map(|m| m.message.id)
    }

    fn newest_id(&self) -> Option<Snowflake> {
        self.entries.iter().rev().find_map(TimelineEntry::id)
    }

    fn contains(&self, id: Snowflake) -> bool {
        self.messages().any(|m| m.message.id == id)
    }

    fn message_mut(&mut self, id: Snowflake) -> Option<&mut Message> {
        self.entries
            .iter_mut()
            .filter_map(TimelineEntry::as_message_mut)
            .find(|m| m.message.id == id)
            .map(|m| &mut m.message)
    }

    /// Index at which a message with `id` keeps the list ascending
    fn insert_position(&self, id: Snowflake) -> usize {
        self.entries
            .iter()
            .position(|e| e.id().is_some_and(|existing| existing > id))
            .unwrap_or(self.entries.len())
    }

    /// Recompute sender continuity and the read-marker flag
    fn relink(&mut self) {
        let last_read = self.last_read_id();
        let mut previous_author = None;
        for entry in &mut self.entries {
            match entry {
                TimelineEntry::Filler => previous_author = None,
                TimelineEntry::Message(m) => {
                    let author = m.message.author_id();
                    m.continues_previous = previous_author == Some(author);
                    m.is_last_read = last_read == Some(m.message.id);
                    previous_author = Some(author);
                }
            }
        }
    }
}

/// Clears a loading flag when a page operation ends, on every path.
/// The flag is left alone if the context was replaced meanwhile.
struct LoadingFlag<'a> {
    state: &'a Mutex<TimelineState>,
    epoch: u64,
    direction: Direction,
}

impl Drop for LoadingFlag<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if state.epoch != self.epoch {
            return;
        }
        match self.direction {
            Direction::Older => state.loading_older = false,
            Direction::Newer => state.loading_newer = false,
        }
    }
}

/// Claimed page operation: epoch, guard and conversation of its context
struct Claim {
    epoch: u64,
    guard: Arc<tokio::sync::Mutex<()>>,
    conversation_id: Snowflake,
}

// ============================================================================
// Timeline Cache
// ============================================================================

pub struct TimelineCache {
    source: Arc<dyn MessageSource>,
    settings: Arc<dyn SettingsProvider>,
    page_size: usize,
    filler_stride: usize,
    self_id: RwLock<Option<Snowflake>>,
    state: Mutex<TimelineState>,
    changes: broadcast::Sender<TimelineChange>,
}

impl TimelineCache {
    pub fn new(
        source: Arc<dyn MessageSource>,
        settings: Arc<dyn SettingsProvider>,
        config: &TimelineConfig,
    ) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            source,
            settings,
            page_size: config.page_size.max(1),
            filler_stride: config.filler_stride,
            self_id: RwLock::new(None),
            state: Mutex::new(TimelineState::new()),
            changes,
        }
    }

    pub fn new_shared(
        source: Arc<dyn MessageSource>,
        settings: Arc<dyn SettingsProvider>,
        config: &TimelineConfig,
    ) -> Arc<Self> {
        Arc::new(Self::new(source, settings, config))
    }

    /// Identity used to mark own reactions
    pub fn set_current_user(&self, user_id: Snowflake) {
        *self.self_id.write() = Some(user_id);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TimelineChange> {
        self.changes.subscribe()
    }

    // ========================================================================
    // Views
    // ========================================================================

    pub fn conversation(&self) -> Option<Conversation> {
        self.state.lock().conversation.clone()
    }

    pub fn conversation_id(&self) -> Option<Snowflake> {
        self.state.lock().conversation_id()
    }

    /// Snapshot of the timeline, fillers included
    pub fn entries(&self) -> Vec<TimelineEntry> {
        self.state.lock().entries.clone()
    }

    /// Ids of the held messages, ascending
    pub fn message_ids(&self) -> Vec<Snowflake> {
        self.state.lock().messages().map(|m| m.message.id).collect()
    }

    pub fn message(&self, id: Snowflake) -> Option<Message> {
        self.state
            .lock()
            .messages()
            .find(|m| m.message.id == id)
            .map(|m| m.message.clone())
    }

    pub fn message_count(&self) -> usize {
        self.state.lock().messages().count()
    }

    /// Message the view should land on after activation
    pub fn scroll_target(&self) -> Option<Snowflake> {
        self.state.lock().scroll_target
    }

    pub fn is_loading_older(&self) -> bool {
        self.state.lock().loading_older
    }

    pub fn is_loading_newer(&self) -> bool {
        self.state.lock().loading_newer
    }

    /// The start of history has been reached
    pub fn reached_oldest(&self) -> bool {
        self.state.lock().reached_oldest
    }

    // ========================================================================
    // Pagination
    // ========================================================================

    /// Switch to `conversation` and load its newest page.
    ///
    /// On failure the timeline stays empty for the new conversation.
    pub async fn activate(&self, conversation: Conversation) -> Result<PageOutcome, FetchError> {
        let conversation_id = conversation.id;
        let (epoch, guard) = {
            let mut state = self.state.lock();
            state.reset(Some(conversation));
            state.loading_newer = true;
            (state.epoch, state.guard.clone())
        };
        let _ = self.changes.send(TimelineChange::Reset(Some(conversation_id)));
        tracing::debug!(conversation_id = %conversation_id, epoch, "Activating timeline");

        let _flag = LoadingFlag {
            state: &self.state,
            epoch,
            direction: Direction::Newer,
        };
        let _permit = guard.lock().await;

        let page = self
            .source
            .fetch_messages(conversation_id, MessageQuery::latest(self.page_size))
            .await
            .inspect_err(|e| {
                tracing::warn!(
                    conversation_id = %conversation_id,
                    error = %e,
                    code = e.code(),
                    "Initial page fetch failed"
                );
            })?;
        let page = sort_page(page);

        let mut state = self.state.lock();
        if state.epoch != epoch {
            return Ok(PageOutcome::Superseded);
        }
        if page.len() < self.page_size {
            state.reached_oldest = true;
        }
        if page.is_empty() {
            return Ok(PageOutcome::Empty);
        }

        if let (Some(conversation), Some(newest)) = (state.conversation.as_mut(), page.last()) {
            conversation.observe_message(newest.id);
        }

        // live messages may have landed while the page was in flight
        let page: Vec<Message> = page.into_iter().filter(|m| !state.contains(m.id)).collect();
        let authors = distinct_authors(&page);
        let count = page.len();
        let live = std::mem::replace(&mut state.entries, self.build_entries(page));
        for entry in live {
            if let Some(id) = entry.id() {
                let position = state.insert_position(id);
                state.entries.insert(position, entry);
            }
        }
        state.relink();

        let last_read = state.last_read_id();
        let scroll_target = state
            .messages()
            .find(|m| Some(m.message.id) == last_read)
            .map(|m| m.message.id)
            .or_else(|| state.newest_id());
        state.scroll_target = scroll_target;
        drop(state);

        let _ = self.changes.send(TimelineChange::Appended(count));
        tracing::debug!(conversation_id = %conversation_id, count, "Timeline activated");
        Ok(PageOutcome::Loaded { count, authors })
    }

    /// Prepend the page before the oldest held message
    pub async fn load_older(&self) -> Result<PageOutcome, FetchError> {
        let Some(claim) = self.claim(Direction::Older) else {
            return Ok(PageOutcome::Skipped);
        };
        let _flag = LoadingFlag {
            state: &self.state,
            epoch: claim.epoch,
            direction: Direction::Older,
        };
        let _permit = claim.guard.lock().await;

        let before = {
            let state = self.state.lock();
            if state.epoch != claim.epoch {
                return Ok(PageOutcome::Superseded);
            }
            state.oldest_id()
        };
        let Some(before) = before else {
            return Ok(PageOutcome::Skipped);
        };

        let page = self
            .source
            .fetch_messages(claim.conversation_id, MessageQuery::before(before, self.page_size))
            .await
            .inspect_err(|e| {
                tracing::warn!(
                    conversation_id = %claim.conversation_id,
                    error = %e,
                    "Older page fetch failed"
                );
            })?;
        let page = sort_page(page);

        let mut state = self.state.lock();
        if state.epoch != claim.epoch {
            tracing::debug!(
                conversation_id = %claim.conversation_id,
                "Dropping older page for replaced conversation"
            );
            return Ok(PageOutcome::Superseded);
        }
        if page.len() < self.page_size {
            state.reached_oldest = true;
        }
        let page: Vec<Message> = page.into_iter().filter(|m| !state.contains(m.id)).collect();
        if page.is_empty() {
            return Ok(PageOutcome::Empty);
        }

        let authors = distinct_authors(&page);
        let count = page.len();
        let entries = self.build_entries(page);
        let held = std::mem::replace(&mut state.entries, entries);
        state.entries.extend(held);
        state.relink();
        drop(state);

        let _ = self.changes.send(TimelineChange::Prepended(count));
        Ok(PageOutcome::Loaded { count, authors })
    }

    /// Append the page after the newest held message, or, when already
    /// caught up, move the read-marker to the newest message.
    pub async fn load_newer(&self) -> Result<PageOutcome, FetchError> {
        let Some(claim) = self.claim(Direction::Newer) else {
            return Ok(PageOutcome::Skipped);
        };
        let _flag = LoadingFlag {
            state: &self.state,
            epoch: claim.epoch,
            direction: Direction::Newer,
        };
        let _permit = claim.guard.lock().await;

        let (newest, last_message, last_read) = {
            let state = self.state.lock();
            if state.epoch != claim.epoch {
                return Ok(PageOutcome::Superseded);
            }
            let conversation = state.conversation.as_ref();
            (
                state.newest_id(),
                conversation.and_then(|c| c.last_message_id),
                conversation.and_then(|c| c.last_read_id),
            )
        };
        let Some(newest) = newest else {
            return Ok(PageOutcome::Skipped);
        };

        if last_message.is_some_and(|last| last > newest) {
            let page = self
                .source
                .fetch_messages(claim.conversation_id, MessageQuery::after(newest, self.page_size))
                .await
                .inspect_err(|e| {
                    tracing::warn!(
                        conversation_id = %claim.conversation_id,
                        error = %e,
                        "Newer page fetch failed"
                    );
                })?;
            let page = sort_page(page);

            let mut state = self.state.lock();
            if state.epoch != claim.epoch {
                return Ok(PageOutcome::Superseded);
            }
            let page: Vec<Message> = page.into_iter().filter(|m| !state.contains(m.id)).collect();
            if page.is_empty() {
                return Ok(PageOutcome::Empty);
            }

            let authors = distinct_authors(&page);
            let count = page.len();
            let entries = self.build_entries(page);
            state.entries.extend(entries);
            state.relink();
            drop(state);

            let _ = self.changes.send(TimelineChange::Appended(count));
            return Ok(PageOutcome::Loaded { count, authors });
        }

        if last_read.is_some_and(|read| read >= newest) {
            return Ok(PageOutcome::Skipped);
        }

        self.source
            .acknowledge(claim.conversation_id, newest)
            .await
            .inspect_err(|e| {
                tracing::warn!(
                    conversation_id = %claim.conversation_id,
                    message_id = %newest,
                    error = %e,
                    "Acknowledge failed"
                );
            })?;

        let mut state = self.state.lock();
        if state.epoch != claim.epoch {
            return Ok(PageOutcome::Superseded);
        }
        if let Some(conversation) = state.conversation.as_mut() {
            conversation.mark_read(newest);
        }
        state.relink();
        drop(state);

        let _ = self.changes.send(TimelineChange::ReadMarker(newest));
        Ok(PageOutcome::Acknowledged(newest))
    }

    /// Drop the active conversation
    pub fn clear(&self) {
        self.state.lock().reset(None);
        let _ = self.changes.send(TimelineChange::Reset(None));
    }

    fn claim(&self, direction: Direction) -> Option<Claim> {
        let mut state = self.state.lock();
        let conversation_id = state.conversation_id()?;
        match direction {
            Direction::Older => {
                if state.loading_older || state.reached_oldest {
                    return None;
                }
                state.loading_older = true;
            }
            Direction::Newer => {
                if state.loading_older || state.loading_newer || state.entries.is_empty() {
                    return None;
                }
                state.loading_newer = true;
            }
        }
        Some(Claim {
            epoch: state.epoch,
            guard: state.guard.clone(),
            conversation_id,
        })
    }

    fn build_entries(&self, page: Vec<Message>) -> Vec<TimelineEntry> {
        let stride = if self.settings.reduced_content_mode() {
            0
        } else {
            self.filler_stride
        };
        let fillers = if stride > 0 { page.len() / stride } else { 0 };
        let mut entries = Vec::with_capacity(page.len() + fillers);
        for (i, message) in page.into_iter().enumerate() {
            entries.push(TimelineEntry::message(message));
            if stride > 0 && (i + 1) % stride == 0 {
                entries.push(TimelineEntry::Filler);
            }
        }
        entries
    }

    // ========================================================================
    // Live events
    // ========================================================================

    /// Insert a live message. Returns whether the timeline changed.
    pub fn on_message_created(&self, message: &Message) -> bool {
        let mut state = self.state.lock();
        if !state.is_active(message.channel_id) {
            return false;
        }
        if let Some(conversation) = state.conversation.as_mut() {
            conversation.observe_message(message.id);
        }
        if state.contains(message.id) {
            return false;
        }
        let position = state.insert_position(message.id);
        state
            .entries
            .insert(position, TimelineEntry::message(message.clone()));
        state.relink();
        drop(state);

        let _ = self.changes.send(TimelineChange::Inserted(message.id));
        true
    }

    pub fn on_message_deleted(&self, conversation_id: Snowflake, message_id: Snowflake) -> bool {
        let mut state = self.state.lock();
        if !state.is_active(conversation_id) {
            return false;
        }
        let Some(index) = state.entries.iter().position(|e| e.id() == Some(message_id)) else {
            return false;
        };
        state.entries.remove(index);
        state.relink();
        drop(state);

        let _ = self.changes.send(TimelineChange::Removed(message_id));
        true
    }

    pub fn on_message_updated(&self, event: &MessageUpdateEvent) -> bool {
        let Some(content) = event.content.clone() else {
            return false;
        };
        self.mutate(event.channel_id, event.id, |message| {
            message.edit(content, event.edited_timestamp);
        })
    }

    pub fn on_reaction_added(&self, event: &MessageReactionEvent) -> bool {
        let by_self = self.is_self(event.user_id);
        self.mutate(event.channel_id, event.message_id, |message| {
            message.add_reaction(event.emoji.clone(), by_self);
        })
    }

    pub fn on_reaction_removed(&self, event: &MessageReactionEvent) -> bool {
        let by_self = self.is_self(event.user_id);
        self.mutate(event.channel_id, event.message_id, |message| {
            message.remove_reaction(&event.emoji, by_self);
        })
    }

    pub fn on_reactions_cleared(&self, conversation_id: Snowflake, message_id: Snowflake) -> bool {
        self.mutate(conversation_id, message_id, Message::clear_reactions)
    }

    /// Read-marker moved, possibly from another session of the same user
    pub fn on_acknowledged(&self, conversation_id: Snowflake, message_id: Snowflake) -> bool {
        let mut state = self.state.lock();
        if !state.is_active(conversation_id) {
            return false;
        }
        if let Some(conversation) = state.conversation.as_mut() {
            conversation.mark_read(message_id);
        }
        state.relink();
        drop(state);

        let _ = self.changes.send(TimelineChange::ReadMarker(message_id));
        true
    }

    fn mutate<F>(&self, conversation_id: Snowflake, message_id: Snowflake, f: F) -> bool
    where
        F: FnOnce(&mut Message),
    {
        let mut state = self.state.lock();
        if !state.is_active(conversation_id) {
            return false;
        }
        let Some(message) = state.message_mut(message_id) else {
            return false;
        };
        f(message);
        drop(state);

        let _ = self.changes.send(TimelineChange::Updated(message_id));
        true
    }

    fn is_self(&self, user_id: Snowflake) -> bool {
        *self.self_id.read() == Some(user_id)
    }
}

impl std::fmt::Debug for TimelineCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("TimelineCache")
            .field("conversation_id", &state.conversation_id())
            .field("entries", &state.entries.len())
            .field("reached_oldest", &state.reached_oldest)
            .finish()
    }
}

/// Ascending by id, duplicates dropped
fn sort_page(mut page: Vec<Message>) -> Vec<Message> {
    page.sort_by_key(|m| m.id);
    page.dedup_by_key(|m| m.id);
    page
}

fn distinct_authors(page: &[Message]) -> Vec<Snowflake> {
    let mut seen = HashSet::new();
    page.iter()
        .map(Message::author_id)
        .filter(|id| seen.insert(*id))
        .collect()
}
