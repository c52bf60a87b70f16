//! Sync session
//!
//! Wires gateway events into the state engines and exposes the navigation
//! operations a presentation layer drives: switching rooms and
//! conversations, reporting the visible roster range, and paging the
//! timeline.

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use sync_cache::{EventBus, PresenceStore, SubscriptionId, TypingTracker};
use sync_common::{SyncConfig, SyncError};
use sync_core::{Conversation, MemberSource, MessageSource, SettingsProvider, Snowflake};
use sync_gateway::{
    GatewayCommands, GatewayError, GatewayEvent, RequestMembersPayload, RoomSubscription,
    SubscriptionPlanner,
};

use crate::conversations::ConversationRegistry;
use crate::members::MemberDirectory;
use crate::roster::{ApplyOutcome, RosterSyncEngine};
use crate::timeline::{PageOutcome, TimelineCache};

/// Room and conversation currently on screen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActiveView {
    pub room_id: Option<Snowflake>,
    pub conversation_id: Option<Snowflake>,
}

/// Fetch ports and settings the session needs from its owner
pub struct SessionPorts {
    pub messages: Arc<dyn MessageSource>,
    pub members: Arc<dyn MemberSource>,
    pub settings: Arc<dyn SettingsProvider>,
}

pub struct SyncSession {
    bus: Arc<EventBus<GatewayEvent>>,
    commands: Arc<dyn GatewayCommands>,
    presence: Arc<PresenceStore>,
    typing: Arc<TypingTracker>,
    registry: Arc<ConversationRegistry>,
    directory: Arc<MemberDirectory>,
    timeline: Arc<TimelineCache>,
    roster: Mutex<Option<RosterSyncEngine>>,
    planner: Mutex<SubscriptionPlanner>,
    active: RwLock<ActiveView>,
    subscription: Mutex<Option<SubscriptionId>>,
}

impl SyncSession {
    /// Build a session and subscribe it to `bus`
    pub fn attach(
        config: &SyncConfig,
        bus: Arc<EventBus<GatewayEvent>>,
        commands: Arc<dyn GatewayCommands>,
        ports: SessionPorts,
    ) -> Arc<Self> {
        let presence = PresenceStore::new_shared();
        let session = Arc::new(Self {
            bus: bus.clone(),
            commands,
            typing: Arc::new(TypingTracker::new(config.typing.timeout())),
            registry: ConversationRegistry::new_shared(),
            directory: MemberDirectory::new_shared(
                ports.members,
                presence.clone(),
                config.roster.member_page_size,
            ),
            timeline: TimelineCache::new_shared(ports.messages, ports.settings, &config.timeline),
            presence,
            roster: Mutex::new(None),
            planner: Mutex::new(SubscriptionPlanner::new(config.roster.page_width)),
            active: RwLock::new(ActiveView::default()),
            subscription: Mutex::new(None),
        });

        let weak: Weak<Self> = Arc::downgrade(&session);
        let id = bus.subscribe(move |event| {
            if let Some(session) = weak.upgrade() {
                session.handle_event(event);
            }
        });
        *session.subscription.lock() = Some(id);
        session
    }

    /// Stop receiving gateway events
    pub fn detach(&self) {
        if let Some(id) = self.subscription.lock().take() {
            self.bus.unsubscribe(id);
        }
    }

    // ========================================================================
    // Views
    // ========================================================================

    pub fn active(&self) -> ActiveView {
        *self.active.read()
    }

    pub fn timeline(&self) -> &Arc<TimelineCache> {
        &self.timeline
    }

    pub fn registry(&self) -> &Arc<ConversationRegistry> {
        &self.registry
    }

    pub fn directory(&self) -> &Arc<MemberDirectory> {
        &self.directory
    }

    pub fn presence(&self) -> &Arc<PresenceStore> {
        &self.presence
    }

    pub fn typing(&self) -> &Arc<TypingTracker> {
        &self.typing
    }

    /// Read the active room's roster
    pub fn with_roster<R>(&self, f: impl FnOnce(&RosterSyncEngine) -> R) -> Option<R> {
        self.roster.lock().as_ref().map(f)
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// Switch the active room.
    ///
    /// The previous room's roster subscription is dropped with an empty
    /// subscription. Local state switches even if that frame cannot be sent.
    pub fn activate_room(&self, room_id: Option<Snowflake>) -> Result<(), SyncError> {
        let previous = {
            let mut active = self.active.write();
            if active.room_id == room_id {
                return Ok(());
            }
            let previous = active.room_id;
            *active = ActiveView {
                room_id,
                conversation_id: None,
            };
            previous
        };

        let leave = previous.and_then(|prev| {
            self.planner
                .lock()
                .leave(prev)
                .map(|subscription| (prev, subscription))
        });

        *self.roster.lock() = room_id.map(|id| self.fresh_roster(id));
        self.directory.set_active_room(room_id);
        self.timeline.clear();
        tracing::info!(room_id = ?room_id, previous = ?previous, "Active room changed");

        if let Some((prev, subscription)) = leave {
            self.send_subscription(prev, &subscription)?;
        }
        Ok(())
    }

    /// Open a conversation: subscribe its roster head page and load the
    /// newest page of messages.
    pub async fn activate_conversation(
        &self,
        conversation_id: Snowflake,
    ) -> Result<PageOutcome, SyncError> {
        let conversation = self.registry.get(conversation_id).unwrap_or_else(|| {
            Conversation::new(conversation_id, self.active().room_id)
        });

        if conversation.room_id.is_some() && conversation.room_id != self.active().room_id {
            if let Err(e) = self.activate_room(conversation.room_id) {
                tracing::debug!(
                    conversation_id = %conversation_id,
                    error = %e,
                    "Opening conversation without leaving the previous room"
                );
            }
        }

        let previous = {
            let mut active = self.active.write();
            let previous = active.conversation_id;
            active.conversation_id = Some(conversation_id);
            previous
        };
        if let Some(previous) = previous.filter(|p| *p != conversation_id) {
            self.typing.clear_conversation(previous);
        }

        if let Some(room_id) = conversation.room_id {
            let initial = self.planner.lock().subscribe_initial(room_id, conversation_id);
            if let Some(subscription) = initial {
                let _ = self.send_subscription(room_id, &subscription);
            }
        }

        let outcome = self.timeline.activate(conversation).await?;
        self.request_unknown_authors(&outcome);
        Ok(outcome)
    }

    /// Report the visible roster window as fractions of its length.
    ///
    /// Returns whether a new subscription was sent.
    pub fn set_visible_range(&self, top_fraction: f64, bottom_fraction: f64) -> Result<bool, SyncError> {
        let ActiveView {
            room_id: Some(room_id),
            conversation_id: Some(conversation_id),
        } = self.active()
        else {
            return Ok(false);
        };
        let length = self.with_roster(RosterSyncEngine::len).unwrap_or(0);

        let update = self
            .planner
            .lock()
            .update(room_id, conversation_id, length, top_fraction, bottom_fraction);
        match update {
            Some(subscription) => {
                self.send_subscription(room_id, &subscription)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn load_older(&self) -> Result<PageOutcome, SyncError> {
        let outcome = self.timeline.load_older().await?;
        self.request_unknown_authors(&outcome);
        Ok(outcome)
    }

    pub async fn load_newer(&self) -> Result<PageOutcome, SyncError> {
        let outcome = self.timeline.load_newer().await?;
        self.request_unknown_authors(&outcome);
        Ok(outcome)
    }

    fn fresh_roster(&self, room_id: Snowflake) -> RosterSyncEngine {
        let owner = self.registry.room(room_id).map(|room| room.owner_id);
        RosterSyncEngine::new(room_id, owner, self.presence.clone())
    }

    /// Drop roster slots and timeline contents after the connection went
    /// away. The active view is kept; reopening it refetches both.
    fn discard_synced_state(&self) {
        self.planner.lock().reset();
        let room_id = self.active().room_id;
        *self.roster.lock() = room_id.map(|id| self.fresh_roster(id));
        self.timeline.clear();
    }

    fn send_subscription(
        &self,
        room_id: Snowflake,
        subscription: &RoomSubscription,
    ) -> Result<(), GatewayError> {
        self.commands
            .update_subscription(room_id, subscription)
            .inspect_err(|e| {
                tracing::warn!(room_id = %room_id, error = %e, "Roster subscription not sent");
            })
    }

    /// Ask for member records of page authors the directory lacks
    fn request_unknown_authors(&self, outcome: &PageOutcome) {
        let PageOutcome::Loaded { authors, .. } = outcome else {
            return;
        };
        let Some(room_id) = self.active().room_id else {
            return;
        };
        let missing = self.directory.missing(room_id, authors);
        if missing.is_empty() {
            return;
        }
        tracing::debug!(room_id = %room_id, users = missing.len(), "Requesting unknown authors");
        if let Err(e) = self
            .commands
            .request_members(&RequestMembersPayload::users(room_id, missing))
        {
            tracing::warn!(room_id = %room_id, error = %e, "Member request not sent");
        }
    }

    // ========================================================================
    // Event routing
    // ========================================================================

    fn handle_event(&self, event: &GatewayEvent) {
        match event {
            GatewayEvent::Ready(ready) => {
                self.registry.load_ready(ready);
                self.timeline.set_current_user(ready.user.id);
                self.planner.lock().reset();
            }
            GatewayEvent::ConnectionClosed(reason) => {
                self.discard_synced_state();
                tracing::info!(reason = %reason, "Session lost its connection");
            }
            GatewayEvent::InvalidSession { resumable } => {
                self.discard_synced_state();
                tracing::info!(resumable, "Session invalidated");
            }
            GatewayEvent::SessionsReplaced(sessions) => {
                tracing::info!(sessions = sessions.len(), "Sessions replaced");
            }

            GatewayEvent::ConversationCreated(conversation)
            | GatewayEvent::ConversationUpdated(conversation) => {
                self.registry.upsert(conversation.clone());
            }
            GatewayEvent::ConversationDeleted(conversation) => {
                self.registry.remove(conversation.id);
                if self.active().conversation_id == Some(conversation.id) {
                    self.active.write().conversation_id = None;
                    self.timeline.clear();
                }
            }

            GatewayEvent::MessageCreated(created) => {
                let message = &created.message;
                self.registry.observe_message(created);
                self.typing.stop_typing(message.channel_id, message.author_id());
                self.timeline.on_message_created(message);
            }
            GatewayEvent::MessageUpdated(update) => {
                self.timeline.on_message_updated(update);
            }
            GatewayEvent::MessageDeleted(deleted) => {
                self.timeline.on_message_deleted(deleted.channel_id, deleted.id);
            }
            GatewayEvent::MessageAcked(ack) => {
                self.registry.mark_read(ack.channel_id, ack.message_id);
                self.timeline.on_acknowledged(ack.channel_id, ack.message_id);
            }
            GatewayEvent::ReactionAdded(reaction) => {
                self.timeline.on_reaction_added(reaction);
            }
            GatewayEvent::ReactionRemoved(reaction) => {
                self.timeline.on_reaction_removed(reaction);
            }
            GatewayEvent::ReactionsCleared(cleared) => {
                self.timeline
                    .on_reactions_cleared(cleared.channel_id, cleared.message_id);
            }

            GatewayEvent::MemberListUpdate(update) => {
                let mut roster = self.roster.lock();
                let Some(engine) = roster.as_mut() else {
                    return;
                };
                if let ApplyOutcome::Applied { skipped, .. } = engine.apply(update) {
                    if skipped > 0 {
                        tracing::warn!(room_id = %update.room_id, skipped, "Roster batch had out-of-range operations");
                    }
                }
            }
            GatewayEvent::MembersChunk(chunk) => {
                self.directory.apply_chunk(chunk);
            }
            GatewayEvent::PresenceUpdated(update) => {
                self.presence.set_presence(update.to_presence());
            }
            GatewayEvent::TypingStarted(typing) => {
                if self.registry.self_id() != Some(typing.user_id) {
                    self.typing.start_typing(typing.channel_id, typing.user_id);
                }
            }

            _ => {}
        }
    }
}

impl Drop for SyncSession {
    fn drop(&mut self) {
        self.detach();
    }
}

impl std::fmt::Debug for SyncSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSession")
            .field("active", &self.active())
            .field("timeline", &self.timeline)
            .finish()
    }
}
