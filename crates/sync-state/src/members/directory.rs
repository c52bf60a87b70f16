//! Member directory
//!
//! Keeps the members learned from member chunks and explicit lookups, keyed
//! by room and user. Only the active room accepts new entries: a chunk or
//! page that arrives after the room changed is dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use sync_cache::PresenceStore;
use sync_core::{FetchError, Member, MemberQuery, MemberSource, Snowflake};
use sync_gateway::events::MembersChunkEvent;

pub struct MemberDirectory {
    source: Arc<dyn MemberSource>,
    presence: Arc<PresenceStore>,
    page_size: usize,
    active_room: RwLock<Option<Snowflake>>,
    epoch: AtomicU64,
    members: DashMap<(Snowflake, Snowflake), Member>,
}

impl MemberDirectory {
    pub fn new(source: Arc<dyn MemberSource>, presence: Arc<PresenceStore>, page_size: usize) -> Self {
        Self {
            source,
            presence,
            page_size: page_size.max(1),
            active_room: RwLock::new(None),
            epoch: AtomicU64::new(0),
            members: DashMap::new(),
        }
    }

    pub fn new_shared(
        source: Arc<dyn MemberSource>,
        presence: Arc<PresenceStore>,
        page_size: usize,
    ) -> Arc<Self> {
        Arc::new(Self::new(source, presence, page_size))
    }

    pub fn active_room(&self) -> Option<Snowflake> {
        *self.active_room.read()
    }

    /// Switch rooms. The previous room's members are forgotten and its
    /// in-flight lookups dropped.
    pub fn set_active_room(&self, room_id: Option<Snowflake>) {
        let previous = std::mem::replace(&mut *self.active_room.write(), room_id);
        self.epoch.fetch_add(1, Ordering::SeqCst);
        if let Some(previous) = previous.filter(|p| Some(*p) != room_id) {
            self.forget_room(previous);
            tracing::debug!(room_id = %previous, "Forgot members of previous room");
        }
    }

    pub fn get(&self, room_id: Snowflake, user_id: Snowflake) -> Option<Member> {
        self.members.get(&(room_id, user_id)).map(|m| m.clone())
    }

    pub fn contains(&self, room_id: Snowflake, user_id: Snowflake) -> bool {
        self.members.contains_key(&(room_id, user_id))
    }

    /// Members known for a room
    pub fn count(&self, room_id: Snowflake) -> usize {
        self.members.iter().filter(|e| e.key().0 == room_id).count()
    }

    /// The ids in `user_ids` with no member record in `room_id`
    pub fn missing(&self, room_id: Snowflake, user_ids: &[Snowflake]) -> Vec<Snowflake> {
        let mut missing: Vec<Snowflake> = user_ids
            .iter()
            .copied()
            .filter(|id| !self.contains(room_id, *id))
            .collect();
        missing.sort_unstable();
        missing.dedup();
        missing
    }

    /// Record one member, e.g. from a roster item
    pub fn upsert(&self, room_id: Snowflake, member: Member) {
        if let Some(presence) = member.presence_record() {
            self.presence.set_presence(presence);
        }
        self.members.insert((room_id, member.id()), member);
    }

    /// Store a member chunk answering a lookup. Returns the number stored.
    pub fn apply_chunk(&self, chunk: &MembersChunkEvent) -> usize {
        if self.active_room() != Some(chunk.room_id) {
            tracing::debug!(room_id = %chunk.room_id, "Dropping member chunk for inactive room");
            return 0;
        }
        for presence in &chunk.presences {
            self.presence.set_presence(presence.to_presence());
        }
        for member in &chunk.members {
            self.upsert(chunk.room_id, member.clone());
        }
        if !chunk.not_found.is_empty() {
            tracing::debug!(
                room_id = %chunk.room_id,
                not_found = chunk.not_found.len(),
                "Member lookup had unknown users"
            );
        }
        chunk.members.len()
    }

    /// Fetch one page of members after `after`, ordered by user id.
    ///
    /// Returns the number stored; zero if the room changed meanwhile.
    pub async fn fetch_page(
        &self,
        room_id: Snowflake,
        after: Option<Snowflake>,
    ) -> Result<usize, FetchError> {
        let epoch = self.epoch.load(Ordering::SeqCst);
        let query = MemberQuery {
            after,
            limit: self.page_size,
        };
        let page = self.source.fetch_members(room_id, query).await?;

        if self.epoch.load(Ordering::SeqCst) != epoch || self.active_room() != Some(room_id) {
            tracing::debug!(room_id = %room_id, "Dropping member page for inactive room");
            return Ok(0);
        }
        let count = page.len();
        for member in page {
            self.upsert(room_id, member);
        }
        Ok(count)
    }

    /// Forget everything known about a room
    pub fn forget_room(&self, room_id: Snowflake) {
        self.members.retain(|(room, _), _| *room != room_id);
    }
}

impl std::fmt::Debug for MemberDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemberDirectory")
            .field("active_room", &self.active_room())
            .field("members", &self.members.len())
            .finish()
    }
}
