//! Roster sync engine
//!
//! Applies member-list patch batches to a sparse, index-addressed roster.
//! Operations inside a batch are applied strictly in order. Indices that do
//! not fit the current roster are skipped with a warning; a bad batch never
//! panics and never leaves the roster half-resized.

use std::sync::Arc;

use sync_cache::PresenceStore;
use sync_core::{MemberGroup, Snowflake};
use sync_gateway::events::{ListItem, MemberListOp, MemberListUpdateEvent};
use tokio::sync::broadcast;

use super::{RosterMember, RosterSlot};

/// Capacity of the change broadcast
const CHANGE_BUFFER: usize = 64;

/// Result of applying one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Batch was for another room
    Ignored,
    /// Stale partition token and no SYNC; nothing applied
    Discarded,
    /// Batch applied; `skipped` counts out-of-bounds operations
    Applied { ops: usize, skipped: usize },
}

/// Snapshot broadcast after every applied batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterChange {
    pub room_id: Snowflake,
    pub len: usize,
    pub occupied: usize,
}

/// Roster of one room
#[derive(Debug)]
pub struct RosterSyncEngine {
    room_id: Snowflake,
    owner_id: Option<Snowflake>,
    list_id: Option<String>,
    groups: Vec<MemberGroup>,
    slots: Vec<RosterSlot>,
    member_count: u32,
    online_count: u32,
    presence: Arc<PresenceStore>,
    changes: broadcast::Sender<RosterChange>,
}

impl RosterSyncEngine {
    pub fn new(room_id: Snowflake, owner_id: Option<Snowflake>, presence: Arc<PresenceStore>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            room_id,
            owner_id,
            list_id: None,
            groups: Vec::new(),
            slots: Vec::new(),
            member_count: 0,
            online_count: 0,
            presence,
            changes,
        }
    }

    pub fn room_id(&self) -> Snowflake {
        self.room_id
    }

    /// Partition token of the last SYNC
    pub fn list_id(&self) -> Option<&str> {
        self.list_id.as_deref()
    }

    pub fn groups(&self) -> &[MemberGroup] {
        &self.groups
    }

    pub fn slots(&self) -> &[RosterSlot] {
        &self.slots
    }

    pub fn slot(&self, index: usize) -> Option<&RosterSlot> {
        self.slots.get(index)
    }

    pub fn member_at(&self, index: usize) -> Option<&RosterMember> {
        self.slots.get(index).and_then(RosterSlot::as_member)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slots holding a member or a group heading
    pub fn occupied_count(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_empty()).count()
    }

    /// Server-declared member and online totals
    pub fn counts(&self) -> (u32, u32) {
        (self.member_count, self.online_count)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RosterChange> {
        self.changes.subscribe()
    }

    /// Apply one batch in order
    pub fn apply(&mut self, event: &MemberListUpdateEvent) -> ApplyOutcome {
        if event.room_id != self.room_id {
            return ApplyOutcome::Ignored;
        }
        if self.list_id.as_deref() != Some(event.list_id.as_str()) && !event.has_sync() {
            tracing::debug!(
                room_id = %self.room_id,
                list_id = %event.list_id,
                tracked = ?self.list_id,
                "Discarding batch for stale partition"
            );
            return ApplyOutcome::Discarded;
        }

        self.member_count = event.member_count;
        self.online_count = event.online_count;
        if let Some(groups) = &event.groups {
            self.replace_groups(groups);
        }

        let mut skipped = 0;
        for op in &event.ops {
            skipped += self.apply_op(op, &event.list_id);
        }

        tracing::debug!(
            room_id = %self.room_id,
            ops = event.ops.len(),
            skipped,
            len = self.slots.len(),
            "Roster batch applied"
        );
        let _ = self.changes.send(RosterChange {
            room_id: self.room_id,
            len: self.slots.len(),
            occupied: self.occupied_count(),
        });

        ApplyOutcome::Applied {
            ops: event.ops.len(),
            skipped,
        }
    }

    /// Replace the group list and resize to the sum of group spans.
    /// Growing appends empty slots; shrinking truncates from the tail.
    fn replace_groups(&mut self, groups: &[MemberGroup]) {
        let total: usize = groups.iter().map(MemberGroup::slot_span).sum();
        self.groups = groups.to_vec();
        self.slots.resize_with(total, RosterSlot::default);
    }

    /// Returns how many writes were skipped
    fn apply_op(&mut self, op: &MemberListOp, list_id: &str) -> usize {
        let len = self.slots.len();
        match op {
            MemberListOp::Sync { range, items } => {
                self.list_id = Some(list_id.to_string());
                let mut skipped = 0;
                for (offset, item) in items.iter().enumerate() {
                    let index = range.lo as usize + offset;
                    if index >= self.slots.len() {
                        skipped += 1;
                        continue;
                    }
                    self.slots[index] = self.slot_for(item);
                }
                if skipped > 0 {
                    tracing::warn!(
                        room_id = %self.room_id,
                        range = %range,
                        skipped,
                        len,
                        "SYNC items past the end of the roster"
                    );
                }
                skipped
            }
            MemberListOp::Invalidate { range } => {
                let hi = (range.hi as usize).min(len.saturating_sub(1));
                for slot in self.slots.iter_mut().take(hi + 1).skip(range.lo as usize) {
                    *slot = RosterSlot::Empty;
                }
                0
            }
            MemberListOp::Insert { index, item } => {
                if *index > len {
                    self.skip(op, *index);
                    return 1;
                }
                let slot = self.slot_for(item);
                self.slots.insert(*index, slot);
                0
            }
            MemberListOp::Update { index, item } => {
                if *index >= len {
                    self.skip(op, *index);
                    return 1;
                }
                self.slots[*index] = self.slot_for(item);
                0
            }
            MemberListOp::Delete { index } => {
                if *index >= len {
                    self.skip(op, *index);
                    return 1;
                }
                self.slots.remove(*index);
                0
            }
        }
    }

    fn skip(&self, op: &MemberListOp, index: usize) {
        tracing::warn!(
            room_id = %self.room_id,
            op = op.name(),
            index,
            len = self.slots.len(),
            "Skipping out-of-bounds roster operation"
        );
    }

    /// Build a slot, pushing any embedded presence into the shared table
    fn slot_for(&self, item: &ListItem) -> RosterSlot {
        match item {
            ListItem::Group(group) => RosterSlot::Group(group.clone()),
            ListItem::Member(member) => {
                if let Some(presence) = member.presence_record() {
                    self.presence.set_presence(presence);
                }
                RosterSlot::Member(RosterMember {
                    is_owner: self.owner_id == Some(member.id()),
                    member: member.clone(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync_core::{Member, Presence, User, UserStatus};
    use sync_gateway::MemberRange;

    const ROOM: Snowflake = Snowflake::new(1);
    const OWNER: Snowflake = Snowflake::new(100);

    fn engine() -> RosterSyncEngine {
        RosterSyncEngine::new(ROOM, Some(OWNER), PresenceStore::new_shared())
    }

    fn member(id: i64) -> ListItem {
        ListItem::Member(Member::new(User::new(Snowflake::new(id), format!("u{id}"))))
    }

    fn group(id: &str, count: u32) -> ListItem {
        ListItem::Group(MemberGroup::new(id, count))
    }

    fn batch(list_id: &str, groups: Option<Vec<MemberGroup>>, ops: Vec<MemberListOp>) -> MemberListUpdateEvent {
        MemberListUpdateEvent {
            list_id: list_id.to_string(),
            room_id: ROOM,
            member_count: 0,
            online_count: 0,
            groups,
            ops,
        }
    }

    /// Roster of `n` slots fully synced: one group heading then members
    fn synced(n: u32) -> RosterSyncEngine {
        let mut engine = engine();
        let mut items = vec![group("online", n - 1)];
        items.extend((1..n).map(|i| member(i64::from(i) + 1000)));
        engine.apply(&batch(
            "everyone",
            Some(vec![MemberGroup::new("online", n - 1)]),
            vec![MemberListOp::Sync {
                range: MemberRange::new(0, n - 1),
                items,
            }],
        ));
        engine
    }

    #[test]
    fn test_sync_writes_items_at_indices() {
        let mut engine = engine();
        let outcome = engine.apply(&batch(
            "everyone",
            Some(vec![MemberGroup::new("online", 9)]),
            vec![MemberListOp::Sync {
                range: MemberRange::new(2, 4),
                items: vec![member(5), member(6), member(7)],
            }],
        ));

        assert_eq!(outcome, ApplyOutcome::Applied { ops: 1, skipped: 0 });
        assert_eq!(engine.len(), 10);
        assert_eq!(engine.occupied_count(), 3);
        assert_eq!(engine.list_id(), Some("everyone"));
        for (index, slot) in engine.slots().iter().enumerate() {
            match index {
                2 => assert_eq!(slot.member_id(), Some(Snowflake::new(5))),
                3 => assert_eq!(slot.member_id(), Some(Snowflake::new(6))),
                4 => assert_eq!(slot.member_id(), Some(Snowflake::new(7))),
                _ => assert!(slot.is_empty()),
            }
        }
    }

    #[test]
    fn test_groups_resize() {
        let mut engine = synced(10);
        engine.apply(&batch(
            "everyone",
            Some(vec![MemberGroup::new("online", 3), MemberGroup::new("offline", 1)]),
            vec![],
        ));
        // Shrink truncates the tail
        assert_eq!(engine.len(), 6);
        assert!(engine.slot(0).unwrap().as_group().is_some());
        assert_eq!(engine.occupied_count(), 6);

        engine.apply(&batch("everyone", Some(vec![MemberGroup::new("online", 11)]), vec![]));
        // Grow appends empties
        assert_eq!(engine.len(), 12);
        assert_eq!(engine.occupied_count(), 6);
        assert_eq!(engine.groups().len(), 1);
    }

    #[test]
    fn test_invalidate_within_bounds() {
        let mut engine = synced(10);
        engine.apply(&batch(
            "everyone",
            None,
            vec![MemberListOp::Invalidate {
                range: MemberRange::new(5, 99),
            }],
        ));
        assert_eq!(engine.len(), 10);
        assert_eq!(engine.occupied_count(), 5);
        assert!(engine.slot(9).unwrap().is_empty());
    }

    #[test]
    fn test_insert_update_delete() {
        let mut engine = synced(4);
        engine.apply(&batch(
            "everyone",
            None,
            vec![
                MemberListOp::Insert { index: 1, item: member(50) },
                MemberListOp::Update { index: 0, item: group("online", 4) },
                MemberListOp::Delete { index: 4 },
            ],
        ));
        assert_eq!(engine.len(), 4);
        assert_eq!(engine.member_at(1).unwrap().member.id(), Snowflake::new(50));
        assert_eq!(engine.slot(0).unwrap().as_group().unwrap().count, 4);
    }

    #[test]
    fn test_out_of_bounds_skipped() {
        let mut engine = synced(3);
        let outcome = engine.apply(&batch(
            "everyone",
            None,
            vec![
                MemberListOp::Insert { index: 9, item: member(9) },
                MemberListOp::Update { index: 3, item: member(9) },
                MemberListOp::Delete { index: 3 },
                MemberListOp::Sync {
                    range: MemberRange::new(2, 3),
                    items: vec![member(20), member(21)],
                },
            ],
        ));
        assert_eq!(outcome, ApplyOutcome::Applied { ops: 4, skipped: 4 });
        assert_eq!(engine.len(), 3);
        assert_eq!(engine.member_at(2).unwrap().member.id(), Snowflake::new(20));
    }

    #[test]
    fn test_stale_partition_discarded() {
        let mut engine = synced(3);
        let outcome = engine.apply(&batch(
            "other",
            None,
            vec![MemberListOp::Delete { index: 0 }],
        ));
        assert_eq!(outcome, ApplyOutcome::Discarded);
        assert_eq!(engine.len(), 3);

        // A SYNC switches the partition
        engine.apply(&batch(
            "other",
            None,
            vec![MemberListOp::Sync {
                range: MemberRange::new(0, 0),
                items: vec![member(7)],
            }],
        ));
        assert_eq!(engine.list_id(), Some("other"));
    }

    #[test]
    fn test_other_room_ignored() {
        let mut engine = engine();
        let mut event = batch("everyone", Some(vec![MemberGroup::new("online", 1)]), vec![]);
        event.room_id = Snowflake::new(2);
        assert_eq!(engine.apply(&event), ApplyOutcome::Ignored);
        assert!(engine.is_empty());
    }

    #[test]
    fn test_member_presence_and_owner() {
        let presence = PresenceStore::new_shared();
        let mut engine = RosterSyncEngine::new(ROOM, Some(OWNER), presence.clone());

        let mut owner = Member::new(User::new(OWNER, "owner"));
        owner.presence = Some(Presence::new(Snowflake::default(), UserStatus::Dnd));

        engine.apply(&batch(
            "everyone",
            Some(vec![MemberGroup::new("online", 1)]),
            vec![MemberListOp::Sync {
                range: MemberRange::new(0, 1),
                items: vec![group("online", 1), ListItem::Member(owner)],
            }],
        ));

        assert!(engine.member_at(1).unwrap().is_owner);
        assert_eq!(presence.status_of(OWNER), UserStatus::Dnd);
    }

    #[tokio::test]
    async fn test_change_broadcast() {
        let mut engine = engine();
        let mut changes = engine.subscribe();
        engine.apply(&batch(
            "everyone",
            Some(vec![MemberGroup::new("online", 2)]),
            vec![MemberListOp::Sync {
                range: MemberRange::new(0, 99),
                items: vec![],
            }],
        ));

        let change = changes.recv().await.unwrap();
        assert_eq!(change.len, 3);
        assert_eq!(change.occupied, 0);
    }
}
