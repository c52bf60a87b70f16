//! Subscription planner
//!
//! Turns the visible slice of a rendered roster into the windowed ranges the
//! server should keep pushing, and swallows updates that would repeat the
//! last request for the room.

use std::collections::HashMap;
use sync_core::Snowflake;

use super::{MemberRange, RoomSubscription};

/// Default roster page width
pub const DEFAULT_PAGE_WIDTH: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
struct SentRanges {
    conversation_id: Snowflake,
    ranges: Vec<MemberRange>,
}

/// Plans roster range subscriptions per room
#[derive(Debug)]
pub struct SubscriptionPlanner {
    page_width: u32,
    last_sent: HashMap<Snowflake, SentRanges>,
}

impl SubscriptionPlanner {
    #[must_use]
    pub fn new(page_width: u32) -> Self {
        Self {
            page_width: page_width.max(1),
            last_sent: HashMap::new(),
        }
    }

    pub fn page_width(&self) -> u32 {
        self.page_width
    }

    /// Ranges covering a viewport.
    ///
    /// `top_fraction` and `bottom_fraction` locate the visible edges within a
    /// roster of `length` slots. The head page is always included; pages
    /// around the viewport are added depending on how close its top edge sits
    /// to a page boundary.
    pub fn plan(&self, length: usize, top_fraction: f64, bottom_fraction: f64) -> Vec<MemberRange> {
        let width = f64::from(self.page_width);
        let top = length as f64 * top_fraction.clamp(0.0, 1.0);
        let bottom = length as f64 * bottom_fraction.clamp(0.0, 1.0);
        let min_f = (top / width).floor() * width;
        let min = min_f as u32;

        let near_boundary = width / 5.0;
        let near_bottom = width * 4.0 / 5.0;
        let w = self.page_width;

        let mut ranges = vec![MemberRange::page(0, w)];
        if top - min_f < near_boundary {
            if min > 2 * w - 1 {
                ranges.push(MemberRange::page(min - w, w));
            }
            if min > w - 1 {
                ranges.push(MemberRange::page(min, w));
            }
        } else if bottom - min_f > near_bottom {
            ranges.push(MemberRange::page(min, w));
            ranges.push(MemberRange::page(min + w, w));
        } else if min > w - 1 {
            ranges.push(MemberRange::page(min, w));
        }

        ranges.sort_unstable();
        ranges.dedup();
        ranges
    }

    /// Plan for a viewport and return the subscription to send, or `None`
    /// when it matches what was last sent for the room.
    pub fn update(
        &mut self,
        room_id: Snowflake,
        conversation_id: Snowflake,
        length: usize,
        top_fraction: f64,
        bottom_fraction: f64,
    ) -> Option<RoomSubscription> {
        let ranges = self.plan(length, top_fraction, bottom_fraction);
        self.record(room_id, conversation_id, ranges)
    }

    /// Head-page subscription sent when a conversation is opened
    pub fn subscribe_initial(
        &mut self,
        room_id: Snowflake,
        conversation_id: Snowflake,
    ) -> Option<RoomSubscription> {
        self.record(
            room_id,
            conversation_id,
            vec![MemberRange::page(0, self.page_width)],
        )
    }

    /// Empty subscription telling the server to stop pushing for the room.
    /// `None` if nothing was subscribed.
    pub fn leave(&mut self, room_id: Snowflake) -> Option<RoomSubscription> {
        self.last_sent.remove(&room_id).map(|_| {
            tracing::debug!(room_id = %room_id, "Dropping roster subscription");
            RoomSubscription::empty()
        })
    }

    /// Forget what was sent without producing a frame (connection reset)
    pub fn reset(&mut self) {
        self.last_sent.clear();
    }

    pub fn last_sent(&self, room_id: Snowflake) -> Option<&[MemberRange]> {
        self.last_sent.get(&room_id).map(|s| s.ranges.as_slice())
    }

    fn record(
        &mut self,
        room_id: Snowflake,
        conversation_id: Snowflake,
        ranges: Vec<MemberRange>,
    ) -> Option<RoomSubscription> {
        let next = SentRanges {
            conversation_id,
            ranges,
        };
        if self.last_sent.get(&room_id) == Some(&next) {
            tracing::trace!(room_id = %room_id, "Subscription unchanged");
            return None;
        }

        let subscription = RoomSubscription::single(conversation_id, next.ranges.clone());
        tracing::debug!(
            room_id = %room_id,
            conversation_id = %conversation_id,
            ranges = next.ranges.len(),
            "Roster subscription changed"
        );
        self.last_sent.insert(room_id, next);
        Some(subscription)
    }
}

impl Default for SubscriptionPlanner {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_WIDTH)
    }
}
