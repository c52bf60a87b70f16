//! Roster ranges and the per-room subscription they form

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use sync_core::Snowflake;

/// Inclusive slice `[lo, hi]` of a roster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberRange {
    pub lo: u32,
    pub hi: u32,
}

impl MemberRange {
    #[must_use]
    pub const fn new(lo: u32, hi: u32) -> Self {
        Self { lo, hi }
    }

    /// The page of `width` slots starting at `lo`
    #[must_use]
    pub const fn page(lo: u32, width: u32) -> Self {
        Self {
            lo,
            hi: lo + width - 1,
        }
    }

    #[must_use]
    pub const fn contains(&self, index: u32) -> bool {
        self.lo <= index && index <= self.hi
    }

    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.lo <= other.hi && other.lo <= self.hi
    }
}

impl fmt::Display for MemberRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.lo, self.hi)
    }
}

// On the wire a range is a two-element array
impl Serialize for MemberRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        [self.lo, self.hi].serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for MemberRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let [lo, hi] = <[u32; 2]>::deserialize(deserializer)?;
        if lo > hi {
            return Err(serde::de::Error::custom(format!("inverted range [{lo}, {hi}]")));
        }
        Ok(Self { lo, hi })
    }
}

/// Which roster slices of one room the server should keep pushing,
/// keyed by the conversation whose member list is being viewed.
///
/// An empty subscription tells the server to stop pushing for the room.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSubscription {
    pub channels: BTreeMap<Snowflake, Vec<MemberRange>>,
}

impl RoomSubscription {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Subscription for one conversation. Ranges are sorted and deduplicated;
    /// overlapping ranges are merged so the set stays disjoint.
    #[must_use]
    pub fn single(conversation_id: Snowflake, ranges: Vec<MemberRange>) -> Self {
        let mut channels = BTreeMap::new();
        channels.insert(conversation_id, normalize(ranges));
        Self { channels }
    }

    pub fn ranges_for(&self, conversation_id: Snowflake) -> &[MemberRange] {
        self.channels
            .get(&conversation_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.values().all(Vec::is_empty)
    }
}

fn normalize(mut ranges: Vec<MemberRange>) -> Vec<MemberRange> {
    ranges.sort_unstable();
    let mut merged: Vec<MemberRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if last.overlaps(&range) => last.hi = last.hi.max(range.hi),
            _ => merged.push(range),
        }
    }
    merged
}
