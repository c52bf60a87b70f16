//! Roster slots

use sync_core::{Member, MemberGroup, Snowflake};

/// Member as displayed in a roster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterMember {
    pub member: Member,
    /// The member owns the room
    pub is_owner: bool,
}

/// One addressable roster position
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RosterSlot {
    /// Not synced yet, or invalidated
    #[default]
    Empty,
    Group(MemberGroup),
    Member(RosterMember),
}

impl RosterSlot {
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn as_member(&self) -> Option<&RosterMember> {
        match self {
            Self::Member(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&MemberGroup> {
        match self {
            Self::Group(g) => Some(g),
            _ => None,
        }
    }

    pub fn member_id(&self) -> Option<Snowflake> {
        self.as_member().map(|m| m.member.id())
    }
}
