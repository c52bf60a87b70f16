//! Timeline entries

use sync_core::{Message, Snowflake};

/// A message as placed in the timeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineMessage {
    pub message: Message,
    /// Same sender as the message directly above, with no filler between
    pub continues_previous: bool,
    /// This message is the read-marker
    pub is_last_read: bool,
}

/// One row of the timeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimelineEntry {
    Message(TimelineMessage),
    /// Interleaved placeholder; has no identity
    Filler,
}

impl TimelineEntry {
    pub(crate) fn message(message: Message) -> Self {
        Self::Message(TimelineMessage {
            message,
            continues_previous: false,
            is_last_read: false,
        })
    }

    /// Message id; fillers have none
    pub fn id(&self) -> Option<Snowflake> {
        match self {
            Self::Message(m) => Some(m.message.id),
            Self::Filler => None,
        }
    }

    pub fn as_message(&self) -> Option<&TimelineMessage> {
        match self {
            Self::Message(m) => Some(m),
            Self::Filler => None,
        }
    }

    pub(crate) fn as_message_mut(&mut self) -> Option<&mut TimelineMessage> {
        match self {
            Self::Message(m) => Some(m),
            Self::Filler => None,
        }
    }

    #[inline]
    pub fn is_filler(&self) -> bool {
        matches!(self, Self::Filler)
    }
}
