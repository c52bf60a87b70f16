//! Fetch ports - the request/response boundary for bulk history
//!
//! The sync core never speaks HTTP itself. Timeline pagination and member
//! lookups go through these traits; the embedding application supplies the
//! implementation.

use async_trait::async_trait;

use crate::entities::{Member, Message};
use crate::error::FetchError;
use crate::value_objects::Snowflake;

/// Result type for fetch operations
pub type FetchResult<T> = Result<T, FetchError>;

// ============================================================================
// Message Source
// ============================================================================

/// Cursor and size for one page of messages.
///
/// With neither cursor set the page is the newest `limit` messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageQuery {
    pub before: Option<Snowflake>,
    pub after: Option<Snowflake>,
    pub limit: usize,
}

impl MessageQuery {
    pub fn latest(limit: usize) -> Self {
        Self {
            before: None,
            after: None,
            limit,
        }
    }

    pub fn before(id: Snowflake, limit: usize) -> Self {
        Self {
            before: Some(id),
            after: None,
            limit,
        }
    }

    pub fn after(id: Snowflake, limit: usize) -> Self {
        Self {
            before: None,
            after: Some(id),
            limit,
        }
    }
}

#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Fetch one page of a conversation's history.
    ///
    /// Pages may come back in any order; callers sort by id.
    async fn fetch_messages(
        &self,
        conversation_id: Snowflake,
        query: MessageQuery,
    ) -> FetchResult<Vec<Message>>;

    /// Move the server-side read-marker of a conversation
    async fn acknowledge(&self, conversation_id: Snowflake, message_id: Snowflake)
        -> FetchResult<()>;
}

// ============================================================================
// Member Source
// ============================================================================

/// Cursor and size for one page of room members, ordered by user id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberQuery {
    pub after: Option<Snowflake>,
    pub limit: usize,
}

#[async_trait]
pub trait MemberSource: Send + Sync {
    /// Fetch one page of a room's members
    async fn fetch_members(&self, room_id: Snowflake, query: MemberQuery)
        -> FetchResult<Vec<Member>>;
}
