//! Known rooms and conversations with their unread state

mod registry;

pub use registry::ConversationRegistry;
