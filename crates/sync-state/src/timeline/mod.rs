//! Message timeline of the active conversation

mod cache;
mod entry;

pub use cache::{PageOutcome, TimelineCache, TimelineChange};
pub use entry::{TimelineEntry, TimelineMessage};
