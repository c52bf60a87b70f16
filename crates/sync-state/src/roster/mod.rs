//! Member roster
//!
//! Sparse, index-addressed roster of one room kept in step with the server
//! through member-list patch batches.

mod engine;
mod slot;

pub use engine::{ApplyOutcome, RosterChange, RosterSyncEngine};
pub use slot::{RosterMember, RosterSlot};
