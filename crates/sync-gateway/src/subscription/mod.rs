//! Roster range subscriptions

mod planner;
mod range;

pub use planner::{SubscriptionPlanner, DEFAULT_PAGE_WIDTH};
pub use range::{MemberRange, RoomSubscription};
