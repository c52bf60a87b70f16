//! Session orchestration

mod sync_session;

pub use sync_session::{ActiveView, SessionPorts, SyncSession};
