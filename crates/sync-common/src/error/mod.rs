//! Error types shared across the client

mod sync_error;

pub use sync_error::{SyncError, SyncResult};
