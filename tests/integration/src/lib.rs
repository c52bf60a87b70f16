//! Integration test utilities for the sync client
//!
//! Provides a scripted transport standing in for the gateway server,
//! in-memory fetch sources, and wire-format fixtures.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
