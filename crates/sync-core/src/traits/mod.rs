//! Ports - the traits the sync core consumes from its host

mod providers;
mod sources;

pub use providers::{CredentialProvider, SettingsProvider};
pub use sources::{FetchResult, MemberQuery, MemberSource, MessageQuery, MessageSource};
