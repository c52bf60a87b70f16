//! Member lookups outside the subscribed roster window

mod directory;

pub use directory::MemberDirectory;
