//! Process lifecycle: shutdown broadcast, worker join-group, startup facts.

pub mod coordinator;
pub mod signal;
pub mod startup;
