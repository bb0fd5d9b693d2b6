pub mod engine;
pub mod poller;

pub use engine::{
    EngineOptions, InboxSnapshot, MutationPolicy, Notice, NoticeLevel, SyncEngine, SyncEvent,
};
pub use poller::{PollerHandle, DEFAULT_POLL_INTERVAL};
