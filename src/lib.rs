// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod config;
pub mod feeds;
pub mod indexer;
pub mod metrics;
pub mod notify;
pub mod scheduler;
pub mod store;
pub mod trigger;
pub mod types;
pub mod verify;
pub mod watcher;

// ---- Re-exports for stable public API ----
pub use crate::notify::{AlertEvent, Notifier, NotifierMux};
pub use crate::store::{FileStore, ResourceRecord, ResourceStore, StoreStats};
pub use crate::trigger::{classify, TransitionEvent, TransitionKind};
pub use crate::types::{
    AlertReason, FeedError, ListingMeta, LookupError, ResourceId, StoreError, ValidatedListing,
};
pub use crate::watcher::{CycleOutcome, Watcher, WatcherCfg};
