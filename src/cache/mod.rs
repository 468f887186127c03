//! Local storage for the engine.
//!
//! This module provides:
//! - `CacheManager`: named cache generations persisted as JSON
//! - `CachedResponse`: a stored response stamped with its write time
//! - `MutationQueue`: requests deferred while offline
//!
//! Cached API responses are served during an outage only while younger
//! than the configured freshness window (60 minutes by default).

pub mod entry;
pub mod manager;
pub mod queue;

pub use entry::CachedResponse;
pub use manager::CacheManager;
pub use queue::{MutationQueue, PendingMutation};
