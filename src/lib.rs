//! swcache - an offline-capable request cache and sync engine.
//!
//! The engine sits between an application and the network. It serves
//! static assets cache-first from a versioned generation, serves API calls
//! network-first with a time-bounded cache fallback, queues mutations made
//! while offline and replays them on reconnect, and bridges push messages
//! to notifications.

pub mod cache;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod http;
pub mod network;
pub mod platform;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use engine::Engine;
pub use error::EngineError;
pub use http::{Request, RequestIdentity, Response};
