//! Network seam for the engine.
//!
//! This module provides the `Fetcher` trait the engine uses for every
//! outbound request, and `HttpFetcher`, the reqwest-backed implementation
//! used outside of tests.
//!
//! A fetcher resolves to `Ok` for any HTTP status. Only transport-level
//! failures (unreachable host, timeout, refused connection) are errors.

pub mod client;
pub mod error;

pub use client::{Fetcher, HttpFetcher};
pub use error::FetchError;
