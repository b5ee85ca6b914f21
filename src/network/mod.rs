//! Network stack for the acceleration backend
//!
//! Outbound fetching, the hot resource cache, the fetch concurrency gate and
//! inbound connection accounting.

mod bandwidth;
mod cache;
mod client;
mod connections;
mod response;

pub use bandwidth::{BandwidthManager, Slot, DEFAULT_MAX_CONCURRENT};
pub use cache::{CachedResource, HotCache, DEFAULT_HOT_CACHE_MAX_BYTES, DEFAULT_HOT_CACHE_TTL};
pub use client::{NetworkClient, DEFAULT_FETCH_TIMEOUT, DEFAULT_MAX_BODY_BYTES, USER_AGENT};
pub use connections::{ConnectionCounter, ConnectionGuard};
pub use response::Response;
