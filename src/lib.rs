//! # Binix Accel - Browser Acceleration Backend
//!
//! An HTTP service that prefetches the sub-resources of web pages, keeps
//! them in a short-lived hot cache and records per-resource and host
//! performance metrics in a durable key-value store.
//!
//! ## Architecture
//!
//! - **prefetch**: resource discovery and the prefetch orchestrator
//! - **network**: HTTP client, hot cache, bandwidth gate, connection counter
//! - **metrics**: metric records, the recorder and the periodic sampler
//! - **storage**: SQLite-backed key-value store, bookmarks and history
//! - **api**: axum routes over the application context
//! - **config**: environment-driven server settings
//! - **utils**: shared error types

pub mod api;
pub mod config;
pub mod context;
pub mod metrics;
pub mod network;
pub mod prefetch;
pub mod storage;
pub mod utils;

pub use config::ServerConfig;
pub use context::AppContext;
pub use utils::error::{AccelError, Result};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = "Binix";
