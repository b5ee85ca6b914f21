//! Resource prefetching
//!
//! - **discover**: finds sub-resources referenced by an HTML document
//! - **orchestrator**: fetches pages and fans out resource fetches

mod discover;
mod orchestrator;

pub use discover::ResourceDiscoverer;
pub use orchestrator::{PrefetchOrchestrator, PrefetchReport};
