//! Durable storage
//!
//! - **kv**: ordered key-value store with transactional writes
//! - **library**: bookmark and history records kept in the same store

mod kv;
mod library;

pub use kv::KvStore;
pub use library::{Bookmark, HistoryEntry, HistoryStats, Library};
