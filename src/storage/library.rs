//! Bookmarks and browsing history
//!
//! Both live in the durable store: one record per URL, so re-saving a URL
//! replaces its previous record instead of duplicating it.

use super::KvStore;
use crate::utils::StorageError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const BOOKMARK_PREFIX: &str = "bookmark_";
const HISTORY_PREFIX: &str = "history_";

/// A saved bookmark
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default = "Utc::now")]
    pub added_at: DateTime<Utc>,
}

/// A visited page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub url: String,
    #[serde(default)]
    pub title: String,
    pub visit_count: u64,
    pub last_visited: DateTime<Utc>,
}

/// Aggregate view over the browsing history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryStats {
    pub total_entries: usize,
    pub total_visits: u64,
    pub most_visited: Option<String>,
    pub request_log_entries: usize,
}

/// Bookmark and history records on top of the durable store
#[derive(Clone)]
pub struct Library {
    store: KvStore,
}

impl Library {
    pub fn new(store: KvStore) -> Self {
        Self { store }
    }

    /// Store every bookmark in one transaction, returning how many were written
    pub fn sync_bookmarks(&self, bookmarks: &[Bookmark]) -> Result<usize, StorageError> {
        let entries = bookmarks
            .iter()
            .map(|b| {
                let value = serde_json::to_vec(b)?;
                Ok::<_, StorageError>((format!("{BOOKMARK_PREFIX}{}", b.url), value))
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.store.put_batch(&entries)?;
        Ok(entries.len())
    }

    pub fn bookmarks(&self) -> Result<Vec<Bookmark>, StorageError> {
        self.store
            .scan_prefix(BOOKMARK_PREFIX)?
            .into_iter()
            .map(|(_, value)| serde_json::from_slice(&value).map_err(StorageError::from))
            .collect()
    }

    pub fn clear_bookmarks(&self) -> Result<usize, StorageError> {
        self.store.delete_prefix(BOOKMARK_PREFIX)
    }

    /// Record a visit; a known URL gets its counter bumped
    ///
    /// The read and the write share one transaction, so concurrent visits to
    /// the same URL are all counted.
    pub fn record_visit(&self, url: &str, title: Option<&str>) -> Result<HistoryEntry, StorageError> {
        let key = format!("{HISTORY_PREFIX}{url}");
        let now = Utc::now();
        self.store.update(&key, |current| {
            let entry = match current {
                Some(raw) => {
                    let mut entry: HistoryEntry = serde_json::from_slice(&raw)?;
                    entry.visit_count += 1;
                    entry.last_visited = now;
                    if let Some(title) = title {
                        entry.title = title.to_string();
                    }
                    entry
                }
                None => HistoryEntry {
                    url: url.to_string(),
                    title: title.unwrap_or_default().to_string(),
                    visit_count: 1,
                    last_visited: now,
                },
            };
            Ok((serde_json::to_vec(&entry)?, entry))
        })
    }

    pub fn history(&self) -> Result<Vec<HistoryEntry>, StorageError> {
        self.store
            .scan_prefix(HISTORY_PREFIX)?
            .into_iter()
            .map(|(_, value)| serde_json::from_slice(&value).map_err(StorageError::from))
            .collect()
    }

    pub fn clear_history(&self) -> Result<usize, StorageError> {
        self.store.delete_prefix(HISTORY_PREFIX)
    }

    pub fn history_stats(&self) -> Result<HistoryStats, StorageError> {
        let history = self.history()?;
        let most_visited = history
            .iter()
            .max_by_key(|e| e.visit_count)
            .map(|e| e.url.clone());

        Ok(HistoryStats {
            total_entries: history.len(),
            total_visits: history.iter().map(|e| e.visit_count).sum(),
            most_visited,
            request_log_entries: self.store.count_prefix(crate::metrics::keys::REQUEST_PREFIX)?,
        })
    }
}
