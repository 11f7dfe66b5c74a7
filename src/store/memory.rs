//! In-memory store backend.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::trace;

use crate::error::Result;

use super::{StorageMap, Store};

// ============================================================================
// MemoryStore
// ============================================================================

/// Store backed by a map behind a `RwLock`.
///
/// Counts successful `set` calls so callers can tell whether anything was
/// persisted.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<FxHashMap<String, Value>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    /// Creates an empty store (first-run state).
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `entries`.
    #[must_use]
    pub fn with_entries(entries: impl IntoIterator<Item = (impl Into<String>, Value)>) -> Self {
        let entries = entries
            .into_iter()
            .map(|(key, value)| (key.into(), value))
            .collect();

        Self {
            entries: RwLock::new(entries),
            writes: AtomicUsize::new(0),
        }
    }

    /// Returns a copy of the value under `key`.
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<Value> {
        self.entries.read().get(key).cloned()
    }

    /// Returns how many `set` calls have completed.
    #[inline]
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, keys: &[&str]) -> Result<StorageMap> {
        let entries = self.entries.read();
        let found: StorageMap = keys
            .iter()
            .filter_map(|key| entries.get(*key).map(|v| ((*key).to_string(), v.clone())))
            .collect();

        trace!(requested = keys.len(), found = found.len(), "MemoryStore get");
        Ok(found)
    }

    async fn set(&self, items: StorageMap) -> Result<()> {
        trace!(keys = items.len(), "MemoryStore set");

        self.entries.write().extend(items);
        self.writes.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[tokio::test]
    async fn test_empty_store_returns_nothing() {
        let store = MemoryStore::new();
        let data = store.get(&["rules", "globalEnabled"]).await.unwrap();
        assert!(data.is_empty());
    }

    #[tokio::test]
    async fn test_set_merges_keys() {
        let store = MemoryStore::with_entries([("globalEnabled", json!(true))]);

        let mut items = StorageMap::default();
        items.insert("rules".into(), json!([]));
        store.set(items).await.unwrap();

        let data = store.get(&["rules", "globalEnabled"]).await.unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_get_only_requested_keys() {
        let store = MemoryStore::with_entries([("a", json!(1)), ("b", json!(2))]);
        let data = store.get(&["a"]).await.unwrap();
        assert_eq!(data.get("a"), Some(&json!(1)));
        assert!(!data.contains_key("b"));
    }
}
