//! Persistence gateway: named collections mapped to serialized snapshots.
//!
//! Backends only move bytes. Decoding lives in [`load_collection`] and
//! [`load_singleton`], which fail open: an absent or undecodable snapshot reads
//! as empty and is logged, never returned as an error.

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;

use crate::AppResult;

mod file;
mod memory;
mod sqlite;

pub use file::{write_atomic, JsonDirStore};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

pub trait SnapshotStore: Send + Sync {
    fn load(&self, collection: &str) -> AppResult<Option<Vec<u8>>>;
    /// Replaces the whole snapshot; readers never observe a partial write.
    fn save(&self, collection: &str, snapshot: &[u8]) -> AppResult<()>;
    fn collections(&self) -> AppResult<Vec<String>>;
}

#[derive(Clone)]
pub struct StoreHandle {
    inner: Arc<dyn SnapshotStore>,
}

impl StoreHandle {
    pub fn new(store: impl SnapshotStore + 'static) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }

    pub fn from_arc(store: Arc<dyn SnapshotStore>) -> Self {
        Self { inner: store }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStore::default())
    }

    pub fn load_raw(&self, collection: &str) -> AppResult<Option<Vec<u8>>> {
        self.inner.load(collection)
    }

    pub fn save_raw(&self, collection: &str, snapshot: &[u8]) -> AppResult<()> {
        self.inner.save(collection, snapshot)
    }

    pub fn collections(&self) -> AppResult<Vec<String>> {
        self.inner.collections()
    }

    pub fn save_collection<T: Serialize>(&self, collection: &str, items: &[T]) -> AppResult<()> {
        let bytes = serde_json::to_vec(items)
            .map_err(|err| crate::AppError::from(err).with_context("collection", collection))?;
        self.inner
            .save(collection, &bytes)
            .map_err(|err| err.with_context("collection", collection))
    }

    pub fn save_singleton<T: Serialize>(&self, key: &str, value: &T) -> AppResult<()> {
        let bytes = serde_json::to_vec(value)
            .map_err(|err| crate::AppError::from(err).with_context("collection", key))?;
        self.inner
            .save(key, &bytes)
            .map_err(|err| err.with_context("collection", key))
    }
}

pub fn load_collection<T: DeserializeOwned>(store: &StoreHandle, collection: &str) -> Vec<T> {
    let bytes = match store.load_raw(collection) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return Vec::new(),
        Err(err) => {
            warn!(
                target: "daybook",
                event = "collection_load_failed",
                collection,
                error = %err
            );
            return Vec::new();
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(items) => items,
        Err(err) => {
            warn!(
                target: "daybook",
                event = "collection_decode_failed",
                collection,
                error = %err
            );
            Vec::new()
        }
    }
}

pub fn load_singleton<T: DeserializeOwned + Default>(store: &StoreHandle, key: &str) -> T {
    match store.load_raw(key) {
        Ok(Some(bytes)) => serde_json::from_slice(&bytes).unwrap_or_else(|err| {
            warn!(
                target: "daybook",
                event = "collection_decode_failed",
                collection = key,
                error = %err
            );
            T::default()
        }),
        Ok(None) => T::default(),
        Err(err) => {
            warn!(
                target: "daybook",
                event = "collection_load_failed",
                collection = key,
                error = %err
            );
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Settings, ShoppingItem};

    #[test]
    fn missing_collection_reads_empty() {
        let store = StoreHandle::in_memory();
        let items: Vec<ShoppingItem> = load_collection(&store, "shopping_items");
        assert!(items.is_empty());
    }

    #[test]
    fn garbage_snapshot_reads_empty() {
        let store = StoreHandle::in_memory();
        store.save_raw("shopping_items", b"{not json").unwrap();
        let items: Vec<ShoppingItem> = load_collection(&store, "shopping_items");
        assert!(items.is_empty());

        store.save_raw("settings", b"[1,2,3]").unwrap();
        let settings: Settings = load_singleton(&store, "settings");
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn collection_round_trips_through_handle() {
        let store = StoreHandle::in_memory();
        let items = vec![ShoppingItem::new("Milk"), ShoppingItem::new("Eggs")];
        store.save_collection("shopping_items", &items).unwrap();
        let loaded: Vec<ShoppingItem> = load_collection(&store, "shopping_items");
        assert_eq!(loaded, items);
        assert_eq!(store.collections().unwrap(), vec!["shopping_items".to_string()]);
    }
}
