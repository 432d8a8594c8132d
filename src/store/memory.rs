use std::collections::BTreeMap;
use std::sync::Mutex;

use super::SnapshotStore;
use crate::AppResult;

#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl SnapshotStore for MemoryStore {
    fn load(&self, collection: &str) -> AppResult<Option<Vec<u8>>> {
        let guard = self.data.lock().unwrap_or_else(|e| e.into_inner());
        Ok(guard.get(collection).cloned())
    }

    fn save(&self, collection: &str, snapshot: &[u8]) -> AppResult<()> {
        let mut guard = self.data.lock().unwrap_or_else(|e| e.into_inner());
        guard.insert(collection.to_string(), snapshot.to_vec());
        Ok(())
    }

    fn collections(&self) -> AppResult<Vec<String>> {
        let guard = self.data.lock().unwrap_or_else(|e| e.into_inner());
        Ok(guard.keys().cloned().collect())
    }
}
