//! Protected storage for vault passwords and secure notes, keyed by item id.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::model::{RecordId, VaultSecret};
use crate::{AppError, AppResult};

pub trait SecretStore: Send + Sync {
    fn store(&self, id: RecordId, secret: &VaultSecret) -> AppResult<()>;
    fn load(&self, id: RecordId) -> AppResult<Option<VaultSecret>>;
    /// Deleting an id with no entry succeeds.
    fn delete(&self, id: RecordId) -> AppResult<()>;
}

/// Process-local secret store. Platform keychains plug in behind the same trait.
#[derive(Default)]
pub struct MemorySecretStore {
    entries: Mutex<HashMap<RecordId, Vec<u8>>>,
}

impl MemorySecretStore {
    pub fn contains(&self, id: RecordId) -> bool {
        self.entries
            .lock()
            .map(|guard| guard.contains_key(&id))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SecretStore for MemorySecretStore {
    fn store(&self, id: RecordId, secret: &VaultSecret) -> AppResult<()> {
        let payload = serde_json::to_vec(secret)?;
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| AppError::new("SECRETS/POISONED", "Secret store lock poisoned"))?;
        guard.insert(id, payload);
        Ok(())
    }

    fn load(&self, id: RecordId) -> AppResult<Option<VaultSecret>> {
        let guard = self
            .entries
            .lock()
            .map_err(|_| AppError::new("SECRETS/POISONED", "Secret store lock poisoned"))?;
        guard
            .get(&id)
            .map(|payload| serde_json::from_slice(payload).map_err(AppError::from))
            .transpose()
    }

    fn delete(&self, id: RecordId) -> AppResult<()> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| AppError::new("SECRETS/POISONED", "Secret store lock poisoned"))?;
        guard.remove(&id);
        Ok(())
    }
}
