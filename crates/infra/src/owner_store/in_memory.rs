use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use personaforge_core::{Metadata, OwnerId};

use super::{OwnerStore, OwnerStoreError};

/// In-memory owner store for tests/dev.
///
/// Owners must be created explicitly; writes to unknown owners fail like they
/// would against a real table.
#[derive(Debug, Default)]
pub struct InMemoryOwnerStore {
    inner: RwLock<HashMap<OwnerId, Metadata>>,
}

impl InMemoryOwnerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or reset) an owner record.
    pub fn insert_owner(&self, owner_id: OwnerId, metadata: Metadata) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(owner_id, metadata);
        }
    }

    pub fn remove_owner(&self, owner_id: OwnerId) {
        if let Ok(mut map) = self.inner.write() {
            map.remove(&owner_id);
        }
    }

    /// Synchronous snapshot, handy in assertions.
    pub fn snapshot(&self, owner_id: OwnerId) -> Option<Metadata> {
        self.inner.read().ok()?.get(&owner_id).cloned()
    }
}

fn poisoned() -> OwnerStoreError {
    OwnerStoreError::Storage("owner store lock poisoned".to_string())
}

#[async_trait]
impl OwnerStore for InMemoryOwnerStore {
    async fn load(&self, owner_id: OwnerId) -> Result<Option<Metadata>, OwnerStoreError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.get(&owner_id).cloned())
    }

    async fn store(&self, owner_id: OwnerId, metadata: Metadata) -> Result<(), OwnerStoreError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        match map.get_mut(&owner_id) {
            Some(slot) => {
                *slot = metadata;
                Ok(())
            }
            None => Err(OwnerStoreError::NotFound(owner_id)),
        }
    }

    async fn owners(&self) -> Result<Vec<OwnerId>, OwnerStoreError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.keys().copied().collect())
    }
}
