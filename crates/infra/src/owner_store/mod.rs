//! Owner record metadata storage.
//!
//! The metadata bag is the only shared mutable state in the orchestrator. It is
//! accessed through [`crate::persister::ResultPersister`]'s read-merge-write,
//! never locked across a read/write pair.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use personaforge_core::{Metadata, OwnerId};

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryOwnerStore;
pub use postgres::PostgresOwnerStore;

#[derive(Debug, Clone, Error)]
pub enum OwnerStoreError {
    #[error("owner not found: {0}")]
    NotFound(OwnerId),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Key/value metadata per owner.
#[async_trait]
pub trait OwnerStore: Send + Sync {
    /// Current metadata, or `None` if the owner does not exist.
    async fn load(&self, owner_id: OwnerId) -> Result<Option<Metadata>, OwnerStoreError>;

    /// Replace the owner's metadata. Fails with `NotFound` for unknown owners.
    async fn store(&self, owner_id: OwnerId, metadata: Metadata) -> Result<(), OwnerStoreError>;

    /// All known owners (used by the reconciliation sweep).
    async fn owners(&self) -> Result<Vec<OwnerId>, OwnerStoreError>;
}

#[async_trait]
impl<S> OwnerStore for Arc<S>
where
    S: OwnerStore + ?Sized,
{
    async fn load(&self, owner_id: OwnerId) -> Result<Option<Metadata>, OwnerStoreError> {
        (**self).load(owner_id).await
    }

    async fn store(&self, owner_id: OwnerId, metadata: Metadata) -> Result<(), OwnerStoreError> {
        (**self).store(owner_id, metadata).await
    }

    async fn owners(&self) -> Result<Vec<OwnerId>, OwnerStoreError> {
        (**self).owners().await
    }
}
