//! Merge job results into owner metadata.
//!
//! Each write is read → shallow-merge into a copy → write back. There is no
//! lock between the read and the write: two persisters racing on the same key
//! resolve last-writer-wins, but keys a persister does not set are carried over
//! from what it read, so unrelated job results survive.

use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, warn};

use personaforge_core::{Job, JobStatus, Metadata, MetadataKeys, OwnerId};

use crate::owner_store::{OwnerStore, OwnerStoreError};

#[derive(Debug, Clone, Error)]
pub enum PersistError {
    #[error(transparent)]
    Store(#[from] OwnerStoreError),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    Merged,
    /// The owner record does not exist (yet); nothing was written.
    OwnerMissing,
}

pub struct ResultPersister<S> {
    store: S,
}

impl<S: OwnerStore> ResultPersister<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Set a single key.
    pub async fn persist(
        &self,
        owner_id: OwnerId,
        key: &str,
        value: JsonValue,
    ) -> Result<PersistOutcome, PersistError> {
        let mut entries = Metadata::new();
        entries.insert(key.to_string(), value);
        self.merge(owner_id, entries).await
    }

    /// Shallow-merge `entries` into the owner's metadata.
    pub async fn merge(
        &self,
        owner_id: OwnerId,
        entries: Metadata,
    ) -> Result<PersistOutcome, PersistError> {
        let Some(current) = self.store.load(owner_id).await? else {
            warn!(owner_id = %owner_id, keys = ?entries.keys().collect::<Vec<_>>(), "owner record missing; skipping persist");
            return Ok(PersistOutcome::OwnerMissing);
        };

        let mut merged = current;
        for (key, value) in entries {
            merged.insert(key, value);
        }

        match self.store.store(owner_id, merged).await {
            Ok(()) => {
                debug!(owner_id = %owner_id, "owner metadata merged");
                Ok(PersistOutcome::Merged)
            }
            Err(OwnerStoreError::NotFound(_)) => {
                warn!(owner_id = %owner_id, "owner record vanished during persist");
                Ok(PersistOutcome::OwnerMissing)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Metadata entries describing a job's current state under its provider's keys.
///
/// Always sets the status; the provider id when known; the result when
/// `Ready`; the error text when `Failed` and a reason is known.
pub fn job_entries(job: &Job, keys: &MetadataKeys) -> Metadata {
    let mut entries = Metadata::new();
    entries.insert(keys.status.clone(), JsonValue::from(job.status.as_str()));
    if let Some(id) = &job.external_id {
        entries.insert(keys.external_id.clone(), JsonValue::from(id.as_str()));
    }
    match job.status {
        JobStatus::Ready => {
            if let Some(result) = &job.result_ref {
                entries.insert(keys.result.clone(), JsonValue::from(result.as_str()));
            }
        }
        JobStatus::Failed => {
            if let Some(reason) = &job.failure_reason {
                entries.insert(keys.error.clone(), JsonValue::from(reason.as_str()));
            }
        }
        JobStatus::Queued | JobStatus::Processing => {}
    }
    entries
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use personaforge_core::JobKind;

    use super::*;
    use crate::owner_store::InMemoryOwnerStore;

    fn setup() -> (Arc<InMemoryOwnerStore>, ResultPersister<Arc<InMemoryOwnerStore>>, OwnerId) {
        let store = Arc::new(InMemoryOwnerStore::new());
        let owner = OwnerId::new();
        store.insert_owner(owner, Metadata::new());
        (store.clone(), ResultPersister::new(store), owner)
    }

    #[tokio::test]
    async fn sequential_persists_keep_each_others_keys() {
        let (store, persister, owner) = setup();

        persister.persist(owner, "a", json!(1)).await.unwrap();
        persister.persist(owner, "b", json!(2)).await.unwrap();

        let m = store.snapshot(owner).unwrap();
        assert_eq!(m.get("a"), Some(&json!(1)));
        assert_eq!(m.get("b"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn same_key_is_last_writer_wins() {
        let (store, persister, owner) = setup();

        persister.persist(owner, "a", json!("first")).await.unwrap();
        persister.persist(owner, "a", json!("second")).await.unwrap();

        assert_eq!(store.snapshot(owner).unwrap().get("a"), Some(&json!("second")));
    }

    #[tokio::test]
    async fn missing_owner_is_skipped_not_failed() {
        let (store, persister, _) = setup();
        let stranger = OwnerId::new();

        let outcome = persister.persist(stranger, "a", json!(1)).await.unwrap();
        assert_eq!(outcome, PersistOutcome::OwnerMissing);
        assert!(store.snapshot(stranger).is_none());
    }

    #[test]
    fn entries_follow_job_state() {
        let keys = MetadataKeys::for_provider("simli", JobKind::FaceEmbedding)
            .with_result_key("simli_face_id");
        let mut job = Job::new(OwnerId::new(), "simli", JobKind::FaceEmbedding).with_external_id("abc");

        let queued = job_entries(&job, &keys);
        assert_eq!(queued.get("simli_face_status"), Some(&json!("queued")));
        assert_eq!(queued.get("simli_face_id_missing"), None);
        assert!(!queued.contains_key("simli_face_id"));

        job.mark_ready(Some("f-9".to_string()));
        let ready = job_entries(&job, &keys);
        assert_eq!(ready.get("simli_face_id"), Some(&json!("f-9")));
        assert_eq!(ready.get("simli_face_status"), Some(&json!("ready")));
    }
}
