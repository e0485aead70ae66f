//! In-process registry of known jobs.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use personaforge_core::{Job, JobId, JobKind, OwnerId};

/// Latest known state of the jobs this process is still driving.
///
/// Process-local and lost on restart; the owner metadata is the durable record.
/// A job leaves the registry once its terminal state has been merged there.
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    inner: Arc<RwLock<HashMap<JobId, Job>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a job snapshot.
    pub async fn upsert(&self, job: &Job) {
        self.inner.write().await.insert(job.id, job.clone());
    }

    /// Drop a job, returning its last snapshot.
    pub async fn remove(&self, job_id: JobId) -> Option<Job> {
        self.inner.write().await.remove(&job_id)
    }

    pub async fn get(&self, job_id: JobId) -> Option<Job> {
        self.inner.read().await.get(&job_id).cloned()
    }

    /// Most recently submitted job for an owner and kind.
    pub async fn latest_for(&self, owner_id: OwnerId, kind: JobKind) -> Option<Job> {
        self.inner
            .read()
            .await
            .values()
            .filter(|j| j.owner_id == owner_id && j.kind == kind)
            .max_by_key(|j| (j.submitted_at, j.id))
            .cloned()
    }

    /// Look up a job by its provider-assigned id.
    pub async fn find_external(&self, provider: &str, external_id: &str) -> Option<Job> {
        self.inner
            .read()
            .await
            .values()
            .find(|j| j.provider == provider && j.external_id.as_deref() == Some(external_id))
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
