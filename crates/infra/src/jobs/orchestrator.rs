//! Facade tying launch, polling, handoff and persistence together.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{info, instrument, warn};

use personaforge_core::{Job, JobId, JobKind, JobStatus, Metadata, MetadataKeys, OwnerId};
use personaforge_providers::ProviderCatalog;

use super::continuation::BackgroundContinuation;
use super::launcher::{JobLauncher, JobPayload, LaunchError};
use super::poller::{PollError, StatusPoller, DEFAULT_MAX_CONSECUTIVE_FAILURES};
use super::reconcile::Reconciler;
use super::registry::JobRegistry;
use crate::external::ProviderTransport;
use crate::owner_store::{OwnerStore, OwnerStoreError};
use crate::persister::{job_entries, PersistError, ResultPersister};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// How long a submit may poll before handing the job to the background.
    pub client_deadline: Duration,
    /// Absolute bound on background polling, measured from handoff.
    pub background_ceiling: Duration,
    pub max_consecutive_failures: u32,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            client_deadline: Duration::from_secs(25),
            background_ceiling: Duration::from_secs(15 * 60),
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LaunchJobRequest {
    pub kind: JobKind,
    pub owner_id: OwnerId,
    pub payload: JobPayload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GetJobStatus {
    Job(JobId),
    Owner { owner_id: OwnerId, kind: JobKind },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOutcome {
    pub job: Job,
    /// Still pending at the client deadline; a background task owns it now.
    pub handed_off: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusSource {
    /// A job handle held by this process.
    Live,
    /// The owner record's persisted keys.
    Persisted,
    /// The provider's configured fallback result.
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusView {
    pub job_id: Option<JobId>,
    pub provider: String,
    pub kind: JobKind,
    pub status: JobStatus,
    pub result_ref: Option<String>,
    pub external_id: Option<String>,
    pub failure_reason: Option<String>,
    pub source: StatusSource,
}

impl StatusView {
    fn live(job: &Job) -> Self {
        Self {
            job_id: Some(job.id),
            provider: job.provider.clone(),
            kind: job.kind,
            status: job.status,
            result_ref: job.result_ref.clone(),
            external_id: job.external_id.clone(),
            failure_reason: job.failure_reason.clone(),
            source: StatusSource::Live,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error(transparent)]
    Poll(#[from] PollError),

    #[error(transparent)]
    Store(#[from] OwnerStoreError),

    #[error("job not found: {0}")]
    JobNotFound(JobId),

    #[error("no {kind} job recorded for owner {owner_id}")]
    NothingRecorded { owner_id: OwnerId, kind: JobKind },

    #[error("no provider registered for {0}")]
    UnknownProvider(JobKind),
}

impl From<PersistError> for OrchestratorError {
    fn from(e: PersistError) -> Self {
        match e {
            PersistError::Store(inner) => OrchestratorError::Store(inner),
        }
    }
}

/// Entry point for job submission and status queries.
pub struct Orchestrator<T: ?Sized, S> {
    launcher: JobLauncher<T>,
    poller: StatusPoller<T, S>,
    continuation: BackgroundContinuation<T, S>,
    catalog: Arc<ProviderCatalog>,
    persister: Arc<ResultPersister<S>>,
    registry: JobRegistry,
    settings: OrchestratorSettings,
}

impl<T, S> Orchestrator<T, S>
where
    T: ProviderTransport + ?Sized + 'static,
    S: OwnerStore + 'static,
{
    pub fn new(
        transport: Arc<T>,
        catalog: Arc<ProviderCatalog>,
        store: S,
        settings: OrchestratorSettings,
    ) -> Self {
        let registry = JobRegistry::new();
        let persister = Arc::new(ResultPersister::new(store));
        let poller = StatusPoller::new(
            transport.clone(),
            catalog.clone(),
            persister.clone(),
            registry.clone(),
        )
        .with_max_consecutive_failures(settings.max_consecutive_failures);

        Self {
            launcher: JobLauncher::new(transport, catalog.clone()),
            continuation: BackgroundContinuation::new(poller.clone()),
            poller,
            catalog,
            persister,
            registry,
            settings,
        }
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub fn catalog(&self) -> &ProviderCatalog {
        &self.catalog
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn persister(&self) -> &ResultPersister<S> {
        &self.persister
    }

    pub fn continuation(&self) -> &BackgroundContinuation<T, S> {
        &self.continuation
    }

    /// Sweep that resumes jobs the owner records still list as pending.
    pub fn reconciler(&self) -> Reconciler<T, S> {
        Reconciler::new(
            self.continuation.clone(),
            self.catalog.clone(),
            self.persister.clone(),
            self.registry.clone(),
            self.settings.background_ceiling,
        )
    }

    /// Launch, then poll until the configured client deadline.
    pub async fn submit(&self, request: LaunchJobRequest) -> Result<SubmitOutcome, OrchestratorError> {
        self.submit_with_deadline(request, self.settings.client_deadline)
            .await
    }

    /// Launch a job, persist its queued marker, and poll until terminal or
    /// `client_deadline`; a job still pending then continues in the background.
    #[instrument(skip(self, request), fields(owner_id = %request.owner_id, kind = %request.kind))]
    pub async fn submit_with_deadline(
        &self,
        request: LaunchJobRequest,
        client_deadline: Duration,
    ) -> Result<SubmitOutcome, OrchestratorError> {
        let mut job = self
            .launcher
            .launch(request.owner_id, request.kind, &request.payload)
            .await?;
        job.deadline = chrono::Duration::from_std(client_deadline)
            .ok()
            .map(|d| Utc::now() + d);
        let keys = self.keys(&job)?;

        if job.is_terminal() {
            self.persister
                .merge(job.owner_id, job_entries(&job, &keys))
                .await?;
            return Ok(SubmitOutcome {
                job,
                handed_off: false,
            });
        }

        // Claimed before the queued marker is visible to a reconciliation sweep.
        let claim = self.continuation.in_flight().claim(&job);
        if claim.is_some() {
            self.registry.upsert(&job).await;
        }
        self.persister
            .merge(job.owner_id, job_entries(&job, &keys))
            .await?;

        let Some(claim) = claim else {
            warn!(job_id = %job.id, provider = %job.provider, external_id = ?job.external_id, "job already being polled elsewhere; not polling it here");
            return Ok(SubmitOutcome {
                job,
                handed_off: true,
            });
        };

        let outcome = self
            .poller
            .poll(&mut job, Instant::now() + client_deadline)
            .await;
        drop(claim);
        let outcome = outcome?;

        if outcome.is_terminal() {
            return Ok(SubmitOutcome {
                job,
                handed_off: false,
            });
        }

        info!(job_id = %job.id, status = %job.status, "client deadline reached; continuing in background");
        self.continuation
            .continue_in_background(job.clone(), self.settings.background_ceiling);
        Ok(SubmitOutcome {
            job,
            handed_off: true,
        })
    }

    /// Current status: the live job if this process holds one, else the
    /// owner record's persisted keys, else the provider's default result.
    pub async fn status(&self, query: GetJobStatus) -> Result<StatusView, OrchestratorError> {
        match query {
            GetJobStatus::Job(job_id) => self
                .registry
                .get(job_id)
                .await
                .map(|job| StatusView::live(&job))
                .ok_or(OrchestratorError::JobNotFound(job_id)),
            GetJobStatus::Owner { owner_id, kind } => {
                if let Some(job) = self.registry.latest_for(owner_id, kind).await {
                    return Ok(StatusView::live(&job));
                }

                let set = self
                    .catalog
                    .for_kind(kind)
                    .ok_or(OrchestratorError::UnknownProvider(kind))?;

                if let Some(metadata) = self.persister.store().load(owner_id).await? {
                    if let Some(view) = persisted_view(&metadata, &set.provider, kind, &set.metadata_keys) {
                        return Ok(view);
                    }
                }

                self.catalog
                    .config(&set.provider)
                    .and_then(|c| c.default_result.clone())
                    .map(|result| StatusView {
                        job_id: None,
                        provider: set.provider.clone(),
                        kind,
                        status: JobStatus::Ready,
                        result_ref: Some(result),
                        external_id: None,
                        failure_reason: None,
                        source: StatusSource::Default,
                    })
                    .ok_or(OrchestratorError::NothingRecorded { owner_id, kind })
            }
        }
    }

    fn keys(&self, job: &Job) -> Result<MetadataKeys, OrchestratorError> {
        self.catalog
            .get(&job.provider, job.kind)
            .map(|s| s.metadata_keys.clone())
            .ok_or(OrchestratorError::UnknownProvider(job.kind))
    }
}

/// Rebuild a status view from an owner's metadata.
///
/// A result key without a status key (records written before statuses were
/// tracked) reads as `Ready`. A failed record never exposes a result, even if
/// a partial one was stored before the failure.
pub(crate) fn persisted_view(
    metadata: &Metadata,
    provider: &str,
    kind: JobKind,
    keys: &MetadataKeys,
) -> Option<StatusView> {
    let text = |key: &str| {
        metadata
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .filter(|s| !s.is_empty())
    };

    let mut result_ref = text(&keys.result);
    let status = text(&keys.status)
        .and_then(|s| JobStatus::from_provider(&s))
        .or(result_ref.as_ref().map(|_| JobStatus::Ready))?;
    if status == JobStatus::Failed {
        result_ref = None;
    }

    Some(StatusView {
        job_id: None,
        provider: provider.to_string(),
        kind,
        status,
        result_ref,
        external_id: text(&keys.external_id),
        failure_reason: text(&keys.error),
        source: StatusSource::Persisted,
    })
}
