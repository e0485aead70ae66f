//! Deadline-bounded status polling.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use personaforge_core::{Job, JobId, JobKind, JobStatus, Metadata, MetadataKeys};
use personaforge_providers::{NormalizedResponse, ProviderCatalog};

use super::probe::{probe, Failures, ProbeOutcome};
use super::registry::JobRegistry;
use crate::external::{HttpMethod, ProviderTransport, RequestBody};
use crate::owner_store::OwnerStore;
use crate::persister::{job_entries, ResultPersister};

pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// Where a poll loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOutcome {
    /// `Ready`/`Failed`, or `Processing` when the deadline came first.
    pub status: JobStatus,
    pub result_ref: Option<String>,
    /// Result seen before the job reached `Ready` (already persisted).
    pub partial_result: Option<String>,
}

impl PollOutcome {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[derive(Debug, Clone, Error)]
pub enum PollError {
    #[error("no provider {provider} registered for {kind}")]
    UnknownProvider { provider: String, kind: JobKind },

    #[error("{provider}: quota exceeded: {message}")]
    Quota { provider: String, message: String },

    #[error("{provider} rejected the job (HTTP {status}): {message}")]
    Rejected {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("{provider}: status unavailable after {rounds} rounds: {failures}")]
    Exhausted {
        provider: String,
        rounds: u32,
        failures: Failures,
    },

    #[error("job {0} has no provider id to poll")]
    MissingId(JobId),
}

/// Polls provider status endpoints until a job is terminal or a deadline passes.
pub struct StatusPoller<T: ?Sized, S> {
    transport: Arc<T>,
    catalog: Arc<ProviderCatalog>,
    persister: Arc<ResultPersister<S>>,
    registry: JobRegistry,
    max_consecutive_failures: u32,
}

impl<T: ?Sized, S> Clone for StatusPoller<T, S> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            catalog: self.catalog.clone(),
            persister: self.persister.clone(),
            registry: self.registry.clone(),
            max_consecutive_failures: self.max_consecutive_failures,
        }
    }
}

impl<T, S> StatusPoller<T, S>
where
    T: ProviderTransport + ?Sized,
    S: OwnerStore,
{
    pub fn new(
        transport: Arc<T>,
        catalog: Arc<ProviderCatalog>,
        persister: Arc<ResultPersister<S>>,
        registry: JobRegistry,
    ) -> Self {
        Self {
            transport,
            catalog,
            persister,
            registry,
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
        }
    }

    pub fn with_max_consecutive_failures(mut self, max: u32) -> Self {
        self.max_consecutive_failures = max.max(1);
        self
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn persister(&self) -> &Arc<ResultPersister<S>> {
        &self.persister
    }

    /// Poll `job` until it is terminal or `deadline` passes.
    ///
    /// Terminal states and early results are persisted as soon as they are
    /// observed. Reaching the deadline is not an error: the outcome reports
    /// `Processing` and the job keeps its last observed status.
    pub async fn poll(&self, job: &mut Job, deadline: Instant) -> Result<PollOutcome, PollError> {
        let set = self
            .catalog
            .get(&job.provider, job.kind)
            .ok_or_else(|| PollError::UnknownProvider {
                provider: job.provider.clone(),
                kind: job.kind,
            })?;
        let keys = &set.metadata_keys;

        if job.is_terminal() {
            self.settle(job, keys).await;
            return Ok(outcome(job, None));
        }

        let Some(external_id) = job.external_id.clone() else {
            return Err(PollError::MissingId(job.id));
        };
        let api_key = self
            .catalog
            .config(&set.provider)
            .and_then(|c| c.api_key.as_deref());
        let candidates = set.status_candidates(&external_id);

        let mut partial: Option<String> = None;
        let mut consecutive_failures = 0u32;

        loop {
            if Instant::now() >= deadline {
                debug!(job_id = %job.id, provider = %job.provider, attempts = job.attempts, "poll deadline reached");
                self.registry.upsert(job).await;
                return Ok(PollOutcome {
                    status: JobStatus::Processing,
                    result_ref: None,
                    partial_result: partial,
                });
            }

            job.record_attempt();
            let probed = probe(
                self.transport.as_ref(),
                set,
                api_key,
                &candidates,
                HttpMethod::Get,
                &RequestBody::Empty,
                |n: &NormalizedResponse| !n.is_empty(),
            )
            .await;

            match probed {
                ProbeOutcome::Accepted { normalized, .. } => {
                    consecutive_failures = 0;
                    let before = job.status;
                    let fresh_partial = apply(job, normalized, &mut partial);

                    if job.is_terminal() {
                        self.settle(job, keys).await;
                        info!(
                            job_id = %job.id,
                            owner_id = %job.owner_id,
                            provider = %job.provider,
                            status = %job.status,
                            result_ref = ?job.result_ref,
                            attempts = job.attempts,
                            "job reached terminal state"
                        );
                        return Ok(outcome(job, partial));
                    }

                    self.registry.upsert(job).await;
                    if let Some(result) = fresh_partial {
                        info!(job_id = %job.id, provider = %job.provider, "early result persisted before ready");
                        let mut entries = job_entries(job, keys);
                        entries.insert(keys.result.clone(), JsonValue::from(result));
                        self.write(job, entries).await;
                    } else if job.status != before {
                        self.write(job, job_entries(job, keys)).await;
                    }
                }
                ProbeOutcome::Quota { message, .. } => {
                    self.registry.upsert(job).await;
                    return Err(PollError::Quota {
                        provider: job.provider.clone(),
                        message,
                    });
                }
                ProbeOutcome::Rejected {
                    status, message, ..
                } => {
                    job.mark_failed(Some(message.clone()));
                    self.settle(job, keys).await;
                    return Err(PollError::Rejected {
                        provider: job.provider.clone(),
                        status,
                        message,
                    });
                }
                ProbeOutcome::Exhausted { failures } => {
                    consecutive_failures += 1;
                    warn!(
                        job_id = %job.id,
                        provider = %job.provider,
                        round = consecutive_failures,
                        failures = %failures,
                        "status candidates exhausted"
                    );
                    if consecutive_failures >= self.max_consecutive_failures {
                        self.registry.upsert(job).await;
                        return Err(PollError::Exhausted {
                            provider: job.provider.clone(),
                            rounds: consecutive_failures,
                            failures,
                        });
                    }
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            tokio::time::sleep(set.poll_interval.min(remaining)).await;
        }
    }

    /// Merge into the owner record; `false` if the write failed.
    async fn write(&self, job: &Job, entries: Metadata) -> bool {
        match self.persister.merge(job.owner_id, entries).await {
            Ok(_) => true,
            Err(e) => {
                error!(job_id = %job.id, owner_id = %job.owner_id, error = %e, "failed to persist job state");
                false
            }
        }
    }

    /// Persist a terminal job and release it from the registry. A job whose
    /// merge failed stays registered so its outcome remains visible.
    async fn settle(&self, job: &Job, keys: &MetadataKeys) {
        if self.write(job, job_entries(job, keys)).await {
            self.registry.remove(job.id).await;
        } else {
            self.registry.upsert(job).await;
        }
    }
}

/// Fold one normalized status response into the job.
///
/// Returns a result that showed up ahead of `Ready` and was not seen before.
fn apply(
    job: &mut Job,
    normalized: NormalizedResponse,
    partial: &mut Option<String>,
) -> Option<String> {
    let status_reported = normalized.status.is_some();
    match (normalized.job_status(), normalized.result_ref) {
        (Some(JobStatus::Failed), _) => {
            job.mark_failed(normalized.message);
            None
        }
        (Some(JobStatus::Ready), result) => {
            job.mark_ready(result.or_else(|| partial.clone()));
            None
        }
        // A result with no status at all means the artifact is done.
        (None, Some(result)) if !status_reported => {
            job.mark_ready(Some(result));
            None
        }
        // Non-terminal or unrecognised status: the result is only partial.
        (status, Some(result)) => {
            if let Some(status) = status {
                job.observe(status);
            }
            if partial.as_deref() == Some(result.as_str()) {
                return None;
            }
            *partial = Some(result.clone());
            Some(result)
        }
        (Some(status), None) => {
            job.observe(status);
            None
        }
        (None, None) => None,
    }
}

fn outcome(job: &Job, partial: Option<String>) -> PollOutcome {
    PollOutcome {
        status: job.status,
        result_ref: job.result_ref.clone(),
        partial_result: partial,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use personaforge_core::OwnerId;
    use personaforge_providers::{AuthStyle, ProviderCandidateSet, ProviderConfig};

    use super::*;
    use crate::external::{ProviderResponse, ScriptedTransport, TransportError};
    use crate::owner_store::InMemoryOwnerStore;

    struct Harness {
        transport: Arc<ScriptedTransport>,
        store: Arc<InMemoryOwnerStore>,
        poller: StatusPoller<ScriptedTransport, Arc<InMemoryOwnerStore>>,
        owner: OwnerId,
    }

    fn harness(responses: Vec<Result<ProviderResponse, TransportError>>) -> Harness {
        let set = ProviderCandidateSet::new("acme", JobKind::VideoAvatar)
            .with_status_endpoint("http://acme.test/v2/videos/{id}")
            .with_auth_styles(vec![AuthStyle::header("x-api-key")])
            .with_poll_interval(Duration::from_secs(5));
        let mut catalog = ProviderCatalog::new();
        catalog.register(set, ProviderConfig::new("acme").with_api_key("k"));

        let transport = Arc::new(ScriptedTransport::with_responses(responses));
        let store = Arc::new(InMemoryOwnerStore::new());
        let owner = OwnerId::new();
        let mut seed = Metadata::new();
        seed.insert("unrelated".to_string(), json!("keep"));
        store.insert_owner(owner, seed);

        let poller = StatusPoller::new(
            transport.clone(),
            Arc::new(catalog),
            Arc::new(ResultPersister::new(store.clone())),
            JobRegistry::new(),
        );
        Harness {
            transport,
            store,
            poller,
            owner,
        }
    }

    fn ok(body: serde_json::Value) -> Result<ProviderResponse, TransportError> {
        Ok(ProviderResponse::new(200, body.to_string()))
    }

    fn job(h: &Harness) -> Job {
        Job::new(h.owner, "acme", JobKind::VideoAvatar).with_external_id("v-1")
    }

    #[tokio::test(start_paused = true)]
    async fn past_deadline_returns_processing_without_polling() {
        let h = harness(vec![]);
        let mut job = job(&h);

        let out = h.poller.poll(&mut job, Instant::now()).await.unwrap();

        assert_eq!(out.status, JobStatus::Processing);
        assert_eq!(h.transport.request_count().await, 0);
        assert_eq!(job.attempts, 0);
        assert_eq!(job.status, JobStatus::Queued);
    }

    #[tokio::test(start_paused = true)]
    async fn polls_until_ready_and_persists() {
        let h = harness(vec![
            ok(json!({"data": {"status": "queued"}})),
            ok(json!({"data": {"status": "rendering"}})),
            ok(json!({"data": {"status": "completed", "video_url": "https://cdn/v.mp4"}})),
        ]);
        let mut job = job(&h);
        let started = Instant::now();

        let out = h
            .poller
            .poll(&mut job, Instant::now() + Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(out.status, JobStatus::Ready);
        assert_eq!(out.result_ref.as_deref(), Some("https://cdn/v.mp4"));
        assert_eq!(job.attempts, 3);
        assert_eq!(started.elapsed(), Duration::from_secs(10));

        let requests = h.transport.requests().await;
        assert_eq!(requests[0].url, "http://acme.test/v2/videos/v-1");

        let m = h.store.snapshot(h.owner).unwrap();
        assert_eq!(m.get("acme_video_status"), Some(&json!("ready")));
        assert_eq!(m.get("acme_video_result"), Some(&json!("https://cdn/v.mp4")));
        assert_eq!(m.get("unrelated"), Some(&json!("keep")));
        assert!(h.poller.registry().get(job.id).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn early_result_is_persisted_before_ready() {
        let h = harness(vec![ok(json!({
            "status": "processing",
            "video_url": "https://cdn/early.mp4"
        }))]);
        let mut job = job(&h);

        let out = h
            .poller
            .poll(&mut job, Instant::now() + Duration::from_secs(3))
            .await
            .unwrap();

        assert_eq!(out.status, JobStatus::Processing);
        assert_eq!(out.partial_result.as_deref(), Some("https://cdn/early.mp4"));
        assert_eq!(job.status, JobStatus::Processing);
        assert!(job.result_ref.is_none());

        let m = h.store.snapshot(h.owner).unwrap();
        assert_eq!(m.get("acme_video_result"), Some(&json!("https://cdn/early.mp4")));
        assert_eq!(m.get("acme_video_status"), Some(&json!("processing")));
        assert_eq!(h.transport.request_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn early_result_backs_a_bare_ready() {
        let h = harness(vec![
            ok(json!({"status": "processing", "video_url": "https://cdn/early.mp4"})),
            ok(json!({"status": "done"})),
        ]);
        let mut job = job(&h);

        let out = h
            .poller
            .poll(&mut job, Instant::now() + Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(out.status, JobStatus::Ready);
        assert_eq!(out.result_ref.as_deref(), Some("https://cdn/early.mp4"));
    }

    #[tokio::test(start_paused = true)]
    async fn result_under_unknown_status_is_partial_not_ready() {
        let h = harness(vec![
            ok(json!({"status": "uploading", "video_url": "https://cdn/partial.mp4"})),
            ok(json!({"status": "failed", "message": "render crashed"})),
        ]);
        let mut job = job(&h);

        let out = h
            .poller
            .poll(&mut job, Instant::now() + Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(out.status, JobStatus::Failed);
        assert!(out.result_ref.is_none());
        assert_eq!(out.partial_result.as_deref(), Some("https://cdn/partial.mp4"));
        assert_eq!(job.failure_reason.as_deref(), Some("render crashed"));
        assert_eq!(h.transport.request_count().await, 2);

        let m = h.store.snapshot(h.owner).unwrap();
        assert_eq!(m.get("acme_video_status"), Some(&json!("failed")));
        assert_eq!(m.get("acme_video_error"), Some(&json!("render crashed")));
    }

    #[tokio::test(start_paused = true)]
    async fn result_without_any_status_is_ready() {
        let h = harness(vec![ok(json!({"video_url": "https://cdn/v.mp4"}))]);
        let mut job = job(&h);

        let out = h
            .poller
            .poll(&mut job, Instant::now() + Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(out.status, JobStatus::Ready);
        assert_eq!(out.result_ref.as_deref(), Some("https://cdn/v.mp4"));
    }

    #[tokio::test(start_paused = true)]
    async fn settled_jobs_leave_the_registry_pending_ones_stay() {
        let h = harness(vec![
            ok(json!({"status": "processing"})),
            ok(json!({"status": "failed"})),
        ]);
        let mut job = job(&h);

        h.poller
            .poll(&mut job, Instant::now() + Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(h.poller.registry().get(job.id).await.unwrap().status, JobStatus::Processing);

        let out = h
            .poller
            .poll(&mut job, Instant::now() + Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(out.status, JobStatus::Failed);
        assert!(h.poller.registry().is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn provider_failure_is_terminal() {
        let h = harness(vec![ok(json!({"status": "failed", "error": "no face detected"}))]);
        let mut job = job(&h);

        let out = h
            .poller
            .poll(&mut job, Instant::now() + Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(out.status, JobStatus::Failed);
        let m = h.store.snapshot(h.owner).unwrap();
        assert_eq!(m.get("acme_video_status"), Some(&json!("failed")));
        assert_eq!(m.get("acme_video_error"), Some(&json!("no face detected")));
    }

    #[tokio::test(start_paused = true)]
    async fn quota_propagates() {
        let h = harness(vec![Ok(ProviderResponse::new(429, "slow down"))]);
        let mut job = job(&h);

        let err = h
            .poller
            .poll(&mut job, Instant::now() + Duration::from_secs(60))
            .await
            .unwrap_err();

        assert!(matches!(err, PollError::Quota { .. }));
        assert_eq!(job.status, JobStatus::Queued);
    }

    #[tokio::test(start_paused = true)]
    async fn consecutive_exhausted_rounds_give_up() {
        let h = harness(vec![
            Ok(ProviderResponse::new(500, "a")),
            Ok(ProviderResponse::new(502, "b")),
        ]);
        let poller = h.poller.clone().with_max_consecutive_failures(2);
        let mut job = job(&h);

        let err = poller
            .poll(&mut job, Instant::now() + Duration::from_secs(60))
            .await
            .unwrap_err();

        match err {
            PollError::Exhausted { rounds, failures, .. } => {
                assert_eq!(rounds, 2);
                assert_eq!(failures.0[0].reason, "HTTP 502: b");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(job.attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_external_id_is_an_error() {
        let h = harness(vec![]);
        let mut job = Job::new(h.owner, "acme", JobKind::VideoAvatar);

        let err = h
            .poller
            .poll(&mut job, Instant::now() + Duration::from_secs(60))
            .await
            .unwrap_err();
        assert!(matches!(err, PollError::MissingId(id) if id == job.id));
    }
}
