//! Detached polling for jobs that outlive the client-facing request.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};

use personaforge_core::Job;

use super::poller::StatusPoller;
use crate::external::ProviderTransport;
use crate::owner_store::OwnerStore;

/// Jobs currently being polled, keyed by provider and provider id.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    keys: Arc<Mutex<HashSet<String>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `job`; `None` if something else is already polling it.
    pub fn claim(&self, job: &Job) -> Option<InFlightGuard> {
        let key = flight_key(job);
        let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        if !keys.insert(key.clone()) {
            return None;
        }
        Some(InFlightGuard {
            keys: self.keys.clone(),
            key,
        })
    }

    pub fn contains(&self, job: &Job) -> bool {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&flight_key(job))
    }

    pub fn len(&self) -> usize {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Releases the claim on drop.
#[derive(Debug)]
pub struct InFlightGuard {
    keys: Arc<Mutex<HashSet<String>>>,
    key: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

fn flight_key(job: &Job) -> String {
    match &job.external_id {
        Some(id) => format!("{}:{}", job.provider, id),
        None => format!("{}:{}", job.provider, job.id),
    }
}

/// Keeps polling handed-off jobs on a spawned task, bounded by an absolute ceiling.
pub struct BackgroundContinuation<T: ?Sized, S> {
    poller: StatusPoller<T, S>,
    in_flight: InFlight,
}

impl<T: ?Sized, S> Clone for BackgroundContinuation<T, S> {
    fn clone(&self) -> Self {
        Self {
            poller: self.poller.clone(),
            in_flight: self.in_flight.clone(),
        }
    }
}

impl<T, S> BackgroundContinuation<T, S>
where
    T: ProviderTransport + ?Sized + 'static,
    S: OwnerStore + 'static,
{
    pub fn new(poller: StatusPoller<T, S>) -> Self {
        Self {
            poller,
            in_flight: InFlight::new(),
        }
    }

    pub fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    /// Spawn a polling task for `job` and return immediately.
    ///
    /// Returns `None` (and spawns nothing) if the job is already being polled.
    /// The task persists whatever it observes; ceiling expiry and poll errors
    /// end it with a log line and nothing else.
    pub fn continue_in_background(&self, job: Job, ceiling: Duration) -> Option<JoinHandle<()>> {
        let Some(guard) = self.in_flight.claim(&job) else {
            warn!(job_id = %job.id, provider = %job.provider, external_id = ?job.external_id, "job already being polled; handoff refused");
            return None;
        };

        info!(
            job_id = %job.id,
            owner_id = %job.owner_id,
            provider = %job.provider,
            external_id = ?job.external_id,
            ceiling_secs = ceiling.as_secs(),
            "job handed off to background polling"
        );

        let poller = self.poller.clone();
        Some(tokio::spawn(async move {
            let _guard = guard;
            let mut job = job;
            let deadline = Instant::now() + ceiling;

            match poller.poll(&mut job, deadline).await {
                Ok(outcome) if outcome.is_terminal() => {
                    info!(job_id = %job.id, status = %outcome.status, result_ref = ?outcome.result_ref, "background job finished");
                }
                Ok(outcome) => {
                    warn!(
                        job_id = %job.id,
                        provider = %job.provider,
                        status = %job.status,
                        partial_result = ?outcome.partial_result,
                        "background ceiling reached; polling stopped"
                    );
                }
                Err(e) => {
                    warn!(job_id = %job.id, provider = %job.provider, error = %e, "background polling stopped");
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use personaforge_core::{JobKind, JobStatus, Metadata, OwnerId};
    use personaforge_providers::{AuthStyle, ProviderCandidateSet, ProviderCatalog, ProviderConfig};

    use super::*;
    use crate::external::ScriptedTransport;
    use crate::jobs::JobRegistry;
    use crate::owner_store::InMemoryOwnerStore;
    use crate::persister::ResultPersister;

    type Continuation = BackgroundContinuation<ScriptedTransport, Arc<InMemoryOwnerStore>>;

    fn setup() -> (Arc<ScriptedTransport>, Arc<InMemoryOwnerStore>, Continuation, OwnerId) {
        let set = ProviderCandidateSet::new("acme", JobKind::LipsyncVideo)
            .with_status_endpoint("http://acme.test/v2/generate/{id}")
            .with_auth_styles(vec![AuthStyle::header("x-api-key")])
            .with_poll_interval(Duration::from_secs(5));
        let mut catalog = ProviderCatalog::new();
        catalog.register(set, ProviderConfig::new("acme"));

        let transport = Arc::new(ScriptedTransport::new());
        let store = Arc::new(InMemoryOwnerStore::new());
        let owner = OwnerId::new();
        store.insert_owner(owner, Metadata::new());

        let poller = StatusPoller::new(
            transport.clone(),
            Arc::new(catalog),
            Arc::new(ResultPersister::new(store.clone())),
            JobRegistry::new(),
        );
        (transport, store, BackgroundContinuation::new(poller), owner)
    }

    #[tokio::test(start_paused = true)]
    async fn background_task_persists_the_result() {
        let (transport, store, continuation, owner) = setup();
        transport.push_json(200, json!({"status": "processing"})).await;
        transport
            .push_json(200, json!({"status": "completed", "output_url": "https://cdn/lip.mp4"}))
            .await;

        let job = Job::new(owner, "acme", JobKind::LipsyncVideo).with_external_id("g-1");
        let handle = continuation
            .continue_in_background(job, Duration::from_secs(900))
            .unwrap();
        handle.await.unwrap();

        let m = store.snapshot(owner).unwrap();
        assert_eq!(m.get("acme_lipsync_status"), Some(&json!("ready")));
        assert_eq!(m.get("acme_lipsync_result"), Some(&json!("https://cdn/lip.mp4")));
        assert!(continuation.in_flight().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn second_handoff_is_refused_while_running() {
        let (transport, _store, continuation, owner) = setup();
        for _ in 0..3 {
            transport.push_json(200, json!({"status": "processing"})).await;
        }

        let job = Job::new(owner, "acme", JobKind::LipsyncVideo).with_external_id("g-2");
        let first = continuation
            .continue_in_background(job.clone(), Duration::from_secs(12))
            .unwrap();
        assert!(continuation.in_flight().contains(&job));
        assert!(continuation
            .continue_in_background(job.clone(), Duration::from_secs(12))
            .is_none());

        first.await.unwrap();
        assert!(!continuation.in_flight().contains(&job));
    }

    #[tokio::test(start_paused = true)]
    async fn ceiling_expiry_stops_silently() {
        let (transport, store, continuation, owner) = setup();
        for _ in 0..3 {
            transport.push_json(200, json!({"status": "running"})).await;
        }

        let job = Job::new(owner, "acme", JobKind::LipsyncVideo).with_external_id("g-3");
        let started = Instant::now();
        continuation
            .continue_in_background(job, Duration::from_secs(12))
            .unwrap()
            .await
            .unwrap();

        assert_eq!(started.elapsed(), Duration::from_secs(12));
        assert_eq!(transport.request_count().await, 3);
        let m = store.snapshot(owner).unwrap();
        assert_eq!(m.get("acme_lipsync_status"), Some(&json!(JobStatus::Processing.as_str())));
        assert!(!m.contains_key("acme_lipsync_result"));
    }
}
