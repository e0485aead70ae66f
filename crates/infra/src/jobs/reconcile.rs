//! Periodic re-polling of jobs left pending in owner records.
//!
//! A background task that hits its ceiling (or a process restart) leaves the
//! owner record saying `queued`/`processing` forever. The sweep finds those
//! records and hands them back to [`BackgroundContinuation`].

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use personaforge_core::Job;
use personaforge_providers::ProviderCatalog;

use super::continuation::BackgroundContinuation;
use super::orchestrator::persisted_view;
use super::registry::JobRegistry;
use crate::external::ProviderTransport;
use crate::owner_store::{OwnerStore, OwnerStoreError};
use crate::persister::ResultPersister;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub owners_scanned: usize,
    pub pending_found: usize,
    pub resumed: usize,
}

pub struct Reconciler<T: ?Sized, S> {
    continuation: BackgroundContinuation<T, S>,
    catalog: Arc<ProviderCatalog>,
    persister: Arc<ResultPersister<S>>,
    registry: JobRegistry,
    ceiling: Duration,
}

impl<T: ?Sized, S> Clone for Reconciler<T, S> {
    fn clone(&self) -> Self {
        Self {
            continuation: self.continuation.clone(),
            catalog: self.catalog.clone(),
            persister: self.persister.clone(),
            registry: self.registry.clone(),
            ceiling: self.ceiling,
        }
    }
}

impl<T, S> Reconciler<T, S>
where
    T: ProviderTransport + ?Sized + 'static,
    S: OwnerStore + 'static,
{
    pub fn new(
        continuation: BackgroundContinuation<T, S>,
        catalog: Arc<ProviderCatalog>,
        persister: Arc<ResultPersister<S>>,
        registry: JobRegistry,
        ceiling: Duration,
    ) -> Self {
        Self {
            continuation,
            catalog,
            persister,
            registry,
            ceiling,
        }
    }

    /// Scan every owner once and resume pending jobs nobody is polling.
    pub async fn sweep(&self) -> Result<SweepReport, OwnerStoreError> {
        let store = self.persister.store();
        let mut report = SweepReport::default();

        for owner_id in store.owners().await? {
            let Some(metadata) = store.load(owner_id).await? else {
                continue;
            };
            report.owners_scanned += 1;

            for set in self.catalog.sets() {
                let Some(view) =
                    persisted_view(&metadata, &set.provider, set.kind, &set.metadata_keys)
                else {
                    continue;
                };
                if view.status.is_terminal() {
                    continue;
                }
                let Some(external_id) = view.external_id else {
                    continue;
                };
                report.pending_found += 1;

                let job = match self.registry.find_external(&set.provider, &external_id).await {
                    Some(job) => job,
                    None => {
                        let mut job = Job::new(owner_id, set.provider.clone(), set.kind)
                            .with_external_id(external_id);
                        job.observe(view.status);
                        job
                    }
                };
                if job.is_terminal() || self.continuation.in_flight().contains(&job) {
                    debug!(job_id = %job.id, provider = %job.provider, "pending job already handled");
                    continue;
                }

                if self
                    .continuation
                    .continue_in_background(job, self.ceiling)
                    .is_some()
                {
                    report.resumed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Run [`Reconciler::sweep`] every `period`, starting one period from now.
    pub fn spawn_periodic(self, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match self.sweep().await {
                    Ok(report) if report.resumed > 0 => {
                        info!(
                            owners = report.owners_scanned,
                            pending = report.pending_found,
                            resumed = report.resumed,
                            "reconciliation sweep resumed jobs"
                        );
                    }
                    Ok(report) => {
                        debug!(owners = report.owners_scanned, pending = report.pending_found, "reconciliation sweep found nothing to resume");
                    }
                    Err(e) => warn!(error = %e, "reconciliation sweep failed"),
                }
            }
        })
    }
}
