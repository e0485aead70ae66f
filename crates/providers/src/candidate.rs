//! Declarative candidate sets: what to try, and how to read a rejection.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use personaforge_core::{JobKind, MetadataKeys};

use crate::auth::AuthStyle;

/// Placeholder substituted with the percent-encoded provider job id in status
/// endpoint templates.
pub const ID_PLACEHOLDER: &str = "{id}";

/// One (endpoint, auth style) combination attempted during probing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate<'a> {
    pub endpoint: String,
    pub auth: &'a AuthStyle,
}

/// How a non-2xx provider response should be treated.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Try the next candidate.
    Retryable,
    /// The provider explicitly rejected the job; stop.
    TerminalFailure,
    /// Plan or rate limits; the rejection applies to the whole provider. Stop.
    TerminalQuota,
}

/// Static probing configuration for one provider and job kind.
///
/// This is data, not behavior: adding an endpoint or an auth style never
/// touches the probing routine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderCandidateSet {
    pub provider: String,
    pub kind: JobKind,
    /// Creation endpoints, in the order they are tried.
    pub create_endpoints: Vec<String>,
    /// Status endpoint templates containing [`ID_PLACEHOLDER`].
    pub status_endpoints: Vec<String>,
    /// Auth styles, in the order they are tried for every endpoint.
    pub auth_styles: Vec<AuthStyle>,
    /// HTTP statuses that always mean plan/rate limits.
    pub quota_statuses: Vec<u16>,
    /// Case-insensitive body fragments that turn any non-2xx into a quota signal.
    pub quota_markers: Vec<String>,
    /// HTTP statuses that explicitly reject a job (empty by default).
    pub failure_statuses: Vec<u16>,
    /// Delay between status polls.
    pub poll_interval: Duration,
    /// Where results for this provider/kind land in owner metadata.
    pub metadata_keys: MetadataKeys,
}

impl ProviderCandidateSet {
    pub fn new(provider: impl Into<String>, kind: JobKind) -> Self {
        let provider = provider.into();
        let metadata_keys = MetadataKeys::for_provider(&provider, kind);
        Self {
            provider,
            kind,
            create_endpoints: Vec::new(),
            status_endpoints: Vec::new(),
            auth_styles: vec![AuthStyle::Bearer],
            quota_statuses: vec![402, 429],
            quota_markers: vec![
                "quota".to_string(),
                "rate limit".to_string(),
                "insufficient credit".to_string(),
                "plan limit".to_string(),
            ],
            failure_statuses: Vec::new(),
            poll_interval: Duration::from_secs(10),
            metadata_keys,
        }
    }

    pub fn with_create_endpoint(mut self, url: impl Into<String>) -> Self {
        self.create_endpoints.push(url.into());
        self
    }

    pub fn with_status_endpoint(mut self, template: impl Into<String>) -> Self {
        self.status_endpoints.push(template.into());
        self
    }

    pub fn with_auth_styles(mut self, styles: Vec<AuthStyle>) -> Self {
        self.auth_styles = styles;
        self
    }

    pub fn with_quota_statuses(mut self, statuses: Vec<u16>) -> Self {
        self.quota_statuses = statuses;
        self
    }

    pub fn with_failure_statuses(mut self, statuses: Vec<u16>) -> Self {
        self.failure_statuses = statuses;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_metadata_keys(mut self, keys: MetadataKeys) -> Self {
        self.metadata_keys = keys;
        self
    }

    /// Creation candidates: endpoint-major cross product with the auth styles.
    pub fn create_candidates(&self) -> Vec<Candidate<'_>> {
        self.cross(self.create_endpoints.iter().cloned())
    }

    /// Status candidates for a provider job id.
    pub fn status_candidates(&self, external_id: &str) -> Vec<Candidate<'_>> {
        self.cross(
            self.status_endpoints
                .iter()
                .map(|t| t.replace(ID_PLACEHOLDER, &urlencoding::encode(external_id))),
        )
    }

    fn cross(&self, endpoints: impl Iterator<Item = String>) -> Vec<Candidate<'_>> {
        endpoints
            .flat_map(|endpoint| {
                self.auth_styles.iter().map(move |auth| Candidate {
                    endpoint: endpoint.clone(),
                    auth,
                })
            })
            .collect()
    }

    /// Classify a non-2xx response.
    pub fn classify(&self, status: u16, body: &str) -> Classification {
        if self.quota_statuses.contains(&status) {
            return Classification::TerminalQuota;
        }
        let body = body.to_ascii_lowercase();
        if self
            .quota_markers
            .iter()
            .any(|m| !m.is_empty() && body.contains(&m.to_ascii_lowercase()))
        {
            return Classification::TerminalQuota;
        }
        if self.failure_statuses.contains(&status) {
            return Classification::TerminalFailure;
        }
        Classification::Retryable
    }
}
