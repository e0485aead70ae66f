//! Ordered candidate probing shared by launch and status polling.

use core::fmt;

use tracing::debug;

use personaforge_providers::{
    Candidate, Classification, NormalizedResponse, ProviderCandidateSet, ResponseNormalizer,
};

use crate::external::{HttpMethod, ProviderRequest, ProviderTransport, RequestBody};

const SNIPPET_CHARS: usize = 200;

/// Why one candidate was passed over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFailure {
    pub endpoint: String,
    pub auth: String,
    pub reason: String,
}

impl fmt::Display for CandidateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.endpoint, self.auth, self.reason)
    }
}

/// Every candidate failure from one exhausted probe, in attempt order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Failures(pub Vec<CandidateFailure>);

impl Failures {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CandidateFailure> {
        self.0.iter()
    }
}

impl fmt::Display for Failures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("no candidates configured");
        }
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{failure}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// A 2xx response the caller's predicate accepted.
    Accepted {
        normalized: NormalizedResponse,
        endpoint: String,
        attempts: usize,
    },
    /// Plan or rate limits: no further candidates were tried.
    Quota {
        endpoint: String,
        message: String,
        attempts: usize,
    },
    /// The provider explicitly rejected the job.
    Rejected {
        endpoint: String,
        status: u16,
        message: String,
        attempts: usize,
    },
    Exhausted { failures: Failures },
}

/// Try `candidates` in order until one is accepted or a terminal rejection stops
/// the sequence.
///
/// Transport errors, retryable HTTP failures and 2xx bodies that `accept`
/// refuses are recorded and the next candidate is tried.
pub async fn probe<T, F>(
    transport: &T,
    set: &ProviderCandidateSet,
    api_key: Option<&str>,
    candidates: &[Candidate<'_>],
    method: HttpMethod,
    body: &RequestBody,
    accept: F,
) -> ProbeOutcome
where
    T: ProviderTransport + ?Sized,
    F: Fn(&NormalizedResponse) -> bool,
{
    let mut failures = Vec::new();

    for (index, candidate) in candidates.iter().enumerate() {
        let attempts = index + 1;
        let request = ProviderRequest {
            method,
            url: candidate.endpoint.clone(),
            auth: candidate.auth.clone(),
            api_key: api_key.map(str::to_string),
            body: body.clone(),
        };

        let fail = |reason: String| CandidateFailure {
            endpoint: candidate.endpoint.clone(),
            auth: candidate.auth.label(),
            reason,
        };

        let response = match transport.send(request).await {
            Ok(r) => r,
            Err(e) => {
                debug!(provider = %set.provider, endpoint = %candidate.endpoint, auth = %candidate.auth, error = %e, "candidate transport error");
                failures.push(fail(e.to_string()));
                continue;
            }
        };

        if response.is_success() {
            let normalized = ResponseNormalizer::normalize_body(set.kind, &response.body);
            if accept(&normalized) {
                debug!(provider = %set.provider, endpoint = %candidate.endpoint, auth = %candidate.auth, attempts, "candidate accepted");
                return ProbeOutcome::Accepted {
                    normalized,
                    endpoint: candidate.endpoint.clone(),
                    attempts,
                };
            }
            debug!(provider = %set.provider, endpoint = %candidate.endpoint, status = response.status, "unrecognized response shape");
            failures.push(fail(format!(
                "HTTP {}: unrecognized response shape",
                response.status
            )));
            continue;
        }

        let message = error_message(set, &response.body);
        match set.classify(response.status, &response.body) {
            Classification::TerminalQuota => {
                return ProbeOutcome::Quota {
                    endpoint: candidate.endpoint.clone(),
                    message,
                    attempts,
                };
            }
            Classification::TerminalFailure => {
                return ProbeOutcome::Rejected {
                    endpoint: candidate.endpoint.clone(),
                    status: response.status,
                    message,
                    attempts,
                };
            }
            Classification::Retryable => {
                debug!(provider = %set.provider, endpoint = %candidate.endpoint, auth = %candidate.auth, status = response.status, "candidate failed");
                failures.push(fail(format!("HTTP {}: {}", response.status, message)));
            }
        }
    }

    ProbeOutcome::Exhausted {
        failures: Failures(failures),
    }
}

/// Provider error text if the body has one, else a bounded snippet of the body.
fn error_message(set: &ProviderCandidateSet, body: &str) -> String {
    let normalized = ResponseNormalizer::normalize_body(set.kind, body);
    match normalized.message {
        Some(m) => m,
        None => body.trim().chars().take(SNIPPET_CHARS).collect(),
    }
}
