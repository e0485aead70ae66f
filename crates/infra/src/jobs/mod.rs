//! External job orchestration.
//!
//! ## Flow
//!
//! - `JobLauncher` submits a creation request, probing candidate endpoints and
//!   auth styles in order
//! - `StatusPoller` polls until a terminal state or the client deadline
//! - `BackgroundContinuation` takes over pending jobs on a spawned task,
//!   bounded by an absolute ceiling
//! - `ResultPersister` merges results into the owner record as they arrive
//! - `Reconciler` (opt-in) resumes jobs left pending after a ceiling expiry
//!   or a restart
//!
//! `Orchestrator` wires these together behind `submit` and `status`.

pub mod continuation;
pub mod launcher;
pub mod orchestrator;
pub mod poller;
pub mod probe;
pub mod reconcile;
pub mod registry;

pub use continuation::{BackgroundContinuation, InFlight, InFlightGuard};
pub use launcher::{JobLauncher, JobPayload, LaunchError};
pub use orchestrator::{
    GetJobStatus, LaunchJobRequest, Orchestrator, OrchestratorError, OrchestratorSettings,
    StatusSource, StatusView, SubmitOutcome,
};
pub use poller::{PollError, PollOutcome, StatusPoller, DEFAULT_MAX_CONSECUTIVE_FAILURES};
pub use probe::{probe, CandidateFailure, Failures, ProbeOutcome};
pub use reconcile::{Reconciler, SweepReport};
pub use registry::JobRegistry;
