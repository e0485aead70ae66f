//! Infrastructure layer: provider HTTP, job orchestration, owner storage, config.

pub mod config;
pub mod external;
pub mod jobs;
pub mod owner_store;
pub mod persister;


pub use config::AppConfig;
pub use jobs::{
    BackgroundContinuation, GetJobStatus, JobLauncher, JobPayload, JobRegistry, LaunchError,
    LaunchJobRequest, Orchestrator, OrchestratorError, OrchestratorSettings, PollError,
    Reconciler, StatusPoller, StatusSource, StatusView, SubmitOutcome,
};
pub use owner_store::{InMemoryOwnerStore, OwnerStore, OwnerStoreError, PostgresOwnerStore};
pub use persister::{PersistError, PersistOutcome, ResultPersister};
