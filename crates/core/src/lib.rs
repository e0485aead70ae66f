//! `personaforge-core`: domain building blocks for external media jobs.
//!
//! This crate contains **pure domain** primitives (no I/O, no provider wire
//! formats): identifiers, the job state machine and metadata key naming.

pub mod error;
pub mod id;
pub mod job;
pub mod metadata;

pub use error::DomainError;
pub use id::{JobId, OwnerId};
pub use job::{Job, JobKind, JobStatus};
pub use metadata::{Metadata, MetadataKeys};
