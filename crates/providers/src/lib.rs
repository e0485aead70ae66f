//! `personaforge-providers`
//!
//! **Responsibility:** the provider boundary, expressed as data.
//!
//! This crate describes *what to try* against an external provider and how to
//! read what comes back:
//! - candidate endpoints × authentication styles ([`ProviderCandidateSet`]),
//! - response classification (retryable vs. quota vs. explicit failure),
//! - heuristic response normalization ([`ResponseNormalizer`]).
//!
//! It performs no I/O. Sending requests lives in `personaforge-infra`.

pub mod auth;
pub mod candidate;
pub mod catalog;
pub mod config;
pub mod normalize;

pub use auth::AuthStyle;
pub use candidate::{Candidate, Classification, ProviderCandidateSet};
pub use catalog::ProviderCatalog;
pub use config::{ConfigError, ProviderConfig};
pub use normalize::{NormalizedResponse, ResponseNormalizer};
