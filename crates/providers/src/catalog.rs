//! Built-in provider adapters.
//!
//! Provider APIs are versioned inconsistently, so every adapter lists several
//! endpoint shapes (`/v2/...`, `/v1/...`, unversioned) and several auth styles.

use std::collections::HashMap;
use std::time::Duration;

use personaforge_core::{JobKind, MetadataKeys};

use crate::auth::AuthStyle;
use crate::candidate::ProviderCandidateSet;
use crate::config::{ConfigError, ProviderConfig};

pub const SIMLI: &str = "simli";
pub const HEYGEN: &str = "heygen";
pub const SYNCLABS: &str = "synclabs";
pub const ELEVENLABS: &str = "elevenlabs";

pub const BUILTIN_PROVIDERS: [&str; 4] = [SIMLI, HEYGEN, SYNCLABS, ELEVENLABS];

/// Registered provider adapters plus their injected configuration.
#[derive(Debug, Clone, Default)]
pub struct ProviderCatalog {
    sets: Vec<ProviderCandidateSet>,
    configs: HashMap<String, ProviderConfig>,
}

impl ProviderCatalog {
    /// Empty catalog; use [`ProviderCatalog::register`] to add adapters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in adapters configured from a settings lookup (usually the environment).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let configs = BUILTIN_PROVIDERS
            .iter()
            .map(|p| ProviderConfig::from_lookup(p, &lookup))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::builtin(configs))
    }

    /// Built-in adapters with explicit configuration; providers without a config
    /// get defaults (and no API key).
    pub fn builtin(configs: impl IntoIterator<Item = ProviderConfig>) -> Self {
        let mut configs: HashMap<String, ProviderConfig> = configs
            .into_iter()
            .map(|c| (c.provider.clone(), c))
            .collect();

        let mut catalog = Self::new();
        for provider in BUILTIN_PROVIDERS {
            let config = configs
                .remove(provider)
                .unwrap_or_else(|| ProviderConfig::new(provider));
            let set = match provider {
                SIMLI => simli(&config),
                HEYGEN => heygen(&config),
                SYNCLABS => synclabs(&config),
                _ => elevenlabs(&config),
            };
            catalog.register(set, config);
        }
        catalog
    }

    /// Register (or replace) an adapter.
    pub fn register(&mut self, set: ProviderCandidateSet, config: ProviderConfig) {
        self.sets
            .retain(|s| !(s.provider == set.provider && s.kind == set.kind));
        self.configs.insert(set.provider.clone(), config);
        self.sets.push(set);
    }

    /// The adapter that handles a kind (first registered wins).
    pub fn for_kind(&self, kind: JobKind) -> Option<&ProviderCandidateSet> {
        self.sets.iter().find(|s| s.kind == kind)
    }

    pub fn get(&self, provider: &str, kind: JobKind) -> Option<&ProviderCandidateSet> {
        self.sets
            .iter()
            .find(|s| s.provider == provider && s.kind == kind)
    }

    pub fn config(&self, provider: &str) -> Option<&ProviderConfig> {
        self.configs.get(provider)
    }

    pub fn sets(&self) -> impl Iterator<Item = &ProviderCandidateSet> {
        self.sets.iter()
    }
}

fn simli(config: &ProviderConfig) -> ProviderCandidateSet {
    let base = "https://api.simli.ai";
    let keys = MetadataKeys::for_provider(SIMLI, JobKind::FaceEmbedding)
        .with_result_key("simli_face_id")
        .with_external_id_key("simli_character_uid");

    ProviderCandidateSet::new(SIMLI, JobKind::FaceEmbedding)
        .with_create_endpoint(endpoint(config, base, "/faceid/generate"))
        .with_create_endpoint(endpoint(config, base, "/v2/faceid/generate"))
        .with_create_endpoint(endpoint(config, base, "/v1/faceid/generate"))
        .with_status_endpoint(endpoint(config, base, "/faceid/status/{id}"))
        .with_status_endpoint(endpoint(config, base, "/v1/faceid/status/{id}"))
        .with_auth_styles(vec![
            AuthStyle::header("x-simli-api-key"),
            AuthStyle::query("apiKey"),
            AuthStyle::Bearer,
        ])
        .with_poll_interval(poll_interval(config, 8))
        .with_metadata_keys(keys)
}

fn heygen(config: &ProviderConfig) -> ProviderCandidateSet {
    let base = "https://api.heygen.com";
    ProviderCandidateSet::new(HEYGEN, JobKind::VideoAvatar)
        .with_create_endpoint(endpoint(config, base, "/v2/video/generate"))
        .with_create_endpoint(endpoint(config, base, "/v1/video.generate"))
        .with_status_endpoint(endpoint(config, base, "/v1/video_status.get?video_id={id}"))
        .with_status_endpoint(endpoint(config, base, "/v2/videos/{id}"))
        .with_auth_styles(vec![AuthStyle::header("x-api-key"), AuthStyle::Bearer])
        .with_poll_interval(poll_interval(config, 15))
}

fn synclabs(config: &ProviderConfig) -> ProviderCandidateSet {
    let base = "https://api.sync.so";
    ProviderCandidateSet::new(SYNCLABS, JobKind::LipsyncVideo)
        .with_create_endpoint(endpoint(config, base, "/v2/generate"))
        .with_create_endpoint(endpoint(config, base, "/v1/lipsync"))
        .with_status_endpoint(endpoint(config, base, "/v2/generate/{id}"))
        .with_status_endpoint(endpoint(config, base, "/v1/lipsync/{id}"))
        .with_auth_styles(vec![AuthStyle::header("x-api-key"), AuthStyle::Bearer])
        .with_poll_interval(poll_interval(config, 10))
}

fn elevenlabs(config: &ProviderConfig) -> ProviderCandidateSet {
    let base = "https://api.elevenlabs.io";
    ProviderCandidateSet::new(ELEVENLABS, JobKind::VoiceClone)
        .with_create_endpoint(endpoint(config, base, "/v1/voices/add"))
        .with_status_endpoint(endpoint(config, base, "/v1/voices/{id}"))
        .with_auth_styles(vec![AuthStyle::header("xi-api-key")])
        .with_failure_statuses(vec![422])
        .with_poll_interval(poll_interval(config, 30))
}

fn endpoint(config: &ProviderConfig, default_base: &str, path: &str) -> String {
    let base = config.base_url.as_deref().unwrap_or(default_base);
    format!("{}{}", base.trim_end_matches('/'), path)
}

fn poll_interval(config: &ProviderConfig, default_secs: u64) -> Duration {
    config
        .poll_interval
        .unwrap_or(Duration::from_secs(default_secs))
}
