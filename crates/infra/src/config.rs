//! Process configuration, read once at startup.

use std::net::SocketAddr;
use std::time::Duration;

use personaforge_providers::config::{parse_flag, parse_secs};
use personaforge_providers::{ConfigError, ProviderCatalog};

use crate::jobs::OrchestratorSettings;

pub const BIND_ADDR: &str = "PERSONAFORGE_BIND_ADDR";
pub const DATABASE_URL: &str = "DATABASE_URL";
pub const CLIENT_DEADLINE_SECS: &str = "PERSONAFORGE_CLIENT_DEADLINE_SECS";
pub const BACKGROUND_CEILING_SECS: &str = "PERSONAFORGE_BACKGROUND_CEILING_SECS";
pub const HTTP_TIMEOUT_SECS: &str = "PERSONAFORGE_HTTP_TIMEOUT_SECS";
pub const RECONCILE_INTERVAL_SECS: &str = "PERSONAFORGE_RECONCILE_INTERVAL_SECS";
pub const EXPOSE_CREDENTIALS: &str = "PERSONAFORGE_EXPOSE_CREDENTIALS";

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// Postgres owner store when set; in-memory otherwise.
    pub database_url: Option<String>,
    pub settings: OrchestratorSettings,
    pub http_timeout: Duration,
    /// Reconciliation sweep period; the sweep is off when unset.
    pub reconcile_interval: Option<Duration>,
    /// Dev-only: hand provider API keys to callers. Never enable in production.
    pub expose_credentials: bool,
    pub catalog: ProviderCatalog,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let secs = |key: &str| get(key).map(|raw| parse_secs(key, &raw)).transpose();

        let bind_raw = get(BIND_ADDR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue {
                key: BIND_ADDR.to_string(),
                value: bind_raw.clone(),
                reason: e.to_string(),
            })?;

        let defaults = OrchestratorSettings::default();
        let settings = OrchestratorSettings {
            client_deadline: secs(CLIENT_DEADLINE_SECS)?.unwrap_or(defaults.client_deadline),
            background_ceiling: secs(BACKGROUND_CEILING_SECS)?
                .unwrap_or(defaults.background_ceiling),
            max_consecutive_failures: defaults.max_consecutive_failures,
        };

        let expose_credentials = match get(EXPOSE_CREDENTIALS) {
            Some(raw) => parse_flag(EXPOSE_CREDENTIALS, &raw)?,
            None => false,
        };

        Ok(Self {
            bind_addr,
            database_url: get(DATABASE_URL),
            settings,
            http_timeout: secs(HTTP_TIMEOUT_SECS)?.unwrap_or(Duration::from_secs(60)),
            reconcile_interval: secs(RECONCILE_INTERVAL_SECS)?.filter(|d| !d.is_zero()),
            expose_credentials,
            catalog: ProviderCatalog::from_lookup(&lookup)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use personaforge_core::JobKind;

    use super::*;

    fn config(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.bind_addr.to_string(), "0.0.0.0:8080");
        assert!(cfg.database_url.is_none());
        assert_eq!(cfg.settings.client_deadline, Duration::from_secs(25));
        assert_eq!(cfg.settings.background_ceiling, Duration::from_secs(900));
        assert_eq!(cfg.http_timeout, Duration::from_secs(60));
        assert!(cfg.reconcile_interval.is_none());
        assert!(!cfg.expose_credentials);
        assert!(cfg.catalog.for_kind(JobKind::FaceEmbedding).is_some());
    }

    #[test]
    fn explicit_values_override_defaults() {
        let cfg = config(&[
            (BIND_ADDR, "127.0.0.1:3000"),
            (DATABASE_URL, "postgres://localhost/personas"),
            (CLIENT_DEADLINE_SECS, "10"),
            (BACKGROUND_CEILING_SECS, "120"),
            (RECONCILE_INTERVAL_SECS, "300"),
            (EXPOSE_CREDENTIALS, "true"),
            ("SIMLI_API_KEY", "sk-simli"),
        ])
        .unwrap();

        assert_eq!(cfg.bind_addr.port(), 3000);
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://localhost/personas"));
        assert_eq!(cfg.settings.client_deadline, Duration::from_secs(10));
        assert_eq!(cfg.settings.background_ceiling, Duration::from_secs(120));
        assert_eq!(cfg.reconcile_interval, Some(Duration::from_secs(300)));
        assert!(cfg.expose_credentials);
        assert_eq!(cfg.catalog.config("simli").unwrap().api_key.as_deref(), Some("sk-simli"));
    }

    #[test]
    fn malformed_values_are_errors() {
        assert!(config(&[(CLIENT_DEADLINE_SECS, "ten")]).is_err());
        assert!(config(&[(BIND_ADDR, "nowhere")]).is_err());
        assert!(config(&[(EXPOSE_CREDENTIALS, "sometimes")]).is_err());
    }
}
