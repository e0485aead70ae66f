//! Explicit per-provider configuration.
//!
//! Values are read through a caller-supplied lookup (usually the process
//! environment) once, at startup, and injected into the catalog. Nothing in the
//! orchestration path reads the environment itself.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// Settings for one provider.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider: String,
    pub api_key: Option<String>,
    /// Replaces the default scheme+host; versioned paths are preserved.
    pub base_url: Option<String>,
    /// Fallback result (e.g. a default face or avatar id) for owners without one.
    pub default_result: Option<String>,
    pub poll_interval: Option<Duration>,
}

impl core::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("default_result", &self.default_result)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl ProviderConfig {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            ..Default::default()
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_default_result(mut self, result: impl Into<String>) -> Self {
        self.default_result = Some(result.into());
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Read `<PROVIDER>_API_KEY`, `<PROVIDER>_BASE_URL`, `<PROVIDER>_DEFAULT_ID`
    /// and `<PROVIDER>_POLL_INTERVAL_SECS`.
    pub fn from_lookup<F>(provider: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let prefix = provider.to_ascii_uppercase();
        let get = |suffix: &str| {
            lookup(&format!("{prefix}_{suffix}"))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let poll_key = format!("{prefix}_POLL_INTERVAL_SECS");
        let poll_interval = match get("POLL_INTERVAL_SECS") {
            Some(raw) => Some(parse_secs(&poll_key, &raw)?),
            None => None,
        };

        Ok(Self {
            provider: provider.to_string(),
            api_key: get("API_KEY"),
            base_url: get("BASE_URL").map(|u| u.trim_end_matches('/').to_string()),
            default_result: get("DEFAULT_ID"),
            poll_interval,
        })
    }
}

/// Parse a whole number of seconds.
pub fn parse_secs(key: &str, raw: &str) -> Result<Duration, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
            reason: e.to_string(),
        })
}

/// Parse a boolean flag; only `true`/`1`/`yes`/`on` enable it.
pub fn parse_flag(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}
