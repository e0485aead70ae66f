//! Owner metadata bag and the key namespace jobs write into.

use serde::{Deserialize, Serialize};

use crate::job::JobKind;

/// Loosely-typed key/value bag attached to an owner record.
///
/// Shared by every job of one owner; a job only ever writes its own keys.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Keys a provider/kind pair owns inside [`Metadata`].
///
/// Namespaced as `<provider>_<slug>_<field>` so jobs of different kinds sharing
/// one owner never collide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataKeys {
    pub status: String,
    pub result: String,
    pub external_id: String,
    pub error: String,
}

impl MetadataKeys {
    pub fn for_provider(provider: &str, kind: JobKind) -> Self {
        let prefix = format!("{}_{}", provider, kind.slug());
        Self {
            status: format!("{prefix}_status"),
            result: format!("{prefix}_result"),
            external_id: format!("{prefix}_id"),
            error: format!("{prefix}_error"),
        }
    }

    /// Override where the result lands (some providers have a historical key name).
    pub fn with_result_key(mut self, key: impl Into<String>) -> Self {
        self.result = key.into();
        self
    }

    /// Override where the provider-assigned id lands.
    pub fn with_external_id_key(mut self, key: impl Into<String>) -> Self {
        self.external_id = key.into();
        self
    }
}
