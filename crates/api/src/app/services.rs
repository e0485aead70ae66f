//! Service wiring: transport, owner store and the orchestrator behind the routes.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use personaforge_infra::external::{ProviderTransport, ReqwestTransport, TransportError};
use personaforge_infra::{
    AppConfig, InMemoryOwnerStore, Orchestrator, OwnerStore, OwnerStoreError, PostgresOwnerStore,
};

/// Orchestrator as the API holds it: provider transport and owner store behind trait objects.
pub type AppOrchestrator = Orchestrator<dyn ProviderTransport, Arc<dyn OwnerStore>>;

pub struct AppServices {
    pub orchestrator: AppOrchestrator,
    /// Dev-only credential endpoint switch.
    pub expose_credentials: bool,
}

impl AppServices {
    pub fn new(orchestrator: AppOrchestrator, expose_credentials: bool) -> Self {
        Self {
            orchestrator,
            expose_credentials,
        }
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("http client: {0}")]
    Transport(#[from] TransportError),

    #[error("owner store: {0}")]
    Store(#[from] OwnerStoreError),
}

/// Build services from configuration.
///
/// `DATABASE_URL` selects the Postgres owner store; without it owner records
/// live in memory and vanish on restart.
pub async fn build_services(config: &AppConfig) -> Result<AppServices, StartupError> {
    let transport: Arc<dyn ProviderTransport> =
        Arc::new(ReqwestTransport::new(config.http_timeout)?);

    let store: Arc<dyn OwnerStore> = match config.database_url.as_deref() {
        Some(url) => {
            let store = PostgresOwnerStore::connect(url).await?;
            store.ensure_schema().await?;
            info!("using postgres owner store");
            Arc::new(store)
        }
        None => {
            warn!("DATABASE_URL not set; owner records are kept in memory");
            Arc::new(InMemoryOwnerStore::new())
        }
    };

    for set in config.catalog.sets() {
        let has_key = config
            .catalog
            .config(&set.provider)
            .is_some_and(|c| c.api_key.is_some());
        if !has_key {
            warn!(provider = %set.provider, kind = %set.kind, "no API key configured");
        }
    }
    if config.expose_credentials {
        warn!("credential exposure is enabled; do not run this in production");
    }

    let orchestrator = Orchestrator::new(
        transport,
        Arc::new(config.catalog.clone()),
        store,
        config.settings,
    );
    Ok(AppServices::new(orchestrator, config.expose_credentials))
}
