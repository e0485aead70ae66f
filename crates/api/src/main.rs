use std::sync::Arc;

use anyhow::Context;

use personaforge_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    personaforge_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let services = personaforge_api::app::services::build_services(&config)
        .await
        .context("failed to build services")?;

    if let Some(period) = config.reconcile_interval {
        tracing::info!(period_secs = period.as_secs(), "starting reconciler");
        let _reconciler = services.orchestrator.reconciler().spawn_periodic(period);
    }

    let app = personaforge_api::app::build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
