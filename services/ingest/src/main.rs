use std::sync::Arc;

use anyhow::Context;
use crmirror_common::clock::SystemClock;
use crmirror_config::{init_tracing, AppConfig};
use crmirror_db::mirror::pg_repository::PgMirrorRepository;
use crmirror_db::owners::pg_repository::PgOwnerRepository;
use crmirror_db::sync::models::{ObjectType, TriggeredBy};
use crmirror_db::sync::pg_repository::PgSyncRunRepository;
use crmirror_ingest::{
    Connector, CrmClient, CrmClientConfig, IngestConfig, SyncOrchestrator, SyncRequest,
};

/// One pass over every object type in dependency order. A failed type does not stop the rest.
async fn run_pass(connector: &dyn Connector, ingest: &IngestConfig) {
    for object_type in ObjectType::ALL {
        let request = SyncRequest {
            object_type,
            mode: ingest.mode,
            triggered_by: TriggeredBy::Cron,
        };
        match connector.sync(request).await {
            Ok(run) => tracing::info!(
                %object_type,
                run_id = %run.id,
                status = run.status.as_str(),
                "object type synced"
            ),
            Err(e) => tracing::error!(%object_type, error = %e, "object type sync failed"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing("info");

    let config = AppConfig::from_env().context("failed to load config")?;
    let ingest = IngestConfig::from_env().context("failed to load ingest config")?;
    let crm_config = CrmClientConfig::from_env()
        .context("failed to load crm config")?
        .context("CRM_ACCESS_TOKEN must be set for the ingest worker")?;

    tracing::info!(
        service = "crmirror-ingest",
        base_url = %crm_config.base_url,
        mode = ingest.mode.as_str(),
        interval_secs = ingest.interval.map(|d| d.as_secs()),
        "starting"
    );

    let pool = crmirror_db::create_pool(&config.database_url)
        .await
        .context("failed to connect to database")?;
    crmirror_db::run_migrations(&pool).await?;

    let orchestrator = SyncOrchestrator::new(
        CrmClient::new(crm_config).context("failed to create crm client")?,
        PgSyncRunRepository::new(pool.clone()),
        PgMirrorRepository::new(pool.clone()),
        PgOwnerRepository::new(pool),
        Arc::new(SystemClock),
        config.stale_run_timeout(),
    );

    match ingest.interval {
        None => run_pass(&orchestrator, &ingest).await,
        Some(interval) => {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = orchestrator.sweep_stale().await {
                    tracing::error!(error = %e, "stale run sweep failed");
                }
                run_pass(&orchestrator, &ingest).await;
            }
        }
    }

    tracing::info!("ingest service finished");
    Ok(())
}
