use std::sync::Arc;

use anyhow::Context;
use crmirror_common::clock::SystemClock;
use crmirror_config::{init_tracing, AppConfig};
use crmirror_db::matches::pg_repository::PgMatchRepository;
use crmirror_db::mirror::pg_repository::PgMirrorRepository;
use crmirror_matching::MatchingConfig;
use crmirror_metrics::{MetricsWorkerConfig, ResolutionJob};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing("info");

    let config = AppConfig::from_env().context("failed to load config")?;
    let worker = MetricsWorkerConfig::from_env().context("failed to load worker config")?;
    let matching = MatchingConfig::from_env().context("failed to load matching config")?;

    tracing::info!(
        service = "crmirror-metrics",
        rebuild_interval_secs = worker.rebuild_interval.as_secs(),
        "starting"
    );

    let pool = crmirror_db::create_pool(&config.database_url)
        .await
        .context("failed to connect to database")?;
    crmirror_db::run_migrations(&pool).await?;

    let job = ResolutionJob::new(
        Arc::new(PgMirrorRepository::new(pool.clone())),
        Arc::new(PgMatchRepository::new(pool)),
        matching,
        Arc::new(SystemClock),
    );

    let mut ticker = tokio::time::interval(worker.rebuild_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = job.rebuild().await {
                    tracing::error!(error = %e, "match rebuild failed");
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    tracing::info!("shutting down");
    Ok(())
}
