mod error;
mod owners;
mod reports;
mod resolution;
mod sync;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use crmirror_common::clock::SystemClock;
use crmirror_common::types::ServiceInfo;
use crmirror_config::{init_tracing, AppConfig};
use crmirror_db::matches::pg_repository::PgMatchRepository;
use crmirror_db::metrics::pg_repository::PgMetricsRepository;
use crmirror_db::mirror::pg_repository::PgMirrorRepository;
use crmirror_db::owners::pg_repository::PgOwnerRepository;
use crmirror_db::owners::repositories::OwnerRepository;
use crmirror_db::sync::pg_repository::PgSyncRunRepository;
use crmirror_db::sync::repositories::SyncRunRepository;
use crmirror_ingest::{Connector, CrmClient, CrmClientConfig, SyncOrchestrator};
use crmirror_matching::MatchingConfig;
use crmirror_metrics::{MetricsEngine, ResolutionJob};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub runs: Arc<dyn SyncRunRepository>,
    pub owners: Arc<dyn OwnerRepository>,
    /// `None` when no CRM credentials are configured; sync triggers then answer 503.
    pub connector: Option<Arc<dyn Connector>>,
    pub metrics: Arc<MetricsEngine>,
    pub resolution: Arc<ResolutionJob>,
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn info() -> Json<ServiceInfo> {
    Json(ServiceInfo::new("crmirror-api"))
}

async fn metrics() -> impl IntoResponse {
    let body = format!(
        "\
# HELP crmirror_up Service up indicator\n\
# TYPE crmirror_up gauge\n\
crmirror_up 1\n\
# HELP crmirror_info Service info\n\
# TYPE crmirror_info gauge\n\
crmirror_info{{service=\"crmirror-api\",version=\"{}\"}} 1\n",
        env!("CARGO_PKG_VERSION")
    );

    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        body,
    )
}

fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/health", get(health))
        .route("/info", get(info))
        .route("/metrics", get(metrics))
        .merge(sync::router())
        .merge(reports::router())
        .merge(owners::router())
        .merge(resolution::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing("info");

    let config = AppConfig::from_env().context("failed to load config")?;
    let crm_config = CrmClientConfig::from_env().context("failed to load crm config")?;
    let matching = MatchingConfig::from_env().context("failed to load matching config")?;
    tracing::info!(
        service = "crmirror-api",
        sync_enabled = crm_config.is_some(),
        "starting"
    );

    let pool = crmirror_db::create_pool(&config.database_url)
        .await
        .context("failed to create database pool")?;
    crmirror_db::run_migrations(&pool).await?;

    let connector: Option<Arc<dyn Connector>> = match crm_config {
        Some(crm_config) => Some(Arc::new(SyncOrchestrator::new(
            CrmClient::new(crm_config).context("failed to create crm client")?,
            PgSyncRunRepository::new(pool.clone()),
            PgMirrorRepository::new(pool.clone()),
            PgOwnerRepository::new(pool.clone()),
            Arc::new(SystemClock),
            config.stale_run_timeout(),
        ))),
        None => {
            tracing::warn!("CRM_ACCESS_TOKEN not set; sync endpoints are disabled");
            None
        }
    };

    let state = AppState {
        runs: Arc::new(PgSyncRunRepository::new(pool.clone())),
        owners: Arc::new(PgOwnerRepository::new(pool.clone())),
        connector,
        metrics: Arc::new(MetricsEngine::new(
            Arc::new(PgMetricsRepository::new(pool.clone())),
            Arc::new(SystemClock),
            config.aggregation_timeout(),
        )),
        resolution: Arc::new(ResolutionJob::new(
            Arc::new(PgMirrorRepository::new(pool.clone())),
            Arc::new(PgMatchRepository::new(pool)),
            matching,
            Arc::new(SystemClock),
        )),
    };

    let app = build_router(state);
    let addr: SocketAddr = config
        .bind_addr()
        .parse()
        .context("invalid bind address")?;

    tracing::info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind")?;
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
