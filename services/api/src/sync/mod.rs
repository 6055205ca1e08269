pub mod handlers;
pub mod requests;
pub mod responses;

use axum::routing::{get, post};
use axum::Router;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sync/runs", get(handlers::list_runs))
        .route("/sync/runs/{id}", get(handlers::get_run))
        .route("/sync/status", get(handlers::sync_status))
        .route("/sync/{object_type}", post(handlers::trigger_sync))
}
