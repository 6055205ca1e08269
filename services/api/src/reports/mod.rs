pub mod handlers;

use axum::routing::get;
use axum::Router;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/reports/summary", get(handlers::summary))
        .route("/reports/funnel", get(handlers::funnel))
        .route("/reports/conversion", get(handlers::conversion))
        .route("/reports/call-to-close", get(handlers::call_to_close))
        .route("/reports/timeline", get(handlers::timeline))
}
