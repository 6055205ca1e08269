pub mod handlers;
pub mod requests;
pub mod responses;

use axum::routing::{get, put};
use axum::Router;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/owners", get(handlers::list_owners))
        .route(
            "/owners/{id}/display-name",
            put(handlers::set_display_name).delete(handlers::clear_display_name),
        )
}
