use axum::extract::State;
use axum::Json;
use crmirror_matching::ResolutionStats;

use crate::error::ApiError;
use crate::AppState;

pub async fn rebuild(State(state): State<AppState>) -> Result<Json<ResolutionStats>, ApiError> {
    Ok(Json(state.resolution.rebuild().await?))
}
