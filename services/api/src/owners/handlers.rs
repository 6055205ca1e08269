use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use crmirror_common::error::CrmirrorError;

use crate::error::ApiError;
use crate::owners::requests::SetDisplayNameRequest;
use crate::owners::responses::{ListOwnersResponse, OwnerResponse};
use crate::AppState;

const MAX_DISPLAY_NAME_LEN: usize = 200;

fn validate_display_name(name: &str) -> Result<&str, CrmirrorError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CrmirrorError::Validation(
            "display_name must not be blank".to_string(),
        ));
    }
    if name.chars().count() > MAX_DISPLAY_NAME_LEN {
        return Err(CrmirrorError::Validation(format!(
            "display_name is longer than {MAX_DISPLAY_NAME_LEN} characters"
        )));
    }
    Ok(name)
}

pub async fn list_owners(
    State(state): State<AppState>,
) -> Result<Json<ListOwnersResponse>, ApiError> {
    let data: Vec<OwnerResponse> = state
        .owners
        .list()
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    let count = data.len();
    Ok(Json(ListOwnersResponse { data, count }))
}

pub async fn set_display_name(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<SetDisplayNameRequest>, JsonRejection>,
) -> Result<Json<OwnerResponse>, ApiError> {
    let Json(body) = body?;
    let name = validate_display_name(&body.display_name)?;
    let owner = state
        .owners
        .set_display_name_override(&id, Some(name))
        .await?;
    tracing::info!(owner_id = %id, "display name override set");
    Ok(Json(owner.into()))
}

pub async fn clear_display_name(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<OwnerResponse>, ApiError> {
    let owner = state.owners.set_display_name_override(&id, None).await?;
    tracing::info!(owner_id = %id, "display name override cleared");
    Ok(Json(owner.into()))
}
