use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use crmirror_common::error::CrmirrorError;
use crmirror_db::sync::models::{ObjectType, SyncRunFilter, TriggeredBy};
use crmirror_ingest::SyncRequest;
use uuid::Uuid;

use crate::error::ApiError;
use crate::sync::requests::TriggerSyncRequest;
use crate::sync::responses::{
    ListRunsResponse, ObjectSyncStatus, SyncRunResponse, SyncStatusResponse,
};
use crate::AppState;

/// Opens the run and answers 202 at once; the page loop runs detached from the request.
///
/// A dropped connection therefore never strands the run in `running`. Callers poll
/// `GET /sync/runs/{id}` for the outcome.
pub async fn trigger_sync(
    State(state): State<AppState>,
    Path(object_type): Path<String>,
    body: Result<Json<TriggerSyncRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SyncRunResponse>), ApiError> {
    let object_type: ObjectType = object_type.parse().map_err(CrmirrorError::Validation)?;
    let Json(body) = body?;

    let connector = state.connector.clone().ok_or_else(|| {
        CrmirrorError::Config("sync is disabled: CRM_ACCESS_TOKEN is not set".to_string())
    })?;

    let request = SyncRequest {
        object_type,
        mode: body.mode.unwrap_or_default(),
        triggered_by: body.triggered_by.unwrap_or(TriggeredBy::Api),
    };
    tracing::info!(%object_type, mode = request.mode.as_str(), "sync triggered over http");

    let started = connector.begin(request).await?;
    let accepted = SyncRunResponse::from(started.run.clone());

    tokio::spawn(async move {
        let run_id = started.run.id;
        if let Err(e) = connector.finish(started).await {
            tracing::error!(%object_type, %run_id, error = %e, "background sync failed");
        }
    });

    Ok((StatusCode::ACCEPTED, Json(accepted)))
}

pub async fn list_runs(
    State(state): State<AppState>,
    filter: Result<Query<SyncRunFilter>, QueryRejection>,
) -> Result<Json<ListRunsResponse>, ApiError> {
    let Query(filter) = filter?;
    let data: Vec<SyncRunResponse> = state
        .runs
        .list_recent(filter)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    let count = data.len();
    Ok(Json(ListRunsResponse { data, count }))
}

pub async fn get_run(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<SyncRunResponse>, ApiError> {
    let Path(id) = id?;
    let run = state
        .runs
        .get(id)
        .await?
        .ok_or_else(|| CrmirrorError::NotFound(format!("sync run {id}")))?;
    Ok(Json(run.into()))
}

pub async fn sync_status(
    State(state): State<AppState>,
) -> Result<Json<SyncStatusResponse>, ApiError> {
    let mut data = Vec::with_capacity(ObjectType::ALL.len());
    for object_type in ObjectType::ALL {
        let last_successful = state.runs.last_successful(object_type).await?;
        data.push(ObjectSyncStatus {
            object_type,
            last_successful: last_successful.map(Into::into),
        });
    }
    Ok(Json(SyncStatusResponse { data }))
}
