use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use crmirror_metrics::engine::models::{
    CallToCloseReport, ConversionReport, FunnelReport, SummaryReport, TimelineReport,
};
use crmirror_metrics::MetricsQuery;

use crate::error::ApiError;
use crate::AppState;

type Filter = Result<Query<MetricsQuery>, QueryRejection>;

pub async fn summary(
    State(state): State<AppState>,
    query: Filter,
) -> Result<Json<SummaryReport>, ApiError> {
    let Query(query) = query?;
    Ok(Json(state.metrics.summary(&query).await?))
}

pub async fn funnel(
    State(state): State<AppState>,
    query: Filter,
) -> Result<Json<FunnelReport>, ApiError> {
    let Query(query) = query?;
    Ok(Json(state.metrics.funnel(&query).await?))
}

pub async fn conversion(
    State(state): State<AppState>,
    query: Filter,
) -> Result<Json<ConversionReport>, ApiError> {
    let Query(query) = query?;
    Ok(Json(state.metrics.conversion(&query).await?))
}

pub async fn call_to_close(
    State(state): State<AppState>,
    query: Filter,
) -> Result<Json<CallToCloseReport>, ApiError> {
    let Query(query) = query?;
    Ok(Json(state.metrics.call_to_close(&query).await?))
}

pub async fn timeline(
    State(state): State<AppState>,
    query: Filter,
) -> Result<Json<TimelineReport>, ApiError> {
    let Query(query) = query?;
    Ok(Json(state.metrics.timeline(&query).await?))
}
