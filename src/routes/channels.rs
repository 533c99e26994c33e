use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::ServiceError;
use crate::models::{ApiResponse, Channel, ChannelGroup, Program};
use crate::AppState;

/// GET /api/channels
pub async fn list_channels(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<Channel>>>, ServiceError> {
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let channels = state.live_tv.list_channels(&cancel).await?;
    Ok(Json(ApiResponse::success(channels)))
}

/// GET /api/channel-groups
pub async fn list_channel_groups(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<ChannelGroup>>>, ServiceError> {
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let groups = state.live_tv.list_channel_groups(&cancel).await?;
    Ok(Json(ApiResponse::success(groups)))
}

/// Guide window; defaults to the next 24 hours
#[derive(Debug, Deserialize)]
pub struct ProgramsQuery {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// GET /api/channels/:id/programs?start&end
pub async fn list_programs(
    State(state): State<Arc<AppState>>,
    Path(channel_id): Path<String>,
    Query(query): Query<ProgramsQuery>,
) -> Result<Json<ApiResponse<Vec<Program>>>, ServiceError> {
    let start = query.start.unwrap_or_else(Utc::now);
    let end = query.end.unwrap_or(start + Duration::hours(24));

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let programs = state
        .live_tv
        .list_programs(&channel_id, start, end, &cancel)
        .await?;
    Ok(Json(ApiResponse::success(programs)))
}
