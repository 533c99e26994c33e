use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::ServiceError;
use crate::models::{ApiResponse, RecordingRecord};
use crate::AppState;

/// GET /api/recordings
pub async fn list_recordings(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<RecordingRecord>>>, ServiceError> {
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let recordings = state.live_tv.list_recordings(&cancel).await?;
    Ok(Json(ApiResponse::success(recordings)))
}

/// DELETE /api/recordings/:id - stops an active recording first
pub async fn delete_recording(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    state.live_tv.delete_recording(&id, &cancel).await?;
    Ok(Json(ApiResponse::success(())))
}
