use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::ServiceError;
use crate::models::{
    ApiResponse, SeriesTimerRecord, SeriesTimerSpec, TimerDefaults, TimerRecord, TimerSpec,
};
use crate::AppState;

type Accepted = (StatusCode, Json<ApiResponse<()>>);

fn accepted() -> Accepted {
    (StatusCode::OK, Json(ApiResponse::success(())))
}

// ============================================================================
// One-time timers
// ============================================================================

/// GET /api/timers
pub async fn list_timers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<TimerRecord>>>, ServiceError> {
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let timers = state.live_tv.list_timers(&cancel).await?;
    Ok(Json(ApiResponse::success(timers)))
}

/// GET /api/timers/defaults
pub async fn timer_defaults(State(state): State<Arc<AppState>>) -> Json<ApiResponse<TimerDefaults>> {
    Json(ApiResponse::success(state.live_tv.timer_defaults()))
}

/// POST /api/timers
pub async fn create_timer(
    State(state): State<Arc<AppState>>,
    Json(spec): Json<TimerSpec>,
) -> Result<Accepted, ServiceError> {
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    state.live_tv.create_timer(&spec, &cancel).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(()))))
}

/// PUT /api/timers/:id - the path id wins over the body
pub async fn update_timer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(mut spec): Json<TimerSpec>,
) -> Result<Accepted, ServiceError> {
    spec.id = Some(id);

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    state.live_tv.update_timer(&spec, &cancel).await?;
    Ok(accepted())
}

/// DELETE /api/timers/:id
pub async fn cancel_timer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Accepted, ServiceError> {
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    state.live_tv.cancel_timer(&id, &cancel).await?;
    Ok(accepted())
}

// ============================================================================
// Series timers
// ============================================================================

/// GET /api/series-timers
pub async fn list_series_timers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<SeriesTimerRecord>>>, ServiceError> {
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let series = state.live_tv.list_series_timers(&cancel).await?;
    Ok(Json(ApiResponse::success(series)))
}

/// POST /api/series-timers
pub async fn create_series_timer(
    State(state): State<Arc<AppState>>,
    Json(spec): Json<SeriesTimerSpec>,
) -> Result<Accepted, ServiceError> {
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    state.live_tv.create_series_timer(&spec, &cancel).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(()))))
}

/// PUT /api/series-timers/:id
pub async fn update_series_timer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(mut spec): Json<SeriesTimerSpec>,
) -> Result<Accepted, ServiceError> {
    spec.id = Some(id);

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    state.live_tv.update_series_timer(&spec, &cancel).await?;
    Ok(accepted())
}

/// DELETE /api/series-timers/:id
pub async fn cancel_series_timer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Accepted, ServiceError> {
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    state.live_tv.cancel_series_timer(&id, &cancel).await?;
    Ok(accepted())
}
