//! Handlers for the `/workers` resource and the caller's notifications.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use plowline_core::error::CoreError;
use plowline_core::geo::Coordinates;
use plowline_core::types::DbId;
use plowline_db::models::worker::CreateWorker;
use plowline_db::repositories::{NotificationRepo, WorkerRepo};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Default page size for notification listings.
const DEFAULT_NOTIFICATION_LIMIT: i64 = 50;

/// POST /api/v1/workers
///
/// Register a new worker (admin only). Workers start unavailable and must
/// toggle themselves on.
pub async fn register_worker(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateWorker>,
) -> AppResult<impl IntoResponse> {
    auth.require_admin()?;

    if !Coordinates::new(input.longitude, input.latitude).is_valid() {
        return Err(AppError::Core(CoreError::Validation(
            "Invalid worker coordinates".into(),
        )));
    }

    let worker = WorkerRepo::create(&state.pool, &input).await?;
    tracing::info!(worker_id = worker.id, "Worker registered");
    Ok((StatusCode::CREATED, Json(DataResponse { data: worker })))
}

/// GET /api/v1/workers/{id}
///
/// Workers can view themselves; admins can view anyone.
pub async fn get_worker(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(worker_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    if auth.user_id != worker_id && !auth.is_admin() {
        return Err(AppError::Core(CoreError::Forbidden(
            "Cannot access another worker's profile".into(),
        )));
    }

    let worker = WorkerRepo::find_by_id(&state.pool, worker_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Worker",
            id: worker_id,
        }))?;
    Ok(Json(DataResponse { data: worker }))
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityRequest {
    pub available: bool,
}

/// PUT /api/v1/workers/{id}/availability
///
/// Toggle the manual availability flag. Workers can only toggle themselves.
pub async fn set_availability(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(worker_id): Path<DbId>,
    Json(input): Json<AvailabilityRequest>,
) -> AppResult<impl IntoResponse> {
    if auth.user_id != worker_id && !auth.is_admin() {
        return Err(AppError::Core(CoreError::Forbidden(
            "Cannot change another worker's availability".into(),
        )));
    }

    let updated = WorkerRepo::set_availability(&state.pool, worker_id, input.available).await?;
    if !updated {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Worker",
            id: worker_id,
        }));
    }

    tracing::info!(worker_id, available = input.available, "Worker availability changed");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    pub limit: Option<i64>,
}

/// GET /api/v1/notifications
///
/// The caller's notifications, newest first.
pub async fn list_notifications(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<NotificationQuery>,
) -> AppResult<impl IntoResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_NOTIFICATION_LIMIT).clamp(1, 200);
    let notifications = NotificationRepo::list_for_user(&state.pool, auth.user_id, limit).await?;
    Ok(Json(DataResponse {
        data: notifications,
    }))
}
