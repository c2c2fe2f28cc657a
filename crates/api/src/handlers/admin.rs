//! Admin handlers: penalty inspection, reinstatement, refund
//! reconciliation, and the manual sweep trigger.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use plowline_core::error::CoreError;
use plowline_core::types::DbId;
use plowline_db::models::worker::CancellationRecord;
use plowline_db::repositories::{JobRepo, WorkerRepo};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct PenaltyReport {
    pub worker_id: DbId,
    pub warning_count: i32,
    pub total_cancellations: i32,
    pub is_suspended: bool,
    pub suspension_reason: Option<String>,
    pub history: Vec<CancellationRecord>,
}

/// GET /api/v1/admin/workers/{id}/penalties
pub async fn worker_penalties(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(worker_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    auth.require_admin()?;

    let worker = WorkerRepo::find_by_id(&state.pool, worker_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Worker",
            id: worker_id,
        }))?;
    let history = WorkerRepo::cancellation_history(&state.pool, worker_id).await?;

    Ok(Json(DataResponse {
        data: PenaltyReport {
            worker_id: worker.id,
            warning_count: worker.warning_count,
            total_cancellations: worker.total_cancellations,
            is_suspended: worker.is_suspended,
            suspension_reason: worker.suspension_reason,
            history,
        },
    }))
}

#[derive(Debug, Deserialize)]
pub struct ReinstateRequest {
    /// Reset the warning counter as well (default true), so the worker does
    /// not re-suspend on their next expiration.
    pub reset_warnings: Option<bool>,
}

/// POST /api/v1/admin/workers/{id}/reinstate
pub async fn reinstate_worker(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(worker_id): Path<DbId>,
    Json(input): Json<ReinstateRequest>,
) -> AppResult<impl IntoResponse> {
    auth.require_admin()?;

    let reset_warnings = input.reset_warnings.unwrap_or(true);
    let lifted = WorkerRepo::clear_suspension(&state.pool, worker_id, reset_warnings).await?;
    if !lifted {
        return Err(AppError::Core(CoreError::Conflict(
            "Worker is not suspended".into(),
        )));
    }

    tracing::info!(worker_id, reset_warnings, admin_id = auth.user_id, "Worker reinstated");
    let worker = WorkerRepo::find_by_id(&state.pool, worker_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Worker",
            id: worker_id,
        }))?;
    Ok(Json(DataResponse { data: worker }))
}

#[derive(Debug, Deserialize)]
pub struct ResolveRefundRequest {
    /// `true` when the refund was issued out of band, `false` to write the
    /// refund off as failed.
    pub refunded: bool,
    /// Provider reference for an out-of-band refund.
    pub reference: Option<String>,
}

/// POST /api/v1/admin/jobs/{id}/resolve-refund
///
/// Settle a `pending_refund` job after escalation (or at any time before).
pub async fn resolve_refund(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
    Json(input): Json<ResolveRefundRequest>,
) -> AppResult<impl IntoResponse> {
    auth.require_admin()?;

    let resolved = JobRepo::resolve_refund(
        &state.pool,
        job_id,
        input.refunded,
        input.reference.as_deref(),
    )
    .await?;
    if !resolved {
        return Err(AppError::Core(CoreError::Conflict(
            "Job does not owe a refund".into(),
        )));
    }

    tracing::info!(
        job_id,
        refunded = input.refunded,
        admin_id = auth.user_id,
        "Refund resolved manually"
    );
    let job = JobRepo::find_by_id(&state.pool, job_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Job",
            id: job_id,
        }))?;
    Ok(Json(DataResponse { data: job }))
}

/// POST /api/v1/admin/sweep
///
/// Run one sweep immediately, outside the regular interval. Safe to call
/// while the background loop is running.
pub async fn run_sweep(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    auth.require_admin()?;

    let summary = state.sweeper.sweep_once().await.map_err(AppError::Database)?;
    tracing::info!(admin_id = auth.user_id, "Manual sweep triggered");
    Ok(Json(DataResponse { data: summary }))
}
