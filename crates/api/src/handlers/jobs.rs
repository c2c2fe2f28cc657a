//! Handlers for the `/jobs` resource.
//!
//! All endpoints require authentication via [`AuthUser`]. Customers book
//! and inspect jobs; workers drive the claim protocol and the progress
//! transitions; admins can do both.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use plowline_core::error::CoreError;
use plowline_core::geo::Coordinates;
use plowline_core::lifecycle::state_machine;
use plowline_core::types::{DbId, Timestamp};
use plowline_db::models::job::{CreateJob, Job};
use plowline_db::models::status::JobStatus;
use plowline_db::repositories::{ClaimOutcome, JobRepo};
use plowline_dispatch::AssignOutcome;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Fetch a job and verify the caller may see it (customer, assigned worker,
/// or admin).
async fn find_and_authorize(
    pool: &sqlx::PgPool,
    job_id: DbId,
    auth: &AuthUser,
) -> AppResult<Job> {
    let job = JobRepo::find_by_id(pool, job_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Job",
            id: job_id,
        }))?;

    let is_party = job.customer_id == auth.user_id
        || job.assigned_worker_id == Some(auth.user_id);
    if !is_party && !auth.is_admin() {
        return Err(AppError::Core(CoreError::Forbidden(
            "Cannot access another user's job".into(),
        )));
    }
    Ok(job)
}

// ---------------------------------------------------------------------------
// Book
// ---------------------------------------------------------------------------

/// Booking request body. The customer is taken from the token, never from
/// the body.
#[derive(Debug, Deserialize)]
pub struct BookJobRequest {
    pub longitude: f64,
    pub latitude: f64,
    pub zone: Option<String>,
    pub required_equipment: Vec<String>,
    pub departure_at: Timestamp,
    pub deadline_at: Timestamp,
    pub total_price_cents: i64,
    pub charge_reference: Option<String>,
    pub is_priority: Option<bool>,
}

/// POST /api/v1/jobs
///
/// Book a new job. Returns 201 with the created job in `pending` status.
pub async fn create_job(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<BookJobRequest>,
) -> AppResult<impl IntoResponse> {
    if !Coordinates::new(input.longitude, input.latitude).is_valid() {
        return Err(AppError::Core(CoreError::Validation(
            "Invalid job site coordinates".into(),
        )));
    }
    if input.total_price_cents < 0 {
        return Err(AppError::Core(CoreError::Validation(
            "Price must not be negative".into(),
        )));
    }

    let job = JobRepo::create(
        &state.pool,
        &CreateJob {
            customer_id: auth.user_id,
            longitude: input.longitude,
            latitude: input.latitude,
            zone: input.zone,
            required_equipment: input.required_equipment,
            departure_at: input.departure_at,
            deadline_at: input.deadline_at,
            total_price_cents: input.total_price_cents,
            charge_reference: input.charge_reference,
            is_priority: input.is_priority,
        },
    )
    .await?;

    tracing::info!(
        job_id = job.id,
        customer_id = auth.user_id,
        deadline_at = %job.deadline_at,
        "Job booked",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: job })))
}

// ---------------------------------------------------------------------------
// Get
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = find_and_authorize(&state.pool, job_id, &auth).await?;
    Ok(Json(DataResponse { data: job }))
}

// ---------------------------------------------------------------------------
// Matches
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct MatchQuery {
    pub limit: Option<usize>,
}

/// GET /api/v1/jobs/{id}/matches
///
/// Rank eligible workers for a pending job, best first. Advisory: nothing
/// is reserved by calling this.
pub async fn get_matches(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
    Query(params): Query<MatchQuery>,
) -> AppResult<impl IntoResponse> {
    find_and_authorize(&state.pool, job_id, &auth).await?;

    let limit = params.limit.unwrap_or(state.engine.match_limit());
    let ranked = state.engine.rank(job_id, limit).await?;
    Ok(Json(DataResponse { data: ranked }))
}

// ---------------------------------------------------------------------------
// Claim
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs/{id}/claim
///
/// Claim a pending job for the calling worker. Returns 200 with the
/// assigned job, or 409 with code `CLAIM_LOST` (someone else won) or
/// `WORKER_UNAVAILABLE` (caller failed claim-time re-validation).
pub async fn claim_job(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    match state.engine.claim(job_id, auth.user_id).await? {
        ClaimOutcome::Claimed(job) => Ok(Json(DataResponse { data: job })),
        ClaimOutcome::AlreadyTaken => Err(AppError::ClaimRejected {
            code: "CLAIM_LOST",
            message: "Job was claimed by another worker".into(),
        }),
        ClaimOutcome::WorkerUnavailable => Err(AppError::ClaimRejected {
            code: "WORKER_UNAVAILABLE",
            message: "Worker is unavailable, suspended, or at capacity".into(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Auto-assign
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct AssignResponse {
    pub assigned: bool,
    pub job: Option<Job>,
}

/// POST /api/v1/jobs/{id}/auto-assign
///
/// Assign the job to the best available worker (admin only). Finding no
/// eligible worker is a 200 with `assigned: false`; a job resolved in the
/// meantime is a 409.
pub async fn auto_assign_job(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    auth.require_admin()?;

    match state.engine.auto_assign(job_id).await? {
        AssignOutcome::Assigned(job) => Ok(Json(DataResponse {
            data: AssignResponse {
                assigned: true,
                job: Some(job),
            },
        })),
        AssignOutcome::NoEligibleWorker => Ok(Json(DataResponse {
            data: AssignResponse {
                assigned: false,
                job: None,
            },
        })),
        AssignOutcome::JobUnavailable => Err(AppError::Core(CoreError::Conflict(
            "Job is no longer available for assignment".into(),
        ))),
    }
}

// ---------------------------------------------------------------------------
// Progress transitions
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs/{id}/en-route
///
/// Assigned -> EnRoute, by the assigned worker.
pub async fn mark_en_route(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    transition(
        &state,
        job_id,
        auth.user_id,
        JobRepo::mark_en_route(&state.pool, job_id, auth.user_id).await?,
        JobStatus::EnRoute,
        "en route",
    )
    .await
}

/// POST /api/v1/jobs/{id}/start
///
/// EnRoute -> InProgress, by the assigned worker.
pub async fn mark_started(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    transition(
        &state,
        job_id,
        auth.user_id,
        JobRepo::mark_in_progress(&state.pool, job_id, auth.user_id).await?,
        JobStatus::InProgress,
        "started",
    )
    .await
}

/// POST /api/v1/jobs/{id}/complete
///
/// InProgress -> Completed, by the assigned worker. Releases the worker's
/// slot and bumps their counters.
pub async fn mark_completed(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    transition(
        &state,
        job_id,
        auth.user_id,
        JobRepo::complete(&state.pool, job_id, auth.user_id).await?,
        JobStatus::Completed,
        "completed",
    )
    .await
}

/// Turn a guarded transition result into a response: the fresh job on
/// success, 404 for a missing job, 409 when the guard did not fire. The
/// 409 message names the invalid transition so workers can tell a skipped
/// step from a job that was never theirs.
async fn transition(
    state: &AppState,
    job_id: DbId,
    worker_id: DbId,
    transitioned: bool,
    target: JobStatus,
    label: &str,
) -> AppResult<Json<DataResponse<Job>>> {
    let job = JobRepo::find_by_id(&state.pool, job_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Job",
            id: job_id,
        }))?;

    if !transitioned {
        if job.assigned_worker_id != Some(worker_id) {
            return Err(AppError::Core(CoreError::Conflict(
                "Job is not assigned to this worker".into(),
            )));
        }
        let message = match state_machine::validate_transition(job.status_id, target.id()) {
            Err(detail) => detail,
            // The status moved again between the UPDATE and this read.
            Ok(()) => format!("Job cannot be marked {label}: state changed, retry"),
        };
        return Err(AppError::Core(CoreError::Conflict(message)));
    }

    tracing::info!(job_id, worker_id, status = label, "Job transition");
    Ok(Json(DataResponse { data: job }))
}
