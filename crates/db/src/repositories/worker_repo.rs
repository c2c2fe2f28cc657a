//! Repository for the `workers` table and the penalty ledger.
//!
//! Penalty fields (`warning_count`, `total_cancellations`, suspension) are
//! mutated only through [`WorkerRepo::record_expiration_penalty`] (the
//! automatic path) and [`WorkerRepo::clear_suspension`] (the admin path).

use plowline_core::types::DbId;
use sqlx::PgPool;

use crate::models::worker::{CancellationRecord, CreateWorker, Worker};

/// Column list for `workers` queries.
const COLUMNS: &str = "\
    id, display_name, is_available, is_suspended, suspended_at, suspended_until, \
    suspension_reason, longitude, latitude, equipment, max_active_jobs, \
    active_jobs_count, average_rating, total_jobs_completed, total_cancellations, \
    warning_count, zone, completed_jobs_in_zone, created_at, updated_at";

/// Default capacity for newly registered workers.
const DEFAULT_MAX_ACTIVE_JOBS: i32 = 3;

/// Result of an expiration penalty write.
#[derive(Debug, Clone, Copy)]
pub struct PenaltyOutcome {
    /// The worker's warning count after the increment.
    pub warning_count: i32,
    /// Whether this penalty tripped the automatic suspension.
    pub newly_suspended: bool,
}

/// Provides worker pool and penalty ledger operations.
pub struct WorkerRepo;

impl WorkerRepo {
    /// Register a new worker (starts unavailable until they toggle on).
    pub async fn create(pool: &PgPool, input: &CreateWorker) -> Result<Worker, sqlx::Error> {
        let query = format!(
            "INSERT INTO workers \
                 (display_name, longitude, latitude, equipment, max_active_jobs, zone) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Worker>(&query)
            .bind(&input.display_name)
            .bind(input.longitude)
            .bind(input.latitude)
            .bind(&input.equipment)
            .bind(input.max_active_jobs.unwrap_or(DEFAULT_MAX_ACTIVE_JOBS))
            .bind(&input.zone)
            .fetch_one(pool)
            .await
    }

    /// Find a worker by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Worker>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM workers WHERE id = $1");
        sqlx::query_as::<_, Worker>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Toggle a worker's manual availability flag.
    pub async fn set_availability(
        pool: &PgPool,
        worker_id: DbId,
        available: bool,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE workers SET is_available = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(worker_id)
        .bind(available)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Load the candidate pool for a job's required equipment.
    ///
    /// The hard constraints are pushed into SQL (`@>` is the array
    /// superset operator) so large pools do not round-trip ineligible
    /// rows; the pure filter in `plowline_core::matching` re-checks the
    /// same constraints on the returned snapshot.
    pub async fn candidates_for(
        pool: &PgPool,
        required_equipment: &[String],
    ) -> Result<Vec<Worker>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM workers \
             WHERE is_available \
               AND NOT is_suspended \
               AND active_jobs_count < max_active_jobs \
               AND equipment @> $1 \
             ORDER BY id"
        );
        sqlx::query_as::<_, Worker>(&query)
            .bind(required_equipment)
            .fetch_all(pool)
            .await
    }

    /// Release one active-job slot (expired or otherwise vacated job).
    pub async fn release_slot(pool: &PgPool, worker_id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE workers \
             SET active_jobs_count = GREATEST(active_jobs_count - 1, 0), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(worker_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Apply the expiration penalty for one job: bump the warning and
    /// cancellation counters, append the ledger entry, and suspend at the
    /// threshold.
    ///
    /// The ledger's unique `(worker_id, job_id)` constraint makes this
    /// idempotent: a second call for the same job returns `None` without
    /// touching the counters. Suspension is one-way here; only
    /// [`Self::clear_suspension`] reverses it.
    pub async fn record_expiration_penalty(
        pool: &PgPool,
        worker_id: DbId,
        job_id: DbId,
        reason: &str,
        suspension_threshold: i32,
    ) -> Result<Option<PenaltyOutcome>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO worker_cancellations (worker_id, job_id, reason) \
             VALUES ($1, $2, $3) \
             ON CONFLICT ON CONSTRAINT uq_worker_cancellations_worker_job DO NOTHING",
        )
        .bind(worker_id)
        .bind(job_id)
        .bind(reason)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let warning_count = sqlx::query_scalar::<_, i32>(
            "UPDATE workers \
             SET warning_count = warning_count + 1, \
                 total_cancellations = total_cancellations + 1, \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING warning_count",
        )
        .bind(worker_id)
        .fetch_one(&mut *tx)
        .await?;

        let mut newly_suspended = false;
        if warning_count >= suspension_threshold {
            let suspended = sqlx::query(
                "UPDATE workers \
                 SET is_suspended = TRUE, suspended_at = NOW(), suspension_reason = $2, \
                     updated_at = NOW() \
                 WHERE id = $1 AND NOT is_suspended",
            )
            .bind(worker_id)
            .bind(plowline_core::penalty::suspension_reason(warning_count))
            .execute(&mut *tx)
            .await?;
            newly_suspended = suspended.rows_affected() > 0;
        }

        tx.commit().await?;
        Ok(Some(PenaltyOutcome {
            warning_count,
            newly_suspended,
        }))
    }

    /// Admin action: lift a suspension, optionally resetting the warning
    /// counter so the worker does not re-suspend on the next expiration.
    pub async fn clear_suspension(
        pool: &PgPool,
        worker_id: DbId,
        reset_warnings: bool,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE workers \
             SET is_suspended = FALSE, suspended_at = NULL, suspended_until = NULL, \
                 suspension_reason = NULL, \
                 warning_count = CASE WHEN $2 THEN 0 ELSE warning_count END, \
                 updated_at = NOW() \
             WHERE id = $1 AND is_suspended",
        )
        .bind(worker_id)
        .bind(reset_warnings)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// The append-only cancellation history for a worker, newest first.
    pub async fn cancellation_history(
        pool: &PgPool,
        worker_id: DbId,
    ) -> Result<Vec<CancellationRecord>, sqlx::Error> {
        sqlx::query_as::<_, CancellationRecord>(
            "SELECT id, worker_id, job_id, reason, occurred_at \
             FROM worker_cancellations \
             WHERE worker_id = $1 \
             ORDER BY occurred_at DESC, id DESC",
        )
        .bind(worker_id)
        .fetch_all(pool)
        .await
    }
}
