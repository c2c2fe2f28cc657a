//! Repository for the `jobs` table.
//!
//! The claim and expiration operations are the two atomicity-critical
//! writes in the system. Both are expressed as conditional UPDATEs so the
//! first committer wins and every other concurrent attempt observes zero
//! affected rows instead of clobbering state.

use plowline_core::lifecycle::state_machine::ACTIVE_STATUSES;
use plowline_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::job::{CreateJob, Job};
use crate::models::status::{JobStatus, PaymentStatus};

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, customer_id, status_id, longitude, latitude, zone, required_equipment, \
    departure_at, deadline_at, assigned_worker_id, \
    payment_status_id, charge_reference, total_price_cents, \
    refund_amount_cents, refund_reference, refund_attempts, refund_escalated, \
    is_priority, assigned_at, cancelled_at, completed_at, \
    cancelled_by, cancel_reason, match_snapshot, match_snapshot_at, \
    created_at, updated_at";

/// Result of a claim attempt. Losing the race is a normal outcome, never
/// an error, so callers can fall through to the next candidate.
#[derive(Debug)]
pub enum ClaimOutcome {
    /// The caller won: the job is now assigned to the worker.
    Claimed(Job),
    /// The job was no longer pending/unassigned when the claim committed.
    AlreadyTaken,
    /// The worker failed re-validation at claim time (capacity reached,
    /// toggled unavailable, or suspended since ranking).
    WorkerUnavailable,
}

/// Provides lifecycle operations for dispatch jobs.
pub struct JobRepo;

impl JobRepo {
    /// Create a new pending job.
    pub async fn create(pool: &PgPool, input: &CreateJob) -> Result<Job, sqlx::Error> {
        let query = format!(
            "INSERT INTO jobs \
                 (customer_id, status_id, longitude, latitude, zone, required_equipment, \
                  departure_at, deadline_at, total_price_cents, charge_reference, \
                  payment_status_id, is_priority) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING {COLUMNS}"
        );
        // A job created with a charge reference has already been charged.
        let payment_status = if input.charge_reference.is_some() {
            PaymentStatus::Paid.id()
        } else {
            PaymentStatus::Pending.id()
        };
        sqlx::query_as::<_, Job>(&query)
            .bind(input.customer_id)
            .bind(JobStatus::Pending.id())
            .bind(input.longitude)
            .bind(input.latitude)
            .bind(&input.zone)
            .bind(&input.required_equipment)
            .bind(input.departure_at)
            .bind(input.deadline_at)
            .bind(input.total_price_cents)
            .bind(&input.charge_reference)
            .bind(payment_status)
            .bind(input.is_priority.unwrap_or(false))
            .fetch_one(pool)
            .await
    }

    /// Find a job by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Atomically claim a pending job for a worker.
    ///
    /// Runs in one transaction: first a bounded increment of the worker's
    /// `active_jobs_count` (re-validating availability, suspension, and
    /// capacity at claim time, not only at ranking time), then a
    /// conditional assignment that only fires while the job is still
    /// pending and unassigned. If either condition fails the transaction
    /// rolls back and the caller gets a retryable signal.
    pub async fn claim(
        pool: &PgPool,
        job_id: DbId,
        worker_id: DbId,
    ) -> Result<ClaimOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let reserved = sqlx::query(
            "UPDATE workers \
             SET active_jobs_count = active_jobs_count + 1, updated_at = NOW() \
             WHERE id = $1 \
               AND is_available \
               AND NOT is_suspended \
               AND active_jobs_count < max_active_jobs",
        )
        .bind(worker_id)
        .execute(&mut *tx)
        .await?;

        if reserved.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(ClaimOutcome::WorkerUnavailable);
        }

        let query = format!(
            "UPDATE jobs \
             SET status_id = $3, assigned_worker_id = $2, assigned_at = NOW(), \
                 updated_at = NOW() \
             WHERE id = $1 AND status_id = $4 AND assigned_worker_id IS NULL \
             RETURNING {COLUMNS}"
        );
        let claimed = sqlx::query_as::<_, Job>(&query)
            .bind(job_id)
            .bind(worker_id)
            .bind(JobStatus::Assigned.id())
            .bind(JobStatus::Pending.id())
            .fetch_optional(&mut *tx)
            .await?;

        match claimed {
            Some(job) => {
                tx.commit().await?;
                Ok(ClaimOutcome::Claimed(job))
            }
            None => {
                // Roll back the slot reservation; the job went to someone
                // else between ranking and claiming.
                tx.rollback().await?;
                Ok(ClaimOutcome::AlreadyTaken)
            }
        }
    }

    /// Assigned -> EnRoute, guarded by the assigned worker's identity.
    ///
    /// Returns `false` when the job is not in the expected state or is
    /// assigned to a different worker.
    pub async fn mark_en_route(
        pool: &PgPool,
        job_id: DbId,
        worker_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs SET status_id = $3, updated_at = NOW() \
             WHERE id = $1 AND assigned_worker_id = $2 AND status_id = $4",
        )
        .bind(job_id)
        .bind(worker_id)
        .bind(JobStatus::EnRoute.id())
        .bind(JobStatus::Assigned.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// EnRoute -> InProgress, guarded by the assigned worker's identity.
    pub async fn mark_in_progress(
        pool: &PgPool,
        job_id: DbId,
        worker_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs SET status_id = $3, updated_at = NOW() \
             WHERE id = $1 AND assigned_worker_id = $2 AND status_id = $4",
        )
        .bind(job_id)
        .bind(worker_id)
        .bind(JobStatus::InProgress.id())
        .bind(JobStatus::EnRoute.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// InProgress -> Completed. Releases the worker's slot and bumps the
    /// completion counters in the same transaction.
    pub async fn complete(
        pool: &PgPool,
        job_id: DbId,
        worker_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let result = sqlx::query(
            "UPDATE jobs SET status_id = $3, completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND assigned_worker_id = $2 AND status_id = $4",
        )
        .bind(job_id)
        .bind(worker_id)
        .bind(JobStatus::Completed.id())
        .bind(JobStatus::InProgress.id())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "UPDATE workers \
             SET active_jobs_count = GREATEST(active_jobs_count - 1, 0), \
                 total_jobs_completed = total_jobs_completed + 1, \
                 completed_jobs_in_zone = completed_jobs_in_zone + \
                     CASE WHEN zone IS NOT NULL \
                               AND zone = (SELECT zone FROM jobs WHERE id = $2) \
                          THEN 1 ELSE 0 END, \
                 updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(worker_id)
        .bind(job_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Cancel an overdue job if it is still in an active status.
    ///
    /// This single statement is the correctness boundary of expiration:
    /// it captures, transitions, and persists in one atomic step. When the
    /// job was paid, the payment flips to `pending_refund` and the refund
    /// amount is recorded in the same statement. Returns `None` when the
    /// job was already resolved (by completion, manual cancellation, or a
    /// concurrent sweeper instance), which makes the expiration pass
    /// idempotent and safe to run redundantly.
    pub async fn expire_if_active(
        pool: &PgPool,
        job_id: DbId,
        cancel_reason: &str,
    ) -> Result<Option<Job>, sqlx::Error> {
        let query = format!(
            "UPDATE jobs \
             SET status_id = $3, cancelled_at = NOW(), cancelled_by = 'system', \
                 cancel_reason = $2, \
                 refund_amount_cents = CASE WHEN payment_status_id = $4 \
                     THEN total_price_cents ELSE refund_amount_cents END, \
                 payment_status_id = CASE WHEN payment_status_id = $4 \
                     THEN $5 ELSE payment_status_id END, \
                 updated_at = NOW() \
             WHERE id = $1 AND status_id = ANY($6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(job_id)
            .bind(cancel_reason)
            .bind(JobStatus::Cancelled.id())
            .bind(PaymentStatus::Paid.id())
            .bind(PaymentStatus::PendingRefund.id())
            .bind(&ACTIVE_STATUSES[..])
            .fetch_optional(pool)
            .await
    }

    /// Jobs whose deadline falls inside the reminder window.
    pub async fn due_for_reminder(
        pool: &PgPool,
        now: Timestamp,
        horizon: Timestamp,
    ) -> Result<Vec<Job>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM jobs \
             WHERE status_id IN ($1, $2) \
               AND deadline_at > $3 AND deadline_at <= $4 \
             ORDER BY deadline_at ASC"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(JobStatus::Assigned.id())
            .bind(JobStatus::EnRoute.id())
            .bind(now)
            .bind(horizon)
            .fetch_all(pool)
            .await
    }

    /// Active jobs whose deadline passed before `cutoff` (deadline plus
    /// grace window already applied by the caller).
    pub async fn expired_before(
        pool: &PgPool,
        cutoff: Timestamp,
    ) -> Result<Vec<Job>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM jobs \
             WHERE status_id = ANY($1) AND deadline_at < $2 \
             ORDER BY deadline_at ASC"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(&ACTIVE_STATUSES[..])
            .bind(cutoff)
            .fetch_all(pool)
            .await
    }

    /// Cancelled jobs still owing a refund, below the retry ceiling.
    pub async fn pending_refunds(
        pool: &PgPool,
        max_attempts: i32,
    ) -> Result<Vec<Job>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM jobs \
             WHERE payment_status_id = $1 AND refund_attempts < $2 \
               AND NOT refund_escalated \
             ORDER BY cancelled_at ASC"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(PaymentStatus::PendingRefund.id())
            .bind(max_attempts)
            .fetch_all(pool)
            .await
    }

    /// Pending-refund jobs that exhausted automatic retries and have not
    /// yet been flagged for admin reconciliation.
    pub async fn refunds_to_escalate(
        pool: &PgPool,
        max_attempts: i32,
    ) -> Result<Vec<Job>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM jobs \
             WHERE payment_status_id = $1 AND refund_attempts >= $2 \
               AND NOT refund_escalated \
             ORDER BY cancelled_at ASC"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(PaymentStatus::PendingRefund.id())
            .bind(max_attempts)
            .fetch_all(pool)
            .await
    }

    /// Record a successful refund. Only fires while the job still owes one.
    pub async fn mark_refunded(
        pool: &PgPool,
        job_id: DbId,
        refund_reference: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs \
             SET payment_status_id = $3, refund_reference = $2, updated_at = NOW() \
             WHERE id = $1 AND payment_status_id = $4",
        )
        .bind(job_id)
        .bind(refund_reference)
        .bind(PaymentStatus::Refunded.id())
        .bind(PaymentStatus::PendingRefund.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Claim the next refund attempt against the provider.
    ///
    /// Fires only while the job still owes a refund and its attempt
    /// counter matches the one the caller observed, so of any number of
    /// concurrent sweeper instances holding the same row exactly one gets
    /// to call the payment provider. Returns `false` when another instance
    /// already claimed this attempt (or the refund was settled meanwhile);
    /// the loser must not contact the provider.
    pub async fn begin_refund_attempt(
        pool: &PgPool,
        job_id: DbId,
        observed_attempts: i32,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs SET refund_attempts = refund_attempts + 1, updated_at = NOW() \
             WHERE id = $1 AND payment_status_id = $2 AND refund_attempts = $3",
        )
        .bind(job_id)
        .bind(PaymentStatus::PendingRefund.id())
        .bind(observed_attempts)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Flag a job's refund as escalated so the sweeper stops retrying it.
    pub async fn mark_refund_escalated(pool: &PgPool, job_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs SET refund_escalated = TRUE, updated_at = NOW() \
             WHERE id = $1 AND payment_status_id = $2 AND NOT refund_escalated",
        )
        .bind(job_id)
        .bind(PaymentStatus::PendingRefund.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Admin override: settle a `pending_refund` job as refunded (refund
    /// issued out of band) or failed (refund written off).
    pub async fn resolve_refund(
        pool: &PgPool,
        job_id: DbId,
        refunded: bool,
        reference: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let target = if refunded {
            PaymentStatus::Refunded.id()
        } else {
            PaymentStatus::Failed.id()
        };
        let result = sqlx::query(
            "UPDATE jobs \
             SET payment_status_id = $2, refund_reference = COALESCE($3, refund_reference), \
                 updated_at = NOW() \
             WHERE id = $1 AND payment_status_id = $4",
        )
        .bind(job_id)
        .bind(target)
        .bind(reference)
        .bind(PaymentStatus::PendingRefund.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Store the advisory ranking snapshot on the job. Not authoritative;
    /// kept for auditability of why a worker was picked.
    pub async fn set_match_snapshot(
        pool: &PgPool,
        job_id: DbId,
        snapshot: &serde_json::Value,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE jobs SET match_snapshot = $2, match_snapshot_at = NOW(), \
                 updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(job_id)
        .bind(snapshot)
        .execute(pool)
        .await?;
        Ok(())
    }
}
