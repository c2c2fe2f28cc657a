//! Per-job expiration handling.
//!
//! [`ExpirationHandler`] runs the full consequence chain for one overdue
//! job. The single conditional UPDATE in [`JobRepo::expire_if_active`] is
//! the durability boundary: once it commits, the cancellation and the
//! refund obligation survive a crash. Everything after it (refund
//! execution, penalty, notifications) is repairable and therefore
//! best-effort: failures are logged and the job is left in a state the
//! next sweep or an admin can reconcile.

use std::sync::Arc;
use std::time::Duration;

use plowline_core::penalty::{expiration_cancel_reason, EnforcementConfig};
use plowline_core::types::Timestamp;
use plowline_db::models::job::Job;
use plowline_db::repositories::{JobRepo, WorkerRepo};
use plowline_db::DbPool;
use plowline_events::{DispatchEvent, EventBus};

use crate::payments::PaymentClient;

/// Outer bound on one refund execution, on top of the client's own
/// request timeout.
const REFUND_TIMEOUT: Duration = Duration::from_secs(15);

/// What the handler did with one overdue job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpirationOutcome {
    /// The job was cancelled by this call.
    Cancelled {
        /// Whether the refund settled during this call.
        refunded: bool,
        /// Whether a penalty was recorded against the assigned worker.
        worker_penalized: bool,
    },
    /// The job was already resolved when the cancellation committed
    /// (completed, manually cancelled, or expired by a concurrent sweeper).
    AlreadyResolved,
}

/// Executes the expiration sequence for overdue jobs.
pub struct ExpirationHandler {
    pool: DbPool,
    payments: Option<Arc<dyn PaymentClient>>,
    bus: Arc<EventBus>,
    config: EnforcementConfig,
}

impl ExpirationHandler {
    /// `payments: None` disables refund execution; cancelled paid jobs then
    /// stay in `pending_refund` until an admin resolves them.
    pub fn new(
        pool: DbPool,
        payments: Option<Arc<dyn PaymentClient>>,
        bus: Arc<EventBus>,
        config: EnforcementConfig,
    ) -> Self {
        Self {
            pool,
            payments,
            bus,
            config,
        }
    }

    /// Expire one overdue job.
    ///
    /// Only the cancellation write itself can fail this call; the refund,
    /// penalty, and notification steps degrade to log lines.
    pub async fn expire(&self, job: &Job, now: Timestamp) -> Result<ExpirationOutcome, sqlx::Error> {
        let reason = expiration_cancel_reason(job.deadline_at, now);
        let Some(cancelled) = JobRepo::expire_if_active(&self.pool, job.id, &reason).await? else {
            tracing::debug!(job_id = job.id, "Job already resolved, skipping expiration");
            return Ok(ExpirationOutcome::AlreadyResolved);
        };
        tracing::info!(
            job_id = cancelled.id,
            worker_id = cancelled.assigned_worker_id,
            refund_cents = cancelled.refund_amount_cents,
            "Job expired past grace window"
        );

        let refunded = if cancelled.refund_pending() {
            self.execute_refund(&cancelled).await
        } else {
            false
        };

        let worker_penalized = match cancelled.assigned_worker_id {
            Some(worker_id) => self.penalize_worker(worker_id, &cancelled, &reason).await,
            None => false,
        };

        self.bus.publish(
            DispatchEvent::new("job.expired")
                .with_job(cancelled.id)
                .with_recipient(cancelled.customer_id)
                .with_payload(serde_json::json!({
                    "refunded": refunded,
                    "refund_cents": cancelled.refund_amount_cents,
                })),
        );

        Ok(ExpirationOutcome::Cancelled {
            refunded,
            worker_penalized,
        })
    }

    /// Execute the refund for a `pending_refund` job.
    ///
    /// Returns whether the refund settled. The attempt is claimed with a
    /// conditional UPDATE against the attempt counter the caller observed
    /// before the provider is contacted, so redundant sweeper instances
    /// holding the same row never send the provider two refund requests.
    /// A failed attempt stays claimed; the next sweep retries it.
    pub async fn execute_refund(&self, job: &Job) -> bool {
        let Some(payments) = &self.payments else {
            tracing::info!(job_id = job.id, "No payment client configured, refund stays pending");
            return false;
        };

        match JobRepo::begin_refund_attempt(&self.pool, job.id, job.refund_attempts).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(
                    job_id = job.id,
                    "Refund attempt claimed by another instance, skipping"
                );
                return false;
            }
            Err(e) => {
                tracing::error!(job_id = job.id, error = %e, "Failed to claim refund attempt");
                return false;
            }
        }

        let Some(charge) = &job.charge_reference else {
            // Paid jobs always carry a charge reference; this is corrupt
            // data. The burned attempt counts toward escalation so an
            // admin eventually sees the job.
            tracing::error!(job_id = job.id, "Pending refund without a charge reference");
            return false;
        };
        let amount = job.refund_amount_cents.unwrap_or(job.total_price_cents);

        let attempt = tokio::time::timeout(REFUND_TIMEOUT, payments.refund(charge, amount)).await;
        match attempt {
            Ok(Ok(receipt)) => {
                match JobRepo::mark_refunded(&self.pool, job.id, &receipt.refund_id).await {
                    Ok(true) => {
                        tracing::info!(
                            job_id = job.id,
                            refund_id = %receipt.refund_id,
                            amount_cents = amount,
                            "Refund settled"
                        );
                    }
                    Ok(false) => {
                        tracing::warn!(job_id = job.id, "Refund already settled by another path");
                    }
                    Err(e) => {
                        tracing::error!(
                            job_id = job.id,
                            refund_id = %receipt.refund_id,
                            error = %e,
                            "Refund executed but could not be recorded"
                        );
                    }
                }
                true
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    job_id = job.id,
                    attempts = job.refund_attempts + 1,
                    error = %e,
                    "Refund attempt failed"
                );
                false
            }
            Err(_) => {
                tracing::warn!(
                    job_id = job.id,
                    attempts = job.refund_attempts + 1,
                    "Refund attempt timed out"
                );
                false
            }
        }
    }

    /// Release the worker's slot and record the penalty. Returns whether a
    /// penalty was recorded (false when already penalized for this job).
    async fn penalize_worker(&self, worker_id: i64, job: &Job, reason: &str) -> bool {
        if let Err(e) = WorkerRepo::release_slot(&self.pool, worker_id).await {
            tracing::error!(worker_id, job_id = job.id, error = %e, "Failed to release slot");
        }

        let outcome = WorkerRepo::record_expiration_penalty(
            &self.pool,
            worker_id,
            job.id,
            reason,
            self.config.suspension_threshold,
        )
        .await;

        match outcome {
            Ok(Some(penalty)) => {
                tracing::info!(
                    worker_id,
                    job_id = job.id,
                    warning_count = penalty.warning_count,
                    suspended = penalty.newly_suspended,
                    "Expiration penalty recorded"
                );
                self.bus.publish(
                    DispatchEvent::new("job.expired_penalty")
                        .with_job(job.id)
                        .with_worker(worker_id)
                        .with_recipient(worker_id)
                        .with_payload(serde_json::json!({
                            "warning_count": penalty.warning_count,
                        })),
                );
                if penalty.newly_suspended {
                    self.bus.publish(
                        DispatchEvent::new("worker.suspended")
                            .with_worker(worker_id)
                            .with_recipient(worker_id)
                            .with_payload(serde_json::json!({
                                "warning_count": penalty.warning_count,
                            })),
                    );
                }
                true
            }
            Ok(None) => {
                tracing::debug!(worker_id, job_id = job.id, "Penalty already recorded");
                false
            }
            Err(e) => {
                tracing::error!(worker_id, job_id = job.id, error = %e, "Failed to record penalty");
                false
            }
        }
    }
}
