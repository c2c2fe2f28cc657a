//! Periodic deadline sweep.
//!
//! [`DeadlineSweeper`] wakes on a fixed interval and runs four passes:
//!
//! 1. reminders for assigned jobs approaching their deadline,
//! 2. refund retries for cancelled jobs still owing a refund,
//! 3. expiration of jobs overdue past the grace window,
//! 4. escalation of refunds that exhausted their retries.
//!
//! Every pass is idempotent against the database, so redundant sweeper
//! instances and crash-restarts are safe: concurrent expiration attempts
//! race on the conditional UPDATE and the loser observes "already
//! resolved". The retry pass runs before the expiration pass so one tick
//! makes at most one provider attempt per job.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use plowline_db::repositories::JobRepo;
use plowline_db::DbPool;
use plowline_events::{DispatchEvent, EventBus};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::DispatchConfig;
use crate::expiration::{ExpirationHandler, ExpirationOutcome};

/// Counters for one sweep, logged after every tick.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct SweepSummary {
    pub reminders_sent: u32,
    pub expired: u32,
    pub already_resolved: u32,
    pub refunds_retried: u32,
    pub refunds_settled: u32,
    pub refunds_escalated: u32,
}

/// The deadline enforcement loop.
pub struct DeadlineSweeper {
    pool: DbPool,
    handler: Arc<ExpirationHandler>,
    bus: Arc<EventBus>,
    config: DispatchConfig,
}

impl DeadlineSweeper {
    pub fn new(
        pool: DbPool,
        handler: Arc<ExpirationHandler>,
        bus: Arc<EventBus>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            pool,
            handler,
            bus,
            config,
        }
    }

    /// Run the sweep loop until `cancel` is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            interval_secs = self.config.sweep_interval_secs,
            grace_window_mins = self.config.enforcement.grace_window_mins,
            "Deadline sweeper started"
        );

        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.sweep_interval_secs));

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Deadline sweeper stopping");
                    break;
                }
                _ = interval.tick() => {
                    match self.sweep_once().await {
                        Ok(summary) => {
                            tracing::info!(
                                reminders = summary.reminders_sent,
                                expired = summary.expired,
                                already_resolved = summary.already_resolved,
                                refunds_retried = summary.refunds_retried,
                                refunds_settled = summary.refunds_settled,
                                refunds_escalated = summary.refunds_escalated,
                                "Sweep completed"
                            );
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Sweep failed");
                        }
                    }
                }
            }
        }
    }

    /// Run one full sweep. Safe to call concurrently with a running loop
    /// (the admin endpoint does exactly that).
    pub async fn sweep_once(&self) -> Result<SweepSummary, sqlx::Error> {
        let mut summary = SweepSummary::default();
        self.send_reminders(&mut summary).await?;
        self.retry_refunds(&mut summary).await?;
        self.expire_overdue(&mut summary).await?;
        self.escalate_refunds(&mut summary).await?;
        Ok(summary)
    }

    /// Pass 1: remind assigned workers of deadlines inside the window.
    async fn send_reminders(&self, summary: &mut SweepSummary) -> Result<(), sqlx::Error> {
        let now = Utc::now();
        let horizon = self.config.enforcement.reminder_horizon(now);
        let due = JobRepo::due_for_reminder(&self.pool, now, horizon).await?;

        for job in due {
            let Some(worker_id) = job.assigned_worker_id else {
                continue;
            };
            let minutes_remaining = (job.deadline_at - now).num_minutes().max(0);
            self.bus.publish(
                DispatchEvent::new("job.deadline_approaching")
                    .with_job(job.id)
                    .with_worker(worker_id)
                    .with_recipient(worker_id)
                    .with_payload(serde_json::json!({
                        "deadline_at": job.deadline_at,
                        "minutes_remaining": minutes_remaining,
                    })),
            );
            summary.reminders_sent += 1;
        }
        Ok(())
    }

    /// Pass 3: expire jobs overdue past the grace window.
    ///
    /// A failure on one job is logged and the pass moves on; one poisoned
    /// row must not stall enforcement for the rest of the backlog.
    async fn expire_overdue(&self, summary: &mut SweepSummary) -> Result<(), sqlx::Error> {
        let now = Utc::now();
        let cutoff = self.config.enforcement.expiration_cutoff(now);
        let overdue = JobRepo::expired_before(&self.pool, cutoff).await?;

        for job in overdue {
            match self.handler.expire(&job, now).await {
                Ok(ExpirationOutcome::Cancelled { .. }) => summary.expired += 1,
                Ok(ExpirationOutcome::AlreadyResolved) => summary.already_resolved += 1,
                Err(e) => {
                    tracing::error!(job_id = job.id, error = %e, "Failed to expire job");
                }
            }
        }
        Ok(())
    }

    /// Pass 2: retry refunds still owed, below the attempt ceiling. Runs
    /// before the expiration pass so a job expired this tick is not
    /// retried again in the same tick after a failed inline attempt.
    async fn retry_refunds(&self, summary: &mut SweepSummary) -> Result<(), sqlx::Error> {
        let owed =
            JobRepo::pending_refunds(&self.pool, self.config.enforcement.refund_max_attempts)
                .await?;

        for job in owed {
            summary.refunds_retried += 1;
            if self.handler.execute_refund(&job).await {
                summary.refunds_settled += 1;
            }
        }
        Ok(())
    }

    /// Pass 4: flag refunds that exhausted automatic retries.
    async fn escalate_refunds(&self, summary: &mut SweepSummary) -> Result<(), sqlx::Error> {
        let exhausted =
            JobRepo::refunds_to_escalate(&self.pool, self.config.enforcement.refund_max_attempts)
                .await?;

        for job in exhausted {
            if JobRepo::mark_refund_escalated(&self.pool, job.id).await? {
                tracing::warn!(
                    job_id = job.id,
                    attempts = job.refund_attempts,
                    "Refund escalated for manual reconciliation"
                );
                self.bus.publish(
                    DispatchEvent::new("refund.escalated")
                        .with_job(job.id)
                        .with_payload(serde_json::json!({
                            "attempts": job.refund_attempts,
                            "amount_cents": job.refund_amount_cents,
                        })),
                );
                summary.refunds_escalated += 1;
            }
        }
        Ok(())
    }
}
