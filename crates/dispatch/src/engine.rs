//! Worker matching and assignment.
//!
//! [`MatchEngine`] wires the pure ranking in `plowline_core::matching` to
//! the live worker pool and the claim protocol. Ranking never reserves
//! anything; every assignment goes through [`JobRepo::claim`] so ranked
//! lists can go stale without harm.

use std::sync::Arc;

use plowline_core::matching::{rank_candidates, CandidateWorker, MatchResult};
use plowline_core::types::DbId;
use plowline_db::models::job::Job;
use plowline_db::models::status::JobStatus;
use plowline_db::repositories::{ClaimOutcome, JobRepo, WorkerRepo};
use plowline_db::DbPool;
use plowline_events::{DispatchEvent, EventBus};

use crate::config::DispatchConfig;

/// Errors surfaced by the match engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("job {0} not found")]
    JobNotFound(DbId),

    #[error("job {0} is not open for matching")]
    JobNotPending(DbId),

    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Result of an automatic assignment attempt. Finding no worker is a
/// normal outcome, never an error.
#[derive(Debug)]
pub enum AssignOutcome {
    /// A worker claimed the job.
    Assigned(Job),
    /// The job was resolved by someone else while candidates were tried.
    JobUnavailable,
    /// Every eligible candidate was exhausted without a successful claim.
    NoEligibleWorker,
}

/// Ranks candidates for pending jobs and drives assignments.
pub struct MatchEngine {
    pool: DbPool,
    bus: Arc<EventBus>,
    max_distance_km: f64,
    match_limit: usize,
}

impl MatchEngine {
    pub fn new(pool: DbPool, bus: Arc<EventBus>, config: &DispatchConfig) -> Self {
        Self {
            pool,
            bus,
            max_distance_km: config.max_distance_km,
            match_limit: config.match_limit,
        }
    }

    /// The configured default size of a match query.
    pub fn match_limit(&self) -> usize {
        self.match_limit
    }

    /// Rank eligible workers for a pending job, best first.
    ///
    /// `limit` of 0 means unlimited. The full ranking is also persisted on
    /// the job as an advisory snapshot; persistence failure is logged and
    /// does not fail the query.
    pub async fn rank(&self, job_id: DbId, limit: usize) -> Result<Vec<MatchResult>, EngineError> {
        let job = JobRepo::find_by_id(&self.pool, job_id)
            .await?
            .ok_or(EngineError::JobNotFound(job_id))?;
        if job.status_id != JobStatus::Pending.id() {
            return Err(EngineError::JobNotPending(job_id));
        }

        let workers = WorkerRepo::candidates_for(&self.pool, &job.required_equipment).await?;
        let candidates: Vec<CandidateWorker> = workers.iter().map(|w| w.as_candidate()).collect();

        let ranked = rank_candidates(&job.profile(), &candidates, self.max_distance_km, limit);

        match serde_json::to_value(&ranked) {
            Ok(snapshot) => {
                if let Err(e) = JobRepo::set_match_snapshot(&self.pool, job_id, &snapshot).await {
                    tracing::warn!(job_id, error = %e, "Failed to persist match snapshot");
                }
            }
            Err(e) => {
                tracing::warn!(job_id, error = %e, "Failed to serialize match snapshot");
            }
        }

        tracing::info!(
            job_id,
            pool_size = candidates.len(),
            ranked = ranked.len(),
            "Ranked candidates for job"
        );
        Ok(ranked)
    }

    /// Claim a job on behalf of a worker.
    ///
    /// Wraps [`JobRepo::claim`] and publishes the assignment notification
    /// when the claim wins.
    pub async fn claim(&self, job_id: DbId, worker_id: DbId) -> Result<ClaimOutcome, EngineError> {
        JobRepo::find_by_id(&self.pool, job_id)
            .await?
            .ok_or(EngineError::JobNotFound(job_id))?;

        let outcome = JobRepo::claim(&self.pool, job_id, worker_id).await?;
        if let ClaimOutcome::Claimed(job) = &outcome {
            tracing::info!(job_id, worker_id, "Job claimed");
            self.publish_assigned(job);
        }
        Ok(outcome)
    }

    /// Assign a pending job to the best available worker.
    ///
    /// Walks the ranking and attempts a claim per candidate. A candidate
    /// that fails re-validation is skipped for the next one; the walk stops
    /// as soon as the job itself is no longer claimable.
    pub async fn auto_assign(&self, job_id: DbId) -> Result<AssignOutcome, EngineError> {
        let ranked = self.rank(job_id, 0).await?;

        for candidate in &ranked {
            match JobRepo::claim(&self.pool, job_id, candidate.worker_id).await? {
                ClaimOutcome::Claimed(job) => {
                    tracing::info!(
                        job_id,
                        worker_id = candidate.worker_id,
                        rank = candidate.rank,
                        score = candidate.score,
                        "Job auto-assigned"
                    );
                    self.publish_assigned(&job);
                    self.bus.publish(
                        DispatchEvent::new("job.dispatch_assigned")
                            .with_job(job.id)
                            .with_worker(candidate.worker_id)
                            .with_recipient(candidate.worker_id)
                            .with_payload(serde_json::json!({
                                "deadline_at": job.deadline_at,
                            })),
                    );
                    return Ok(AssignOutcome::Assigned(job));
                }
                ClaimOutcome::WorkerUnavailable => {
                    tracing::debug!(
                        job_id,
                        worker_id = candidate.worker_id,
                        "Candidate failed claim-time re-validation, trying next"
                    );
                }
                ClaimOutcome::AlreadyTaken => {
                    return Ok(AssignOutcome::JobUnavailable);
                }
            }
        }

        tracing::info!(job_id, candidates = ranked.len(), "No eligible worker for job");
        Ok(AssignOutcome::NoEligibleWorker)
    }

    fn publish_assigned(&self, job: &Job) {
        let mut event = DispatchEvent::new("job.assigned")
            .with_job(job.id)
            .with_recipient(job.customer_id)
            .with_payload(serde_json::json!({
                "deadline_at": job.deadline_at,
            }));
        if let Some(worker_id) = job.assigned_worker_id {
            event = event.with_worker(worker_id);
        }
        self.bus.publish(event);
    }
}
