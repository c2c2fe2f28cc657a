//! Candidate filtering and match scoring.
//!
//! Given a job and a snapshot of the worker pool, this module produces a
//! deterministic ranked candidate list. Filtering applies the hard
//! constraints (availability, suspension, capacity, equipment superset);
//! scoring combines six weighted factors into a 0-100 composite. Both
//! stages are pure so the same snapshot always yields the same ranking.

use serde::{Deserialize, Serialize};

use crate::geo::{self, Coordinates};
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Factor weights (must sum to 1.0)
// ---------------------------------------------------------------------------

/// Weight of the distance factor.
pub const WEIGHT_DISTANCE: f64 = 0.20;

/// Weight of the availability headroom factor.
pub const WEIGHT_AVAILABILITY: f64 = 0.25;

/// Weight of the customer rating factor.
pub const WEIGHT_RATING: f64 = 0.20;

/// Weight of the equipment fit factor. Always 100 after the hard filter;
/// kept as an explicit factor so the breakdown stays self-explanatory.
pub const WEIGHT_EQUIPMENT: f64 = 0.15;

/// Weight of the experience factor.
pub const WEIGHT_EXPERIENCE: f64 = 0.10;

/// Weight of the zone specialization factor.
pub const WEIGHT_ZONE: f64 = 0.10;

/// Workers with fewer completed jobs than this get a neutral rating score
/// instead of their (statistically meaningless) average.
pub const MIN_JOBS_FOR_RATING: i32 = 3;

/// Neutral rating score for workers below [`MIN_JOBS_FOR_RATING`].
pub const NEUTRAL_RATING_SCORE: f64 = 50.0;

/// Completed-job count at which the volume half of the experience factor
/// saturates.
pub const EXPERIENCE_SATURATION_JOBS: f64 = 50.0;

/// Zone specialization points per completed job in the job's zone.
pub const ZONE_POINTS_PER_JOB: f64 = 10.0;

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// The job-side inputs to filtering and scoring.
#[derive(Debug, Clone)]
pub struct JobProfile {
    pub location: Coordinates,
    pub required_equipment: Vec<String>,
    pub zone: Option<String>,
}

/// A point-in-time snapshot of one worker, as loaded from the pool.
#[derive(Debug, Clone)]
pub struct CandidateWorker {
    pub worker_id: DbId,
    pub is_available: bool,
    pub is_suspended: bool,
    pub location: Coordinates,
    pub equipment: Vec<String>,
    pub max_active_jobs: i32,
    pub active_jobs_count: i32,
    pub average_rating: f64,
    pub total_jobs_completed: i32,
    pub total_cancellations: i32,
    pub zone: Option<String>,
    pub completed_jobs_in_zone: i32,
}

// ---------------------------------------------------------------------------
// Hard constraints (CandidateFilter)
// ---------------------------------------------------------------------------

/// Why a worker was excluded before scoring.
///
/// Hard-constraint violations are normal negative results, never errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Unavailable,
    Suspended,
    AtCapacity,
    MissingEquipment,
}

/// Apply the hard constraints. `None` means the worker is eligible.
pub fn check_eligibility(job: &JobProfile, worker: &CandidateWorker) -> Option<Rejection> {
    if worker.is_suspended {
        return Some(Rejection::Suspended);
    }
    if !worker.is_available {
        return Some(Rejection::Unavailable);
    }
    if worker.active_jobs_count >= worker.max_active_jobs {
        return Some(Rejection::AtCapacity);
    }
    // Full superset: every required tag must be present.
    let has_all = job
        .required_equipment
        .iter()
        .all(|req| worker.equipment.iter().any(|tag| tag == req));
    if !has_all {
        return Some(Rejection::MissingEquipment);
    }
    None
}

// ---------------------------------------------------------------------------
// Scoring (MatchScorer)
// ---------------------------------------------------------------------------

/// Per-factor scores, each in 0-100. Retained on every match result so a
/// ranking can be audited after the fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub distance: i32,
    pub availability: i32,
    pub rating: i32,
    pub equipment: i32,
    pub experience: i32,
    pub zone_specialization: i32,
}

/// One entry in a ranked candidate list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub worker_id: DbId,
    /// 1-based position in the ranking.
    pub rank: u32,
    /// Weighted composite, rounded to the nearest integer.
    pub score: i32,
    /// Great-circle distance to the job site. `None` when either
    /// coordinate was malformed.
    pub distance_km: Option<f64>,
    pub breakdown: ScoreBreakdown,
}

/// Availability headroom: `100 * (1 - active / max)`.
fn availability_score(active: i32, max: i32) -> f64 {
    if max <= 0 {
        return 0.0;
    }
    let headroom = 1.0 - (active as f64 / max as f64);
    (100.0 * headroom).clamp(0.0, 100.0)
}

/// Rating on a 0-5 scale mapped to 0-100, neutral below the minimum
/// sample size.
fn rating_score(average_rating: f64, total_jobs_completed: i32) -> f64 {
    if total_jobs_completed < MIN_JOBS_FOR_RATING {
        return NEUTRAL_RATING_SCORE;
    }
    (average_rating * 20.0).clamp(0.0, 100.0)
}

/// Experience: half completion rate, half saturating volume.
fn experience_score(total_jobs_completed: i32, total_cancellations: i32) -> f64 {
    let completion_rate = if total_jobs_completed <= 0 {
        1.0
    } else {
        let completed = total_jobs_completed as f64;
        ((completed - total_cancellations as f64) / completed).clamp(0.0, 1.0)
    };
    let volume = (total_jobs_completed as f64 / EXPERIENCE_SATURATION_JOBS).min(1.0);
    50.0 * completion_rate + 50.0 * volume.max(0.0)
}

/// Zone specialization: 10 points per job completed in the job's zone,
/// capped at 100. Scores 0 when either side has no zone or they differ.
fn zone_score(job_zone: Option<&str>, worker_zone: Option<&str>, completed_in_zone: i32) -> f64 {
    match (job_zone, worker_zone) {
        (Some(j), Some(w)) if j == w => {
            (completed_in_zone.max(0) as f64 * ZONE_POINTS_PER_JOB).min(100.0)
        }
        _ => 0.0,
    }
}

/// Score a single eligible worker against a job.
///
/// Returns the distance (if computable), the rounded per-factor breakdown,
/// and the rounded composite. Callers must have applied
/// [`check_eligibility`] first; the equipment factor is reported as 100
/// on that assumption.
pub fn score_candidate(
    job: &JobProfile,
    worker: &CandidateWorker,
    max_distance_km: f64,
) -> (Option<f64>, ScoreBreakdown, i32) {
    let distance_km = geo::haversine_km(job.location, worker.location);
    let distance = match distance_km {
        Some(d) => geo::distance_score(d, max_distance_km) as f64,
        None => 0.0,
    };
    let availability = availability_score(worker.active_jobs_count, worker.max_active_jobs);
    let rating = rating_score(worker.average_rating, worker.total_jobs_completed);
    let equipment = 100.0;
    let experience = experience_score(worker.total_jobs_completed, worker.total_cancellations);
    let zone = zone_score(
        job.zone.as_deref(),
        worker.zone.as_deref(),
        worker.completed_jobs_in_zone,
    );

    let composite = WEIGHT_DISTANCE * distance
        + WEIGHT_AVAILABILITY * availability
        + WEIGHT_RATING * rating
        + WEIGHT_EQUIPMENT * equipment
        + WEIGHT_EXPERIENCE * experience
        + WEIGHT_ZONE * zone;

    let breakdown = ScoreBreakdown {
        distance: distance.round() as i32,
        availability: availability.round() as i32,
        rating: rating.round() as i32,
        equipment: equipment as i32,
        experience: experience.round() as i32,
        zone_specialization: zone.round() as i32,
    };

    (distance_km, breakdown, composite.round() as i32)
}

/// Filter, score, and rank the worker pool for a job.
///
/// Ordering: composite score descending, then distance ascending, then
/// `total_jobs_completed` descending, then worker id ascending so the
/// result is a total order. `limit = 0` means no limit.
pub fn rank_candidates(
    job: &JobProfile,
    pool: &[CandidateWorker],
    max_distance_km: f64,
    limit: usize,
) -> Vec<MatchResult> {
    let mut scored: Vec<(MatchResult, i32)> = pool
        .iter()
        .filter(|w| check_eligibility(job, w).is_none())
        .map(|w| {
            let (distance_km, breakdown, score) = score_candidate(job, w, max_distance_km);
            (
                MatchResult {
                    worker_id: w.worker_id,
                    rank: 0,
                    score,
                    distance_km,
                    breakdown,
                },
                w.total_jobs_completed,
            )
        })
        .collect();

    scored.sort_by(|(a, a_jobs), (b, b_jobs)| {
        b.score
            .cmp(&a.score)
            .then_with(|| {
                // Unknown distances sort last within a score bucket.
                let da = a.distance_km.unwrap_or(f64::MAX);
                let db = b.distance_km.unwrap_or(f64::MAX);
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| b_jobs.cmp(a_jobs))
            .then_with(|| a.worker_id.cmp(&b.worker_id))
    });

    let take = if limit == 0 { scored.len() } else { limit };
    scored
        .into_iter()
        .take(take)
        .enumerate()
        .map(|(i, (mut result, _))| {
            result.rank = (i + 1) as u32;
            result
        })
        .collect()
}
