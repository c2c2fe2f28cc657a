//! Worker entity models.

use plowline_core::geo::Coordinates;
use plowline_core::matching::CandidateWorker;
use plowline_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `workers` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Worker {
    pub id: DbId,
    pub display_name: String,
    pub is_available: bool,
    pub is_suspended: bool,
    pub suspended_at: Option<Timestamp>,
    pub suspended_until: Option<Timestamp>,
    pub suspension_reason: Option<String>,
    pub longitude: f64,
    pub latitude: f64,
    pub equipment: Vec<String>,
    pub max_active_jobs: i32,
    pub active_jobs_count: i32,
    pub average_rating: f64,
    pub total_jobs_completed: i32,
    pub total_cancellations: i32,
    pub warning_count: i32,
    pub zone: Option<String>,
    pub completed_jobs_in_zone: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Worker {
    /// Snapshot this row as a scoring candidate.
    pub fn as_candidate(&self) -> CandidateWorker {
        CandidateWorker {
            worker_id: self.id,
            is_available: self.is_available,
            is_suspended: self.is_suspended,
            location: Coordinates::new(self.longitude, self.latitude),
            equipment: self.equipment.clone(),
            max_active_jobs: self.max_active_jobs,
            active_jobs_count: self.active_jobs_count,
            average_rating: self.average_rating,
            total_jobs_completed: self.total_jobs_completed,
            total_cancellations: self.total_cancellations,
            zone: self.zone.clone(),
            completed_jobs_in_zone: self.completed_jobs_in_zone,
        }
    }
}

/// A row from the append-only `worker_cancellations` ledger.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CancellationRecord {
    pub id: DbId,
    pub worker_id: DbId,
    pub job_id: DbId,
    pub reason: String,
    pub occurred_at: Timestamp,
}

/// DTO for registering a worker (used by onboarding and tests).
#[derive(Debug, Deserialize)]
pub struct CreateWorker {
    pub display_name: String,
    pub longitude: f64,
    pub latitude: f64,
    pub equipment: Vec<String>,
    pub max_active_jobs: Option<i32>,
    pub zone: Option<String>,
}
