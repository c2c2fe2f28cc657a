//! Job (reservation) entity models and DTOs.

use plowline_core::geo::Coordinates;
use plowline_core::matching::JobProfile;
use plowline_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::status::{PaymentStatus, StatusId};

/// A row from the `jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Job {
    pub id: DbId,
    pub customer_id: DbId,
    pub status_id: StatusId,
    pub longitude: f64,
    pub latitude: f64,
    pub zone: Option<String>,
    pub required_equipment: Vec<String>,
    pub departure_at: Timestamp,
    pub deadline_at: Timestamp,
    pub assigned_worker_id: Option<DbId>,
    pub payment_status_id: StatusId,
    pub charge_reference: Option<String>,
    pub total_price_cents: i64,
    pub refund_amount_cents: Option<i64>,
    pub refund_reference: Option<String>,
    pub refund_attempts: i32,
    pub refund_escalated: bool,
    pub is_priority: bool,
    pub assigned_at: Option<Timestamp>,
    pub cancelled_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub cancelled_by: Option<String>,
    pub cancel_reason: Option<String>,
    pub match_snapshot: Option<serde_json::Value>,
    pub match_snapshot_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Job {
    /// Job site coordinates.
    pub fn location(&self) -> Coordinates {
        Coordinates::new(self.longitude, self.latitude)
    }

    /// The matching inputs for this job.
    pub fn profile(&self) -> JobProfile {
        JobProfile {
            location: self.location(),
            required_equipment: self.required_equipment.clone(),
            zone: self.zone.clone(),
        }
    }

    /// Whether a refund is owed and not yet settled.
    pub fn refund_pending(&self) -> bool {
        self.payment_status_id == PaymentStatus::PendingRefund.id()
    }
}

/// DTO for creating a new job (used by the booking flow and tests).
#[derive(Debug, Deserialize)]
pub struct CreateJob {
    pub customer_id: DbId,
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
