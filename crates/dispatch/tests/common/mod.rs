//! Shared fixtures for dispatch integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use chrono::{Duration, Utc};
use plowline_db::models::job::CreateJob;
use plowline_db::models::worker::CreateWorker;
use plowline_db::repositories::WorkerRepo;
use plowline_dispatch::{PaymentClient, PaymentError, RefundReceipt};
use sqlx::PgPool;

/// Recording payment double. Flip `fail` to make refunds decline.
#[derive(Default)]
pub struct StubPayments {
    pub fail: AtomicBool,
    pub calls: Mutex<Vec<(String, i64)>>,
}

impl StubPayments {
    pub fn failing() -> Self {
        Self {
            fail: AtomicBool::new(true),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl PaymentClient for StubPayments {
    async fn refund(
        &self,
        charge_reference: &str,
        amount_cents: i64,
    ) -> Result<RefundReceipt, PaymentError> {
        self.calls
            .lock()
            .unwrap()
            .push((charge_reference.to_string(), amount_cents));
        if self.fail.load(Ordering::SeqCst) {
            Err(PaymentError::Declined(502))
        } else {
            Ok(RefundReceipt {
                refund_id: format!("re_{charge_reference}"),
            })
        }
    }
}

pub fn job_due_in(minutes: i64, charge_reference: Option<&str>) -> CreateJob {
    CreateJob {
        customer_id: 100,
        longitude: 10.75,
        latitude: 59.91,
        zone: Some("frogner".into()),
        required_equipment: vec!["shovel".into()],
        departure_at: Utc::now() - Duration::hours(3),
        deadline_at: Utc::now() + Duration::minutes(minutes),
        total_price_cents: 45_000,
        charge_reference: charge_reference.map(str::to_string),
        is_priority: None,
    }
}

pub async fn available_worker_at(
    pool: &PgPool,
    name: &str,
    longitude: f64,
    latitude: f64,
) -> i64 {
    let worker = WorkerRepo::create(
        pool,
        &CreateWorker {
            display_name: name.to_string(),
            longitude,
            latitude,
            equipment: vec!["shovel".into(), "ice_scraper".into()],
            max_active_jobs: Some(3),
            zone: Some("frogner".into()),
        },
    )
    .await
    .unwrap();
    WorkerRepo::set_availability(pool, worker.id, true)
        .await
        .unwrap();
    worker.id
}
