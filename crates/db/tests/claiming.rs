//! Integration tests for the atomic claim protocol.
//!
//! Exercises the repository layer against a real database: the conditional
//! assignment, claim-time re-validation of worker capacity, the concurrent
//! claim race, and the guarded progress transitions.

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use plowline_db::models::job::CreateJob;
use plowline_db::models::status::JobStatus;
use plowline_db::models::worker::CreateWorker;
use plowline_db::repositories::{ClaimOutcome, JobRepo, WorkerRepo};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_job(customer_id: i64) -> CreateJob {
    CreateJob {
        customer_id,
        longitude: 10.75,
        latitude: 59.91,
        zone: Some("frogner".into()),
        required_equipment: vec!["shovel".into()],
        departure_at: Utc::now(),
        deadline_at: Utc::now() + Duration::hours(2),
        total_price_cents: 45_000,
        charge_reference: None,
        is_priority: None,
    }
}

fn new_worker(name: &str) -> CreateWorker {
    CreateWorker {
        display_name: name.to_string(),
        longitude: 10.74,
        latitude: 59.92,
        equipment: vec!["shovel".into(), "ice_scraper".into()],
        max_active_jobs: Some(3),
        zone: Some("frogner".into()),
    }
}

async fn available_worker(pool: &PgPool, name: &str) -> i64 {
    let worker = WorkerRepo::create(pool, &new_worker(name)).await.unwrap();
    WorkerRepo::set_availability(pool, worker.id, true)
        .await
        .unwrap();
    worker.id
}

// ---------------------------------------------------------------------------
// Claim basics
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn claim_assigns_pending_job(pool: PgPool) {
    let worker_id = available_worker(&pool, "w1").await;
    let job = JobRepo::create(&pool, &new_job(100)).await.unwrap();

    let outcome = JobRepo::claim(&pool, job.id, worker_id).await.unwrap();

    let claimed = assert_matches!(outcome, ClaimOutcome::Claimed(j) => j);
    assert_eq!(claimed.status_id, JobStatus::Assigned.id());
    assert_eq!(claimed.assigned_worker_id, Some(worker_id));
    assert!(claimed.assigned_at.is_some());

    let worker = WorkerRepo::find_by_id(&pool, worker_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(worker.active_jobs_count, 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn second_claim_loses_and_does_not_leak_a_slot(pool: PgPool) {
    let first = available_worker(&pool, "w1").await;
    let second = available_worker(&pool, "w2").await;
    let job = JobRepo::create(&pool, &new_job(100)).await.unwrap();

    assert_matches!(
        JobRepo::claim(&pool, job.id, first).await.unwrap(),
        ClaimOutcome::Claimed(_)
    );
    assert_matches!(
        JobRepo::claim(&pool, job.id, second).await.unwrap(),
        ClaimOutcome::AlreadyTaken
    );

    // The losing worker's slot reservation must have been rolled back.
    let loser = WorkerRepo::find_by_id(&pool, second).await.unwrap().unwrap();
    assert_eq!(loser.active_jobs_count, 0);

    let job = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(job.assigned_worker_id, Some(first));
}

#[sqlx::test(migrations = "./migrations")]
async fn claim_revalidates_capacity_at_claim_time(pool: PgPool) {
    let worker = WorkerRepo::create(
        &pool,
        &CreateWorker {
            max_active_jobs: Some(1),
            ..new_worker("w1")
        },
    )
    .await
    .unwrap();
    WorkerRepo::set_availability(&pool, worker.id, true)
        .await
        .unwrap();

    let first_job = JobRepo::create(&pool, &new_job(100)).await.unwrap();
    let second_job = JobRepo::create(&pool, &new_job(101)).await.unwrap();

    assert_matches!(
        JobRepo::claim(&pool, first_job.id, worker.id).await.unwrap(),
        ClaimOutcome::Claimed(_)
    );
    // Capacity filled between ranking and claiming: the claim must fail
    // closed even though the job is still pending.
    assert_matches!(
        JobRepo::claim(&pool, second_job.id, worker.id).await.unwrap(),
        ClaimOutcome::WorkerUnavailable
    );

    let second_job = JobRepo::find_by_id(&pool, second_job.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second_job.status_id, JobStatus::Pending.id());
    assert_eq!(second_job.assigned_worker_id, None);
}

#[sqlx::test(migrations = "./migrations")]
async fn unavailable_or_suspended_worker_cannot_claim(pool: PgPool) {
    let unavailable = WorkerRepo::create(&pool, &new_worker("w1")).await.unwrap();
    let suspended = available_worker(&pool, "w2").await;
    sqlx::query("UPDATE workers SET is_suspended = TRUE WHERE id = $1")
        .bind(suspended)
        .execute(&pool)
        .await
        .unwrap();

    let job = JobRepo::create(&pool, &new_job(100)).await.unwrap();

    assert_matches!(
        JobRepo::claim(&pool, job.id, unavailable.id).await.unwrap(),
        ClaimOutcome::WorkerUnavailable
    );
    assert_matches!(
        JobRepo::claim(&pool, job.id, suspended).await.unwrap(),
        ClaimOutcome::WorkerUnavailable
    );
}

// ---------------------------------------------------------------------------
// The race: N concurrent claims, exactly one winner
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn concurrent_claims_have_exactly_one_winner(pool: PgPool) {
    let job = JobRepo::create(&pool, &new_job(100)).await.unwrap();

    let mut worker_ids = Vec::new();
    for i in 0..8 {
        worker_ids.push(available_worker(&pool, &format!("w{i}")).await);
    }

    let mut tasks = tokio::task::JoinSet::new();
    for worker_id in worker_ids.clone() {
        let pool = pool.clone();
        let job_id = job.id;
        tasks.spawn(async move {
            let outcome = JobRepo::claim(&pool, job_id, worker_id).await.unwrap();
            (worker_id, outcome)
        });
    }

    let mut winners = Vec::new();
    let mut losses = 0;
    while let Some(result) = tasks.join_next().await {
        match result.unwrap() {
            (worker_id, ClaimOutcome::Claimed(_)) => winners.push(worker_id),
            (_, ClaimOutcome::AlreadyTaken) => losses += 1,
            (worker_id, ClaimOutcome::WorkerUnavailable) => {
                panic!("worker {worker_id} was eligible but reported unavailable")
            }
        }
    }

    assert_eq!(winners.len(), 1, "exactly one claim must win");
    assert_eq!(losses, 7);

    // The assignment is stable and matches the single winner.
    let job = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(job.assigned_worker_id, Some(winners[0]));
    assert_eq!(job.status_id, JobStatus::Assigned.id());

    // Exactly one slot was consumed across the whole pool.
    let total_active: i64 =
        sqlx::query_scalar("SELECT COALESCE(SUM(active_jobs_count), 0) FROM workers")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(total_active, 1);
}

// ---------------------------------------------------------------------------
// Guarded progress transitions
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn progress_transitions_follow_the_state_machine(pool: PgPool) {
    let worker_id = available_worker(&pool, "w1").await;
    let job = JobRepo::create(&pool, &new_job(100)).await.unwrap();
    JobRepo::claim(&pool, job.id, worker_id).await.unwrap();

    // Cannot start before going en route.
    assert!(!JobRepo::mark_in_progress(&pool, job.id, worker_id)
        .await
        .unwrap());

    assert!(JobRepo::mark_en_route(&pool, job.id, worker_id).await.unwrap());
    assert!(JobRepo::mark_in_progress(&pool, job.id, worker_id)
        .await
        .unwrap());
    assert!(JobRepo::complete(&pool, job.id, worker_id).await.unwrap());

    let job = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(job.status_id, JobStatus::Completed.id());
    assert!(job.completed_at.is_some());

    // Completion releases the slot and bumps counters (same zone).
    let worker = WorkerRepo::find_by_id(&pool, worker_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(worker.active_jobs_count, 0);
    assert_eq!(worker.total_jobs_completed, 1);
    assert_eq!(worker.completed_jobs_in_zone, 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn another_worker_cannot_drive_the_transition(pool: PgPool) {
    let owner = available_worker(&pool, "w1").await;
    let intruder = available_worker(&pool, "w2").await;
    let job = JobRepo::create(&pool, &new_job(100)).await.unwrap();
    JobRepo::claim(&pool, job.id, owner).await.unwrap();

    assert!(!JobRepo::mark_en_route(&pool, job.id, intruder).await.unwrap());

    let job = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(job.status_id, JobStatus::Assigned.id());
}
