//! Integration tests for the admin surface: penalties, reinstatement,
//! refund reconciliation, and the manual sweep trigger.

mod common;

use axum::http::StatusCode;
use axum::Router;
use chrono::{Duration, Utc};
use common::{body_json, get_as, post_json, token_for};
use plowline_db::repositories::WorkerRepo;
use serde_json::json;
use sqlx::PgPool;

const ADMIN_ID: i64 = 9000;
const CUSTOMER_ID: i64 = 5000;

/// Book a paid job whose deadline passed long before the grace window.
async fn book_overdue_job(app: &Router) -> i64 {
    let response = post_json(
        app.clone(),
        "/api/v1/jobs",
        &token_for(CUSTOMER_ID, "customer"),
        json!({
            "longitude": 10.74,
            "latitude": 59.92,
            "zone": "oslo-east",
            "required_equipment": ["plow"],
            "departure_at": (Utc::now() - Duration::hours(4)).to_rfc3339(),
            "deadline_at": (Utc::now() - Duration::hours(2)).to_rfc3339(),
            "total_price_cents": 45_000,
            "charge_reference": "ch_overdue_1",
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    json["data"]["id"].as_i64().expect("job id")
}

// ---------------------------------------------------------------------------
// Authorization
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn admin_endpoints_reject_non_admins(pool: PgPool) {
    let app = common::build_test_app(pool);
    let worker_token = token_for(1, "worker");

    let response = post_json(app.clone(), "/api/v1/admin/sweep", &worker_token, json!({})).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = get_as(
        app.clone(),
        "/api/v1/admin/workers/1/penalties",
        &worker_token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = post_json(
        app,
        "/api/v1/admin/workers/1/reinstate",
        &worker_token,
        json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// ---------------------------------------------------------------------------
// Manual sweep
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn manual_sweep_expires_overdue_jobs(pool: PgPool) {
    let app = common::build_test_app(pool);
    let job_id = book_overdue_job(&app).await;

    let response = post_json(
        app.clone(),
        "/api/v1/admin/sweep",
        &token_for(ADMIN_ID, "admin"),
        json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let summary = body_json(response).await;
    assert_eq!(summary["data"]["expired"], 1);
    assert_eq!(summary["data"]["reminders_sent"], 0);

    // The job is cancelled and, with no payment client configured, the
    // refund obligation stays pending.
    let response = get_as(
        app,
        &format!("/api/v1/jobs/{job_id}"),
        &token_for(ADMIN_ID, "admin"),
    )
    .await;
    let job = body_json(response).await;
    assert_eq!(job["data"]["status_id"], 6);
    assert_eq!(job["data"]["payment_status_id"], 3);
    assert_eq!(job["data"]["cancelled_by"], "system");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn repeated_sweeps_are_idempotent(pool: PgPool) {
    let app = common::build_test_app(pool);
    book_overdue_job(&app).await;
    let admin_token = token_for(ADMIN_ID, "admin");

    let response = post_json(app.clone(), "/api/v1/admin/sweep", &admin_token, json!({})).await;
    let first = body_json(response).await;
    assert_eq!(first["data"]["expired"], 1);

    let response = post_json(app, "/api/v1/admin/sweep", &admin_token, json!({})).await;
    let second = body_json(response).await;
    assert_eq!(second["data"]["expired"], 0);
}

// ---------------------------------------------------------------------------
// Refund reconciliation
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn resolve_refund_settles_a_pending_refund(pool: PgPool) {
    let app = common::build_test_app(pool);
    let job_id = book_overdue_job(&app).await;
    let admin_token = token_for(ADMIN_ID, "admin");

    let response = post_json(app.clone(), "/api/v1/admin/sweep", &admin_token, json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = post_json(
        app,
        &format!("/api/v1/admin/jobs/{job_id}/resolve-refund"),
        &admin_token,
        json!({ "refunded": true, "reference": "re_manual_1" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let job = body_json(response).await;
    assert_eq!(job["data"]["payment_status_id"], 4);
    assert_eq!(job["data"]["refund_reference"], "re_manual_1");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn resolve_refund_conflicts_when_nothing_is_owed(pool: PgPool) {
    let app = common::build_test_app(pool);
    let job_id = book_overdue_job(&app).await;

    // No sweep has run, so the job does not owe a refund yet.
    let response = post_json(
        app,
        &format!("/api/v1/admin/jobs/{job_id}/resolve-refund"),
        &token_for(ADMIN_ID, "admin"),
        json!({ "refunded": true, "reference": "re_early" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

// ---------------------------------------------------------------------------
// Penalties and reinstatement
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn penalty_report_and_reinstatement_round_trip(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let admin_token = token_for(ADMIN_ID, "admin");

    let response = post_json(
        app.clone(),
        "/api/v1/workers",
        &admin_token,
        json!({
            "display_name": "Penalized",
            "longitude": 10.75,
            "latitude": 59.91,
            "equipment": ["plow"],
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let worker = body_json(response).await;
    let worker_id = worker["data"]["id"].as_i64().expect("worker id");

    // Suspend the worker directly, threshold 1 so a single penalty trips it.
    let job_id = book_overdue_job(&app).await;
    WorkerRepo::record_expiration_penalty(&pool, worker_id, job_id, "deadline_expired", 1)
        .await
        .expect("penalty write should succeed")
        .expect("first penalty should apply");

    let response = get_as(
        app.clone(),
        &format!("/api/v1/admin/workers/{worker_id}/penalties"),
        &admin_token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let report = body_json(response).await;
    assert_eq!(report["data"]["warning_count"], 1);
    assert_eq!(report["data"]["is_suspended"], true);
    assert_eq!(report["data"]["history"].as_array().map(Vec::len), Some(1));

    let response = post_json(
        app.clone(),
        &format!("/api/v1/admin/workers/{worker_id}/reinstate"),
        &admin_token,
        json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let reinstated = body_json(response).await;
    assert_eq!(reinstated["data"]["is_suspended"], false);
    assert_eq!(reinstated["data"]["warning_count"], 0);

    // A second reinstate is a conflict, the worker is no longer suspended.
    let response = post_json(
        app,
        &format!("/api/v1/admin/workers/{worker_id}/reinstate"),
        &admin_token,
        json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn reinstate_can_preserve_the_warning_counter(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let admin_token = token_for(ADMIN_ID, "admin");

    let response = post_json(
        app.clone(),
        "/api/v1/workers",
        &admin_token,
        json!({
            "display_name": "KeepsWarnings",
            "longitude": 10.75,
            "latitude": 59.91,
            "equipment": ["plow"],
        }),
    )
    .await;
    let worker = body_json(response).await;
    let worker_id = worker["data"]["id"].as_i64().expect("worker id");

    let job_id = book_overdue_job(&app).await;
    WorkerRepo::record_expiration_penalty(&pool, worker_id, job_id, "deadline_expired", 1)
        .await
        .expect("penalty write should succeed")
        .expect("first penalty should apply");

    let response = post_json(
        app,
        &format!("/api/v1/admin/workers/{worker_id}/reinstate"),
        &admin_token,
        json!({ "reset_warnings": false }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let reinstated = body_json(response).await;
    assert_eq!(reinstated["data"]["is_suspended"], false);
    assert_eq!(reinstated["data"]["warning_count"], 1);
}
