pub mod admin;
pub mod health;
pub mod jobs;
pub mod workers;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /jobs                             book a job (POST)
/// /jobs/{id}                        get job (GET)
/// /jobs/{id}/matches                ranked candidates (GET)
/// /jobs/{id}/claim                  claim for the calling worker (POST)
/// /jobs/{id}/auto-assign            assign best worker, admin (POST)
/// /jobs/{id}/en-route               assigned -> en_route (POST)
/// /jobs/{id}/start                  en_route -> in_progress (POST)
/// /jobs/{id}/complete               in_progress -> completed (POST)
///
/// /workers                          register worker, admin (POST)
/// /workers/{id}                     get worker (GET)
/// /workers/{id}/availability        toggle availability (PUT)
///
/// /notifications                    caller's notifications (GET)
///
/// /admin/workers/{id}/penalties     penalty report (GET)
/// /admin/workers/{id}/reinstate     lift suspension (POST)
/// /admin/jobs/{id}/resolve-refund   settle a refund manually (POST)
/// /admin/sweep                      run one sweep now (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/jobs", jobs::router())
        .nest("/workers", workers::router())
        .route("/notifications", get(handlers::workers::list_notifications))
        .nest("/admin", admin::router())
}
