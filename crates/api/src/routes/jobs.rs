//! Route definitions for the `/jobs` resource.
//!
//! All endpoints require authentication.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Routes mounted at `/jobs`.
///
/// ```text
/// POST   /                  -> create_job
/// GET    /{id}              -> get_job
/// GET    /{id}/matches      -> get_matches
/// POST   /{id}/claim        -> claim_job
/// POST   /{id}/auto-assign  -> auto_assign_job
/// POST   /{id}/en-route     -> mark_en_route
/// POST   /{id}/start        -> mark_started
/// POST   /{id}/complete     -> mark_completed
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(jobs::create_job))
        .route("/{id}", get(jobs::get_job))
        .route("/{id}/matches", get(jobs::get_matches))
        .route("/{id}/claim", post(jobs::claim_job))
        .route("/{id}/auto-assign", post(jobs::auto_assign_job))
        .route("/{id}/en-route", post(jobs::mark_en_route))
        .route("/{id}/start", post(jobs::mark_started))
        .route("/{id}/complete", post(jobs::mark_completed))
}
