//! Route definitions for the `/workers` resource.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::workers;
use crate::state::AppState;

/// Routes mounted at `/workers`.
///
/// ```text
/// POST   /                    -> register_worker (admin)
/// GET    /{id}                -> get_worker
/// PUT    /{id}/availability   -> set_availability
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(workers::register_worker))
        .route("/{id}", get(workers::get_worker))
        .route("/{id}/availability", put(workers::set_availability))
}
