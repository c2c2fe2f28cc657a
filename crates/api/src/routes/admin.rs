//! Route definitions for the `/admin` surface. Every handler re-checks the
//! admin role itself.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::admin;
use crate::state::AppState;

/// Routes mounted at `/admin`.
///
/// ```text
/// GET    /workers/{id}/penalties     -> worker_penalties
/// POST   /workers/{id}/reinstate     -> reinstate_worker
/// POST   /jobs/{id}/resolve-refund   -> resolve_refund
/// POST   /sweep                      -> run_sweep
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/workers/{id}/penalties", get(admin::worker_penalties))
        .route("/workers/{id}/reinstate", post(admin::reinstate_worker))
        .route("/jobs/{id}/resolve-refund", post(admin::resolve_refund))
        .route("/sweep", post(admin::run_sweep))
}
