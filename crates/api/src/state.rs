use std::sync::Arc;

use plowline_dispatch::{DeadlineSweeper, MatchEngine};
use plowline_events::EventBus;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: plowline_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Match engine (ranking, claims, auto-assignment).
    pub engine: Arc<MatchEngine>,
    /// Deadline sweeper, exposed so the admin endpoint can trigger a sweep.
    pub sweeper: Arc<DeadlineSweeper>,
    /// Centralized event bus for publishing dispatch events.
    pub event_bus: Arc<EventBus>,
}
