//! Plowline core domain logic.
//!
//! Pure functions and types shared by the dispatch engine, the repository
//! layer, and the API. This crate has zero internal dependencies so it can
//! be used from any other workspace crate (and future CLI tooling) without
//! pulling in sqlx or axum.

pub mod error;
pub mod geo;
pub mod lifecycle;
pub mod matching;
pub mod penalty;
pub mod roles;
pub mod types;
