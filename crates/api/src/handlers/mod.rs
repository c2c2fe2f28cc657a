//! HTTP handlers, grouped by resource.

pub mod admin;
pub mod jobs;
pub mod workers;
