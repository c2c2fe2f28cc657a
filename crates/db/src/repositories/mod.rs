//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument. Every lifecycle transition is a
//! single conditional UPDATE so concurrent writers race on the database's
//! atomicity, never on a read-then-write gap.

pub mod job_repo;
pub mod notification_repo;
pub mod worker_repo;

pub use job_repo::{ClaimOutcome, JobRepo};
pub use notification_repo::NotificationRepo;
pub use worker_repo::{PenaltyOutcome, WorkerRepo};
