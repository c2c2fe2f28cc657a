//! Plowline dispatch engine.
//!
//! Ties the pure matching and policy code in `plowline-core` to the
//! database and the notification bus:
//!
//! - [`MatchEngine`] — ranks candidate workers for a job and drives the
//!   claim protocol (manual claims and automatic assignment).
//! - [`DeadlineSweeper`] — the periodic enforcement loop: reminders,
//!   expiration, refund retry, and refund escalation.
//! - [`ExpirationHandler`] — the per-job expiration sequence.
//! - [`PaymentClient`] — the seam to the payment provider.

pub mod config;
pub mod engine;
pub mod expiration;
pub mod payments;
pub mod sweeper;

pub use config::DispatchConfig;
pub use engine::{AssignOutcome, EngineError, MatchEngine};
pub use expiration::{ExpirationHandler, ExpirationOutcome};
pub use payments::{HttpPaymentClient, PaymentClient, PaymentError, RefundReceipt};
pub use sweeper::{DeadlineSweeper, SweepSummary};
