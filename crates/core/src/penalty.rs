//! Enforcement policy: windows, thresholds, and penalty decisions.
//!
//! All tunables live in [`EnforcementConfig`], which is constructed once
//! and injected into the sweeper and expiration handler instead of being
//! read from ambient constants. The helpers are pure so the policy can be
//! tested without a clock or a database.

use crate::types::Timestamp;

/// Default grace window after the deadline before a job is auto-cancelled.
pub const DEFAULT_GRACE_WINDOW_MINS: i64 = 30;

/// Default window before the deadline in which reminders are sent.
pub const DEFAULT_REMINDER_WINDOW_MINS: i64 = 15;

/// Default warning count at which a worker is automatically suspended.
pub const DEFAULT_SUSPENSION_THRESHOLD: i32 = 3;

/// Default ceiling on automatic refund retries before escalating to admin.
pub const DEFAULT_REFUND_MAX_ATTEMPTS: i32 = 5;

/// Enforcement tunables, injected into the sweeper, expiration handler,
/// and penalty ledger.
#[derive(Debug, Clone)]
pub struct EnforcementConfig {
    /// Minutes past the deadline before the expiration pass acts on a job.
    /// Absorbs clock and sync drift.
    pub grace_window_mins: i64,
    /// Minutes before the deadline in which approaching-deadline reminders
    /// are sent to the assigned worker.
    pub reminder_window_mins: i64,
    /// Warning count at which a worker is automatically suspended.
    pub suspension_threshold: i32,
    /// How many times a failed refund is retried by the sweeper before the
    /// job is escalated to admin reconciliation.
    pub refund_max_attempts: i32,
}

impl Default for EnforcementConfig {
    fn default() -> Self {
        Self {
            grace_window_mins: DEFAULT_GRACE_WINDOW_MINS,
            reminder_window_mins: DEFAULT_REMINDER_WINDOW_MINS,
            suspension_threshold: DEFAULT_SUSPENSION_THRESHOLD,
            refund_max_attempts: DEFAULT_REFUND_MAX_ATTEMPTS,
        }
    }
}

impl EnforcementConfig {
    /// The instant before which a deadline counts as expired, i.e.
    /// `now - grace_window`.
    pub fn expiration_cutoff(&self, now: Timestamp) -> Timestamp {
        now - chrono::Duration::minutes(self.grace_window_mins)
    }

    /// The instant up to which upcoming deadlines get a reminder, i.e.
    /// `now + reminder_window`.
    pub fn reminder_horizon(&self, now: Timestamp) -> Timestamp {
        now + chrono::Duration::minutes(self.reminder_window_mins)
    }

    /// Whether a job deadline has been breached beyond the grace window.
    pub fn is_past_grace(&self, deadline_at: Timestamp, now: Timestamp) -> bool {
        deadline_at < self.expiration_cutoff(now)
    }

    /// Whether a worker's warning count triggers automatic suspension.
    pub fn should_suspend(&self, warning_count: i32) -> bool {
        warning_count >= self.suspension_threshold
    }

    /// Whether automatic refund retries are exhausted for a job.
    pub fn refund_attempts_exhausted(&self, attempts: i32) -> bool {
        attempts >= self.refund_max_attempts
    }
}

/// Cancel reason recorded on jobs expired by the system.
pub fn expiration_cancel_reason(deadline_at: Timestamp, now: Timestamp) -> String {
    let overdue_mins = (now - deadline_at).num_minutes().max(0);
    format!("Deadline exceeded by {overdue_mins} minutes without completion")
}

/// Suspension reason recorded when the warning threshold is reached.
pub fn suspension_reason(warning_count: i32) -> String {
    format!("Automatic suspension after {warning_count} expired-job warnings")
}
