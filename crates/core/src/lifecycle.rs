//! Job lifecycle state machine.
//!
//! This module lives in `core` (zero internal deps) so it can be used by
//! both the API/repository layer and the standalone sweeper binary.

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Job status IDs matching `job_statuses` seed data (1-based SMALLSERIAL).
///
/// The state machine is intentionally duplicated from the `db` crate's
/// `JobStatus` enum because `core` must have zero internal deps.
pub mod state_machine {
    /// Statuses a job can be expired out of. Everything except the two
    /// terminal states (Completed=5, Cancelled=6).
    pub const ACTIVE_STATUSES: [i16; 4] = [1, 2, 3, 4];

    /// Returns the set of valid target status IDs reachable from `from_status`.
    ///
    /// Terminal states (Completed=5, Cancelled=6) return an empty slice
    /// because no further transitions are allowed.
    pub fn valid_transitions(from_status: i16) -> &'static [i16] {
        match from_status {
            // Pending -> Assigned, Cancelled
            1 => &[2, 6],
            // Assigned -> EnRoute, Cancelled
            2 => &[3, 6],
            // EnRoute -> InProgress, Cancelled
            3 => &[4, 6],
            // InProgress -> Completed, Cancelled
            4 => &[5, 6],
            // Terminal states: Completed, Cancelled
            5 | 6 => &[],
            // Unknown status: no transitions allowed
            _ => &[],
        }
    }

    /// Check whether a transition from `from` to `to` is valid.
    pub fn can_transition(from: i16, to: i16) -> bool {
        valid_transitions(from).contains(&to)
    }

    /// Validate a state transition, returning an error message for invalid ones.
    pub fn validate_transition(from: i16, to: i16) -> Result<(), String> {
        if can_transition(from, to) {
            Ok(())
        } else {
            let from_name = status_name(from);
            let to_name = status_name(to);
            Err(format!(
                "Invalid transition: {from_name} ({from}) -> {to_name} ({to})"
            ))
        }
    }

    /// Human-readable name for a status ID (for error messages).
    pub fn status_name(id: i16) -> &'static str {
        match id {
            1 => "Pending",
            2 => "Assigned",
            3 => "EnRoute",
            4 => "InProgress",
            5 => "Completed",
            6 => "Cancelled",
            _ => "Unknown",
        }
    }
}
