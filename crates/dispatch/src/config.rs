use plowline_core::geo::DEFAULT_MAX_DISTANCE_KM;
use plowline_core::penalty::{
    EnforcementConfig, DEFAULT_GRACE_WINDOW_MINS, DEFAULT_REFUND_MAX_ATTEMPTS,
    DEFAULT_REMINDER_WINDOW_MINS, DEFAULT_SUSPENSION_THRESHOLD,
};

/// Dispatch engine configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Seconds between deadline sweeps (default: `60`).
    pub sweep_interval_secs: u64,
    /// Distance beyond which candidates score zero, in km (default: `50`).
    pub max_distance_km: f64,
    /// Maximum candidates returned by a match query (default: `10`).
    pub match_limit: usize,
    /// Enforcement windows and thresholds.
    pub enforcement: EnforcementConfig,
    /// Base URL of the payment provider API, e.g. `https://pay.example.com`.
    /// `None` disables refund execution (refunds stay pending).
    pub payment_api_url: Option<String>,
    /// URL of the mobile push gateway. `None` disables push delivery.
    pub push_gateway_url: Option<String>,
}

impl DispatchConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default |
    /// |--------------------------|---------|
    /// | `SWEEP_INTERVAL_SECS`    | `60`    |
    /// | `MAX_DISTANCE_KM`        | `50`    |
    /// | `MATCH_LIMIT`            | `10`    |
    /// | `GRACE_WINDOW_MINS`      | `30`    |
    /// | `REMINDER_WINDOW_MINS`   | `15`    |
    /// | `SUSPENSION_THRESHOLD`   | `3`     |
    /// | `REFUND_MAX_ATTEMPTS`    | `5`     |
    /// | `PAYMENT_API_URL`        | unset   |
    /// | `PUSH_GATEWAY_URL`       | unset   |
    pub fn from_env() -> Self {
        let sweep_interval_secs: u64 = std::env::var("SWEEP_INTERVAL_SECS")
            .unwrap_or_else(|_| "60".into())
            .parse()
            .expect("SWEEP_INTERVAL_SECS must be a valid u64");

        let max_distance_km: f64 = std::env::var("MAX_DISTANCE_KM")
            .unwrap_or_else(|_| DEFAULT_MAX_DISTANCE_KM.to_string())
            .parse()
            .expect("MAX_DISTANCE_KM must be a valid f64");

        let match_limit: usize = std::env::var("MATCH_LIMIT")
            .unwrap_or_else(|_| "10".into())
            .parse()
            .expect("MATCH_LIMIT must be a valid usize");

        let grace_window_mins: i64 = std::env::var("GRACE_WINDOW_MINS")
            .unwrap_or_else(|_| DEFAULT_GRACE_WINDOW_MINS.to_string())
            .parse()
            .expect("GRACE_WINDOW_MINS must be a valid i64");

        let reminder_window_mins: i64 = std::env::var("REMINDER_WINDOW_MINS")
            .unwrap_or_else(|_| DEFAULT_REMINDER_WINDOW_MINS.to_string())
            .parse()
            .expect("REMINDER_WINDOW_MINS must be a valid i64");

        let suspension_threshold: i32 = std::env::var("SUSPENSION_THRESHOLD")
            .unwrap_or_else(|_| DEFAULT_SUSPENSION_THRESHOLD.to_string())
            .parse()
            .expect("SUSPENSION_THRESHOLD must be a valid i32");

        let refund_max_attempts: i32 = std::env::var("REFUND_MAX_ATTEMPTS")
            .unwrap_or_else(|_| DEFAULT_REFUND_MAX_ATTEMPTS.to_string())
            .parse()
            .expect("REFUND_MAX_ATTEMPTS must be a valid i32");

        Self {
            sweep_interval_secs,
            max_distance_km,
            match_limit,
            enforcement: EnforcementConfig {
                grace_window_mins,
                reminder_window_mins,
                suspension_threshold,
                refund_max_attempts,
            },
            payment_api_url: std::env::var("PAYMENT_API_URL").ok(),
            push_gateway_url: std::env::var("PUSH_GATEWAY_URL").ok(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 60,
            max_distance_km: DEFAULT_MAX_DISTANCE_KM,
            match_limit: 10,
            enforcement: EnforcementConfig::default(),
            payment_api_url: None,
            push_gateway_url: None,
        }
    }
}
