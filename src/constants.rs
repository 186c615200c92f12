//! # System Constants
//!
//! Metric names published to the sink and the operational limits shared by the
//! configuration layer and the periodic jobs.

/// Metric categories and counter names. These match the performance objects the
/// platform registers, so instance values land in the existing counters.
pub mod metrics {
    /// Category holding per-channel throughput counters
    pub const EVENT_LOG_CATEGORY: &str = "Windows Event Log";

    /// Events-per-second counter, one instance per channel
    pub const CHANNEL_EPS_COUNTER: &str = "Channel EPS rate";

    /// Category holding per-subscription forwarding counters
    pub const EVENT_FORWARDING_CATEGORY: &str = "Windows Event Forwarding";

    /// Sources that recently heartbeated (or have not yet) without error
    pub const ACTIVE_SOURCES_COUNTER: &str = "Active Event Source Count";

    /// All sources registered under the subscription
    pub const TOTAL_SOURCES_COUNTER: &str = "Total Event Source Count";
}

/// Configuration limits and defaults
pub mod limits {
    /// Smallest sampling period accepted at startup
    pub const MIN_SAMPLING_INTERVAL_MS: u64 = 1000;

    /// Smallest liveness evaluation period accepted at startup
    pub const MIN_LIVENESS_INTERVAL_MS: u64 = 1000;

    pub const DEFAULT_MAX_CONCURRENT_SOURCE_CHECKS: usize = 16;

    pub const DEFAULT_SOURCE_CHECK_TIMEOUT_MS: u64 = 5000;

    pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 30_000;

    /// Separator used by the single-string channel list format
    pub const CHANNEL_LIST_SEPARATOR: char = ';';
}

/// Job names used in logs and scheduler statistics
pub mod jobs {
    pub const RATE_SAMPLER: &str = "rate_sampler";
    pub const LIVENESS_EVALUATOR: &str = "liveness_evaluator";
}
