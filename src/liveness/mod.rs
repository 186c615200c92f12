//! # Event Forwarding Liveness
//!
//! Per-subscription active/total source counts. A source is active when it
//! reports no error and its last heartbeat (if any) is younger than the
//! subscription's heartbeat window. The window is the subscription's custom
//! interval or, failing that, the interval of its global configuration mode.

pub mod evaluator;
pub mod policy;
pub mod types;

pub use evaluator::{LivenessEvaluator, LivenessSettings};
pub use policy::{is_source_active, GlobalModeTable, HeartbeatPolicy, HeartbeatPolicyError};
pub use types::{
    AggregateCount, LivenessReport, SkipReason, SkippedSubscription, SourceStatus, Subscription,
};
