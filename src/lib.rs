#![allow(clippy::doc_markdown)] // Allow technical terms like EventLog, FILETIME in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # logwatch
//!
//! Health monitor for two Windows event pipelines: local event-log channels and
//! event-forwarding (WEF) subscriptions. Two periodic jobs derive metrics from
//! platform state and republish them to a metrics sink.
//!
//! ## Jobs
//!
//! - **Rate sampler** ([`sampling`]): events per second for each configured
//!   channel, from the delta of the newest record's sequence number. Channels
//!   whose reads fail are quarantined for the rest of the run.
//! - **Liveness evaluator** ([`liveness`]): active and total forwarding sources
//!   per enabled subscription, judged against the subscription's heartbeat window.
//!
//! Both run on independent timers ([`scheduler`]); a tick that would overlap the
//! previous one of the same job is dropped.
//!
//! ## Module Organization
//!
//! - [`config`] - Layered configuration loading and validation
//! - [`platform`] - Collaborator traits over event-log and subscription state
//! - [`metrics`] - Metrics sink trait and bundled sinks
//! - [`sampling`] - Instance-name sanitizer, channel cursors, rate sampler
//! - [`liveness`] - Heartbeat policy and liveness evaluator
//! - [`scheduler`] - Periodic job driver with reentrancy guards
//! - [`service`] - Startup wiring and graceful shutdown
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use logwatch::config::MonitorConfig;
//! use logwatch::metrics::TracingMetricsSink;
//! use logwatch::platform::{MemoryLogSource, MemorySubscriptionSource};
//! use logwatch::MonitorService;
//!
//! # async fn example() -> logwatch::Result<()> {
//! logwatch::logging::init_structured_logging();
//!
//! let config = MonitorConfig::new(["Application", "System"], 1000);
//! let service = MonitorService::new(
//!     config,
//!     Arc::new(MemoryLogSource::new().with_channel("Application", 0)),
//!     Arc::new(MemorySubscriptionSource::new()),
//!     Arc::new(TracingMetricsSink::new()),
//! )
//! .await?;
//!
//! let report = service
//!     .run_until(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//! println!("removed {} channel instances", report.channel_instances_removed);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod liveness;
pub mod logging;
pub mod metrics;
pub mod platform;
pub mod sampling;
pub mod scheduler;
pub mod service;

pub use crate::config::{ConfigManager, ConfigurationError, MonitorConfig};
pub use error::{LogSourceError, MonitorError, Result, SinkError, SubscriptionSourceError};
pub use liveness::{
    AggregateCount, HeartbeatPolicy, HeartbeatPolicyError, LivenessEvaluator, LivenessReport,
};
pub use metrics::{MetricKey, MetricsSink};
pub use platform::{LogSource, SubscriptionSource};
pub use sampling::{sanitize_instance_name, ChannelCursorStore, RateSampler, SampleReport};
pub use scheduler::{PeriodicJob, Scheduler, TickGuard};
pub use service::{MonitorService, ShutdownReport};
