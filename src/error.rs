//! # Error Types
//!
//! Error types for the monitor. Collaborator failures are modelled per concern so
//! the sampling and liveness engines can decide, item by item, whether a failure
//! quarantines a channel, skips a subscription or is fatal at startup.

use thiserror::Error;

use crate::config::ConfigurationError;
use crate::liveness::HeartbeatPolicyError;

/// Failures reported by a [`LogSource`](crate::platform::LogSource) implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogSourceError {
    /// The channel does not exist on this machine
    #[error("Event channel not found: {channel}")]
    ChannelNotFound { channel: String },

    /// The channel exists but its metadata could not be retrieved
    #[error("Event channel {channel} unavailable: {reason}")]
    ChannelUnavailable { channel: String, reason: String },

    /// The provider writing to the channel has been disabled
    #[error("Event channel {channel} provider disabled: {reason}")]
    ChannelDisabled { channel: String, reason: String },

    /// Reading the newest record failed
    #[error("Failed reading event channel {channel}: {reason}")]
    ChannelReadError { channel: String, reason: String },
}

impl LogSourceError {
    /// Name of the channel the failure refers to
    pub fn channel(&self) -> &str {
        match self {
            LogSourceError::ChannelNotFound { channel }
            | LogSourceError::ChannelUnavailable { channel, .. }
            | LogSourceError::ChannelDisabled { channel, .. }
            | LogSourceError::ChannelReadError { channel, .. } => channel,
        }
    }

    /// Short machine-friendly kind, used as a structured log field
    pub fn kind(&self) -> &'static str {
        match self {
            LogSourceError::ChannelNotFound { .. } => "channel_not_found",
            LogSourceError::ChannelUnavailable { .. } => "channel_unavailable",
            LogSourceError::ChannelDisabled { .. } => "channel_disabled",
            LogSourceError::ChannelReadError { .. } => "channel_read_error",
        }
    }
}

/// Failures reported by a [`SubscriptionSource`](crate::platform::SubscriptionSource).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscriptionSourceError {
    /// The backing configuration store cannot be reached at all
    #[error("Subscription configuration store unavailable: {0}")]
    StoreUnavailable(String),

    /// The subscription was removed (or never existed)
    #[error("Subscription not found: {0}")]
    SubscriptionNotFound(String),

    /// The source is no longer registered under the subscription
    #[error("Source {source_name} not found under subscription {subscription}")]
    SourceNotFound {
        subscription: String,
        source_name: String,
    },

    /// A value exists but could not be read or has an unexpected type
    #[error("Failed reading {item}: {reason}")]
    ReadError { item: String, reason: String },
}

impl SubscriptionSourceError {
    /// Create a read error for the named item
    pub fn read_error<I: Into<String>, R: Into<String>>(item: I, reason: R) -> Self {
        Self::ReadError {
            item: item.into(),
            reason: reason.into(),
        }
    }
}

/// Failures reported by a [`MetricsSink`](crate::metrics::MetricsSink).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("Metrics sink rejected {operation} for {instance}: {reason}")]
    Rejected {
        operation: String,
        instance: String,
        reason: String,
    },

    #[error("Metrics sink unavailable: {0}")]
    Unavailable(String),
}

/// Crate-level error
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Log source error: {0}")]
    LogSource(#[from] LogSourceError),

    #[error("Subscription source error: {0}")]
    SubscriptionSource(#[from] SubscriptionSourceError),

    #[error("Heartbeat policy error: {0}")]
    HeartbeatPolicy(#[from] HeartbeatPolicyError),

    #[error("Metrics sink error: {0}")]
    Sink(#[from] SinkError),

    /// A collaborator could not be reached while constructing a component
    #[error("Collaborator {collaborator} unavailable: {reason}")]
    CollaboratorUnavailable {
        collaborator: String,
        reason: String,
    },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Timeout error: {0}")]
    Timeout(String),
}

impl MonitorError {
    /// Create a collaborator-unavailable error
    pub fn collaborator_unavailable<C: Into<String>, R: std::fmt::Display>(
        collaborator: C,
        reason: R,
    ) -> Self {
        Self::CollaboratorUnavailable {
            collaborator: collaborator.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the error must stop the service from starting
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MonitorError::Configuration(_) | MonitorError::CollaboratorUnavailable { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, MonitorError>;
