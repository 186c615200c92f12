//! Heartbeat window resolution and the per-source liveness rule.

use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use super::types::{SourceStatus, Subscription};
use crate::error::SubscriptionSourceError;
use crate::platform::SubscriptionSource;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeartbeatPolicyError {
    /// Neither a custom interval nor a known configuration mode
    #[error(
        "No heartbeat interval for subscription {subscription} (config mode: {})",
        .config_mode.as_deref().unwrap_or("<none>")
    )]
    Unresolved {
        subscription: String,
        config_mode: Option<String>,
    },
}

/// Global configuration modes and their heartbeat intervals.
///
/// Loaded once at startup and immutable afterwards. Mode names are matched
/// ignoring ASCII case, as the collector's configuration store does.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalModeTable {
    modes: HashMap<String, u64>,
}

impl GlobalModeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every mode from the store.
    ///
    /// A mode without a readable heartbeat value is left out with a warning; an
    /// unreachable store fails the whole load.
    pub async fn load(
        source: &dyn SubscriptionSource,
    ) -> Result<GlobalModeTable, SubscriptionSourceError> {
        let mut modes = HashMap::new();

        for mode in source.list_config_modes().await? {
            match source.global_heartbeat_ms(&mode).await {
                Ok(Some(heartbeat_ms)) => {
                    debug!(mode = %mode, heartbeat_ms = heartbeat_ms, "Loaded configuration mode");
                    modes.insert(mode.to_ascii_lowercase(), heartbeat_ms);
                }
                Ok(None) => {
                    warn!(mode = %mode, "Configuration mode has no heartbeat interval; ignoring it");
                }
                Err(e @ SubscriptionSourceError::StoreUnavailable(_)) => return Err(e),
                Err(e) => {
                    warn!(mode = %mode, error = %e, "Failed reading configuration mode; ignoring it");
                }
            }
        }

        Ok(GlobalModeTable { modes })
    }

    pub fn heartbeat_ms(&self, mode: &str) -> Option<u64> {
        self.modes.get(&mode.to_ascii_lowercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.modes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, u64)> for GlobalModeTable {
    fn from_iter<T: IntoIterator<Item = (S, u64)>>(iter: T) -> Self {
        Self {
            modes: iter
                .into_iter()
                .map(|(mode, ms)| (mode.into().to_ascii_lowercase(), ms))
                .collect(),
        }
    }
}

/// Resolves the heartbeat window of a subscription
#[derive(Debug, Clone, Default)]
pub struct HeartbeatPolicy {
    modes: GlobalModeTable,
}

impl HeartbeatPolicy {
    pub fn new(modes: GlobalModeTable) -> Self {
        Self { modes }
    }

    pub fn modes(&self) -> &GlobalModeTable {
        &self.modes
    }

    /// Custom interval first, then the configuration mode's interval.
    ///
    /// A custom interval of zero is treated as unset.
    pub fn resolve(&self, subscription: &Subscription) -> Result<Duration, HeartbeatPolicyError> {
        if let Some(custom_ms) = subscription.custom_heartbeat_ms.filter(|ms| *ms > 0) {
            return Ok(Duration::from_millis(custom_ms));
        }

        subscription
            .config_mode
            .as_deref()
            .and_then(|mode| self.modes.heartbeat_ms(mode))
            .map(Duration::from_millis)
            .ok_or_else(|| HeartbeatPolicyError::Unresolved {
                subscription: subscription.name.clone(),
                config_mode: subscription.config_mode.clone(),
            })
    }
}

/// Whether a source counts as active at `now`.
///
/// A non-zero last error always means inactive. Otherwise a source that never
/// sent a heartbeat is active, and one that did must have done so strictly less
/// than `interval` ago.
pub fn is_source_active(status: &SourceStatus, interval: Duration, now: DateTime<Utc>) -> bool {
    if status.last_error.is_some_and(|code| code != 0) {
        return false;
    }

    match status.last_heartbeat {
        None => true,
        Some(heartbeat) => {
            let window = TimeDelta::from_std(interval).unwrap_or_else(|_| {
                debug!(
                    source = %status.name,
                    interval_secs = interval.as_secs(),
                    "Heartbeat interval out of range, clamping"
                );
                TimeDelta::MAX
            });
            now.signed_duration_since(heartbeat) < window
        }
    }
}
