//! # Structured Logging Module
//!
//! Environment-aware console logging built on `tracing`. The level defaults from
//! the deployment environment and `RUST_LOG` overrides it when present. Output is
//! JSON when `LOGWATCH_LOG_FORMAT=json`, which suits hosts that ship stdout to a
//! log collector.

use std::io::IsTerminal;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
///
/// Safe to call more than once; only the first call installs a subscriber, and an
/// already-installed global subscriber is left in place.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);
        let json = use_json_format();
        let use_ansi = IsTerminal::is_terminal(&std::io::stdout());

        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

        let layer = if json {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(false)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(use_ansi)
                .with_filter(filter)
                .boxed()
        };

        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
            return;
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            json_output = json,
            ansi_colors = use_ansi,
            "Structured logging initialized"
        );
    });
}

/// Current deployment environment
pub fn get_environment() -> String {
    std::env::var("LOGWATCH_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Default log level for an environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

fn use_json_format() -> bool {
    std::env::var("LOGWATCH_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Log channel operations with a consistent field layout
#[macro_export]
macro_rules! log_channel {
    ($level:ident, $operation:expr, channel: $channel:expr, $($key:ident: $value:expr),* $(,)?) => {
        tracing::$level!(
            operation = %$operation,
            channel = %$channel,
            $($key = ?$value,)*
            "CHANNEL_{} ({})", $operation, $channel
        );
    };
    ($level:ident, $operation:expr, channel: $channel:expr $(,)?) => {
        tracing::$level!(
            operation = %$operation,
            channel = %$channel,
            "CHANNEL_{} ({})", $operation, $channel
        );
    };
}

/// Log subscription operations with a consistent field layout
#[macro_export]
macro_rules! log_subscription {
    ($level:ident, $operation:expr, subscription: $subscription:expr, $($key:ident: $value:expr),* $(,)?) => {
        tracing::$level!(
            operation = %$operation,
            subscription = %$subscription,
            $($key = ?$value,)*
            "SUBSCRIPTION_{} ({})", $operation, $subscription
        );
    };
    ($level:ident, $operation:expr, subscription: $subscription:expr $(,)?) => {
        tracing::$level!(
            operation = %$operation,
            subscription = %$subscription,
            "SUBSCRIPTION_{} ({})", $operation, $subscription
        );
    };
}
