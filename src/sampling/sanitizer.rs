//! Channel name to metrics instance name mapping.
//!
//! Performance counter instance names reserve `(`, `)`, `#`, `\` and `/`.
//! Channel names such as `Microsoft-Windows-Sysmon/Operational` contain them, so
//! the reserved characters are substituted before a name is used as an instance.

/// Map a channel name to a metrics-safe instance name.
///
/// `(` becomes `[`, `)` becomes `]`, and `#`, `\`, `/` become `-`. Every other
/// character passes through unchanged. The mapping is total, deterministic and
/// idempotent since none of the replacement characters is itself replaced.
pub fn sanitize_instance_name(channel: &str) -> String {
    channel
        .chars()
        .map(|c| match c {
            '(' => '[',
            ')' => ']',
            '#' | '\\' | '/' => '-',
            other => other,
        })
        .collect()
}
