#![forbid(unsafe_code)]

//! Logging setup.
//!
//! Library code logs through `tracing` macros only. Host binaries call
//! [`install_subscriber`] (feature `subscriber`) once at start-up to route
//! those events to stderr, either human-readable or as JSON lines.

use std::fmt;

/// Environment variable that overrides `RUST_LOG` for Waypoint hosts.
pub const LOG_ENV: &str = "WAYPOINT_LOG";

/// Default filter when neither [`LOG_ENV`] nor `RUST_LOG` is set.
pub const DEFAULT_FILTER: &str = "info";

/// Output format for the installed subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// Parse `"json"` / `"pretty"` (case-insensitive).
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" | "jsonl" => Some(Self::Json),
            "pretty" | "text" => Some(Self::Pretty),
            _ => None,
        }
    }
}

/// Errors from subscriber installation.
#[derive(Debug)]
pub enum LoggingError {
    /// The filter directive could not be parsed.
    Filter(String),
    /// A global subscriber is already installed.
    AlreadyInstalled,
}

impl fmt::Display for LoggingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Filter(msg) => write!(f, "invalid log filter: {msg}"),
            Self::AlreadyInstalled => write!(f, "a global tracing subscriber is already installed"),
        }
    }
}

impl std::error::Error for LoggingError {}

/// Resolve the filter directive: [`LOG_ENV`], then `RUST_LOG`, then [`DEFAULT_FILTER`].
#[must_use]
pub fn filter_directive() -> String {
    filter_directive_from(
        std::env::var(LOG_ENV).ok().as_deref(),
        std::env::var("RUST_LOG").ok().as_deref(),
    )
}

fn filter_directive_from(waypoint: Option<&str>, rust_log: Option<&str>) -> String {
    waypoint
        .filter(|s| !s.trim().is_empty())
        .or(rust_log.filter(|s| !s.trim().is_empty()))
        .unwrap_or(DEFAULT_FILTER)
        .to_string()
}

/// Install a global `tracing-subscriber` writing to stderr.
#[cfg(feature = "subscriber")]
pub fn install_subscriber(format: LogFormat) -> Result<(), LoggingError> {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(filter_directive())
        .map_err(|e| LoggingError::Filter(e.to_string()))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    let result = match format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().flatten_event(true).try_init(),
    };
    result.map_err(|_| LoggingError::AlreadyInstalled)
}
