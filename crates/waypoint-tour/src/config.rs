#![forbid(unsafe_code)]

//! Tour configuration.
//!
//! Every timing and geometry constant lives in [`TourConfig`]. Hosts either
//! take the defaults, tweak them with the `with_*` builders, or load a JSON
//! document (durations as integer milliseconds):
//!
//! ```json
//! { "start_delay": 500, "poll_attempts": 15, "placement": { "gap": 20 } }
//! ```

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use waypoint_core::geometry::Size;

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// The JSON document could not be parsed.
    Parse(String),
    /// A value is out of range.
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(msg) => write!(f, "failed to parse tour config: {msg}"),
            Self::Invalid(msg) => write!(f, "invalid tour config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Geometry constants for tooltip placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// Distance between anchor and tooltip along the main axis.
    pub gap: f64,
    /// Minimum distance kept from the viewport edges when clamping.
    pub edge_margin: f64,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            gap: 20.0,
            edge_margin: 16.0,
        }
    }
}

/// Tour timing, geometry, and storage settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TourConfig {
    /// Settle interval between mount and the first step.
    #[serde(with = "duration_ms")]
    pub start_delay: Duration,
    /// Delay between leaving one step and entering the next.
    #[serde(with = "duration_ms")]
    pub transition_delay: Duration,
    /// Interval between DOM polls for a step's anchor.
    #[serde(with = "duration_ms")]
    pub poll_interval: Duration,
    /// Maximum number of DOM polls per step (the first poll is immediate).
    pub poll_attempts: u32,
    pub placement: PlacementConfig,
    /// Tooltip box size used for placement.
    pub tooltip_size: Size,
    /// Spotlight cut-out padding around the anchor.
    pub spotlight_padding: f64,
    /// Route the host navigates to on restart.
    pub root_route: String,
    /// Prefix of the persisted keys.
    pub storage_namespace: String,
    /// Suffix of the persisted keys; bump whenever step semantics change.
    pub storage_version: String,
}

impl Default for TourConfig {
    fn default() -> Self {
        Self {
            start_delay: Duration::from_millis(500),
            transition_delay: Duration::from_millis(150),
            poll_interval: Duration::from_millis(200),
            poll_attempts: 15,
            placement: PlacementConfig::default(),
            tooltip_size: Size::new(360.0, 200.0),
            spotlight_padding: 8.0,
            root_route: "/".to_string(),
            storage_namespace: "interactive_tour".to_string(),
            storage_version: "v3".to_string(),
        }
    }
}

impl TourConfig {
    /// Parse and validate a JSON document. Missing fields take defaults.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_attempts == 0 {
            return Err(ConfigError::Invalid("poll_attempts must be at least 1".into()));
        }
        if !self.tooltip_size.is_valid() {
            return Err(ConfigError::Invalid(format!(
                "tooltip_size must be finite and non-negative, got {:?}",
                self.tooltip_size
            )));
        }
        for (name, value) in [
            ("placement.gap", self.placement.gap),
            ("placement.edge_margin", self.placement.edge_margin),
            ("spotlight_padding", self.spotlight_padding),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        if self.storage_namespace.is_empty() || self.storage_version.is_empty() {
            return Err(ConfigError::Invalid(
                "storage_namespace and storage_version must be non-empty".into(),
            ));
        }
        Ok(())
    }

    /// Total time spent polling before a target is declared missing.
    #[must_use]
    pub fn poll_window(&self) -> Duration {
        self.poll_interval
            .saturating_mul(self.poll_attempts.saturating_sub(1))
    }

    #[must_use]
    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    #[must_use]
    pub fn with_transition_delay(mut self, delay: Duration) -> Self {
        self.transition_delay = delay;
        self
    }

    #[must_use]
    pub fn with_polling(mut self, interval: Duration, attempts: u32) -> Self {
        self.poll_interval = interval;
        self.poll_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_placement(mut self, placement: PlacementConfig) -> Self {
        self.placement = placement;
        self
    }

    #[must_use]
    pub fn with_tooltip_size(mut self, size: Size) -> Self {
        self.tooltip_size = size;
        self
    }

    #[must_use]
    pub fn with_root_route(mut self, route: impl Into<String>) -> Self {
        self.root_route = route.into();
        self
    }

    #[must_use]
    pub fn with_storage_version(mut self, version: impl Into<String>) -> Self {
        self.storage_version = version.into();
        self
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let ms = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(ms)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
