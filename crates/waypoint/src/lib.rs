#![forbid(unsafe_code)]

//! Waypoint public facade crate.
//!
//! Re-exports the tour controller and its supporting types from the internal
//! crates and offers a prelude for embedding the tour in a host app.

use std::fmt;

// --- Core re-exports -------------------------------------------------------

pub use waypoint_core::event::{ElementHandle, KeyCode, KeyEvent, ListenerId, Modifiers};
pub use waypoint_core::geometry::{Point, Rect, Size};
pub use waypoint_core::logging::{LogFormat, LoggingError};

// --- Runtime re-exports ----------------------------------------------------

pub use waypoint_runtime::{
    KvStore, Locale, LocaleContext, MemoryStorage, StorageBackend, StorageError, StringCatalog,
    Translate, UnavailableStorage,
};

// --- Tour re-exports -------------------------------------------------------

pub use waypoint_tour::{
    Capabilities, ConfigError, EventOutcome, FinishReason, HostEvent, RoleFlags, TourConfig,
    TourController, TourEvent, TourHost, TourOverlay, TourPhase, TourSnapshot, TourState,
    TourStep, UserDescriptor, builtin_catalog,
};

// --- Web re-exports --------------------------------------------------------

#[cfg(feature = "web")]
pub use waypoint_web::{DeterministicClock, EventQueue, StepDriver, StepResult, WebError};

// --- Errors ---------------------------------------------------------------

/// Top-level error type for Waypoint hosts.
#[derive(Debug)]
pub enum Error {
    /// Progress storage failed.
    Storage(StorageError),
    /// Tour configuration was rejected.
    Config(ConfigError),
    /// The tracing subscriber could not be installed.
    Logging(LoggingError),
    /// Browser runner failure.
    #[cfg(feature = "web")]
    Web(WebError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(err) => write!(f, "{err}"),
            Self::Config(err) => write!(f, "{err}"),
            Self::Logging(err) => write!(f, "{err}"),
            #[cfg(feature = "web")]
            Self::Web(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            Self::Config(err) => Some(err),
            Self::Logging(err) => Some(err),
            #[cfg(feature = "web")]
            Self::Web(err) => Some(err),
        }
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl From<LoggingError> for Error {
    fn from(err: LoggingError) -> Self {
        Self::Logging(err)
    }
}

#[cfg(feature = "web")]
impl From<WebError> for Error {
    fn from(err: WebError) -> Self {
        Self::Web(err)
    }
}

/// Standard result type for Waypoint APIs.
pub type Result<T> = std::result::Result<T, Error>;

/// Parse a JSON tour configuration.
pub fn config_from_json(raw: &str) -> Result<TourConfig> {
    Ok(TourConfig::from_json(raw)?)
}

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        Capabilities, Error, EventOutcome, HostEvent, KeyCode, KeyEvent, KvStore, LocaleContext,
        Rect, Result, RoleFlags, Size, TourConfig, TourController, TourEvent, TourHost,
        TourPhase, UserDescriptor, builtin_catalog,
    };

    pub use crate::{core, runtime, tour};

    #[cfg(feature = "web")]
    pub use crate::{StepDriver, web};
}

pub use waypoint_core as core;
pub use waypoint_runtime as runtime;
pub use waypoint_tour as tour;
#[cfg(feature = "web")]
pub use waypoint_web as web;
