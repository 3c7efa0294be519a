#![forbid(unsafe_code)]

//! Per-user tour progress in client-local storage.
//!
//! Three independent keys per user, all carrying the storage version suffix:
//!
//! ```text
//! {namespace}_status_{user}_{version}    "skipped" | "completed"
//! {namespace}_progress_{user}_{version}  checkpoint step index
//! {namespace}_locale_{user}_{version}    locale active when the tour was skipped
//! ```
//!
//! Every operation goes through [`KvStore`], so storage failures degrade to
//! "absent" reads and no-op writes.

use std::fmt;

use serde::Serialize;
use waypoint_runtime::state_persistence::KvStore;

use crate::config::TourConfig;

/// Persisted tour outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum TourStatus {
    /// Never finished; the tour auto-starts.
    #[default]
    Unset,
    Skipped,
    Completed,
}

impl TourStatus {
    #[must_use]
    pub const fn as_str(self) -> Option<&'static str> {
        match self {
            Self::Unset => None,
            Self::Skipped => Some("skipped"),
            Self::Completed => Some("completed"),
        }
    }

    /// Parse a stored value. Unknown values read as `Unset`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "skipped" => Self::Skipped,
            "completed" => Self::Completed,
            other => {
                tracing::debug!(value = other, "ignoring unknown tour status");
                Self::Unset
            }
        }
    }
}

impl fmt::Display for TourStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str().unwrap_or("unset"))
    }
}

/// Everything read back at start-up.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PersistedProgress {
    pub status: TourStatus,
    pub step_index: Option<usize>,
    pub skip_locale: Option<String>,
}

/// The three storage keys for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressKeys {
    pub status: String,
    pub progress: String,
    pub locale: String,
}

impl ProgressKeys {
    #[must_use]
    pub fn new(namespace: &str, user_id: &str, version: &str) -> Self {
        let key = |kind: &str| format!("{namespace}_{kind}_{user_id}_{version}");
        Self {
            status: key("status"),
            progress: key("progress"),
            locale: key("locale"),
        }
    }

    #[must_use]
    pub fn for_user(config: &TourConfig, user_id: &str) -> Self {
        Self::new(&config.storage_namespace, user_id, &config.storage_version)
    }

    fn all(&self) -> [&str; 3] {
        [&self.status, &self.progress, &self.locale]
    }
}

/// Typed view over the user's progress keys.
#[derive(Debug, Clone)]
pub struct ProgressStore {
    store: KvStore,
    keys: ProgressKeys,
}

impl ProgressStore {
    #[must_use]
    pub fn new(store: KvStore, keys: ProgressKeys) -> Self {
        Self { store, keys }
    }

    #[must_use]
    pub fn keys(&self) -> &ProgressKeys {
        &self.keys
    }

    /// Storage has failed at least once this session.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.store.is_degraded()
    }

    pub fn load(&self) -> PersistedProgress {
        let status = self
            .store
            .get(&self.keys.status)
            .map_or(TourStatus::Unset, |raw| TourStatus::parse(&raw));
        let step_index = self.store.get(&self.keys.progress).and_then(|raw| {
            raw.trim()
                .parse::<usize>()
                .inspect_err(|_| tracing::debug!(value = %raw, "ignoring malformed checkpoint"))
                .ok()
        });
        let skip_locale = self.store.get(&self.keys.locale).filter(|l| !l.is_empty());
        PersistedProgress {
            status,
            step_index,
            skip_locale,
        }
    }

    pub fn save_checkpoint(&self, step_index: usize) {
        self.store.set(&self.keys.progress, &step_index.to_string());
    }

    pub fn save_completed(&self) {
        self.write_status(TourStatus::Completed);
    }

    pub fn save_skipped(&self, locale: &str) {
        self.write_status(TourStatus::Skipped);
        self.store.set(&self.keys.locale, locale);
    }

    /// Remove all three keys.
    pub fn clear(&self) {
        for key in self.keys.all() {
            self.store.remove(key);
        }
    }

    fn write_status(&self, status: TourStatus) {
        if let Some(value) = status.as_str() {
            self.store.set(&self.keys.status, value);
        }
    }
}
