#![forbid(unsafe_code)]

//! Runtime services for Waypoint hosts: client-local storage, locale,
//! translation catalogs, and cancellable timers.

pub mod i18n;
pub mod locale;
pub mod state_persistence;
pub mod timer;

pub use i18n::{StringCatalog, Translate, TranslationId};
pub use locale::{Locale, LocaleContext};
pub use state_persistence::{
    KvStore, MemoryStorage, StorageBackend, StorageError, StorageResult, UnavailableStorage,
};
#[cfg(feature = "state-persistence")]
pub use state_persistence::FileStorage;
pub use timer::{TimerId, TimerQueue, TimerScope, Timers};
