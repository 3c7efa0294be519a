#![forbid(unsafe_code)]

//! Guided onboarding tour.
//!
//! The tour walks a user through live application screens: it builds the
//! ordered step list for the user's capabilities ([`catalog`]), finds each
//! step's anchor element on the page ([`resolver`]), positions the tooltip
//! next to it ([`placement`]), and remembers progress per user
//! ([`progress`]). [`TourController`] ties these together as a single-threaded
//! state machine driven by host events and a host-advanced clock.
//!
//! # Example
//!
//! ```ignore
//! let locale = LocaleContext::new("en");
//! let mut tour = TourController::new(
//!     TourConfig::default(),
//!     host,
//!     Rc::new(builtin_catalog(locale.clone())),
//!     KvStore::in_memory(),
//!     UserDescriptor::new("42", Some(RoleFlags::MANAGER)),
//!     locale,
//! );
//! tour.mount(now);
//! for event in tour.tick(now + Duration::from_millis(500)) {
//!     println!("{event:?}");
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod controller;
pub mod guards;
pub mod host;
pub mod overlay;
pub mod placement;
pub mod progress;
pub mod resolver;
pub mod strings;

pub use catalog::{
    Capabilities, RoleFlags, StepAction, StepCatalog, StepGroup, TourStep, UserDescriptor,
    build_steps,
};
pub use config::{ConfigError, PlacementConfig, TourConfig};
pub use controller::{
    FinishReason, TourAdvanceReason, TourController, TourEvent, TourPhase, TourSnapshot,
    TourState,
};
pub use guards::{ClickInterceptor, ResizeObservation, ScrollLock, WindowResizeListener};
pub use host::{EventOutcome, HostEvent, TourHost};
pub use overlay::{ProgressDot, TourOverlay};
pub use placement::{ArrowSide, Orientation, Placement, place};
pub use progress::{PersistedProgress, ProgressKeys, ProgressStore, TourStatus};
pub use resolver::{Resolution, TargetResolver};
pub use strings::builtin_catalog;
