#![forbid(unsafe_code)]

//! Deterministic harness for the Waypoint onboarding tour.
//!
//! - **Scripted pages**: [`ScriptedHost`] models routes, late-rendering
//!   anchors, scroll pinning, and listener tables, and logs every host call.
//! - **Timed runs**: [`TourRun`] advances the clock deadline by deadline and
//!   records each tour event with its timestamp.
//!
//! # Quick Start
//!
//! ```ignore
//! use waypoint_harness::TourRun;
//!
//! let mut run = TourRun::builder("42", None).build();
//! run.mount();
//! run.run_until(Duration::from_millis(500));
//! assert_eq!(run.step_id(), Some("welcome"));
//! ```

pub mod run;
pub mod scripted_host;

pub use run::{TimedEvent, TourRun, TourRunBuilder};
pub use scripted_host::{DEFAULT_VIEWPORT, HostCall, ScriptedHost, data_tour_selector};
