#![forbid(unsafe_code)]

//! `waypoint-web` runs the onboarding tour inside a host-driven event loop.
//!
//! Design goals:
//! - **Host-driven I/O**: the embedding page pushes [`HostEvent`]s into an
//!   [`EventQueue`] (from DOM listeners or directly).
//! - **Deterministic time**: the host advances a [`DeterministicClock`].
//! - **No blocking / no threads**: suitable for `wasm32-unknown-unknown`.
//!
//! On `wasm32` the [`wasm`] module adds browser bindings: a `localStorage`
//! backend, a `web-sys` implementation of
//! [`TourHost`](waypoint_tour::TourHost), and the `WaypointTour` JS API.

pub mod step_driver;

#[cfg(target_arch = "wasm32")]
pub mod wasm;

use core::time::Duration;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use waypoint_tour::HostEvent;

pub use step_driver::{StepDriver, StepResult};

/// Web runner error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebError {
    /// A view model could not be encoded as JSON.
    Serialization(String),
    /// The browser refused an operation.
    Host(String),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serialization(msg) => write!(f, "serialization failed: {msg}"),
            Self::Host(msg) => write!(f, "host error: {msg}"),
        }
    }
}

impl std::error::Error for WebError {}

/// Deterministic monotonic clock controlled by the host.
#[derive(Debug, Default, Clone)]
pub struct DeterministicClock {
    now: Duration,
}

impl DeterministicClock {
    /// Create a clock starting at `0`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            now: Duration::ZERO,
        }
    }

    #[must_use]
    pub const fn now(&self) -> Duration {
        self.now
    }

    /// Set current time. Going backwards is ignored.
    pub fn set(&mut self, now: Duration) {
        self.now = self.now.max(now);
    }

    /// Advance time by `dt`.
    pub fn advance(&mut self, dt: Duration) {
        self.now = self.now.saturating_add(dt);
    }
}

/// FIFO of host events shared between DOM listeners and the driver.
///
/// Clones share one queue.
#[derive(Clone, Default)]
pub struct EventQueue {
    inner: Rc<RefCell<VecDeque<HostEvent>>>,
}

impl EventQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: HostEvent) {
        self.inner.borrow_mut().push_back(event);
    }

    pub fn pop(&self) -> Option<HostEvent> {
        self.inner.borrow_mut().pop_front()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventQueue")
            .field("pending", &self.len())
            .finish()
    }
}
