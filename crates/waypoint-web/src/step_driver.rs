#![forbid(unsafe_code)]

//! Step-based tour runner.
//!
//! [`StepDriver`] drives a [`TourController`] without threads or blocking.
//! The host controls the loop:
//!
//! 1. Push events via [`StepDriver::push_event`] (or through a cloned
//!    [`EventQueue`] held by DOM listeners).
//! 2. Advance time via [`StepDriver::advance_time`] or [`StepDriver::set_time`].
//! 3. Call [`StepDriver::step`] to process queued events and due timers.
//! 4. Read [`StepDriver::overlay_json`] and redraw if the step changed.
//!
//! # Example
//!
//! ```ignore
//! let mut driver = StepDriver::new(tour, queue);
//! driver.mount();
//! driver.advance_time(Duration::from_millis(500));
//! let result = driver.step();
//! assert_eq!(result.tour_events.len(), 1);
//! ```

use core::time::Duration;

use serde::Serialize;
use waypoint_tour::{HostEvent, TourController, TourEvent};

use crate::{DeterministicClock, EventQueue, WebError};

/// Result of a single [`StepDriver::step`] call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepResult {
    /// Host events handled during this step.
    pub events_processed: u32,
    /// How many of them need their default action suppressed.
    pub prevented: u32,
    /// Tour notifications raised during this step, in order.
    pub tour_events: Vec<TourEvent>,
    /// Next timer deadline, for hosts that sleep between steps.
    pub next_deadline_ms: Option<u64>,
}

/// Host-driven, non-blocking tour runner.
#[derive(Debug)]
pub struct StepDriver {
    tour: TourController,
    clock: DeterministicClock,
    queue: EventQueue,
    steps: u64,
}

impl StepDriver {
    #[must_use]
    pub fn new(tour: TourController, queue: EventQueue) -> Self {
        Self {
            tour,
            clock: DeterministicClock::new(),
            queue,
            steps: 0,
        }
    }

    /// Mount the tour at the current clock time.
    pub fn mount(&mut self) -> bool {
        self.tour.mount(self.clock.now())
    }

    /// Queue a host event for the next [`step`](Self::step).
    pub fn push_event(&mut self, event: HostEvent) {
        self.queue.push(event);
    }

    pub fn advance_time(&mut self, dt: Duration) {
        self.clock.advance(dt);
    }

    pub fn set_time(&mut self, now: Duration) {
        self.clock.set(now);
    }

    /// Handle every queued event, then fire due timers.
    pub fn step(&mut self) -> StepResult {
        let mut events_processed = 0u32;
        let mut prevented = 0u32;
        while let Some(event) = self.queue.pop() {
            events_processed += 1;
            if self.tour.handle_event(event).prevent_default {
                prevented += 1;
            }
        }
        let tour_events = self.tour.tick(self.clock.now());
        self.steps += 1;
        if !tour_events.is_empty() {
            tracing::debug!(step = self.steps, events = tour_events.len(), "driver step");
        }
        StepResult {
            events_processed,
            prevented,
            tour_events,
            next_deadline_ms: self
                .tour
                .next_deadline()
                .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
        }
    }

    /// Handle one event immediately, bypassing the queue.
    ///
    /// Used for input whose default action must be decided synchronously
    /// (keyboard shortcuts). Returns whether the default must be prevented.
    pub fn dispatch_now(&mut self, event: HostEvent) -> bool {
        self.tour.handle_event(event).prevent_default
    }

    #[must_use]
    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    #[must_use]
    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    #[must_use]
    pub fn tour(&self) -> &TourController {
        &self.tour
    }

    pub fn tour_mut(&mut self) -> &mut TourController {
        &mut self.tour
    }

    /// `{ is_active, current_step_number, total_steps }` as JSON.
    pub fn snapshot_json(&self) -> Result<String, WebError> {
        to_json(&self.tour.snapshot())
    }

    /// Current overlay as JSON, or `null` when nothing is on screen.
    pub fn overlay_json(&self) -> Result<String, WebError> {
        to_json(&self.tour.overlay())
    }

    /// Tear down the tour's host resources.
    pub fn unmount(&mut self) {
        self.tour.unmount();
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, WebError> {
    serde_json::to_string(value).map_err(|e| WebError::Serialization(e.to_string()))
}
