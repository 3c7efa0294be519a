#![forbid(unsafe_code)]

//! Target resolution for one step.
//!
//! A [`TargetResolver`] lives exactly as long as the step it serves. It owns
//! the step's poll timers (through a [`TimerScope`]) and the anchor's resize
//! observation, so dropping it cancels both.
//!
//! ```text
//! begin ──route differs──▶ AwaitingRoute ──route matches──┐
//!   │                                                     ▼
//!   ├──no selector──────────────────────────────────▶ Centered
//!   └──selector──▶ Polling(1) ─miss─▶ Polling(2) … ─miss─▶ Failed
//!                      │ hit              │ hit
//!                      ▼                  ▼
//!                   Resolved           Resolved
//! ```

use std::rc::Rc;
use std::time::Duration;

use waypoint_core::event::{ElementHandle, ListenerId};
use waypoint_core::geometry::Rect;
use waypoint_runtime::timer::TimerScope;

use crate::catalog::TourStep;
use crate::controller::TourTimer;
use crate::guards::ResizeObservation;
use crate::host::TourHost;

/// Where resolution currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Idle,
    /// Navigation was requested; waiting for the host to report the route.
    AwaitingRoute { requested: String },
    /// Poll `attempt` missed; the next one is scheduled.
    Polling { attempt: u32 },
    Resolved { element: ElementHandle },
    /// The step has no anchor.
    Centered,
    /// Polls exhausted.
    Failed,
}

/// Result of a resolution step, for the controller to act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    Pending,
    Ready,
    Missing,
}

/// Poll cadence for one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub attempts: u32,
}

/// Locates and tracks the anchor of a single step.
pub struct TargetResolver {
    host: Rc<dyn TourHost>,
    step_index: usize,
    step_id: &'static str,
    route: Option<&'static str>,
    selector: Option<&'static str>,
    policy: PollPolicy,
    state: Resolution,
    rect: Option<Rect>,
    observation: Option<ResizeObservation>,
    timers: TimerScope<TourTimer>,
}

impl TargetResolver {
    #[must_use]
    pub fn new(
        host: Rc<dyn TourHost>,
        step_index: usize,
        step: &TourStep,
        policy: PollPolicy,
        timers: TimerScope<TourTimer>,
    ) -> Self {
        Self {
            host,
            step_index,
            step_id: step.id,
            route: step.route_path,
            selector: step.target_selector,
            policy,
            state: Resolution::Idle,
            rect: None,
            observation: None,
            timers,
        }
    }

    #[must_use]
    pub fn state(&self) -> &Resolution {
        &self.state
    }

    #[must_use]
    pub fn step_index(&self) -> usize {
        self.step_index
    }

    /// Last known anchor bounds.
    #[must_use]
    pub fn rect(&self) -> Option<Rect> {
        self.rect
    }

    #[must_use]
    pub fn element(&self) -> Option<ElementHandle> {
        match self.state {
            Resolution::Resolved { element } => Some(element),
            _ => None,
        }
    }

    /// Resolution finished, with or without an anchor.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self.state, Resolution::Resolved { .. } | Resolution::Centered)
    }

    #[must_use]
    pub fn is_awaiting_route(&self) -> bool {
        matches!(self.state, Resolution::AwaitingRoute { .. })
    }

    /// `route` is somewhere other than this step's page.
    #[must_use]
    pub fn is_off_route(&self, route: &str) -> bool {
        self.route.is_some_and(|r| r != route)
    }

    /// Start resolving. Navigates first when the host is on another route.
    pub fn begin(&mut self, now: Duration) -> ResolveOutcome {
        let current = self.host.current_route();
        if let Some(route) = self.route
            && route != current
        {
            tracing::debug!(step = self.step_id, from = %current, to = route, "navigating to step route");
            self.state = Resolution::AwaitingRoute {
                requested: route.to_string(),
            };
            self.host.navigate_to(route);
            return ResolveOutcome::Pending;
        }
        self.resolve_on_route(now)
    }

    /// The host reported a route change.
    pub fn route_changed(&mut self, route: &str, now: Duration) -> ResolveOutcome {
        let arrived = match &self.state {
            Resolution::AwaitingRoute { requested } => requested == route,
            Resolution::Failed => return ResolveOutcome::Missing,
            _ if self.is_ready() => return ResolveOutcome::Ready,
            _ => return ResolveOutcome::Pending,
        };
        if arrived {
            self.resolve_on_route(now)
        } else {
            ResolveOutcome::Pending
        }
    }

    /// A scheduled poll fired.
    pub fn poll(&mut self, attempt: u32, now: Duration) -> ResolveOutcome {
        match self.state {
            Resolution::Polling { attempt: last } if last + 1 == attempt => self.try_attempt(attempt, now),
            _ => {
                tracing::trace!(step = self.step_id, attempt, "ignoring out-of-sequence poll");
                if self.is_ready() {
                    ResolveOutcome::Ready
                } else {
                    ResolveOutcome::Pending
                }
            }
        }
    }

    /// Resize report for the observed anchor. Returns `true` if it applied.
    pub fn element_resized(&mut self, listener: ListenerId, rect: Rect) -> bool {
        match &self.observation {
            Some(obs) if obs.listener() == listener => {
                self.rect = Some(rect);
                true
            }
            _ => false,
        }
    }

    /// Re-read the anchor bounds (window resize, scroll settle).
    pub fn refresh_rect(&mut self) -> Option<Rect> {
        if let Some(element) = self.element()
            && let Some(rect) = self.host.bounding_rect(element)
        {
            self.rect = Some(rect);
        }
        self.rect
    }

    fn resolve_on_route(&mut self, now: Duration) -> ResolveOutcome {
        match self.selector {
            None => {
                self.state = Resolution::Centered;
                self.rect = None;
                ResolveOutcome::Ready
            }
            Some(_) => self.try_attempt(1, now),
        }
    }

    fn try_attempt(&mut self, attempt: u32, now: Duration) -> ResolveOutcome {
        let Some(selector) = self.selector else {
            return ResolveOutcome::Pending;
        };
        if let Some(element) = self.host.query_selector(selector) {
            tracing::debug!(step = self.step_id, attempt, "anchor found");
            self.host.scroll_into_view(element);
            self.rect = self.host.bounding_rect(element);
            self.observation = Some(ResizeObservation::observe(Rc::clone(&self.host), element));
            self.state = Resolution::Resolved { element };
            return ResolveOutcome::Ready;
        }

        if attempt >= self.policy.attempts {
            self.state = Resolution::Failed;
            return ResolveOutcome::Missing;
        }

        self.state = Resolution::Polling { attempt };
        let deadline = now + self.policy.interval;
        self.timers.schedule(
            deadline,
            TourTimer::Poll {
                step: self.step_index,
                attempt: attempt + 1,
            },
        );
        tracing::trace!(step = self.step_id, attempt, ?deadline, "anchor not present yet");
        ResolveOutcome::Pending
    }
}

impl std::fmt::Debug for TargetResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetResolver")
            .field("step", &self.step_id)
            .field("state", &self.state)
            .field("rect", &self.rect)
            .field("pending_polls", &self.timers.pending())
            .finish()
    }
}
