#![forbid(unsafe_code)]

//! Tour state machine.
//!
//! [`TourController`] owns the tour's state and drives it from three inputs:
//! explicit operations (`advance`, `retreat`, `skip`, `restart`), host events
//! ([`HostEvent`]), and time (`tick`). It never sleeps; every delay is a timer
//! in a [`Timers`] queue the host drains by calling [`TourController::tick`].
//!
//! ```text
//!            mount + start delay                 terminal step
//! Inactive ───────────────────────▶ Active ─────────────────────▶ Finished(Completed)
//!                                   │   ▲
//!                  advance/retreat  │   │ transition delay
//!                                   ▼   │
//!                               Transitioning
//!
//! any running phase ──Escape / skip()──▶ Finished(Skipped)
//! ```
//!
//! # Resource scoping
//!
//! | Scope   | Owns                                              | Released on                  |
//! |---------|---------------------------------------------------|------------------------------|
//! | session | scroll lock, window resize listener               | finish, skip, unmount        |
//! | step    | poll timers, resize observer, click interceptor   | step change, pause, any exit |
//! | tour    | start and transition timers                       | skip, finish, restart, unmount |
//!
//! Work for step N is always dropped before work for step N±1 starts.
//!
//! # Policies
//!
//! - An anchor that never appears within the poll window logs a warning,
//!   emits [`TourEvent::TargetMissing`], and advances like a normal step.
//! - Navigating away from the current step's route pauses the tour; returning
//!   to the route resumes it. Route changes during a transition are ignored.
//! - A tour skipped under one locale restarts from step 0 when the active
//!   locale differs, both at mount and on later locale changes.

use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use serde::Serialize;
use waypoint_core::event::{KeyCode, KeyEvent, ListenerId};
use waypoint_core::geometry::Rect;
use waypoint_runtime::i18n::Translate;
use waypoint_runtime::locale::{Locale, LocaleContext};
use waypoint_runtime::state_persistence::KvStore;
use waypoint_runtime::timer::{TimerScope, Timers};

use crate::catalog::{Capabilities, StepCatalog, TourStep, UserDescriptor};
use crate::config::TourConfig;
use crate::guards::{ClickInterceptor, ScrollLock, WindowResizeListener};
use crate::host::{EventOutcome, HostEvent, TourHost};
use crate::overlay::TourOverlay;
use crate::progress::{PersistedProgress, ProgressKeys, ProgressStore, TourStatus};
use crate::resolver::{PollPolicy, ResolveOutcome, TargetResolver};

// ─────────────────────────────────────────────────────────────────────────────
// Public types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FinishReason {
    Completed,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TourPhase {
    Inactive,
    Active,
    Transitioning,
    Finished(FinishReason),
}

impl TourPhase {
    /// Active or between steps.
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Active | Self::Transitioning)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TourAdvanceReason {
    /// Next button.
    Manual,
    Keyboard,
    /// Intercepted click on a click-advance anchor.
    Click,
    /// The anchor never appeared.
    TargetMissing,
    Back,
}

/// Timer payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TourTimer {
    Start,
    Transition(TourAdvanceReason),
    Poll { step: usize, attempt: u32 },
}

/// Outbound notifications, drained through [`TourController::tick`] or
/// [`TourController::drain_events`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TourEvent {
    Started {
        step: &'static str,
    },
    StepChanged {
        from: &'static str,
        to: &'static str,
        reason: TourAdvanceReason,
    },
    TargetMissing {
        step: &'static str,
    },
    Paused {
        step: &'static str,
    },
    Resumed {
        step: &'static str,
    },
    Finished {
        reason: FinishReason,
    },
    Restarted,
    LocaleReset {
        locale: Locale,
    },
}

/// Controller-owned tour state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TourState {
    pub phase: TourPhase,
    /// Meaningful while the phase is running.
    pub step_index: usize,
    pub target_rect: Option<Rect>,
    /// Resolution for the current step has completed.
    pub target_ready: bool,
    /// The host left the current step's route.
    pub is_paused: bool,
}

impl Default for TourState {
    fn default() -> Self {
        Self {
            phase: TourPhase::Inactive,
            step_index: 0,
            target_rect: None,
            target_ready: false,
            is_paused: false,
        }
    }
}

/// What the embedding app observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TourSnapshot {
    pub is_active: bool,
    /// 1-based.
    pub current_step_number: usize,
    pub total_steps: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// Scopes
// ─────────────────────────────────────────────────────────────────────────────

struct ActiveSession {
    _window: WindowResizeListener,
    _scroll: ScrollLock,
}

impl ActiveSession {
    fn acquire(host: &Rc<dyn TourHost>) -> Self {
        Self {
            _scroll: ScrollLock::acquire(Rc::clone(host)),
            _window: WindowResizeListener::add(Rc::clone(host)),
        }
    }
}

struct StepScope {
    resolver: TargetResolver,
    interceptor: Option<ClickInterceptor>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Controller
// ─────────────────────────────────────────────────────────────────────────────

/// The guided tour state machine.
pub struct TourController {
    config: TourConfig,
    host: Rc<dyn TourHost>,
    translator: Rc<dyn Translate>,
    locale: LocaleContext,
    user: UserDescriptor,
    caps: Capabilities,
    catalog: StepCatalog,
    steps: Rc<[TourStep]>,
    progress: ProgressStore,
    persisted: PersistedProgress,
    timers: Timers<TourTimer>,
    lifecycle: TimerScope<TourTimer>,
    resume_index: usize,
    state: TourState,
    step: Option<StepScope>,
    session: Option<ActiveSession>,
    events: Vec<TourEvent>,
    now: Duration,
    mounted: bool,
}

impl TourController {
    pub fn new(
        config: TourConfig,
        host: Rc<dyn TourHost>,
        translator: Rc<dyn Translate>,
        storage: KvStore,
        user: UserDescriptor,
        locale: LocaleContext,
    ) -> Self {
        let caps = user.capabilities();
        let mut catalog = StepCatalog::new();
        let steps = catalog.steps(caps, translator.as_ref());
        let progress = ProgressStore::new(storage, ProgressKeys::for_user(&config, &user.id));
        let timers = Timers::new();
        let lifecycle = timers.scope();
        Self {
            config,
            host,
            translator,
            locale,
            user,
            caps,
            catalog,
            steps,
            progress,
            persisted: PersistedProgress::default(),
            timers,
            lifecycle,
            resume_index: 0,
            state: TourState::default(),
            step: None,
            session: None,
            events: Vec::new(),
            now: Duration::ZERO,
            mounted: false,
        }
    }

    // ── Accessors ───────────────────────────────────────────────────────────

    #[must_use]
    pub fn state(&self) -> &TourState {
        &self.state
    }

    #[must_use]
    pub fn steps(&self) -> &[TourStep] {
        &self.steps
    }

    #[must_use]
    pub fn current_step(&self) -> Option<&TourStep> {
        self.steps.get(self.state.step_index)
    }

    #[must_use]
    pub fn config(&self) -> &TourConfig {
        &self.config
    }

    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        self.caps
    }

    #[must_use]
    pub fn user(&self) -> &UserDescriptor {
        &self.user
    }

    /// Progress as last read or written this session.
    #[must_use]
    pub fn persisted(&self) -> &PersistedProgress {
        &self.persisted
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Time of the last tick.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Earliest pending timer, for hosts that sleep between ticks.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.next_deadline()
    }

    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    #[must_use]
    pub fn snapshot(&self) -> TourSnapshot {
        TourSnapshot {
            is_active: self.state.phase.is_running(),
            current_step_number: match self.state.phase {
                // A pending start reports the checkpoint it will resume at.
                TourPhase::Inactive => self.resume_index + 1,
                _ => self.state.step_index + 1,
            },
            total_steps: self.steps.len(),
        }
    }

    /// View model for the renderer; `None` unless a step is on screen.
    #[must_use]
    pub fn overlay(&self) -> Option<TourOverlay> {
        if self.state.phase != TourPhase::Active {
            return None;
        }
        let step = self.current_step()?;
        Some(TourOverlay::build(
            step,
            self.state.step_index,
            self.steps.len(),
            self.state.target_rect,
            self.host.viewport_size(),
            self.state.is_paused,
            &self.config,
        ))
    }

    pub fn drain_events(&mut self) -> Vec<TourEvent> {
        std::mem::take(&mut self.events)
    }

    // ── Lifecycle ───────────────────────────────────────────────────────────

    /// Read persisted progress and schedule the auto-start.
    ///
    /// Returns `true` when a start was scheduled.
    pub fn mount(&mut self, now: Duration) -> bool {
        self.now = now;
        if self.mounted {
            return false;
        }
        self.mounted = true;
        if self.user.id.is_empty() {
            tracing::debug!("no user id; tour stays inactive");
            return false;
        }

        self.persisted = self.progress.load();
        if self.reconcile_locale(true) {
            return true;
        }
        match self.persisted.status {
            TourStatus::Unset => {
                self.resume_index = self
                    .persisted
                    .step_index
                    .unwrap_or(0)
                    .min(self.last_index());
                self.schedule_start();
                true
            }
            TourStatus::Skipped => {
                self.state.phase = TourPhase::Finished(FinishReason::Skipped);
                false
            }
            TourStatus::Completed => {
                self.state.phase = TourPhase::Finished(FinishReason::Completed);
                false
            }
        }
    }

    /// Release every scoped resource. A later `mount` resumes from the
    /// persisted checkpoint.
    pub fn unmount(&mut self) {
        if !self.mounted && self.session.is_none() {
            return;
        }
        self.teardown();
        if !matches!(self.state.phase, TourPhase::Finished(_)) {
            self.state.phase = TourPhase::Inactive;
            self.resume_index = self.state.step_index;
        }
        self.mounted = false;
        tracing::debug!(user = %self.user.id, "tour unmounted");
    }

    /// Fire every timer due at or before `now` and return queued events.
    ///
    /// Timers fire at their own deadlines, so one large tick behaves like
    /// many small ones.
    pub fn tick(&mut self, now: Duration) -> Vec<TourEvent> {
        while let Some(deadline) = self.timers.next_deadline().filter(|d| *d <= now) {
            self.now = self.now.max(deadline);
            let Some((_, timer)) = self.timers.pop_due(deadline) else {
                break;
            };
            self.fire(timer);
        }
        self.now = self.now.max(now);
        self.drain_events()
    }

    // ── Operations ──────────────────────────────────────────────────────────

    /// Next step, or finish from the terminal step.
    pub fn advance(&mut self) -> bool {
        self.advance_with(TourAdvanceReason::Manual)
    }

    /// Previous step. No-op at step 0 and between steps.
    pub fn retreat(&mut self) -> bool {
        if self.state.phase != TourPhase::Active || self.state.step_index == 0 {
            return false;
        }
        self.begin_transition(TourAdvanceReason::Back);
        true
    }

    /// Abandon the tour and remember the locale it was abandoned in.
    pub fn skip(&mut self) -> bool {
        if self.user.id.is_empty() || matches!(self.state.phase, TourPhase::Finished(_)) {
            return false;
        }
        let locale = self.locale.current_locale();
        self.teardown();
        self.progress.save_skipped(&locale);
        self.persisted.status = TourStatus::Skipped;
        self.persisted.skip_locale = Some(locale.clone());
        self.state.phase = TourPhase::Finished(FinishReason::Skipped);
        tracing::info!(
            user = %self.user.id,
            step = self.state.step_index,
            locale = %locale,
            "tour skipped"
        );
        self.emit(TourEvent::Finished {
            reason: FinishReason::Skipped,
        });
        true
    }

    /// Forget all progress and start over from step 0 at the root route.
    /// Requires a mounted tour with a user id.
    pub fn restart(&mut self) -> bool {
        if !self.mounted || self.user.id.is_empty() {
            return false;
        }
        self.progress.clear();
        self.persisted = PersistedProgress::default();
        self.step = None;
        self.lifecycle.cancel_all();
        tracing::info!(user = %self.user.id, "tour restarted");
        self.emit(TourEvent::Restarted);
        self.host.navigate_to(&self.config.root_route);
        self.enter_active(0);
        true
    }

    /// Swap the capability set and re-derive the catalog.
    pub fn set_capabilities(&mut self, caps: Capabilities) {
        if caps == self.caps {
            return;
        }
        self.caps = caps;
        self.refresh_steps();
    }

    pub fn handle_event(&mut self, event: HostEvent) -> EventOutcome {
        match event {
            HostEvent::Key(key) => self.on_key(key),
            HostEvent::RouteChanged(route) => self.on_route_changed(&route),
            HostEvent::LocaleChanged(locale) => self.on_locale_changed(locale),
            HostEvent::WindowResized(_) => self.on_window_resized(),
            HostEvent::ElementResized { listener, rect } => {
                self.on_element_resized(listener, rect)
            }
            HostEvent::Click { listener } => self.on_click(listener),
        }
    }

    // ── Input handlers ──────────────────────────────────────────────────────

    fn on_key(&mut self, key: KeyEvent) -> EventOutcome {
        if !self.state.phase.is_running() || key.is_chord() {
            return EventOutcome::IGNORED;
        }
        match key.code {
            KeyCode::Escape => {
                self.skip();
                EventOutcome::CONSUMED
            }
            KeyCode::Right | KeyCode::Enter => {
                if self.current_step().is_some_and(TourStep::is_click_advance) {
                    tracing::trace!("keyboard advance blocked on click-advance step");
                    return EventOutcome::IGNORED;
                }
                if self.advance_with(TourAdvanceReason::Keyboard) {
                    EventOutcome::CONSUMED
                } else {
                    EventOutcome::IGNORED
                }
            }
            KeyCode::Left => {
                if self.retreat() {
                    EventOutcome::CONSUMED
                } else {
                    EventOutcome::IGNORED
                }
            }
            _ => EventOutcome::IGNORED,
        }
    }

    fn on_route_changed(&mut self, route: &str) -> EventOutcome {
        if self.state.phase != TourPhase::Active {
            return EventOutcome::IGNORED;
        }
        let steps = Rc::clone(&self.steps);
        let Some(step) = steps.get(self.state.step_index) else {
            return EventOutcome::IGNORED;
        };

        if self.state.is_paused {
            if step.route_path.is_some_and(|r| r != route) {
                return EventOutcome::IGNORED;
            }
            self.state.is_paused = false;
            tracing::debug!(step = step.id, route, "back on step route; resuming");
            self.emit(TourEvent::Resumed { step: step.id });
            self.enter_step();
            return EventOutcome::HANDLED;
        }

        let now = self.now;
        let Some(scope) = self.step.as_mut() else {
            return EventOutcome::IGNORED;
        };
        if scope.resolver.is_awaiting_route() {
            let outcome = scope.resolver.route_changed(route, now);
            self.apply_resolution(outcome);
            return EventOutcome::HANDLED;
        }
        if scope.resolver.is_off_route(route) {
            self.pause(step.id, route);
            return EventOutcome::HANDLED;
        }
        EventOutcome::IGNORED
    }

    fn on_locale_changed(&mut self, locale: Locale) -> EventOutcome {
        self.locale.set_locale(locale);
        self.refresh_steps();
        self.reconcile_locale(false);
        EventOutcome::HANDLED
    }

    fn on_window_resized(&mut self) -> EventOutcome {
        match self.step.as_mut() {
            Some(scope) if scope.resolver.element().is_some() => {
                self.state.target_rect = scope.resolver.refresh_rect();
                EventOutcome::HANDLED
            }
            _ => EventOutcome::IGNORED,
        }
    }

    fn on_element_resized(&mut self, listener: ListenerId, rect: Rect) -> EventOutcome {
        let applied = self
            .step
            .as_mut()
            .is_some_and(|scope| scope.resolver.element_resized(listener, rect));
        if !applied {
            return EventOutcome::IGNORED;
        }
        self.state.target_rect = Some(rect);
        EventOutcome::HANDLED
    }

    fn on_click(&mut self, listener: ListenerId) -> EventOutcome {
        if self.state.phase != TourPhase::Active {
            tracing::trace!(?listener, "click outside an active step dropped");
            return EventOutcome::IGNORED;
        }
        let owned = self
            .step
            .as_ref()
            .and_then(|scope| scope.interceptor.as_ref())
            .is_some_and(|interceptor| interceptor.listener() == listener);
        if !owned {
            return EventOutcome::IGNORED;
        }

        let steps = Rc::clone(&self.steps);
        let Some(step) = steps.get(self.state.step_index) else {
            return EventOutcome::IGNORED;
        };
        self.progress.save_checkpoint(self.state.step_index + 1);
        if let Some(route) = step.next_route {
            self.host.navigate_to(route);
        }
        self.advance_with(TourAdvanceReason::Click);
        EventOutcome::CONSUMED
    }

    // ── Transitions ─────────────────────────────────────────────────────────

    fn fire(&mut self, timer: TourTimer) {
        match timer {
            TourTimer::Start => {
                if self.state.phase == TourPhase::Inactive {
                    self.enter_active(self.resume_index);
                }
            }
            TourTimer::Transition(reason) => self.complete_transition(reason),
            TourTimer::Poll { step, attempt } => {
                let now = self.now;
                let outcome = match self.step.as_mut() {
                    Some(scope) if scope.resolver.step_index() == step => {
                        scope.resolver.poll(attempt, now)
                    }
                    _ => {
                        tracing::trace!(step, attempt, "stale poll dropped");
                        return;
                    }
                };
                self.apply_resolution(outcome);
            }
        }
    }

    fn schedule_start(&mut self) {
        let deadline = self.now + self.config.start_delay;
        self.lifecycle.schedule(deadline, TourTimer::Start);
        tracing::debug!(
            user = %self.user.id,
            step = self.resume_index,
            ?deadline,
            "tour start scheduled"
        );
    }

    fn enter_active(&mut self, index: usize) {
        self.lifecycle.cancel_all();
        self.state = TourState {
            phase: TourPhase::Active,
            step_index: index.min(self.last_index()),
            ..TourState::default()
        };
        if self.session.is_none() {
            self.session = Some(ActiveSession::acquire(&self.host));
        }
        let id = self.current_step().map_or("", |s| s.id);
        tracing::info!(user = %self.user.id, step = id, index = self.state.step_index, "tour started");
        self.emit(TourEvent::Started { step: id });
        self.enter_step();
    }

    fn enter_step(&mut self) {
        // Cancel the previous step's work before starting new work.
        self.step = None;
        self.state.target_ready = false;
        self.state.target_rect = None;

        let steps = Rc::clone(&self.steps);
        let index = self.state.step_index;
        let Some(step) = steps.get(index) else {
            return;
        };
        let policy = PollPolicy {
            interval: self.config.poll_interval,
            attempts: self.config.poll_attempts,
        };
        let mut resolver =
            TargetResolver::new(Rc::clone(&self.host), index, step, policy, self.timers.scope());
        tracing::debug!(step = step.id, index, "entering step");
        let outcome = resolver.begin(self.now);
        self.step = Some(StepScope {
            resolver,
            interceptor: None,
        });
        self.apply_resolution(outcome);
    }

    fn apply_resolution(&mut self, outcome: ResolveOutcome) {
        match outcome {
            ResolveOutcome::Pending => {}
            ResolveOutcome::Ready => self.on_target_ready(),
            ResolveOutcome::Missing => self.on_target_missing(),
        }
    }

    fn on_target_ready(&mut self) {
        let steps = Rc::clone(&self.steps);
        let Some(step) = steps.get(self.state.step_index) else {
            return;
        };
        let Some(scope) = self.step.as_mut() else {
            return;
        };
        self.state.target_ready = true;
        self.state.target_rect = scope.resolver.rect();
        if step.is_click_advance()
            && scope.interceptor.is_none()
            && let Some(element) = scope.resolver.element()
        {
            scope.interceptor = Some(ClickInterceptor::attach(Rc::clone(&self.host), element));
        }
    }

    fn on_target_missing(&mut self) {
        let id = self.current_step().map_or("", |s| s.id);
        tracing::warn!(
            step = id,
            attempts = self.config.poll_attempts,
            window = ?self.config.poll_window(),
            "step anchor never appeared; moving on"
        );
        self.emit(TourEvent::TargetMissing { step: id });
        self.advance_with(TourAdvanceReason::TargetMissing);
    }

    fn advance_with(&mut self, reason: TourAdvanceReason) -> bool {
        if self.state.phase != TourPhase::Active {
            return false;
        }
        let Some(step) = self.current_step() else {
            return false;
        };
        if step.is_terminal {
            self.finish_completed();
        } else {
            self.begin_transition(reason);
        }
        true
    }

    fn begin_transition(&mut self, reason: TourAdvanceReason) {
        // Dropping the step scope detaches the click interceptor before the
        // delay, so a second click cannot advance twice.
        self.step = None;
        self.state.phase = TourPhase::Transitioning;
        self.state.target_ready = false;
        self.state.target_rect = None;
        self.state.is_paused = false;
        let deadline = self.now + self.config.transition_delay;
        self.lifecycle
            .schedule(deadline, TourTimer::Transition(reason));
        tracing::debug!(index = self.state.step_index, ?reason, "transition started");
    }

    fn complete_transition(&mut self, reason: TourAdvanceReason) {
        if self.state.phase != TourPhase::Transitioning {
            return;
        }
        let from_index = self.state.step_index;
        let to_index = if reason == TourAdvanceReason::Back {
            from_index.saturating_sub(1)
        } else {
            (from_index + 1).min(self.last_index())
        };
        let from = self.steps.get(from_index).map_or("", |s| s.id);
        let to = self.steps.get(to_index).map_or("", |s| s.id);

        self.state.step_index = to_index;
        self.state.phase = TourPhase::Active;
        if reason != TourAdvanceReason::Back {
            self.progress.save_checkpoint(to_index);
            self.persisted.step_index = Some(to_index);
        }
        tracing::debug!(from, to, ?reason, "step changed");
        self.emit(TourEvent::StepChanged { from, to, reason });
        self.enter_step();
    }

    fn finish_completed(&mut self) {
        self.teardown();
        self.progress.save_completed();
        self.persisted.status = TourStatus::Completed;
        self.state.phase = TourPhase::Finished(FinishReason::Completed);
        tracing::info!(user = %self.user.id, "tour completed");
        self.emit(TourEvent::Finished {
            reason: FinishReason::Completed,
        });
    }

    fn pause(&mut self, step: &'static str, route: &str) {
        self.step = None;
        self.state.target_ready = false;
        self.state.target_rect = None;
        self.state.is_paused = true;
        tracing::debug!(step, route, "left step route; tour paused");
        self.emit(TourEvent::Paused { step });
    }

    /// Reset a skipped tour when the active locale differs from the one it was
    /// skipped under. Returns `true` if a reset happened.
    fn reconcile_locale(&mut self, at_mount: bool) -> bool {
        if !self.mounted || self.persisted.status != TourStatus::Skipped {
            return false;
        }
        let current = self.locale.current_locale();
        match self.persisted.skip_locale.as_deref() {
            Some(skipped) if skipped != current => {}
            _ => return false,
        }

        tracing::info!(
            user = %self.user.id,
            skipped_in = ?self.persisted.skip_locale,
            locale = %current,
            "locale changed since skip; restarting onboarding"
        );
        self.progress.clear();
        self.persisted = PersistedProgress::default();
        self.state.phase = TourPhase::Inactive;
        self.emit(TourEvent::LocaleReset { locale: current });
        if at_mount {
            self.resume_index = 0;
            self.schedule_start();
        } else {
            self.enter_active(0);
        }
        true
    }

    fn refresh_steps(&mut self) {
        let previous = self.current_step().map(|s| s.id);
        self.steps = self.catalog.steps(self.caps, self.translator.as_ref());
        let last = self.last_index();
        self.state.step_index = self.state.step_index.min(last);
        self.resume_index = self.resume_index.min(last);
        let current = self.current_step().map(|s| s.id);
        if self.state.phase == TourPhase::Active && !self.state.is_paused && previous != current {
            self.enter_step();
        }
    }

    fn teardown(&mut self) {
        self.step = None;
        self.lifecycle.cancel_all();
        self.session = None;
        self.state.target_ready = false;
        self.state.target_rect = None;
        self.state.is_paused = false;
    }

    fn last_index(&self) -> usize {
        self.steps.len().saturating_sub(1)
    }

    fn emit(&mut self, event: TourEvent) {
        tracing::trace!(?event, "tour event");
        self.events.push(event);
    }
}

impl Drop for TourController {
    fn drop(&mut self) {
        self.unmount();
    }
}

impl fmt::Debug for TourController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TourController")
            .field("user", &self.user.id)
            .field("caps", &self.caps)
            .field("state", &self.state)
            .field("steps", &self.steps.len())
            .field("timers", &self.timers)
            .field("mounted", &self.mounted)
            .finish()
    }
}
