#![forbid(unsafe_code)]

//! Deterministic tour runs.
//!
//! A [`TourRun`] wires a [`TourController`] to a [`ScriptedHost`] through a
//! [`StepDriver`] and advances time deadline by deadline, so the page clock
//! and the tour clock agree at every timer firing. Every tour event is kept
//! with its timestamp for assertions and JSONL transcripts.
//!
//! # JSONL Schema
//!
//! ```json
//! {"t_ms":500,"event":{"Started":{"step":"welcome"}}}
//! {"t_ms":650,"event":{"StepChanged":{"from":"welcome","to":"create-request","reason":"Manual"}}}
//! ```

use std::fmt::Write as _;
use std::rc::Rc;
use std::time::Duration;

use serde::Serialize;
use waypoint_core::event::{KeyCode, KeyEvent};
use waypoint_runtime::locale::LocaleContext;
use waypoint_runtime::state_persistence::{KvStore, MemoryStorage, StorageBackend};
use waypoint_tour::{
    EventOutcome, HostEvent, RoleFlags, TourConfig, TourController, TourEvent, UserDescriptor,
    builtin_catalog,
};
use waypoint_web::{EventQueue, StepDriver};

use crate::scripted_host::ScriptedHost;

/// A tour event and the page time it was observed at.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimedEvent {
    pub t_ms: u64,
    pub event: TourEvent,
}

/// Builder for [`TourRun`].
pub struct TourRunBuilder {
    user: UserDescriptor,
    locale: String,
    config: TourConfig,
    backend: Option<Rc<dyn StorageBackend>>,
    host: Option<Box<dyn FnOnce(EventQueue) -> ScriptedHost>>,
}

impl TourRunBuilder {
    #[must_use]
    pub fn with_locale(mut self, locale: &str) -> Self {
        self.locale = locale.to_string();
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: TourConfig) -> Self {
        self.config = config;
        self
    }

    /// Share a storage backend across runs to simulate reloads.
    #[must_use]
    pub fn with_backend(mut self, backend: Rc<dyn StorageBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Replace the default [`ScriptedHost::request_app`] page.
    #[must_use]
    pub fn with_page(mut self, page: impl FnOnce(EventQueue) -> ScriptedHost + 'static) -> Self {
        self.host = Some(Box::new(page));
        self
    }

    #[must_use]
    pub fn build(self) -> TourRun {
        let queue = EventQueue::new();
        let host = Rc::new(match self.host {
            Some(page) => page(queue.clone()),
            None => ScriptedHost::request_app(queue.clone()),
        });
        let backend = self
            .backend
            .unwrap_or_else(|| Rc::new(MemoryStorage::new()));
        let locale = LocaleContext::new(self.locale);
        let tour = TourController::new(
            self.config,
            host.clone(),
            Rc::new(builtin_catalog(locale.clone())),
            KvStore::open(backend.clone()),
            self.user,
            locale,
        );
        TourRun {
            host,
            backend,
            driver: StepDriver::new(tour, queue),
            log: Vec::new(),
        }
    }
}

/// A tour mounted on a scripted page.
pub struct TourRun {
    host: Rc<ScriptedHost>,
    backend: Rc<dyn StorageBackend>,
    driver: StepDriver,
    log: Vec<TimedEvent>,
}

impl TourRun {
    /// Start building a run for `user_id` with the given roles.
    #[must_use]
    pub fn builder(user_id: &str, roles: Option<RoleFlags>) -> TourRunBuilder {
        TourRunBuilder {
            user: UserDescriptor::new(user_id, roles),
            locale: "en".to_string(),
            config: TourConfig::default(),
            backend: None,
            host: None,
        }
    }

    pub fn mount(&mut self) -> bool {
        let scheduled = self.driver.mount();
        self.settle();
        scheduled
    }

    /// Advance to absolute time `t`, firing each timer at its own deadline.
    pub fn run_until(&mut self, t: Duration) -> Vec<TourEvent> {
        let mut fired = Vec::new();
        loop {
            let next = self
                .driver
                .tour()
                .next_deadline()
                .filter(|deadline| *deadline <= t);
            let Some(deadline) = next else {
                break;
            };
            let deadline = deadline.max(self.driver.now());
            fired.extend(self.step_at(deadline));
        }
        let now = t.max(self.driver.now());
        fired.extend(self.step_at(now));
        fired
    }

    /// Advance by `dt` from the current time.
    pub fn run_for(&mut self, dt: Duration) -> Vec<TourEvent> {
        self.run_until(self.driver.now() + dt)
    }

    /// Run until no timers remain or `limit` is reached.
    pub fn run_to_idle(&mut self, limit: Duration) -> Vec<TourEvent> {
        let mut fired = Vec::new();
        while let Some(deadline) = self.driver.tour().next_deadline() {
            if deadline > limit {
                break;
            }
            fired.extend(self.run_until(deadline));
        }
        fired
    }

    /// Process queued host events at the current time.
    pub fn settle(&mut self) -> Vec<TourEvent> {
        let now = self.driver.now();
        self.step_at(now)
    }

    /// Press a key. Returns the tour's decision; queued side effects are
    /// settled before returning.
    pub fn key(&mut self, code: KeyCode) -> EventOutcome {
        self.key_event(KeyEvent::new(code))
    }

    pub fn key_event(&mut self, key: KeyEvent) -> EventOutcome {
        let outcome = self.driver.tour_mut().handle_event(HostEvent::Key(key));
        self.settle();
        outcome
    }

    /// Click an anchor and settle. Returns whether the tour intercepted it.
    pub fn click(&mut self, anchor: &str) -> bool {
        let intercepted = self.host.click(anchor);
        self.settle();
        intercepted
    }

    /// The user navigates on their own.
    pub fn visit(&mut self, route: &str) -> Vec<TourEvent> {
        self.host.visit(route);
        self.settle()
    }

    pub fn change_locale(&mut self, locale: &str) -> Vec<TourEvent> {
        self.driver
            .push_event(HostEvent::LocaleChanged(locale.to_string()));
        self.settle()
    }

    /// Call a tour operation and record the events it raised.
    pub fn with_tour<R>(&mut self, f: impl FnOnce(&mut TourController) -> R) -> R {
        let result = f(self.driver.tour_mut());
        self.settle();
        result
    }

    #[must_use]
    pub fn host(&self) -> &ScriptedHost {
        &self.host
    }

    /// The page, kept alive past the run for teardown assertions.
    #[must_use]
    pub fn shared_host(&self) -> Rc<ScriptedHost> {
        Rc::clone(&self.host)
    }

    #[must_use]
    pub fn backend(&self) -> Rc<dyn StorageBackend> {
        Rc::clone(&self.backend)
    }

    #[must_use]
    pub fn tour(&self) -> &TourController {
        self.driver.tour()
    }

    #[must_use]
    pub fn now(&self) -> Duration {
        self.driver.now()
    }

    /// Current step id, if a step is on screen.
    #[must_use]
    pub fn step_id(&self) -> Option<&'static str> {
        self.driver.tour().overlay().map(|overlay| overlay.step.id)
    }

    #[must_use]
    pub fn events(&self) -> &[TimedEvent] {
        &self.log
    }

    /// Every recorded event as one JSON object per line.
    #[must_use]
    pub fn transcript_jsonl(&self) -> String {
        let mut out = String::new();
        for entry in &self.log {
            match serde_json::to_string(entry) {
                Ok(line) => {
                    let _ = writeln!(out, "{line}");
                }
                Err(err) => tracing::warn!(error = %err, "transcript entry skipped"),
            }
        }
        out
    }

    /// Tear the tour down, releasing every host resource.
    pub fn unmount(&mut self) {
        self.driver.unmount();
        self.settle();
    }

    fn step_at(&mut self, now: Duration) -> Vec<TourEvent> {
        self.host.set_now(now);
        self.driver.set_time(now);
        let mut fired = self.driver.step().tour_events;
        // Tour operations called directly leave their events in the outbox.
        fired.extend(self.driver.tour_mut().drain_events());
        let t_ms = u64::try_from(now.as_millis()).unwrap_or(u64::MAX);
        self.log.extend(fired.iter().cloned().map(|event| TimedEvent { t_ms, event }));
        fired
    }
}
