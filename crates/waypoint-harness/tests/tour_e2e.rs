//! End-to-end tour runs on the scripted request-management app.
//!
//! ```sh
//! cargo test -p waypoint-harness --test tour_e2e
//! ```
//!
//! # Invariants
//!
//! 1. **Catalog shape**: the step list depends only on the capability set,
//!    with the completion step last.
//! 2. **Single advance per click**: an intercepted click advances exactly
//!    once, however many clicks land before the transition completes.
//! 3. **Scroll restore**: the scroll offset saved on activation is restored on
//!    every exit path (complete, skip, unmount, drop).
//! 4. **Stale work is inert**: polls for a step that is no longer current
//!    never fire a result.
//! 5. **Persistence**: checkpoints resume across reloads; skip and completion
//!    are terminal until a locale change or explicit restart.
//! 6. **Storage failure is silent**: an unavailable backend never stops the
//!    tour.

#![cfg(test)]

use std::rc::Rc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use proptest::prelude::*;

use waypoint_core::event::{KeyCode, KeyEvent, Modifiers};
use waypoint_core::geometry::{Point, Rect, Size};
use waypoint_harness::{HostCall, ScriptedHost, TourRun};
use waypoint_runtime::FileStorage;
use waypoint_runtime::state_persistence::{MemoryStorage, StorageBackend, UnavailableStorage};
use waypoint_tour::{
    EventOutcome, FinishReason, RoleFlags, TourAdvanceReason, TourController, TourEvent,
    TourPhase,
};

fn log_jsonl(event: &str, case: &str, passed: bool, details: &str) {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    eprintln!(
        r#"{{"event":"{event}","case":"{case}","passed":{passed},"details":"{details}","timestamp":{timestamp}}}"#
    );
}

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

fn key(kind: &str, user: &str) -> String {
    format!("interactive_tour_{kind}_{user}_v3")
}

fn stored(backend: &dyn StorageBackend, key: &str) -> Option<String> {
    backend.get(key).ok().flatten()
}

/// Mount and fire the start timer.
fn started(mut run: TourRun) -> TourRun {
    assert!(run.mount());
    run.run_until(ms(500));
    run
}

/// Press Right and let the transition complete.
fn next(run: &mut TourRun) -> Vec<TourEvent> {
    assert_eq!(run.key(KeyCode::Right), EventOutcome::CONSUMED);
    run.run_for(ms(150))
}

fn changed_to(events: &[TourEvent]) -> Vec<&'static str> {
    events
        .iter()
        .filter_map(|e| match e {
            TourEvent::StepChanged { to, .. } => Some(*to),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Catalog shape
// ============================================================================

#[test]
fn base_user_gets_eight_steps() {
    let run = TourRun::builder("1", None).build();
    let ids: Vec<_> = run.tour().steps().iter().map(|s| s.id).collect();
    assert_eq!(
        ids,
        vec![
            "welcome",
            "create-request",
            "user-search",
            "system-select",
            "role-select",
            "justification",
            "my-requests",
            "complete",
        ]
    );
    assert!(run.tour().steps()[7].is_terminal);
}

#[test]
fn manager_admin_gets_twelve_steps_in_group_order() {
    let run = TourRun::builder("1", Some(RoleFlags::MANAGER | RoleFlags::ADMIN)).build();
    let ids: Vec<_> = run.tour().steps().iter().map(|s| s.id).collect();
    assert_eq!(ids.len(), 12);
    assert_eq!(
        &ids[6..],
        &[
            "my-requests",
            "approvals",
            "admin-entry",
            "admin-users",
            "admin-systems",
            "complete"
        ]
    );
    log_jsonl("catalog", "manager_admin", true, "12 steps");
}

// ============================================================================
// Full walkthrough
// ============================================================================

#[test]
fn base_walkthrough_completes_and_releases_everything() {
    let backend = Rc::new(MemoryStorage::new());
    let mut run = started(TourRun::builder("1", None).with_backend(backend.clone()).build());
    assert_eq!(run.step_id(), Some("welcome"));
    assert!(run.host().is_pinned());
    assert_eq!(run.host().window_listener_count(), 1);

    let events = next(&mut run);
    assert_eq!(
        events,
        vec![TourEvent::StepChanged {
            from: "welcome",
            to: "create-request",
            reason: TourAdvanceReason::Keyboard,
        }]
    );
    assert!(run.tour().state().target_ready);
    assert_eq!(run.host().interceptor_count(), 1);

    // Keyboard cannot skip past a click-through step.
    assert_eq!(run.key(KeyCode::Right), EventOutcome::IGNORED);
    assert_eq!(run.key(KeyCode::Enter), EventOutcome::IGNORED);

    assert!(run.click("new-request"));
    assert_eq!(run.host().interceptor_count(), 0);
    assert_eq!(run.host().route(), "/create-request");
    let events = run.run_for(ms(150));
    assert_eq!(
        events,
        vec![TourEvent::StepChanged {
            from: "create-request",
            to: "user-search",
            reason: TourAdvanceReason::Click,
        }]
    );

    for expected in [
        "system-select",
        "role-select",
        "justification",
        "my-requests",
        "complete",
    ] {
        let events = next(&mut run);
        assert_eq!(changed_to(&events), vec![expected]);
        assert_eq!(run.step_id(), Some(expected));
        assert!(run.tour().state().target_ready, "{expected} not resolved");
    }
    assert_eq!(run.host().route(), "/");
    assert_eq!(stored(&*backend, &key("progress", "1")).as_deref(), Some("7"));

    assert_eq!(run.key(KeyCode::Enter), EventOutcome::CONSUMED);
    assert_eq!(
        run.tour().state().phase,
        TourPhase::Finished(FinishReason::Completed)
    );
    assert_eq!(
        stored(&*backend, &key("status", "1")).as_deref(),
        Some("completed")
    );
    assert_eq!(run.host().navigations(), vec!["/create-request", "/"]);
    assert!(run.host().is_released());
    assert_eq!(run.tour().pending_timers(), 0);
    assert!(run.tour().overlay().is_none());

    let transcript = run.transcript_jsonl();
    let passed = transcript.lines().count() == 9;
    log_jsonl("walkthrough", "base", passed, "started + 7 changes + finished");
    assert!(passed, "{transcript}");
}

#[test]
fn admin_click_through_lands_on_admin_page() {
    let backend = Rc::new(MemoryStorage::with_entries([(key("progress", "9"), "7")]));
    let mut run = started(
        TourRun::builder("9", Some(RoleFlags::ADMIN))
            .with_backend(backend)
            .build(),
    );
    assert_eq!(run.step_id(), Some("admin-entry"));
    assert!(run.tour().state().target_ready);

    assert!(run.click("admin-link"));
    run.run_for(ms(150));
    assert_eq!(run.step_id(), Some("admin-users"));
    assert_eq!(run.host().route(), "/admin");
    assert!(run.tour().state().target_ready);
}

// ============================================================================
// Click interception
// ============================================================================

#[test]
fn double_click_advances_once() {
    let mut run = started(TourRun::builder("1", None).build());
    next(&mut run);
    assert_eq!(run.step_id(), Some("create-request"));

    // Both clicks land before the queue is processed.
    assert!(run.host().click("new-request"));
    assert!(run.host().click("new-request"));
    run.settle();

    let events = run.run_for(ms(1_000));
    assert_eq!(changed_to(&events), vec!["user-search"]);
    assert_eq!(run.tour().state().step_index, 2);

    let calls = run.host().calls();
    let attaches = calls
        .iter()
        .filter(|c| matches!(c, HostCall::AttachClick(_)))
        .count();
    let detaches = calls
        .iter()
        .filter(|c| matches!(c, HostCall::DetachClick(_)))
        .count();
    assert_eq!((attaches, detaches), (1, 1));
}

#[test]
fn click_before_anchor_resolves_is_not_intercepted() {
    let mut run = started(TourRun::builder("1", None).build());
    assert!(!run.click("new-request"));
    assert_eq!(run.step_id(), Some("welcome"));
}

// ============================================================================
// Keyboard
// ============================================================================

#[test]
fn chords_are_ignored_and_escape_skips() {
    let backend = Rc::new(MemoryStorage::new());
    let mut run = started(TourRun::builder("1", None).with_backend(backend.clone()).build());

    let chord = KeyEvent::new(KeyCode::Right).with_modifiers(Modifiers::CTRL);
    assert_eq!(run.key_event(chord), EventOutcome::IGNORED);
    assert_eq!(run.step_id(), Some("welcome"));

    assert_eq!(run.key(KeyCode::Left), EventOutcome::IGNORED);
    assert_eq!(run.key(KeyCode::Escape), EventOutcome::CONSUMED);
    assert_eq!(
        run.tour().state().phase,
        TourPhase::Finished(FinishReason::Skipped)
    );
    assert_eq!(
        stored(&*backend, &key("status", "1")).as_deref(),
        Some("skipped")
    );
    assert_eq!(stored(&*backend, &key("locale", "1")).as_deref(), Some("en"));
    assert_eq!(run.key(KeyCode::Escape), EventOutcome::IGNORED);
}

#[test]
fn back_across_routes_reattaches_interceptor() {
    let mut run = started(TourRun::builder("1", None).build());
    next(&mut run);
    run.click("new-request");
    run.run_for(ms(150));
    assert_eq!(run.step_id(), Some("user-search"));

    assert_eq!(run.key(KeyCode::Left), EventOutcome::CONSUMED);
    let events = run.run_for(ms(150));
    assert_eq!(
        events,
        vec![TourEvent::StepChanged {
            from: "user-search",
            to: "create-request",
            reason: TourAdvanceReason::Back,
        }]
    );
    assert_eq!(run.host().route(), "/");
    assert!(run.tour().state().target_ready);
    assert_eq!(run.host().interceptor_count(), 1);
}

// ============================================================================
// Target resolution
// ============================================================================

#[test]
fn late_anchor_resolves_on_a_later_poll() {
    let backend = Rc::new(MemoryStorage::with_entries([(key("progress", "1"), "2")]));
    let page = |queue| {
        let host = ScriptedHost::request_app(queue);
        host.remove_anchor("user-search");
        host.add_anchor_at(
            "user-search",
            Some("/create-request"),
            Rect::new(320.0, 120.0, 640.0, 48.0),
            ms(1_000),
        );
        host
    };
    let mut run = started(
        TourRun::builder("1", None)
            .with_backend(backend)
            .with_page(page)
            .build(),
    );
    assert_eq!(run.step_id(), Some("user-search"));
    assert_eq!(run.host().navigations(), vec!["/create-request"]);
    assert!(!run.tour().state().target_ready);

    run.run_until(ms(1_099));
    assert!(!run.tour().state().target_ready);
    run.run_until(ms(1_100));
    assert!(run.tour().state().target_ready);
    assert_eq!(run.tour().pending_timers(), 0);
    assert_eq!(
        run.tour().state().target_rect,
        Some(Rect::new(320.0, 120.0, 640.0, 48.0))
    );
}

#[test]
fn missing_anchor_is_reported_then_skipped() {
    let backend = Rc::new(MemoryStorage::with_entries([(key("progress", "1"), "2")]));
    let page = |queue| {
        let host = ScriptedHost::request_app(queue);
        host.remove_anchor("user-search");
        host
    };
    let mut run = started(
        TourRun::builder("1", None)
            .with_backend(backend.clone())
            .with_page(page)
            .build(),
    );

    let events = run.run_until(ms(3_299));
    assert!(events.is_empty());
    let events = run.run_until(ms(3_300));
    assert_eq!(events, vec![TourEvent::TargetMissing { step: "user-search" }]);
    let events = run.run_until(ms(3_450));
    assert_eq!(
        events,
        vec![TourEvent::StepChanged {
            from: "user-search",
            to: "system-select",
            reason: TourAdvanceReason::TargetMissing,
        }]
    );
    assert_eq!(stored(&*backend, &key("progress", "1")).as_deref(), Some("3"));
    log_jsonl("resolve", "missing_anchor", true, "15 polls then advance");
}

#[test]
fn leaving_a_polling_step_cancels_its_polls() {
    let backend = Rc::new(MemoryStorage::with_entries([(key("progress", "1"), "2")]));
    let page = |queue| {
        let host = ScriptedHost::request_app(queue);
        host.remove_anchor("user-search");
        host
    };
    let mut run = started(
        TourRun::builder("1", None)
            .with_backend(backend)
            .with_page(page)
            .build(),
    );
    run.run_until(ms(600));
    assert_eq!(run.tour().pending_timers(), 1);

    next(&mut run);
    assert_eq!(run.step_id(), Some("system-select"));
    assert_eq!(run.tour().pending_timers(), 0);

    let events = run.run_until(ms(5_000));
    assert!(events.is_empty(), "stale poll fired: {events:?}");
    assert_eq!(run.step_id(), Some("system-select"));
}

#[test]
fn anchor_and_window_resizes_update_the_spotlight() {
    let mut run = started(TourRun::builder("1", None).build());
    next(&mut run);
    assert_eq!(run.host().observer_count(), 1);

    let moved = Rect::new(900.0, 40.0, 200.0, 44.0);
    run.host().resize_anchor("new-request", moved);
    run.settle();
    assert_eq!(run.tour().state().target_rect, Some(moved));

    run.host().resize_window(Size::new(800.0, 600.0));
    run.settle();
    let overlay = run.tour().overlay().expect("overlay");
    assert_eq!(overlay.spotlight.map(|r| r.width), Some(216.0));
    assert!(overlay.tooltip.left + 360.0 <= 800.0);
}

// ============================================================================
// Manual navigation
// ============================================================================

#[test]
fn manual_navigation_pauses_and_returning_resumes() {
    let mut run = started(TourRun::builder("1", None).build());
    next(&mut run);
    run.click("new-request");
    run.run_for(ms(150));
    assert_eq!(run.step_id(), Some("user-search"));

    let events = run.visit("/");
    assert_eq!(events, vec![TourEvent::Paused { step: "user-search" }]);
    assert!(run.tour().state().is_paused);
    assert_eq!(run.host().observer_count(), 0);
    assert!(run.host().is_pinned());
    let overlay = run.tour().overlay().expect("overlay while paused");
    assert!(overlay.is_paused);
    assert!(!overlay.allows_click_at(Point::new(1.0, 1.0)));

    // Another unrelated page keeps the pause.
    assert!(run.visit("/admin").is_empty());

    let events = run.visit("/create-request");
    assert_eq!(events, vec![TourEvent::Resumed { step: "user-search" }]);
    assert!(!run.tour().state().is_paused);
    assert!(run.tour().state().target_ready);
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn checkpoint_resumes_after_reload() {
    let backend = Rc::new(MemoryStorage::new());
    {
        let mut run = started(TourRun::builder("1", None).with_backend(backend.clone()).build());
        next(&mut run);
        run.click("new-request");
        run.run_for(ms(150));
        next(&mut run);
        assert_eq!(run.step_id(), Some("system-select"));
    }
    assert_eq!(stored(&*backend, &key("progress", "1")).as_deref(), Some("3"));

    let mut run = started(TourRun::builder("1", None).with_backend(backend).build());
    assert_eq!(run.events()[0].event, TourEvent::Started { step: "system-select" });
    assert_eq!(run.host().navigations(), vec!["/create-request"]);
    assert!(run.tour().state().target_ready);
    run.unmount();
}

#[test]
fn file_store_checkpoint_survives_reload() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("waypoint").join("progress.json");
    let open = || -> Rc<dyn StorageBackend> { Rc::new(FileStorage::new(&path)) };
    {
        let mut run = started(TourRun::builder("1", None).with_backend(open()).build());
        next(&mut run);
        run.click("new-request");
        run.run_for(ms(150));
        assert_eq!(run.step_id(), Some("user-search"));
        run.unmount();
    }
    assert!(path.exists());
    assert_eq!(stored(&*open(), &key("progress", "1")).as_deref(), Some("2"));

    let mut run = TourRun::builder("1", None).with_backend(open()).build();
    assert!(run.mount());
    // Before the start delay the snapshot already points at the checkpoint.
    let pending = run.tour().snapshot();
    assert!(!pending.is_active);
    assert_eq!(pending.current_step_number, 3);

    run.run_until(ms(500));
    assert_eq!(run.step_id(), Some("user-search"));
    assert_eq!(run.tour().snapshot().current_step_number, 3);
    log_jsonl("persist", "file_reload", true, "resumed at user-search");
    run.unmount();
}

#[test]
fn skipped_tour_stays_finished_after_reload() {
    let backend = Rc::new(MemoryStorage::new());
    {
        let mut run = started(TourRun::builder("1", None).with_backend(backend.clone()).build());
        run.key(KeyCode::Escape);
    }
    let mut run = TourRun::builder("1", None).with_backend(backend).build();
    assert!(!run.mount());
    run.run_until(ms(5_000));
    assert!(run.events().is_empty());
    assert_eq!(
        run.tour().state().phase,
        TourPhase::Finished(FinishReason::Skipped)
    );
    assert!(!run.host().is_pinned());
}

#[test]
fn skip_in_other_locale_restarts_on_mount() {
    let backend = Rc::new(MemoryStorage::with_entries([
        (key("status", "1"), "skipped"),
        (key("locale", "1"), "en"),
        (key("progress", "1"), "4"),
    ]));
    let mut run = TourRun::builder("1", None)
        .with_locale("ru")
        .with_backend(backend.clone())
        .build();
    assert!(run.mount());
    assert_eq!(
        run.events()[0].event,
        TourEvent::LocaleReset {
            locale: "ru".to_string()
        }
    );
    assert!(backend.is_empty());

    run.run_until(ms(500));
    assert_eq!(run.step_id(), Some("welcome"));
    let overlay = run.tour().overlay().expect("overlay");
    assert_eq!(overlay.step.title, "Добро пожаловать");
}

#[test]
fn locale_switch_after_skip_restarts_immediately() {
    let backend = Rc::new(MemoryStorage::new());
    let mut run = started(TourRun::builder("1", None).with_backend(backend.clone()).build());
    next(&mut run);
    run.key(KeyCode::Escape);
    assert!(!run.host().is_pinned());

    assert!(run.change_locale("en").is_empty());

    let events = run.change_locale("ru");
    assert_eq!(
        events,
        vec![
            TourEvent::LocaleReset {
                locale: "ru".to_string()
            },
            TourEvent::Started { step: "welcome" },
        ]
    );
    assert_eq!(run.tour().state().phase, TourPhase::Active);
    assert_eq!(run.tour().state().step_index, 0);
    assert!(run.host().is_pinned());
    assert_eq!(stored(&*backend, &key("status", "1")), None);
    log_jsonl("locale", "skip_then_switch", true, "reset to welcome");
}

#[test]
fn unavailable_storage_never_blocks_the_tour() {
    let backend: Rc<dyn StorageBackend> = Rc::new(UnavailableStorage::new("quota exceeded"));
    let mut run = started(TourRun::builder("1", None).with_backend(backend.clone()).build());
    assert_eq!(run.step_id(), Some("welcome"));
    next(&mut run);
    run.key(KeyCode::Escape);
    assert_eq!(
        run.tour().state().phase,
        TourPhase::Finished(FinishReason::Skipped)
    );

    // Nothing was remembered, so a reload starts over.
    let mut reload = started(TourRun::builder("1", None).with_backend(backend).build());
    assert_eq!(reload.step_id(), Some("welcome"));
    reload.unmount();
}

#[test]
fn restart_after_completion_begins_at_root() {
    let backend = Rc::new(MemoryStorage::with_entries([(key("progress", "1"), "7")]));
    let mut run = started(TourRun::builder("1", None).with_backend(backend.clone()).build());
    assert_eq!(run.step_id(), Some("complete"));
    run.key(KeyCode::Enter);
    run.visit("/admin");

    assert!(run.with_tour(TourController::restart));
    let tail: Vec<_> = run.events().iter().rev().take(2).map(|e| e.event.clone()).collect();
    assert_eq!(
        tail,
        vec![TourEvent::Started { step: "welcome" }, TourEvent::Restarted]
    );
    assert_eq!(run.host().route(), "/");
    assert_eq!(stored(&*backend, &key("status", "1")), None);
    assert_eq!(run.tour().snapshot().current_step_number, 1);
}

// ============================================================================
// Scroll lock
// ============================================================================

fn scrolled_run() -> TourRun {
    let run = TourRun::builder("1", None).build();
    assert!(run.host().scroll_to(Point::new(0.0, 420.0)));
    started(run)
}

#[test]
fn scroll_is_restored_on_completion() {
    let mut run = scrolled_run();
    for _ in 0..7 {
        if run.tour().current_step().is_some_and(|s| s.is_click_advance()) {
            run.click("new-request");
            run.run_for(ms(150));
        } else {
            next(&mut run);
        }
    }
    assert_eq!(run.step_id(), Some("complete"));
    run.key(KeyCode::Right);
    assert_eq!(run.host().scroll(), Point::new(0.0, 420.0));
    assert!(run.host().is_released());
}

#[test]
fn scroll_is_restored_on_skip() {
    let mut run = scrolled_run();
    assert!(run.host().is_pinned());
    assert!(!run.host().scroll_to(Point::new(0.0, 0.0)));
    run.key(KeyCode::Escape);
    assert_eq!(run.host().scroll(), Point::new(0.0, 420.0));
    assert!(run.host().is_released());
}

#[test]
fn scroll_is_restored_on_unmount_mid_transition() {
    let mut run = scrolled_run();
    run.key(KeyCode::Right);
    assert_eq!(run.tour().state().phase, TourPhase::Transitioning);
    run.unmount();
    assert_eq!(run.host().scroll(), Point::new(0.0, 420.0));
    assert!(run.host().is_released());
    assert_eq!(run.tour().pending_timers(), 0);
}

#[test]
fn scroll_is_restored_when_the_tour_is_dropped() {
    let run = scrolled_run();
    let host = run.shared_host();
    assert!(host.is_pinned());
    drop(run);
    assert_eq!(host.scroll(), Point::new(0.0, 420.0));
    assert!(host.is_released());
    assert_eq!(
        host.calls().last(),
        Some(&HostCall::Unpin(Point::new(0.0, 420.0)))
    );
}

// ============================================================================
// Property: arbitrary interaction never leaks host resources
// ============================================================================

#[derive(Debug, Clone)]
enum Action {
    Key(KeyCode),
    Click(&'static str),
    Visit(&'static str),
    Wait(u64),
    Locale(&'static str),
    Restart,
}

fn action() -> impl Strategy<Value = Action> {
    prop_oneof![
        prop::sample::select(vec![
            KeyCode::Right,
            KeyCode::Left,
            KeyCode::Enter,
            KeyCode::Escape
        ])
        .prop_map(Action::Key),
        prop::sample::select(vec!["new-request", "admin-link", "user-search"]).prop_map(Action::Click),
        prop::sample::select(vec!["/", "/create-request", "/admin"]).prop_map(Action::Visit),
        (1u64..1_000).prop_map(Action::Wait),
        prop::sample::select(vec!["en", "ru"]).prop_map(Action::Locale),
        Just(Action::Restart),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn interaction_never_leaks(actions in prop::collection::vec(action(), 0..40)) {
        let mut run = TourRun::builder("p", Some(RoleFlags::MANAGER | RoleFlags::ADMIN)).build();
        run.host().scroll_to(Point::new(0.0, 128.0));
        run.mount();
        run.run_until(ms(500));
        for action in actions {
            match action {
                Action::Key(code) => { run.key(code); }
                Action::Click(anchor) => { run.click(anchor); }
                Action::Visit(route) => { run.visit(route); }
                Action::Wait(dt) => { run.run_for(ms(dt)); }
                Action::Locale(locale) => { run.change_locale(locale); }
                Action::Restart => { run.with_tour(TourController::restart); }
            }
            let state = run.tour().state();
            prop_assert!(state.step_index < run.tour().steps().len());
            prop_assert_eq!(run.host().is_pinned(), state.phase.is_running());
            prop_assert!(run.host().interceptor_count() <= 1);
            prop_assert!(run.host().observer_count() <= 1);
        }
        run.unmount();
        prop_assert!(run.host().is_released());
        prop_assert_eq!(run.host().scroll(), Point::new(0.0, 128.0));
    }
}
