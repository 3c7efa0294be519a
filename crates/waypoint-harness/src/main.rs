#![forbid(unsafe_code)]

//! Tour walkthrough demo.
//!
//! Walks one user through the request-management app on a scripted page and
//! prints the tour transcript as JSON lines on stdout. Tracing output goes
//! to stderr.
//!
//! # Running
//!
//! ```sh
//! WAYPOINT_HARNESS_ROLES=manager,admin cargo run -p waypoint-harness
//! ```
//!
//! # Environment
//!
//! - `WAYPOINT_HARNESS_USER`: user id (default `demo`)
//! - `WAYPOINT_HARNESS_ROLES`: comma-separated `manager`, `admin`
//! - `WAYPOINT_HARNESS_LOCALE`: UI locale (default `en`)
//! - `WAYPOINT_HARNESS_STORE`: JSON file for progress; in-memory when unset
//! - `WAYPOINT_HARNESS_SKIP_AT`: step number at which to press Escape
//! - `WAYPOINT_HARNESS_LOG_FORMAT`: `pretty` or `json`
//! - `WAYPOINT_LOG` / `RUST_LOG`: tracing filter

use std::io::{self, Write};
use std::rc::Rc;
use std::time::Duration;

use waypoint_core::event::KeyCode;
use waypoint_core::logging::{LogFormat, install_subscriber};
use waypoint_harness::TourRun;
use waypoint_runtime::FileStorage;
use waypoint_runtime::state_persistence::StorageBackend;
use waypoint_tour::{RoleFlags, TourPhase};

/// Upper bound on scripted interactions, well past the longest catalog.
const MAX_INTERACTIONS: usize = 64;

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn env_usize(name: &str) -> Option<usize> {
    env_string(name).and_then(|value| value.parse::<usize>().ok())
}

fn parse_roles(raw: &str) -> RoleFlags {
    raw.split(',')
        .map(str::trim)
        .fold(RoleFlags::empty(), |roles, role| match role {
            "manager" => roles | RoleFlags::MANAGER,
            "admin" => roles | RoleFlags::ADMIN,
            _ => roles,
        })
}

fn main() -> io::Result<()> {
    let format = env_string("WAYPOINT_HARNESS_LOG_FORMAT")
        .and_then(|raw| LogFormat::parse(&raw))
        .unwrap_or_default();
    if let Err(err) = install_subscriber(format) {
        eprintln!("logging disabled: {err}");
    }

    let user = env_string("WAYPOINT_HARNESS_USER").unwrap_or_else(|| "demo".into());
    let roles = env_string("WAYPOINT_HARNESS_ROLES").map(|raw| parse_roles(&raw));
    let locale = env_string("WAYPOINT_HARNESS_LOCALE").unwrap_or_else(|| "en".into());
    let skip_at = env_usize("WAYPOINT_HARNESS_SKIP_AT");

    let mut builder = TourRun::builder(&user, roles).with_locale(&locale);
    if let Some(path) = env_string("WAYPOINT_HARNESS_STORE") {
        let backend: Rc<dyn StorageBackend> = Rc::new(FileStorage::new(path));
        builder = builder.with_backend(backend);
    }
    let mut run = builder.build();

    if !run.mount() {
        tracing::info!(user = %user, phase = ?run.tour().state().phase, "nothing to show");
    }
    run.run_for(run.tour().config().start_delay);

    for _ in 0..MAX_INTERACTIONS {
        if !run.tour().state().phase.is_running() {
            break;
        }
        let step_number = run.tour().snapshot().current_step_number;
        if skip_at == Some(step_number) {
            run.key(KeyCode::Escape);
            break;
        }
        match run.tour().current_step() {
            Some(step) if step.is_click_advance() && run.tour().state().target_ready => {
                let anchor = step
                    .target_selector
                    .and_then(|s| s.strip_prefix("[data-tour=\""))
                    .and_then(|s| s.strip_suffix("\"]"))
                    .unwrap_or_default()
                    .to_string();
                run.click(&anchor);
            }
            Some(_) if run.tour().state().phase == TourPhase::Active => {
                run.key(KeyCode::Right);
            }
            _ => {}
        }
        let transition = run.tour().config().transition_delay;
        let poll_window = run.tour().config().poll_window();
        run.run_for(transition.max(Duration::from_millis(1)));
        // Let a late anchor either resolve or time out.
        if run.tour().state().phase == TourPhase::Active && !run.tour().state().target_ready {
            run.run_for(poll_window);
        }
    }

    let mut stdout = io::stdout().lock();
    stdout.write_all(run.transcript_jsonl().as_bytes())?;
    stdout.flush()?;

    let snapshot = run.tour().snapshot();
    tracing::info!(
        user = %user,
        phase = ?run.tour().state().phase,
        total_steps = snapshot.total_steps,
        "walkthrough finished"
    );
    run.unmount();
    if !run.host().is_released() {
        eprintln!("host resources still held after unmount");
        std::process::exit(2);
    }
    Ok(())
}
