#![forbid(unsafe_code)]

//! Render-ready view of the current step.
//!
//! [`TourOverlay`] is everything a renderer needs to draw the backdrop,
//! spotlight, tooltip, and controls. It carries no behavior beyond simple
//! geometry queries.

use serde::Serialize;
use waypoint_core::geometry::{Point, Rect, Size};

use crate::catalog::TourStep;
use crate::config::TourConfig;
use crate::placement::{Placement, place};

/// State of one progress dot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressDot {
    Completed,
    Current,
    Upcoming,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TourOverlay {
    pub step: TourStep,
    /// 1-based.
    pub step_number: usize,
    pub total_steps: usize,
    pub dots: Vec<ProgressDot>,
    /// Anchor bounds inflated by the spotlight padding.
    pub spotlight: Option<Rect>,
    pub tooltip: Placement,
    pub tooltip_size: Size,
    pub show_prev: bool,
    pub show_next: bool,
    /// Translation key for the primary button.
    pub next_label_key: &'static str,
    /// Ask the user to click the highlighted control.
    pub click_hint: bool,
    /// The user navigated away; the tour waits for them to return.
    pub is_paused: bool,
}

impl TourOverlay {
    pub(crate) fn build(
        step: &TourStep,
        index: usize,
        total: usize,
        target: Option<Rect>,
        viewport: Size,
        paused: bool,
        config: &TourConfig,
    ) -> Self {
        let dots = (0..total)
            .map(|i| match i.cmp(&index) {
                std::cmp::Ordering::Less => ProgressDot::Completed,
                std::cmp::Ordering::Equal => ProgressDot::Current,
                std::cmp::Ordering::Greater => ProgressDot::Upcoming,
            })
            .collect();
        let click_only = step.is_click_advance();
        Self {
            step: step.clone(),
            step_number: index + 1,
            total_steps: total,
            dots,
            spotlight: target.map(|r| r.inflate(config.spotlight_padding)),
            tooltip: place(
                target.as_ref(),
                config.tooltip_size,
                viewport,
                &config.placement,
            ),
            tooltip_size: config.tooltip_size,
            show_prev: index > 0 && !click_only,
            show_next: !click_only,
            next_label_key: if step.is_terminal { "tourFinish" } else { "next" },
            click_hint: click_only && target.is_some(),
            is_paused: paused,
        }
    }

    /// Whether a click at `point` reaches the page.
    ///
    /// Only the spotlight hole is click-through; the backdrop swallows the rest.
    #[must_use]
    pub fn allows_click_at(&self, point: Point) -> bool {
        !self.is_paused && self.spotlight.is_some_and(|hole| hole.contains(point))
    }

    #[must_use]
    pub fn tooltip_rect(&self) -> Rect {
        self.tooltip.rect(self.tooltip_size)
    }
}
