#![forbid(unsafe_code)]

//! Tooltip placement.
//!
//! [`place`] maps an anchor rectangle (or none), the tooltip box size, and the
//! viewport size to the tooltip's top-left corner and arrow side. It is a pure
//! function; the controller re-runs it whenever the anchor or viewport moves.
//!
//! # Algorithm
//!
//! Without an anchor the tooltip is centered and has no arrow. With an anchor,
//! orientations are tried in a fixed order:
//!
//! | Orientation | Main axis                       | Arrow  |
//! |-------------|---------------------------------|--------|
//! | Below       | `top = anchor.bottom + gap`     | Top    |
//! | Above       | `top = anchor.top - gap - h`    | Bottom |
//! | Right       | `left = anchor.right + gap`     | Left   |
//! | Left        | `left = anchor.left - gap - w`  | Right  |
//!
//! The cross axis is centered on the anchor's midpoint and clamped into
//! `[edge_margin, viewport - tooltip - edge_margin]`. The first orientation
//! whose box lies entirely inside the viewport wins. If none fits, the result
//! is "below" with both axes clamped independently.

use serde::Serialize;
use waypoint_core::geometry::{Rect, Size};

use crate::config::PlacementConfig;

/// Which side of the anchor the tooltip sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Below,
    Above,
    Right,
    Left,
}

impl Orientation {
    /// Preference order.
    pub const ORDER: [Self; 4] = [Self::Below, Self::Above, Self::Right, Self::Left];

    /// The tooltip edge carrying the arrow, pointing back at the anchor.
    #[must_use]
    pub const fn arrow(self) -> ArrowSide {
        match self {
            Self::Below => ArrowSide::Top,
            Self::Above => ArrowSide::Bottom,
            Self::Right => ArrowSide::Left,
            Self::Left => ArrowSide::Right,
        }
    }
}

/// Edge of the tooltip box the arrow is drawn on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrowSide {
    Top,
    Bottom,
    Left,
    Right,
}

/// Result of [`place`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Placement {
    pub top: f64,
    pub left: f64,
    /// `None` for a centered tooltip.
    pub orientation: Option<Orientation>,
    pub arrow: Option<ArrowSide>,
    /// No orientation fit and the box was clamped.
    pub fallback: bool,
}

impl Placement {
    /// Centered in the viewport, no arrow.
    #[must_use]
    pub fn centered(tooltip: Size, viewport: Size) -> Self {
        Self {
            top: ((viewport.height - tooltip.height) / 2.0).max(0.0),
            left: ((viewport.width - tooltip.width) / 2.0).max(0.0),
            orientation: None,
            arrow: None,
            fallback: false,
        }
    }

    /// The tooltip box this placement describes.
    #[must_use]
    pub fn rect(&self, tooltip: Size) -> Rect {
        Rect::new(self.left, self.top, tooltip.width, tooltip.height)
    }
}

/// Clamp `value` into `[margin, extent - size - margin]`.
///
/// When the range is empty the box cannot respect both margins; it is
/// centered in `extent` instead.
fn clamp_axis(value: f64, size: f64, extent: f64, margin: f64) -> f64 {
    let lo = margin;
    let hi = extent - size - margin;
    if hi < lo {
        (extent - size) / 2.0
    } else {
        value.clamp(lo, hi)
    }
}

fn fits(rect: &Rect, viewport: Size) -> bool {
    Rect::from(viewport).contains_rect(rect)
}

fn candidate(
    orientation: Orientation,
    anchor: &Rect,
    tooltip: Size,
    viewport: Size,
    config: &PlacementConfig,
) -> (f64, f64) {
    let gap = config.gap;
    let margin = config.edge_margin;
    let centered_left = anchor.center_x() - tooltip.width / 2.0;
    let centered_top = anchor.center_y() - tooltip.height / 2.0;
    match orientation {
        Orientation::Below => (
            anchor.bottom() + gap,
            clamp_axis(centered_left, tooltip.width, viewport.width, margin),
        ),
        Orientation::Above => (
            anchor.top() - gap - tooltip.height,
            clamp_axis(centered_left, tooltip.width, viewport.width, margin),
        ),
        Orientation::Right => (
            clamp_axis(centered_top, tooltip.height, viewport.height, margin),
            anchor.right() + gap,
        ),
        Orientation::Left => (
            clamp_axis(centered_top, tooltip.height, viewport.height, margin),
            anchor.left() - gap - tooltip.width,
        ),
    }
}

/// Compute the tooltip position for `anchor`.
#[must_use]
pub fn place(
    anchor: Option<&Rect>,
    tooltip: Size,
    viewport: Size,
    config: &PlacementConfig,
) -> Placement {
    let Some(anchor) = anchor else {
        return Placement::centered(tooltip, viewport);
    };

    for orientation in Orientation::ORDER {
        let (top, left) = candidate(orientation, anchor, tooltip, viewport, config);
        if fits(&Rect::new(left, top, tooltip.width, tooltip.height), viewport) {
            return Placement {
                top,
                left,
                orientation: Some(orientation),
                arrow: Some(orientation.arrow()),
                fallback: false,
            };
        }
    }

    let (top, left) = candidate(Orientation::Below, anchor, tooltip, viewport, config);
    Placement {
        top: clamp_axis(top, tooltip.height, viewport.height, config.edge_margin),
        left,
        orientation: Some(Orientation::Below),
        arrow: Some(ArrowSide::Top),
        fallback: true,
    }
}
