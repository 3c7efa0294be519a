#![forbid(unsafe_code)]

//! Host contract.
//!
//! The tour never touches a document directly. Everything it needs from the
//! page (routing, element lookup, geometry, scroll pinning, listeners) goes
//! through [`TourHost`], and everything the page reports back arrives as a
//! [`HostEvent`].

use serde::Serialize;
use waypoint_core::event::{ElementHandle, KeyEvent, ListenerId};
use waypoint_core::geometry::{Point, Rect, Size};
use waypoint_runtime::locale::Locale;

/// Services the embedding page provides to the tour.
///
/// All methods take `&self`; implementations use interior mutability. Calls
/// happen on the host's single event-loop thread.
pub trait TourHost {
    /// Path of the active route, e.g. `"/create-request"`.
    fn current_route(&self) -> String;

    /// Request navigation. The host reports completion with
    /// [`HostEvent::RouteChanged`].
    fn navigate_to(&self, path: &str);

    /// First element matching `selector`, if any.
    fn query_selector(&self, selector: &str) -> Option<ElementHandle>;

    /// Viewport-relative bounds of a live element.
    fn bounding_rect(&self, element: ElementHandle) -> Option<Rect>;

    /// Smoothly scroll `element` to the vertical center of the viewport.
    fn scroll_into_view(&self, element: ElementHandle);

    fn viewport_size(&self) -> Size;

    /// Current document scroll offset.
    fn scroll_offset(&self) -> Point;

    /// Freeze page scrolling at `offset`.
    fn pin_body(&self, offset: Point);

    /// Undo [`pin_body`](Self::pin_body) and scroll back to `offset`.
    fn unpin_body(&self, offset: Point);

    /// Attach a capture-phase click handler on `element`. Clicks are reported
    /// as [`HostEvent::Click`] and have their default action prevented.
    fn attach_click_interceptor(&self, element: ElementHandle, listener: ListenerId);

    fn detach_click_interceptor(&self, element: ElementHandle, listener: ListenerId);

    /// Report size changes of `element` as [`HostEvent::ElementResized`].
    fn observe_resize(&self, element: ElementHandle, listener: ListenerId);

    fn unobserve_resize(&self, element: ElementHandle, listener: ListenerId);

    /// Report window resizes as [`HostEvent::WindowResized`].
    fn add_window_resize_listener(&self, listener: ListenerId);

    fn remove_window_resize_listener(&self, listener: ListenerId);
}

/// Input from the host.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    Key(KeyEvent),
    /// The active route changed (tour-initiated or manual).
    RouteChanged(String),
    LocaleChanged(Locale),
    WindowResized(Size),
    ElementResized { listener: ListenerId, rect: Rect },
    /// An intercepted click on a click-advance anchor.
    Click { listener: ListenerId },
}

/// What the tour did with a [`HostEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct EventOutcome {
    /// The tour acted on the event.
    pub handled: bool,
    /// The host must suppress the event's default action.
    pub prevent_default: bool,
}

impl EventOutcome {
    pub const IGNORED: Self = Self {
        handled: false,
        prevent_default: false,
    };

    pub const HANDLED: Self = Self {
        handled: true,
        prevent_default: false,
    };

    /// Handled, and the default action must not run.
    pub const CONSUMED: Self = Self {
        handled: true,
        prevent_default: true,
    };
}
