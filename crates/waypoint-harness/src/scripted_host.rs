#![forbid(unsafe_code)]

//! Scripted page model.
//!
//! [`ScriptedHost`] stands in for a browser: it has a current route, a set of
//! anchors that exist on particular routes from a particular time on, a
//! scroll position, and the listener tables the tour registers into. Every
//! call the tour makes is appended to a [`HostCall`] log so tests can assert
//! on acquisition and release order.
//!
//! Route changes triggered by the tour are reported back through the shared
//! [`EventQueue`], the way an SPA router would.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use waypoint_core::event::{ElementHandle, ListenerId};
use waypoint_core::geometry::{Point, Rect, Size};
use waypoint_tour::{HostEvent, TourHost};
use waypoint_web::EventQueue;

/// Default viewport for scripted pages.
pub const DEFAULT_VIEWPORT: Size = Size::new(1280.0, 800.0);

/// One call made by the tour into the host.
#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    Navigate(String),
    ScrollIntoView(ElementHandle),
    Pin(Point),
    Unpin(Point),
    AttachClick(ListenerId),
    DetachClick(ListenerId),
    Observe(ListenerId),
    Unobserve(ListenerId),
    AddWindowListener(ListenerId),
    RemoveWindowListener(ListenerId),
}

#[derive(Debug, Clone)]
struct Anchor {
    name: String,
    selector: String,
    route: Option<String>,
    rect: Rect,
    appears_at: Duration,
    handle: ElementHandle,
}

/// Deterministic [`TourHost`] for tests and demos.
#[derive(Debug)]
pub struct ScriptedHost {
    queue: EventQueue,
    route: RefCell<String>,
    now: Cell<Duration>,
    viewport: Cell<Size>,
    scroll: Cell<Point>,
    pinned: Cell<Option<Point>>,
    anchors: RefCell<Vec<Anchor>>,
    next_handle: Cell<u64>,
    interceptors: RefCell<BTreeMap<ListenerId, ElementHandle>>,
    observers: RefCell<BTreeMap<ListenerId, ElementHandle>>,
    window_listeners: RefCell<BTreeSet<ListenerId>>,
    calls: RefCell<Vec<HostCall>>,
}

/// `[data-tour="name"]`
#[must_use]
pub fn data_tour_selector(name: &str) -> String {
    format!("[data-tour=\"{name}\"]")
}

impl ScriptedHost {
    #[must_use]
    pub fn new(queue: EventQueue, route: &str) -> Self {
        Self {
            queue,
            route: RefCell::new(route.to_string()),
            now: Cell::new(Duration::ZERO),
            viewport: Cell::new(DEFAULT_VIEWPORT),
            scroll: Cell::new(Point::default()),
            pinned: Cell::new(None),
            anchors: RefCell::new(Vec::new()),
            next_handle: Cell::new(1),
            interceptors: RefCell::new(BTreeMap::new()),
            observers: RefCell::new(BTreeMap::new()),
            window_listeners: RefCell::new(BTreeSet::new()),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// The request-management app: home, request form and admin pages with
    /// every `data-tour` anchor the catalog points at.
    #[must_use]
    pub fn request_app(queue: EventQueue) -> Self {
        let host = Self::new(queue, "/");
        host.add_anchor("new-request", Some("/"), Rect::new(1040.0, 24.0, 180.0, 44.0));
        host.add_anchor("my-requests", Some("/"), Rect::new(32.0, 160.0, 600.0, 320.0));
        host.add_anchor("pending-approvals", Some("/"), Rect::new(660.0, 160.0, 560.0, 320.0));
        host.add_anchor("admin-link", Some("/"), Rect::new(24.0, 24.0, 120.0, 40.0));
        host.add_anchor("user-search", Some("/create-request"), Rect::new(320.0, 120.0, 640.0, 48.0));
        host.add_anchor("system-select", Some("/create-request"), Rect::new(320.0, 200.0, 640.0, 48.0));
        host.add_anchor("role-select", Some("/create-request"), Rect::new(320.0, 280.0, 640.0, 48.0));
        host.add_anchor("justification", Some("/create-request"), Rect::new(320.0, 360.0, 640.0, 160.0));
        host.add_anchor("admin-users", Some("/admin"), Rect::new(40.0, 120.0, 520.0, 400.0));
        host.add_anchor("admin-systems", Some("/admin"), Rect::new(600.0, 120.0, 520.0, 400.0));
        host
    }

    // ── Page scripting ──────────────────────────────────────────────────────

    /// Add an anchor present from time zero. `route: None` means it is part
    /// of the layout on every route.
    pub fn add_anchor(&self, name: &str, route: Option<&str>, rect: Rect) -> ElementHandle {
        self.add_anchor_at(name, route, rect, Duration::ZERO)
    }

    /// Add an anchor that only renders once the page clock reaches `appears_at`.
    pub fn add_anchor_at(
        &self,
        name: &str,
        route: Option<&str>,
        rect: Rect,
        appears_at: Duration,
    ) -> ElementHandle {
        // Handles are never reused, even after `remove_anchor`.
        let handle = ElementHandle(self.next_handle.get());
        self.next_handle.set(handle.0 + 1);
        self.anchors.borrow_mut().push(Anchor {
            name: name.to_string(),
            selector: data_tour_selector(name),
            route: route.map(str::to_string),
            rect,
            appears_at,
            handle,
        });
        handle
    }

    /// Remove an anchor from the page entirely.
    pub fn remove_anchor(&self, name: &str) {
        self.anchors.borrow_mut().retain(|a| a.name != name);
    }

    /// Move or resize an anchor and notify its resize observers.
    pub fn resize_anchor(&self, name: &str, rect: Rect) {
        let handle = {
            let mut anchors = self.anchors.borrow_mut();
            let Some(anchor) = anchors.iter_mut().find(|a| a.name == name) else {
                return;
            };
            anchor.rect = rect;
            anchor.handle
        };
        for (listener, element) in self.observers.borrow().iter() {
            if *element == handle {
                self.queue.push(HostEvent::ElementResized {
                    listener: *listener,
                    rect,
                });
            }
        }
    }

    /// Resize the viewport and notify window listeners.
    pub fn resize_window(&self, size: Size) {
        self.viewport.set(size);
        if !self.window_listeners.borrow().is_empty() {
            self.queue.push(HostEvent::WindowResized(size));
        }
    }

    /// The user navigated (address bar, nav link).
    pub fn visit(&self, route: &str) {
        *self.route.borrow_mut() = route.to_string();
        self.queue.push(HostEvent::RouteChanged(route.to_string()));
    }

    /// The user clicked `name`. Returns `true` if a tour interceptor caught it.
    pub fn click(&self, name: &str) -> bool {
        let Some(handle) = self.visible(name).map(|a| a.handle) else {
            return false;
        };
        let listeners: Vec<ListenerId> = self
            .interceptors
            .borrow()
            .iter()
            .filter(|(_, element)| **element == handle)
            .map(|(listener, _)| *listener)
            .collect();
        for listener in &listeners {
            self.queue.push(HostEvent::Click {
                listener: *listener,
            });
        }
        !listeners.is_empty()
    }

    /// Scroll the document (only possible while the body is not pinned).
    pub fn scroll_to(&self, offset: Point) -> bool {
        if self.pinned.get().is_some() {
            return false;
        }
        self.scroll.set(offset);
        true
    }

    pub fn set_now(&self, now: Duration) {
        self.now.set(now);
    }

    // ── Inspection ──────────────────────────────────────────────────────────

    #[must_use]
    pub fn route(&self) -> String {
        self.route.borrow().clone()
    }

    #[must_use]
    pub fn is_pinned(&self) -> bool {
        self.pinned.get().is_some()
    }

    #[must_use]
    pub fn scroll(&self) -> Point {
        self.scroll.get()
    }

    #[must_use]
    pub fn interceptor_count(&self) -> usize {
        self.interceptors.borrow().len()
    }

    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.borrow().len()
    }

    #[must_use]
    pub fn window_listener_count(&self) -> usize {
        self.window_listeners.borrow().len()
    }

    /// Nothing the tour acquired is still held.
    #[must_use]
    pub fn is_released(&self) -> bool {
        !self.is_pinned()
            && self.interceptor_count() == 0
            && self.observer_count() == 0
            && self.window_listener_count() == 0
    }

    #[must_use]
    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    /// Navigations the tour requested, in order.
    #[must_use]
    pub fn navigations(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                HostCall::Navigate(route) => Some(route.clone()),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn handle_of(&self, name: &str) -> Option<ElementHandle> {
        self.anchors
            .borrow()
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.handle)
    }

    fn visible(&self, name: &str) -> Option<Anchor> {
        let route = self.route.borrow();
        let now = self.now.get();
        self.anchors
            .borrow()
            .iter()
            .find(|a| {
                a.name == name
                    && a.appears_at <= now
                    && a.route.as_deref().is_none_or(|r| r == route.as_str())
            })
            .cloned()
    }

    fn record(&self, call: HostCall) {
        self.calls.borrow_mut().push(call);
    }
}

impl TourHost for ScriptedHost {
    fn current_route(&self) -> String {
        self.route()
    }

    fn navigate_to(&self, path: &str) {
        self.record(HostCall::Navigate(path.to_string()));
        *self.route.borrow_mut() = path.to_string();
        self.queue.push(HostEvent::RouteChanged(path.to_string()));
    }

    fn query_selector(&self, selector: &str) -> Option<ElementHandle> {
        let name = self
            .anchors
            .borrow()
            .iter()
            .find(|a| a.selector == selector)
            .map(|a| a.name.clone())?;
        self.visible(&name).map(|a| a.handle)
    }

    fn bounding_rect(&self, element: ElementHandle) -> Option<Rect> {
        let name = self
            .anchors
            .borrow()
            .iter()
            .find(|a| a.handle == element)
            .map(|a| a.name.clone())?;
        self.visible(&name).map(|a| a.rect)
    }

    fn scroll_into_view(&self, element: ElementHandle) {
        self.record(HostCall::ScrollIntoView(element));
    }

    fn viewport_size(&self) -> Size {
        self.viewport.get()
    }

    fn scroll_offset(&self) -> Point {
        self.scroll.get()
    }

    fn pin_body(&self, offset: Point) {
        self.record(HostCall::Pin(offset));
        self.pinned.set(Some(offset));
    }

    fn unpin_body(&self, offset: Point) {
        self.record(HostCall::Unpin(offset));
        self.pinned.set(None);
        self.scroll.set(offset);
    }

    fn attach_click_interceptor(&self, element: ElementHandle, listener: ListenerId) {
        self.record(HostCall::AttachClick(listener));
        self.interceptors.borrow_mut().insert(listener, element);
    }

    fn detach_click_interceptor(&self, _element: ElementHandle, listener: ListenerId) {
        self.record(HostCall::DetachClick(listener));
        self.interceptors.borrow_mut().remove(&listener);
    }

    fn observe_resize(&self, element: ElementHandle, listener: ListenerId) {
        self.record(HostCall::Observe(listener));
        self.observers.borrow_mut().insert(listener, element);
    }

    fn unobserve_resize(&self, _element: ElementHandle, listener: ListenerId) {
        self.record(HostCall::Unobserve(listener));
        self.observers.borrow_mut().remove(&listener);
    }

    fn add_window_resize_listener(&self, listener: ListenerId) {
        self.record(HostCall::AddWindowListener(listener));
        self.window_listeners.borrow_mut().insert(listener);
    }

    fn remove_window_resize_listener(&self, listener: ListenerId) {
        self.record(HostCall::RemoveWindowListener(listener));
        self.window_listeners.borrow_mut().remove(&listener);
    }
}
