#![forbid(unsafe_code)]

//! Browser bindings.
//!
//! [`BrowserHost`] implements [`TourHost`] on top of `web-sys`. DOM callbacks
//! never call into the controller directly: they push [`HostEvent`]s into the
//! shared [`EventQueue`], and the JS side calls `tick` from its animation or
//! timer loop.

use core::time::Duration;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{
    Document, Element, Event, ResizeObserver, ScrollBehavior, ScrollIntoViewOptions,
    ScrollLogicalPosition, Storage, Window,
};

use waypoint_core::event::{ElementHandle, KeyCode, KeyEvent, ListenerId, Modifiers};
use waypoint_core::geometry::{Point, Rect, Size};
use waypoint_runtime::locale::LocaleContext;
use waypoint_runtime::state_persistence::{
    KvStore, StorageBackend, StorageError, StorageResult, UnavailableStorage,
};
use waypoint_tour::{
    HostEvent, RoleFlags, TourConfig, TourController, TourHost, UserDescriptor, builtin_catalog,
};

use crate::{EventQueue, StepDriver, WebError};

fn js_err(err: &JsValue) -> String {
    err.as_string().unwrap_or_else(|| format!("{err:?}"))
}

impl From<WebError> for JsValue {
    fn from(err: WebError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

// ─── localStorage ───────────────────────────────────────────────────────────

/// [`StorageBackend`] over `window.localStorage`.
pub struct LocalStorageBackend {
    storage: Storage,
}

impl LocalStorageBackend {
    /// `None` when the browser denies storage access (private mode, policy).
    pub fn open(window: &Window) -> Option<Self> {
        match window.local_storage() {
            Ok(Some(storage)) => Some(Self { storage }),
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(error = %js_err(&err), "localStorage access denied");
                None
            }
        }
    }
}

impl StorageBackend for LocalStorageBackend {
    fn name(&self) -> &str {
        "LocalStorage"
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.storage
            .get_item(key)
            .map_err(|e| StorageError::Unavailable(js_err(&e)))
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.storage
            .set_item(key, value)
            .map_err(|e| StorageError::Unavailable(js_err(&e)))
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.storage
            .remove_item(key)
            .map_err(|e| StorageError::Unavailable(js_err(&e)))
    }

    /// Some browsers expose `localStorage` but throw on every write.
    fn is_available(&self) -> bool {
        const PROBE_KEY: &str = "__waypoint_probe__";
        self.storage.set_item(PROBE_KEY, "1").is_ok() && self.storage.remove_item(PROBE_KEY).is_ok()
    }
}

// ─── DOM host ───────────────────────────────────────────────────────────────

enum Listener {
    Click {
        element: Element,
        callback: Closure<dyn FnMut(Event)>,
    },
    Resize {
        observer: ResizeObserver,
        _callback: Closure<dyn FnMut(js_sys::Array)>,
    },
    Window {
        callback: Closure<dyn FnMut(Event)>,
    },
}

/// [`TourHost`] backed by the live document.
pub struct BrowserHost {
    window: Window,
    document: Document,
    queue: EventQueue,
    navigate: Option<js_sys::Function>,
    elements: RefCell<Vec<(ElementHandle, Element)>>,
    next_handle: Cell<u64>,
    listeners: RefCell<HashMap<ListenerId, Listener>>,
}

impl BrowserHost {
    /// `navigate` is the app router's push function; without it the host
    /// falls back to `history.pushState` and reports the route change itself.
    pub fn new(queue: EventQueue, navigate: Option<js_sys::Function>) -> Result<Self, WebError> {
        let window = web_sys::window().ok_or_else(|| WebError::Host("no window".into()))?;
        let document = window
            .document()
            .ok_or_else(|| WebError::Host("no document".into()))?;
        Ok(Self {
            window,
            document,
            queue,
            navigate,
            elements: RefCell::new(Vec::new()),
            next_handle: Cell::new(1),
            listeners: RefCell::new(HashMap::new()),
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    fn element(&self, handle: ElementHandle) -> Option<Element> {
        self.elements
            .borrow()
            .iter()
            .find(|(h, _)| *h == handle)
            .map(|(_, el)| el.clone())
    }

    fn register(&self, element: Element) -> ElementHandle {
        let mut elements = self.elements.borrow_mut();
        elements.retain(|(_, el)| el.is_connected());
        let known = elements
            .iter()
            .find(|(_, el)| el.is_same_node(Some(element.as_ref())))
            .map(|(handle, _)| *handle);
        if let Some(handle) = known {
            return handle;
        }
        let handle = ElementHandle(self.next_handle.get());
        self.next_handle.set(handle.0 + 1);
        elements.push((handle, element));
        handle
    }

    fn body_style(&self) -> Option<web_sys::CssStyleDeclaration> {
        self.document.body().map(|body| body.style())
    }

    fn inner_size(&self) -> Size {
        viewport_of(&self.window)
    }

    /// Drop every DOM listener still registered.
    pub fn detach_all(&self) {
        let drained: Vec<_> = self.listeners.borrow_mut().drain().collect();
        for (_, listener) in drained {
            self.release(listener);
        }
        self.elements.borrow_mut().clear();
    }

    fn release(&self, listener: Listener) {
        match listener {
            Listener::Click { element, callback } => {
                if let Err(err) = element.remove_event_listener_with_callback_and_bool(
                    "click",
                    callback.as_ref().unchecked_ref(),
                    true,
                ) {
                    tracing::warn!(error = %js_err(&err), "click listener removal failed");
                }
            }
            Listener::Resize { observer, .. } => observer.disconnect(),
            Listener::Window { callback } => {
                if let Err(err) = self
                    .window
                    .remove_event_listener_with_callback("resize", callback.as_ref().unchecked_ref())
                {
                    tracing::warn!(error = %js_err(&err), "resize listener removal failed");
                }
            }
        }
    }
}

fn viewport_of(window: &Window) -> Size {
    let width = window.inner_width().ok().and_then(|v| v.as_f64()).unwrap_or(0.0);
    let height = window.inner_height().ok().and_then(|v| v.as_f64()).unwrap_or(0.0);
    Size::new(width, height)
}

fn rect_of(element: &Element) -> Rect {
    let r = element.get_bounding_client_rect();
    Rect::new(r.left(), r.top(), r.width(), r.height())
}

impl TourHost for BrowserHost {
    fn current_route(&self) -> String {
        self.window
            .location()
            .pathname()
            .unwrap_or_else(|_| "/".to_string())
    }

    fn navigate_to(&self, path: &str) {
        if let Some(navigate) = &self.navigate {
            if let Err(err) = navigate.call1(&JsValue::NULL, &JsValue::from_str(path)) {
                tracing::warn!(path, error = %js_err(&err), "router navigate failed");
            }
            return;
        }
        let pushed = self
            .window
            .history()
            .and_then(|h| h.push_state_with_url(&JsValue::NULL, "", Some(path)));
        match pushed {
            Ok(()) => self.queue.push(HostEvent::RouteChanged(path.to_string())),
            Err(err) => tracing::warn!(path, error = %js_err(&err), "pushState failed"),
        }
    }

    fn query_selector(&self, selector: &str) -> Option<ElementHandle> {
        match self.document.query_selector(selector) {
            Ok(Some(element)) => Some(self.register(element)),
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(selector, error = %js_err(&err), "invalid selector");
                None
            }
        }
    }

    fn bounding_rect(&self, element: ElementHandle) -> Option<Rect> {
        self.element(element)
            .filter(|el| el.is_connected())
            .map(|el| rect_of(&el))
    }

    fn scroll_into_view(&self, element: ElementHandle) {
        if let Some(el) = self.element(element) {
            let options = ScrollIntoViewOptions::new();
            options.set_behavior(ScrollBehavior::Smooth);
            options.set_block(ScrollLogicalPosition::Center);
            el.scroll_into_view_with_scroll_into_view_options(&options);
        }
    }

    fn viewport_size(&self) -> Size {
        self.inner_size()
    }

    fn scroll_offset(&self) -> Point {
        Point::new(
            self.window.scroll_x().unwrap_or(0.0),
            self.window.scroll_y().unwrap_or(0.0),
        )
    }

    fn pin_body(&self, offset: Point) {
        let Some(style) = self.body_style() else {
            return;
        };
        let top = format!("-{}px", offset.y);
        for (name, value) in [("position", "fixed"), ("top", top.as_str()), ("width", "100%")] {
            if let Err(err) = style.set_property(name, value) {
                tracing::warn!(property = name, error = %js_err(&err), "pin body failed");
            }
        }
    }

    fn unpin_body(&self, offset: Point) {
        if let Some(style) = self.body_style() {
            for name in ["position", "top", "width"] {
                let _ = style.remove_property(name);
            }
        }
        self.window.scroll_to_with_x_and_y(offset.x, offset.y);
    }

    fn attach_click_interceptor(&self, element: ElementHandle, listener: ListenerId) {
        let Some(el) = self.element(element) else {
            return;
        };
        let queue = self.queue.clone();
        let callback = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
            event.prevent_default();
            event.stop_propagation();
            queue.push(HostEvent::Click { listener });
        });
        if let Err(err) =
            el.add_event_listener_with_callback_and_bool("click", callback.as_ref().unchecked_ref(), true)
        {
            tracing::warn!(error = %js_err(&err), "click interceptor attach failed");
            return;
        }
        self.listeners.borrow_mut().insert(
            listener,
            Listener::Click {
                element: el,
                callback,
            },
        );
    }

    fn detach_click_interceptor(&self, _element: ElementHandle, listener: ListenerId) {
        let removed = self.listeners.borrow_mut().remove(&listener);
        if let Some(listener) = removed {
            self.release(listener);
        }
    }

    fn observe_resize(&self, element: ElementHandle, listener: ListenerId) {
        let Some(el) = self.element(element) else {
            return;
        };
        let queue = self.queue.clone();
        let target = el.clone();
        let callback = Closure::<dyn FnMut(js_sys::Array)>::new(move |_entries: js_sys::Array| {
            queue.push(HostEvent::ElementResized {
                listener,
                rect: rect_of(&target),
            });
        });
        match ResizeObserver::new(callback.as_ref().unchecked_ref()) {
            Ok(observer) => {
                observer.observe(&el);
                self.listeners.borrow_mut().insert(
                    listener,
                    Listener::Resize {
                        observer,
                        _callback: callback,
                    },
                );
            }
            Err(err) => tracing::warn!(error = %js_err(&err), "ResizeObserver unavailable"),
        }
    }

    fn unobserve_resize(&self, _element: ElementHandle, listener: ListenerId) {
        let removed = self.listeners.borrow_mut().remove(&listener);
        if let Some(listener) = removed {
            self.release(listener);
        }
    }

    fn add_window_resize_listener(&self, listener: ListenerId) {
        let queue = self.queue.clone();
        let window = self.window.clone();
        let callback = Closure::<dyn FnMut(Event)>::new(move |_event: Event| {
            queue.push(HostEvent::WindowResized(viewport_of(&window)));
        });
        if let Err(err) = self
            .window
            .add_event_listener_with_callback("resize", callback.as_ref().unchecked_ref())
        {
            tracing::warn!(error = %js_err(&err), "window resize listener attach failed");
            return;
        }
        self.listeners
            .borrow_mut()
            .insert(listener, Listener::Window { callback });
    }

    fn remove_window_resize_listener(&self, listener: ListenerId) {
        let removed = self.listeners.borrow_mut().remove(&listener);
        if let Some(listener) = removed {
            self.release(listener);
        }
    }
}

// ─── JS API ─────────────────────────────────────────────────────────────────

/// Onboarding tour exported to JavaScript.
///
/// The page owns the loop: call `tick(performance.now())` on a timer, forward
/// `keydown` through `key`, and report router changes through `routeChanged`.
#[wasm_bindgen]
pub struct WaypointTour {
    driver: StepDriver,
    host: Rc<BrowserHost>,
    origin_ms: Option<f64>,
}

#[wasm_bindgen]
impl WaypointTour {
    #[wasm_bindgen(constructor)]
    pub fn new(
        user_id: &str,
        is_manager: bool,
        is_admin: bool,
        locale: &str,
        navigate: Option<js_sys::Function>,
        config_json: Option<String>,
    ) -> Result<WaypointTour, JsValue> {
        let config = match config_json {
            Some(raw) => TourConfig::from_json(&raw).map_err(|e| JsValue::from_str(&e.to_string()))?,
            None => TourConfig::default(),
        };
        let queue = EventQueue::new();
        let host = Rc::new(BrowserHost::new(queue.clone(), navigate)?);

        let backend: Rc<dyn StorageBackend> = match LocalStorageBackend::open(host.window()) {
            Some(storage) => Rc::new(storage),
            None => Rc::new(UnavailableStorage::new("localStorage unavailable")),
        };

        let mut roles = RoleFlags::empty();
        roles.set(RoleFlags::MANAGER, is_manager);
        roles.set(RoleFlags::ADMIN, is_admin);

        let locale = LocaleContext::new(locale);
        let tour = TourController::new(
            config,
            host.clone(),
            Rc::new(builtin_catalog(locale.clone())),
            KvStore::open(backend),
            UserDescriptor::new(user_id, Some(roles)),
            locale,
        );
        Ok(Self {
            driver: StepDriver::new(tour, queue),
            host,
            origin_ms: None,
        })
    }

    /// Start the tour clock. Returns `false` when already mounted.
    pub fn mount(&mut self, now_ms: f64) -> bool {
        self.sync_clock(now_ms);
        self.driver.mount()
    }

    /// Process queued DOM events and due timers. Returns the step result as
    /// JSON.
    pub fn tick(&mut self, now_ms: f64) -> Result<String, JsValue> {
        self.sync_clock(now_ms);
        let result = self.driver.step();
        serde_json::to_string(&result).map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Forward a `keydown`. Returns `true` when the page must call
    /// `preventDefault`.
    pub fn key(&mut self, key: &str, ctrl: bool, alt: bool, meta: bool, shift: bool) -> bool {
        let mut modifiers = Modifiers::empty();
        modifiers.set(Modifiers::CTRL, ctrl);
        modifiers.set(Modifiers::ALT, alt);
        modifiers.set(Modifiers::META, meta);
        modifiers.set(Modifiers::SHIFT, shift);
        let event = KeyEvent::new(KeyCode::from_dom_key(key)).with_modifiers(modifiers);
        self.driver.dispatch_now(HostEvent::Key(event))
    }

    #[wasm_bindgen(js_name = routeChanged)]
    pub fn route_changed(&mut self, path: &str) {
        self.driver.push_event(HostEvent::RouteChanged(path.to_string()));
    }

    #[wasm_bindgen(js_name = localeChanged)]
    pub fn locale_changed(&mut self, locale: &str) {
        self.driver.push_event(HostEvent::LocaleChanged(locale.to_string()));
    }

    pub fn next(&mut self) -> bool {
        self.driver.tour_mut().advance()
    }

    pub fn prev(&mut self) -> bool {
        self.driver.tour_mut().retreat()
    }

    pub fn skip(&mut self) -> bool {
        self.driver.tour_mut().skip()
    }

    pub fn restart(&mut self) -> bool {
        self.driver.tour_mut().restart()
    }

    /// `{ is_active, current_step_number, total_steps }` as JSON.
    pub fn snapshot(&self) -> Result<String, JsValue> {
        Ok(self.driver.snapshot_json()?)
    }

    /// Overlay view model as JSON (`null` while hidden).
    pub fn overlay(&self) -> Result<String, JsValue> {
        Ok(self.driver.overlay_json()?)
    }

    /// Explicit teardown for JS callers. Releases the scroll lock and every
    /// DOM listener.
    pub fn destroy(&mut self) {
        self.driver.unmount();
        self.host.detach_all();
    }
}

impl WaypointTour {
    fn sync_clock(&mut self, now_ms: f64) {
        let origin = *self.origin_ms.get_or_insert(now_ms);
        let elapsed = ((now_ms - origin) / 1000.0).max(0.0);
        self.driver
            .set_time(Duration::try_from_secs_f64(elapsed).unwrap_or_default());
    }
}
