#![forbid(unsafe_code)]

//! Scoped host resources.
//!
//! Each guard acquires one host resource on construction and releases it in
//! `Drop`, so every exit path (advance past the end, skip, step change, host
//! unmount, panic unwinding) releases it exactly once.

use std::fmt;
use std::rc::Rc;

use waypoint_core::event::{ElementHandle, ListenerId};
use waypoint_core::geometry::Point;

use crate::host::TourHost;

/// Pins the document scroll position and restores the exact offset on drop.
pub struct ScrollLock {
    host: Rc<dyn TourHost>,
    saved: Point,
}

impl ScrollLock {
    #[must_use]
    pub fn acquire(host: Rc<dyn TourHost>) -> Self {
        let saved = host.scroll_offset();
        host.pin_body(saved);
        tracing::debug!(x = saved.x, y = saved.y, "scroll lock acquired");
        Self { host, saved }
    }

    /// Offset restored on release.
    #[must_use]
    pub fn saved_offset(&self) -> Point {
        self.saved
    }
}

impl Drop for ScrollLock {
    fn drop(&mut self) {
        self.host.unpin_body(self.saved);
        tracing::debug!(x = self.saved.x, y = self.saved.y, "scroll lock released");
    }
}

impl fmt::Debug for ScrollLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScrollLock")
            .field("saved", &self.saved)
            .finish()
    }
}

/// Capture-phase click handler on a click-advance anchor.
pub struct ClickInterceptor {
    host: Rc<dyn TourHost>,
    element: ElementHandle,
    listener: ListenerId,
}

impl ClickInterceptor {
    #[must_use]
    pub fn attach(host: Rc<dyn TourHost>, element: ElementHandle) -> Self {
        let listener = ListenerId::next();
        host.attach_click_interceptor(element, listener);
        Self {
            host,
            element,
            listener,
        }
    }

    #[must_use]
    pub fn listener(&self) -> ListenerId {
        self.listener
    }

    #[must_use]
    pub fn element(&self) -> ElementHandle {
        self.element
    }
}

impl Drop for ClickInterceptor {
    fn drop(&mut self) {
        self.host
            .detach_click_interceptor(self.element, self.listener);
    }
}

impl fmt::Debug for ClickInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClickInterceptor")
            .field("element", &self.element)
            .field("listener", &self.listener)
            .finish()
    }
}

/// Resize observer on the resolved anchor.
pub struct ResizeObservation {
    host: Rc<dyn TourHost>,
    element: ElementHandle,
    listener: ListenerId,
}

impl ResizeObservation {
    #[must_use]
    pub fn observe(host: Rc<dyn TourHost>, element: ElementHandle) -> Self {
        let listener = ListenerId::next();
        host.observe_resize(element, listener);
        Self {
            host,
            element,
            listener,
        }
    }

    #[must_use]
    pub fn listener(&self) -> ListenerId {
        self.listener
    }

    #[must_use]
    pub fn element(&self) -> ElementHandle {
        self.element
    }
}

impl Drop for ResizeObservation {
    fn drop(&mut self) {
        self.host.unobserve_resize(self.element, self.listener);
    }
}

impl fmt::Debug for ResizeObservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResizeObservation")
            .field("element", &self.element)
            .field("listener", &self.listener)
            .finish()
    }
}

/// Window `resize` listener, held for the whole active session.
pub struct WindowResizeListener {
    host: Rc<dyn TourHost>,
    listener: ListenerId,
}

impl WindowResizeListener {
    #[must_use]
    pub fn add(host: Rc<dyn TourHost>) -> Self {
        let listener = ListenerId::next();
        host.add_window_resize_listener(listener);
        Self { host, listener }
    }

    #[must_use]
    pub fn listener(&self) -> ListenerId {
        self.listener
    }
}

impl Drop for WindowResizeListener {
    fn drop(&mut self) {
        self.host.remove_window_resize_listener(self.listener);
    }
}

impl fmt::Debug for WindowResizeListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowResizeListener")
            .field("listener", &self.listener)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use waypoint_core::geometry::{Rect, Size};

    #[derive(Default)]
    struct CallLog {
        calls: RefCell<Vec<String>>,
    }

    impl CallLog {
        fn push(&self, call: String) {
            self.calls.borrow_mut().push(call);
        }

        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.calls.borrow_mut())
        }
    }

    impl TourHost for CallLog {
        fn current_route(&self) -> String {
            "/".into()
        }
        fn navigate_to(&self, _path: &str) {}
        fn query_selector(&self, _selector: &str) -> Option<ElementHandle> {
            None
        }
        fn bounding_rect(&self, _element: ElementHandle) -> Option<Rect> {
            None
        }
        fn scroll_into_view(&self, _element: ElementHandle) {}
        fn viewport_size(&self) -> Size {
            Size::new(800.0, 600.0)
        }
        fn scroll_offset(&self) -> Point {
            Point::new(0.0, 240.0)
        }
        fn pin_body(&self, offset: Point) {
            self.push(format!("pin {}", offset.y));
        }
        fn unpin_body(&self, offset: Point) {
            self.push(format!("unpin {}", offset.y));
        }
        fn attach_click_interceptor(&self, element: ElementHandle, _listener: ListenerId) {
            self.push(format!("click+ {}", element.0));
        }
        fn detach_click_interceptor(&self, element: ElementHandle, _listener: ListenerId) {
            self.push(format!("click- {}", element.0));
        }
        fn observe_resize(&self, element: ElementHandle, _listener: ListenerId) {
            self.push(format!("observe+ {}", element.0));
        }
        fn unobserve_resize(&self, element: ElementHandle, _listener: ListenerId) {
            self.push(format!("observe- {}", element.0));
        }
        fn add_window_resize_listener(&self, _listener: ListenerId) {
            self.push("window+".into());
        }
        fn remove_window_resize_listener(&self, _listener: ListenerId) {
            self.push("window-".into());
        }
    }

    #[test]
    fn scroll_lock_restores_saved_offset() {
        let log = Rc::new(CallLog::default());
        let lock = ScrollLock::acquire(log.clone());
        assert_eq!(lock.saved_offset(), Point::new(0.0, 240.0));
        drop(lock);
        assert_eq!(log.take(), vec!["pin 240", "unpin 240"]);
    }

    #[test]
    fn guards_release_in_reverse_acquisition_order() {
        let log = Rc::new(CallLog::default());
        {
            let _window = WindowResizeListener::add(log.clone());
            let _observe = ResizeObservation::observe(log.clone(), ElementHandle(3));
            let _click = ClickInterceptor::attach(log.clone(), ElementHandle(3));
        }
        assert_eq!(
            log.take(),
            vec![
                "window+",
                "observe+ 3",
                "click+ 3",
                "click- 3",
                "observe- 3",
                "window-"
            ]
        );
    }

    #[test]
    fn listener_ids_are_distinct() {
        let log = Rc::new(CallLog::default());
        let a = ClickInterceptor::attach(log.clone(), ElementHandle(1));
        let b = ClickInterceptor::attach(log.clone(), ElementHandle(1));
        assert_ne!(a.listener(), b.listener());
    }
}
