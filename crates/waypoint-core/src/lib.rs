#![forbid(unsafe_code)]

//! Core: geometry, input events, host handles, and logging setup.

pub mod event;
pub mod geometry;
pub mod logging;

pub use event::{ElementHandle, KeyCode, KeyEvent, ListenerId, Modifiers};
pub use geometry::{Point, Rect, Size};
