#![forbid(unsafe_code)]

//! Core: canonical key events, viewport geometry, and shared error types.
//!
//! # Role in lazytable
//! `lazytable-core` is the input layer. It owns the normalized key events the
//! deferred-load scheduler consumes, the content-space rectangle a host hands
//! in on every paint, and the error types shared by the runtime and widget
//! crates.

pub mod error;
pub mod event;
pub mod geometry;

pub use error::{ConfigError, LoadError};
pub use event::{KeyCode, KeyEvent, KeyEventKind};
pub use geometry::Rect;
