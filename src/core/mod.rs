//! Core application layer
//!
//! Key bindings, completion and the [`AppCore`] that ties the script runtime,
//! the widget interface and the console together. No rendering code lives
//! here; frontends read the core and draw it.

pub mod app_core;
pub mod binds;
pub mod completion;
pub mod demo;
pub mod input_router;
pub mod keys;

pub use app_core::{AppCommand, AppCore};
