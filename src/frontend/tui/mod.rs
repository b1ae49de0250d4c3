//! TUI frontend (ratatui-based)
//!
//! Implements the Frontend trait with ratatui for drawing and crossterm for
//! terminal events. Widgets are drawn onto the cell grid by
//! [`surface::CellSurface`].

pub mod app;
pub mod input;
pub mod surface;

pub use app::TuiFrontend;
