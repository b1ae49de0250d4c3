//! Frontend abstraction layer
//!
//! This module defines the `Frontend` trait for event polling, rendering and
//! cleanup. The terminal preview (ratatui + crossterm) is the only
//! implementation; tests and the headless runner draw into a
//! [`crate::ui::DrawList`] instead.

pub mod events;
pub mod tui;

use anyhow::Result;
pub use events::FrontendEvent;
pub use tui::TuiFrontend;

use crate::core::AppCore;

pub trait Frontend {
    /// Pending input, converted to [`FrontendEvent`]s (empty if none)
    fn poll_events(&mut self) -> Result<Vec<FrontendEvent>>;

    /// Draw one frame of the core
    fn render(&mut self, core: &mut AppCore) -> Result<()>;

    /// Restore the terminal
    fn cleanup(&mut self) -> Result<()>;

    /// Current surface size in cells
    fn size(&self) -> (u16, u16);
}
