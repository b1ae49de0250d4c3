//! Script-built widget tree
//!
//! Windows declare their contents every frame through [`build::UiBuilder`];
//! the tree keeps the nodes between frames, sizes them in [`layout`], routes
//! pointer and key input through [`propagate`] and emits primitives through
//! [`draw`]. [`world::Interface`] ties the passes together.

pub mod build;
pub mod draw;
pub mod editor;
pub mod kind;
pub mod layout;
pub mod propagate;
pub mod state;
pub mod text;
pub mod tree;
pub mod world;

pub use build::UiBuilder;
pub use draw::{DrawList, DrawSurface};
pub use state::StateFlags;
pub use text::{MonoMetrics, TextMetrics};
pub use tree::{WidgetId, WidgetTree};
pub use world::{Interface, InterfaceSettings};
