//! Frontend-agnostic input events.
//!
//! Frontends translate their native event streams into this enum so the core
//! only handles one event shape. Keys use the codes in [`crate::core::keys`],
//! mouse buttons and the wheel included.

/// Events emitted by a frontend
#[derive(Debug, Clone, PartialEq)]
pub enum FrontendEvent {
    /// Key or mouse button transition
    Key { code: i32, down: bool },
    /// Relative pointer motion in device units
    PointerMotion { dx: f32, dy: f32 },
    /// Absolute pointer position, normalized to `[0, 1]`
    PointerMoveTo { x: f32, y: f32 },
    /// Typed text (UTF-8 fragment)
    Text(String),
    /// Surface resize
    Resize { width: u16, height: u16 },
    /// Application quit signal
    Quit,
}

impl FrontendEvent {
    pub fn key(code: i32, down: bool) -> Self {
        Self::Key { code, down }
    }

    /// Press followed by release
    pub fn tap(code: i32) -> [Self; 2] {
        [Self::key(code, true), Self::key(code, false)]
    }

    pub fn motion(dx: f32, dy: f32) -> Self {
        Self::PointerMotion { dx, dy }
    }

    pub fn move_to(x: f32, y: f32) -> Self {
        Self::PointerMoveTo { x, y }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn resize(width: u16, height: u16) -> Self {
        Self::Resize { width, height }
    }

    pub fn quit() -> Self {
        Self::Quit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::keys;

    #[test]
    fn test_event_creation() {
        let key_event = FrontendEvent::key(keys::RETURN, true);
        assert!(matches!(key_event, FrontendEvent::Key { code: 13, down: true }));

        let [down, up] = FrontendEvent::tap(keys::MOUSE_LEFT);
        assert_eq!(down, FrontendEvent::key(keys::MOUSE_LEFT, true));
        assert_eq!(up, FrontendEvent::key(keys::MOUSE_LEFT, false));

        let resize_event = FrontendEvent::resize(120, 40);
        assert!(matches!(
            resize_event,
            FrontendEvent::Resize {
                width: 120,
                height: 40
            }
        ));

        assert_eq!(FrontendEvent::text("hi"), FrontendEvent::Text("hi".to_string()));
        assert!(matches!(FrontendEvent::quit(), FrontendEvent::Quit));
    }
}
