//! Input routing
//!
//! Applies frontend events to the [`AppCore`]:
//! - keys and mouse buttons go through the UI / command line / binding chain
//! - pointer motion moves the UI cursor while a window takes input
//! - typed text goes to the focused editor or the command line

use crate::core::AppCore;
use crate::frontend::FrontendEvent;

/// What an event did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteResult {
    Consumed,
    Ignored,
    /// The HUD changed size; the frontend should redraw everything
    Resized,
    Quit,
}

/// Route one event into the core
pub fn route_event(core: &mut AppCore, event: &FrontendEvent) -> RouteResult {
    let consumed = match event {
        FrontendEvent::Key { code, down } => core.process_key(*code, *down),
        FrontendEvent::PointerMotion { dx, dy } => core.move_cursor(*dx, *dy),
        FrontendEvent::PointerMoveTo { x, y } => {
            if !core.ui.allow_input() {
                return RouteResult::Ignored;
            }
            core.ui.set_cursor(*x, *y);
            true
        }
        FrontendEvent::Text(text) => core.text_input(text),
        FrontendEvent::Resize { width, height } => {
            core.ui.set_hud_size(*width as i32, *height as i32);
            return RouteResult::Resized;
        }
        FrontendEvent::Quit => {
            core.running = false;
            return RouteResult::Quit;
        }
    };
    if !core.running {
        return RouteResult::Quit;
    }
    if consumed {
        RouteResult::Consumed
    } else {
        RouteResult::Ignored
    }
}

/// Route a batch; stops early once the core stops running
pub fn route_events(core: &mut AppCore, events: &[FrontendEvent]) -> RouteResult {
    let mut last = RouteResult::Ignored;
    for event in events {
        last = route_event(core, event);
        if last == RouteResult::Quit {
            break;
        }
    }
    last
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::core::keys;
    use crate::script::{Code, Value};

    #[test]
    fn test_pointer_ignored_without_input_window() {
        let mut core = AppCore::new(Config::default());
        core.ui.set_hud_size(100, 100);
        let before = core.ui.cursor();
        assert_eq!(route_event(&mut core, &FrontendEvent::move_to(0.1, 0.1)), RouteResult::Ignored);
        assert_eq!(route_event(&mut core, &FrontendEvent::motion(5.0, 5.0)), RouteResult::Ignored);
        assert_eq!(core.ui.cursor(), before);
    }

    #[test]
    fn test_pointer_moves_cursor_with_input_window() {
        let mut core = AppCore::new(Config::default());
        core.ui.set_hud_size(100, 100);
        core.new_ui("m", Code::build(|_, _| Value::Null), Code::Exit, Code::Exit);
        core.run_script("showui m");
        core.update(0);
        assert_eq!(route_event(&mut core, &FrontendEvent::move_to(0.2, 0.3)), RouteResult::Consumed);
        assert_eq!(core.ui.cursor(), (0.2, 0.3));
        route_event(&mut core, &FrontendEvent::motion(10.0, 0.0));
        let (x, _) = core.ui.cursor();
        assert!((x - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_resize_sets_hud() {
        let mut core = AppCore::new(Config::default());
        assert_eq!(route_event(&mut core, &FrontendEvent::resize(80, 24)), RouteResult::Resized);
        assert_eq!(core.ui.hud_size(), (80, 24));
    }

    #[test]
    fn test_quit_command_stops_batch() {
        let mut core = AppCore::new(Config::default());
        core.run_script("bind Q [quit]; bind G [echo late]");
        let mut events = FrontendEvent::tap('q' as i32).to_vec();
        events.extend(FrontendEvent::tap('g' as i32));
        assert_eq!(route_events(&mut core, &events), RouteResult::Quit);
        assert!(!core.running);
        assert!(core.console.is_empty());
    }

    #[test]
    fn test_text_goes_to_command_line() {
        let mut core = AppCore::new(Config::default());
        assert_eq!(route_event(&mut core, &FrontendEvent::text("x")), RouteResult::Ignored);
        core.run_script("saycommand");
        route_events(&mut core, &[FrontendEvent::text("hi")]);
        assert_eq!(core.command_line.text(), "hi");
        route_events(&mut core, &FrontendEvent::tap(keys::ESCAPE));
        assert!(!core.command_line.is_open());
    }
}
