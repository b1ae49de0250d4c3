//! crossterm events to [`FrontendEvent`]s
//!
//! Terminals report key presses only, so each press becomes a down/up pair
//! with any typed text in between. Control is reported the same way, around
//! the key it modifies.

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEventKind};

use crate::core::keys;
use crate::frontend::FrontendEvent;

/// Key code for a crossterm key, if the UI knows it
pub fn key_code(code: KeyCode) -> Option<i32> {
    Some(match code {
        KeyCode::Char(c) if c.is_ascii() => c.to_ascii_lowercase() as i32,
        KeyCode::Enter => keys::RETURN,
        KeyCode::Esc => keys::ESCAPE,
        KeyCode::Backspace => keys::BACKSPACE,
        KeyCode::Tab | KeyCode::BackTab => keys::TAB,
        KeyCode::Delete => keys::DELETE,
        KeyCode::Home => keys::HOME,
        KeyCode::End => keys::END,
        KeyCode::PageUp => keys::PAGE_UP,
        KeyCode::PageDown => keys::PAGE_DOWN,
        KeyCode::Left => keys::LEFT,
        KeyCode::Right => keys::RIGHT,
        KeyCode::Up => keys::UP,
        KeyCode::Down => keys::DOWN,
        KeyCode::F(n @ 1..=12) => keys::F1 + n as i32 - 1,
        _ => return None,
    })
}

fn convert_key(key: KeyEvent, out: &mut Vec<FrontendEvent>) {
    if key.kind == KeyEventKind::Release {
        return;
    }
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let text = match key.code {
        KeyCode::Char(c) if !ctrl && !key.modifiers.contains(KeyModifiers::ALT) => Some(c.to_string()),
        _ => None,
    };
    let code = key_code(key.code);
    if code.is_none() && text.is_none() {
        return;
    }

    if ctrl {
        out.push(FrontendEvent::key(keys::LCTRL, true));
    }
    if let Some(code) = code {
        out.push(FrontendEvent::key(code, true));
    }
    if let Some(text) = text {
        out.push(FrontendEvent::Text(text));
    }
    if let Some(code) = code {
        out.push(FrontendEvent::key(code, false));
    }
    if ctrl {
        out.push(FrontendEvent::key(keys::LCTRL, false));
    }
}

fn mouse_button(button: MouseButton) -> i32 {
    match button {
        MouseButton::Left => keys::MOUSE_LEFT,
        MouseButton::Middle => keys::MOUSE_MIDDLE,
        MouseButton::Right => keys::MOUSE_RIGHT,
    }
}

/// Convert one crossterm event. `size` is the UI area in cells, used to
/// normalize pointer positions to the cell centers.
pub fn convert_event(event: Event, size: (u16, u16)) -> Vec<FrontendEvent> {
    let mut out = Vec::new();
    match event {
        Event::Key(key) => convert_key(key, &mut out),
        Event::Mouse(mouse) => {
            let (w, h) = (size.0.max(1) as f32, size.1.max(1) as f32);
            let x = (mouse.column as f32 + 0.5) / w;
            let y = (mouse.row as f32 + 0.5) / h;
            out.push(FrontendEvent::move_to(x, y));
            match mouse.kind {
                MouseEventKind::Down(b) => out.push(FrontendEvent::key(mouse_button(b), true)),
                MouseEventKind::Up(b) => out.push(FrontendEvent::key(mouse_button(b), false)),
                MouseEventKind::ScrollUp => out.extend(FrontendEvent::tap(keys::MOUSE_WHEEL_UP)),
                MouseEventKind::ScrollDown => out.extend(FrontendEvent::tap(keys::MOUSE_WHEEL_DOWN)),
                _ => {}
            }
        }
        Event::Resize(w, h) => out.push(FrontendEvent::resize(w, h)),
        Event::Paste(text) => out.push(FrontendEvent::Text(text)),
        _ => {}
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEventState, MouseEvent};

    fn press(code: KeyCode, modifiers: KeyModifiers) -> Event {
        Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    #[test]
    fn test_char_press_becomes_down_text_up() {
        let events = convert_event(press(KeyCode::Char('G'), KeyModifiers::SHIFT), (80, 24));
        assert_eq!(
            events,
            vec![
                FrontendEvent::key('g' as i32, true),
                FrontendEvent::text("G"),
                FrontendEvent::key('g' as i32, false),
            ]
        );
    }

    #[test]
    fn test_ctrl_wraps_key_without_text() {
        let events = convert_event(press(KeyCode::Char('v'), KeyModifiers::CONTROL), (80, 24));
        assert_eq!(
            events,
            vec![
                FrontendEvent::key(keys::LCTRL, true),
                FrontendEvent::key('v' as i32, true),
                FrontendEvent::key('v' as i32, false),
                FrontendEvent::key(keys::LCTRL, false),
            ]
        );
    }

    #[test]
    fn test_function_and_unknown_keys() {
        assert_eq!(key_code(KeyCode::F(3)), Some(keys::F1 + 2));
        assert_eq!(key_code(KeyCode::Enter), Some(keys::RETURN));
        assert_eq!(key_code(KeyCode::Insert), None);
        assert!(convert_event(press(KeyCode::Insert, KeyModifiers::NONE), (80, 24)).is_empty());
    }

    #[test]
    fn test_mouse_press_moves_then_clicks() {
        let event = Event::Mouse(MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column: 9,
            row: 4,
            modifiers: KeyModifiers::NONE,
        });
        let events = convert_event(event, (20, 10));
        assert_eq!(
            events,
            vec![
                FrontendEvent::move_to(0.475, 0.45),
                FrontendEvent::key(keys::MOUSE_LEFT, true),
            ]
        );
    }
}
