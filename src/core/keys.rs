//! Key codes
//!
//! Keyboard keys use SDL keycode values. Mouse buttons and the wheel use
//! small negative codes so both live in one `i32` space.

pub const MOUSE_LEFT: i32 = -1;
pub const MOUSE_MIDDLE: i32 = -2;
pub const MOUSE_RIGHT: i32 = -3;
pub const MOUSE_WHEEL_UP: i32 = -4;
pub const MOUSE_WHEEL_DOWN: i32 = -5;
pub const MOUSE_X1: i32 = -6;
pub const MOUSE_X2: i32 = -7;

pub const BACKSPACE: i32 = 8;
pub const TAB: i32 = 9;
pub const RETURN: i32 = 13;
pub const ESCAPE: i32 = 27;
pub const SPACE: i32 = 32;
pub const DELETE: i32 = 127;

const SCANCODE_MASK: i32 = 1 << 30;

const fn scancode(n: i32) -> i32 {
    n | SCANCODE_MASK
}

pub const F1: i32 = scancode(58);
pub const HOME: i32 = scancode(74);
pub const PAGE_UP: i32 = scancode(75);
pub const END: i32 = scancode(77);
pub const PAGE_DOWN: i32 = scancode(78);
pub const RIGHT: i32 = scancode(79);
pub const LEFT: i32 = scancode(80);
pub const DOWN: i32 = scancode(81);
pub const UP: i32 = scancode(82);
pub const KP_ENTER: i32 = scancode(88);
pub const LCTRL: i32 = scancode(224);
pub const LSHIFT: i32 = scancode(225);
pub const LALT: i32 = scancode(226);
pub const RCTRL: i32 = scancode(228);
pub const RSHIFT: i32 = scancode(229);
pub const RALT: i32 = scancode(230);

pub const fn is_return(code: i32) -> bool {
    code == RETURN || code == KP_ENTER
}

pub const fn is_ctrl(code: i32) -> bool {
    code == LCTRL || code == RCTRL
}

/// The stock key names, registered at startup
pub fn default_keymap() -> Vec<(i32, String)> {
    let mut map: Vec<(i32, String)> = vec![
        (MOUSE_LEFT, "MOUSELEFT".into()),
        (MOUSE_MIDDLE, "MOUSEMIDDLE".into()),
        (MOUSE_RIGHT, "MOUSERIGHT".into()),
        (MOUSE_WHEEL_UP, "MOUSEWHEELUP".into()),
        (MOUSE_WHEEL_DOWN, "MOUSEWHEELDOWN".into()),
        (MOUSE_X1, "MOUSEBACK".into()),
        (MOUSE_X2, "MOUSEFORWARD".into()),
        (BACKSPACE, "BACKSPACE".into()),
        (TAB, "TAB".into()),
        (RETURN, "RETURN".into()),
        (ESCAPE, "ESCAPE".into()),
        (SPACE, "SPACE".into()),
        (DELETE, "DELETE".into()),
        (HOME, "HOME".into()),
        (END, "END".into()),
        (PAGE_UP, "PAGEUP".into()),
        (PAGE_DOWN, "PAGEDOWN".into()),
        (LEFT, "LEFT".into()),
        (RIGHT, "RIGHT".into()),
        (UP, "UP".into()),
        (DOWN, "DOWN".into()),
        (KP_ENTER, "KP_ENTER".into()),
        (LCTRL, "LCTRL".into()),
        (RCTRL, "RCTRL".into()),
        (LSHIFT, "LSHIFT".into()),
        (RSHIFT, "RSHIFT".into()),
        (LALT, "LALT".into()),
        (RALT, "RALT".into()),
    ];
    for c in b'a'..=b'z' {
        map.push((c as i32, (c as char).to_ascii_uppercase().to_string()));
    }
    for c in b'0'..=b'9' {
        map.push((c as i32, (c as char).to_string()));
    }
    for n in 0..12 {
        map.push((F1 + n, format!("F{}", n + 1)));
    }
    for (c, name) in [
        (b'`', "BACKQUOTE"),
        (b'-', "MINUS"),
        (b'=', "EQUALS"),
        (b'[', "LEFTBRACKET"),
        (b']', "RIGHTBRACKET"),
        (b'\\', "BACKSLASH"),
        (b';', "SEMICOLON"),
        (b'\'', "QUOTE"),
        (b',', "COMMA"),
        (b'.', "PERIOD"),
        (b'/', "SLASH"),
    ] {
        map.push((c as i32, name.to_string()));
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_keymap_unique_codes() {
        let map = default_keymap();
        let mut codes: Vec<i32> = map.iter().map(|(c, _)| *c).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), map.len());
        assert!(map.iter().any(|(c, n)| *c == 'g' as i32 && n == "G"));
    }

    #[test]
    fn test_return_and_ctrl() {
        assert!(is_return(RETURN));
        assert!(is_return(KP_ENTER));
        assert!(!is_return(TAB));
        assert!(is_ctrl(RCTRL));
    }
}
