//! Single-line text editing for UI text fields

use crate::core::keys;

/// Edit buffer with a cursor and an optional selection mark.
///
/// Positions are char indices. `max_len` bounds the text in chars.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LineEditor {
    text: String,
    cursor: usize,
    mark: Option<usize>,
    pub max_len: Option<usize>,
}

fn byte_index(s: &str, chars: usize) -> usize {
    s.char_indices().nth(chars).map_or(s.len(), |(i, _)| i)
}

impl LineEditor {
    pub fn new(max_len: Option<usize>) -> Self {
        Self {
            max_len,
            ..Default::default()
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    fn len(&self) -> usize {
        self.text.chars().count()
    }

    /// Replace the contents, cursor at the end
    pub fn init(&mut self, text: &str) {
        self.text.clear();
        self.cursor = 0;
        self.mark = None;
        self.insert(text);
    }

    pub fn clear(&mut self) {
        self.init("");
    }

    /// Start a selection at the cursor, or drop it
    pub fn set_mark(&mut self, on: bool) {
        self.mark = on.then_some(self.cursor);
    }

    /// Selected char range, ordered
    pub fn selection(&self) -> Option<(usize, usize)> {
        let mark = self.mark?;
        (mark != self.cursor).then(|| (mark.min(self.cursor), mark.max(self.cursor)))
    }

    fn delete_selection(&mut self) -> bool {
        let Some((start, end)) = self.selection() else {
            self.mark = None;
            return false;
        };
        let (bs, be) = (byte_index(&self.text, start), byte_index(&self.text, end));
        self.text.replace_range(bs..be, "");
        self.cursor = start;
        self.mark = None;
        true
    }

    /// Insert at the cursor, replacing any selection. Text past `max_len` is
    /// dropped.
    pub fn insert(&mut self, s: &str) {
        self.delete_selection();
        let room = self
            .max_len
            .map_or(usize::MAX, |max| max.saturating_sub(self.len()));
        let clipped: String = s.chars().filter(|c| *c != '\n' && *c != '\r').take(room).collect();
        if clipped.is_empty() {
            return;
        }
        let at = byte_index(&self.text, self.cursor);
        self.text.insert_str(at, &clipped);
        self.cursor += clipped.chars().count();
    }

    /// Typed text; control characters are ignored
    pub fn input(&mut self, s: &str) {
        let printable: String = s.chars().filter(|c| !c.is_control()).collect();
        self.insert(&printable);
    }

    /// Insert only the characters in `filter`
    pub fn input_filtered(&mut self, s: &str, filter: Option<&str>) {
        match filter {
            None => self.input(s),
            Some(allowed) => {
                let kept: String = s.chars().filter(|c| allowed.contains(*c)).collect();
                self.input(&kept);
            }
        }
    }

    /// Editing keys. Returns false for keys the editor has no use for.
    pub fn key(&mut self, code: i32) -> bool {
        match code {
            keys::LEFT => {
                self.mark = None;
                self.cursor = self.cursor.saturating_sub(1);
            }
            keys::RIGHT => {
                self.mark = None;
                self.cursor = (self.cursor + 1).min(self.len());
            }
            keys::HOME => {
                self.mark = None;
                self.cursor = 0;
            }
            keys::END => {
                self.mark = None;
                self.cursor = self.len();
            }
            keys::BACKSPACE => {
                if !self.delete_selection() && self.cursor > 0 {
                    let at = byte_index(&self.text, self.cursor - 1);
                    self.text.remove(at);
                    self.cursor -= 1;
                }
            }
            keys::DELETE => {
                if !self.delete_selection() && self.cursor < self.len() {
                    let at = byte_index(&self.text, self.cursor);
                    self.text.remove(at);
                }
            }
            _ => return false,
        }
        true
    }

    /// Place the cursor at column `col`. A drag extends the selection from
    /// where the cursor was.
    pub fn hit(&mut self, col: i32, dragged: bool) {
        if dragged {
            if self.mark.is_none() {
                self.mark = Some(self.cursor);
            }
        } else {
            self.mark = None;
        }
        self.cursor = col.clamp(0, self.len() as i32) as usize;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_respects_max_len() {
        let mut e = LineEditor::new(Some(5));
        e.insert("hello world");
        assert_eq!(e.text(), "hello");
        e.insert("!");
        assert_eq!(e.text(), "hello");
    }

    #[test]
    fn test_editing_keys() {
        let mut e = LineEditor::new(None);
        e.init("abcd");
        assert_eq!(e.cursor(), 4);
        e.key(keys::LEFT);
        e.key(keys::BACKSPACE);
        assert_eq!(e.text(), "abd");
        e.key(keys::HOME);
        e.key(keys::DELETE);
        assert_eq!(e.text(), "bd");
        e.key(keys::END);
        e.input("é\x07");
        assert_eq!(e.text(), "bdé");
        assert!(!e.key(keys::TAB));
    }

    #[test]
    fn test_drag_selection_replaced_by_insert() {
        let mut e = LineEditor::new(None);
        e.init("hello");
        e.hit(1, false);
        e.hit(4, true);
        assert_eq!(e.selection(), Some((1, 4)));
        e.insert("EY");
        assert_eq!(e.text(), "hEYo");
        assert_eq!(e.selection(), None);
    }
}
