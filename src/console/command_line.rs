use bitflags::bitflags;

use super::history::{History, HistoryEntry};
use crate::core::completion::TextCompletionIndex;
use crate::core::keys;
use crate::script::ScriptRuntime;

/// Byte capacity of the edit buffer
pub const MAX_COMMAND_LEN: usize = 259;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct CommandFlags: u32 {
        /// Tab completes
        const COMPLETE = 1 << 0;
        /// `/text` runs as script
        const EXECUTE = 1 << 1;
    }
}

impl CommandFlags {
    /// Parse an `inputcommand` flag string: `c` complete, `x` execute, `s` both
    pub fn parse(s: &str) -> Self {
        s.chars().fold(CommandFlags::empty(), |acc, c| match c {
            'c' => acc | CommandFlags::COMPLETE,
            'x' => acc | CommandFlags::EXECUTE,
            's' => acc | CommandFlags::COMPLETE | CommandFlags::EXECUTE,
            _ => acc,
        })
    }
}

/// What a key did to the command line
#[derive(Debug, PartialEq)]
pub enum LineKey {
    /// The line is closed; the key belongs to someone else
    Ignored,
    Handled,
    /// Enter released: the line closed and this entry should run
    Submit(Option<HistoryEntry>),
    /// Escape released: the line closed
    Closed,
}

/// Single-line command editor (rendering-agnostic)
///
/// The cursor is a char index, or `None` when it sits at the end of the text.
pub struct CommandLine {
    buf: String,
    pos: Option<usize>,
    action: Option<String>,
    prompt: Option<String>,
    flags: CommandFlags,
    /// Frame clock when the line opened, `None` while closed
    opened_at: Option<u64>,
    pub history: History,
}

impl CommandLine {
    pub fn new(max_history: usize) -> Self {
        Self {
            buf: String::new(),
            pos: None,
            action: None,
            prompt: None,
            flags: CommandFlags::empty(),
            opened_at: None,
            history: History::new(max_history),
        }
    }

    pub fn is_open(&self) -> bool {
        self.opened_at.is_some()
    }

    pub fn opened_at(&self) -> Option<u64> {
        self.opened_at
    }

    pub fn text(&self) -> &str {
        &self.buf
    }

    pub fn cursor(&self) -> Option<usize> {
        self.pos
    }

    pub fn prompt(&self) -> &str {
        self.prompt.as_deref().unwrap_or(">")
    }

    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    pub fn flags(&self) -> CommandFlags {
        self.flags
    }

    /// Open (`init` is `Some`) or close (`None`) the command line.
    ///
    /// Without an explicit flag string an opened line gets both
    /// complete and execute.
    pub fn input_command(
        &mut self,
        init: Option<&str>,
        action: Option<&str>,
        prompt: Option<&str>,
        flags: Option<&str>,
        now: u64,
    ) {
        self.opened_at = init.map(|_| now);
        self.buf.clear();
        self.buf.push_str(clip_to(init.unwrap_or(""), MAX_COMMAND_LEN));
        self.pos = None;
        self.action = action.filter(|a| !a.is_empty()).map(str::to_string);
        self.prompt = prompt.filter(|p| !p.is_empty()).map(str::to_string);
        self.flags = match flags {
            Some(f) => CommandFlags::parse(f),
            None if init.is_some() => CommandFlags::COMPLETE | CommandFlags::EXECUTE,
            None => CommandFlags::empty(),
        };
    }

    pub fn close(&mut self) {
        self.input_command(None, None, None, None, 0);
    }

    fn char_len(&self) -> usize {
        self.buf.chars().count()
    }

    fn byte_idx(&self, char_pos: usize) -> usize {
        self.buf
            .char_indices()
            .nth(char_pos)
            .map(|(idx, _)| idx)
            .unwrap_or(self.buf.len())
    }

    /// Insert typed or pasted text at the cursor, clipped to the space left.
    /// Returns false while the line is closed.
    pub fn insert(&mut self, text: &str, completion: &mut TextCompletionIndex) -> bool {
        if !self.is_open() {
            return false;
        }
        completion.reset();
        let room = MAX_COMMAND_LEN.saturating_sub(self.buf.len());
        let text = clip_to(text, room);
        match self.pos {
            None => self.buf.push_str(text),
            Some(pos) => {
                let at = self.byte_idx(pos);
                self.buf.insert_str(at, text);
                self.pos = Some(pos + text.chars().count());
            }
        }
        true
    }

    /// Paste clipboard text; control characters are dropped
    pub fn paste(&mut self, text: &str, completion: &mut TextCompletionIndex) -> bool {
        let clean: String = text.chars().filter(|c| !c.is_control()).collect();
        self.insert(&clean, completion)
    }

    fn delete_forward(&mut self, completion: &mut TextCompletionIndex) {
        let Some(pos) = self.pos else {
            return;
        };
        let len = self.char_len();
        if pos < len {
            let at = self.byte_idx(pos);
            self.buf.remove(at);
            completion.reset();
        }
        if pos + 1 >= len {
            self.pos = None;
        }
    }

    fn backspace(&mut self, completion: &mut TextCompletionIndex) {
        let len = self.char_len();
        let i = self.pos.unwrap_or(len);
        if i < 1 {
            return;
        }
        let at = self.byte_idx(i - 1);
        self.buf.remove(at);
        completion.reset();
        match self.pos {
            Some(p) if p > 0 => self.pos = Some(p - 1),
            Some(0) if len <= 1 => self.pos = None,
            _ => {}
        }
    }

    fn move_left(&mut self) {
        match self.pos {
            Some(p) if p > 0 => self.pos = Some(p - 1),
            Some(_) => {}
            None => self.pos = self.char_len().checked_sub(1),
        }
    }

    fn move_right(&mut self) {
        if let Some(p) = self.pos {
            let next = p + 1;
            self.pos = (next < self.char_len()).then_some(next);
        }
    }

    fn restore(&mut self, entry: &HistoryEntry) {
        self.buf.clear();
        self.buf.push_str(&entry.text);
        if self.pos.is_some_and(|p| p >= self.char_len()) {
            self.pos = None;
        }
        self.action = entry.action.clone();
        self.prompt = entry.prompt.clone();
        self.flags = entry.flags;
    }

    fn complete(&mut self, completion: &mut TextCompletionIndex, rt: &dyn ScriptRuntime) {
        if !self.flags.contains(CommandFlags::COMPLETE) {
            return;
        }
        let prefix = self.flags.contains(CommandFlags::EXECUTE).then_some("/");
        let session = self.opened_at.unwrap_or(0);
        completion.complete(&mut self.buf, MAX_COMMAND_LEN, prefix, session, rt);
        if self.pos.is_some_and(|p| p >= self.char_len()) {
            self.pos = None;
        }
    }

    fn current_entry(&self) -> HistoryEntry {
        HistoryEntry {
            text: self.buf.clone(),
            action: self.action.clone(),
            prompt: self.prompt.clone(),
            flags: self.flags,
        }
    }

    /// Feed a key to the line. Editing happens on key down; submit and
    /// cancel happen on key up.
    pub fn key(
        &mut self,
        code: i32,
        down: bool,
        ctrl: bool,
        completion: &mut TextCompletionIndex,
        rt: &dyn ScriptRuntime,
    ) -> LineKey {
        if !self.is_open() {
            return LineKey::Ignored;
        }
        if down {
            match code {
                keys::HOME => {
                    if !self.buf.is_empty() {
                        self.pos = Some(0);
                    }
                }
                keys::END => self.pos = None,
                keys::DELETE => self.delete_forward(completion),
                keys::BACKSPACE => self.backspace(completion),
                keys::LEFT => self.move_left(),
                keys::RIGHT => self.move_right(),
                keys::UP => {
                    if let Some(entry) = self.history.older().cloned() {
                        self.restore(&entry);
                    }
                }
                keys::DOWN => {
                    if let Some(entry) = self.history.newer().cloned() {
                        self.restore(&entry);
                    }
                }
                keys::TAB => self.complete(completion, rt),
                c if c == 'c' as i32 && ctrl => {
                    if let Err(e) = crate::clipboard::copy(&self.buf) {
                        tracing::warn!("Failed to copy command line: {}", e);
                    }
                }
                c if c == 'v' as i32 && ctrl => match crate::clipboard::paste() {
                    Ok(text) => {
                        self.paste(&text, completion);
                    }
                    Err(e) => tracing::warn!("Failed to paste into command line: {}", e),
                },
                _ => {}
            }
            return LineKey::Handled;
        }

        if keys::is_return(code) {
            let entry = (!self.buf.is_empty()).then(|| self.current_entry());
            let to_run = entry.map(|e| self.history.submit(e));
            self.history.reset_browse();
            self.close();
            return LineKey::Submit(to_run);
        }
        if code == keys::ESCAPE {
            self.history.reset_browse();
            self.close();
            return LineKey::Closed;
        }
        LineKey::Handled
    }
}

/// Longest prefix of `s` that fits in `max` bytes
fn clip_to(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::NativeRuntime;

    fn open_line(text: &str) -> CommandLine {
        let mut line = CommandLine::new(100);
        line.input_command(Some(text), None, None, None, 0);
        line
    }

    fn press(line: &mut CommandLine, code: i32) -> LineKey {
        let mut completion = TextCompletionIndex::new();
        let rt = NativeRuntime::new();
        line.key(code, true, false, &mut completion, &rt)
    }

    fn release(line: &mut CommandLine, code: i32) -> LineKey {
        let mut completion = TextCompletionIndex::new();
        let rt = NativeRuntime::new();
        line.key(code, false, false, &mut completion, &rt)
    }

    #[test]
    fn test_flags_parse() {
        assert_eq!(CommandFlags::parse("c"), CommandFlags::COMPLETE);
        assert_eq!(CommandFlags::parse("xs"), CommandFlags::all());
        assert_eq!(CommandFlags::parse(""), CommandFlags::empty());
    }

    #[test]
    fn test_open_defaults_to_complete_and_execute() {
        let line = open_line("");
        assert!(line.is_open());
        assert_eq!(line.flags(), CommandFlags::all());
        assert_eq!(line.prompt(), ">");

        let mut closed = CommandLine::new(10);
        closed.close();
        assert!(!closed.is_open());
    }

    #[test]
    fn test_insert_at_cursor() {
        let mut line = open_line("helo");
        let mut completion = TextCompletionIndex::new();
        press(&mut line, keys::LEFT);
        assert_eq!(line.cursor(), Some(3));
        line.insert("l", &mut completion);
        assert_eq!(line.text(), "hello");
        assert_eq!(line.cursor(), Some(4));
    }

    #[test]
    fn test_insert_clips_to_capacity() {
        let mut line = open_line(&"x".repeat(MAX_COMMAND_LEN - 2));
        let mut completion = TextCompletionIndex::new();
        line.insert("abcdef", &mut completion);
        assert_eq!(line.text().len(), MAX_COMMAND_LEN);
        assert!(line.text().ends_with("ab"));
    }

    #[test]
    fn test_insert_when_closed_is_refused() {
        let mut line = CommandLine::new(10);
        let mut completion = TextCompletionIndex::new();
        assert!(!line.insert("abc", &mut completion));
    }

    #[test]
    fn test_left_right_wrap_sentinel() {
        let mut line = open_line("ab");
        press(&mut line, keys::LEFT);
        assert_eq!(line.cursor(), Some(1));
        press(&mut line, keys::LEFT);
        assert_eq!(line.cursor(), Some(0));
        press(&mut line, keys::LEFT);
        assert_eq!(line.cursor(), Some(0));
        press(&mut line, keys::RIGHT);
        assert_eq!(line.cursor(), Some(1));
        // Stepping onto the end goes back to the sentinel
        press(&mut line, keys::RIGHT);
        assert_eq!(line.cursor(), None);
        // Right at the end stays there
        press(&mut line, keys::RIGHT);
        assert_eq!(line.cursor(), None);
    }

    #[test]
    fn test_home_end() {
        let mut line = open_line("");
        press(&mut line, keys::HOME);
        assert_eq!(line.cursor(), None);

        let mut line = open_line("abc");
        press(&mut line, keys::HOME);
        assert_eq!(line.cursor(), Some(0));
        press(&mut line, keys::END);
        assert_eq!(line.cursor(), None);
    }

    #[test]
    fn test_backspace_and_delete() {
        let mut line = open_line("abc");
        press(&mut line, keys::BACKSPACE);
        assert_eq!(line.text(), "ab");
        assert_eq!(line.cursor(), None);

        // Delete at the end sentinel does nothing
        press(&mut line, keys::DELETE);
        assert_eq!(line.text(), "ab");

        press(&mut line, keys::HOME);
        press(&mut line, keys::DELETE);
        assert_eq!(line.text(), "b");
        assert_eq!(line.cursor(), Some(0));
        press(&mut line, keys::DELETE);
        assert_eq!(line.text(), "");
        assert_eq!(line.cursor(), None);
    }

    #[test]
    fn test_submit_saves_and_dedups() {
        let mut line = open_line("/say hi");
        let result = release(&mut line, keys::RETURN);
        let LineKey::Submit(Some(entry)) = result else {
            panic!("expected a submission, got {:?}", result);
        };
        assert_eq!(entry.text, "/say hi");
        assert!(!line.is_open());

        line.input_command(Some("/say hi"), None, None, None, 5);
        release(&mut line, keys::RETURN);
        assert_eq!(line.history.len(), 1);
    }

    #[test]
    fn test_submit_empty_runs_nothing() {
        let mut line = open_line("");
        assert_eq!(release(&mut line, keys::RETURN), LineKey::Submit(None));
        assert!(line.history.is_empty());
    }

    #[test]
    fn test_history_restores_fields_and_pins_cursor() {
        let mut line = CommandLine::new(10);
        line.input_command(Some("x"), Some("setname $commandbuf"), Some("name?"), Some("c"), 0);
        release(&mut line, keys::RETURN);

        line.input_command(Some("a much longer line"), None, None, None, 0);
        press(&mut line, keys::HOME);
        for _ in 0..5 {
            press(&mut line, keys::RIGHT);
        }
        assert_eq!(line.cursor(), Some(5));

        press(&mut line, keys::UP);
        assert_eq!(line.text(), "x");
        assert_eq!(line.cursor(), None);
        assert_eq!(line.action(), Some("setname $commandbuf"));
        assert_eq!(line.prompt(), "name?");
        assert_eq!(line.flags(), CommandFlags::COMPLETE);
    }

    #[test]
    fn test_escape_closes() {
        let mut line = open_line("abc");
        assert_eq!(release(&mut line, keys::ESCAPE), LineKey::Closed);
        assert!(!line.is_open());
        assert!(line.history.is_empty());
    }

    #[test]
    fn test_closed_line_ignores_keys() {
        let mut line = CommandLine::new(10);
        assert_eq!(press(&mut line, keys::LEFT), LineKey::Ignored);
    }

    #[test]
    fn test_paste_strips_control_chars() {
        let mut line = open_line("");
        let mut completion = TextCompletionIndex::new();
        line.paste("ab\ncd\té", &mut completion);
        assert_eq!(line.text(), "abcdé");
    }
}
