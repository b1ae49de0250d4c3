use std::collections::VecDeque;

use super::buffer::{ConsoleBuffer, ConsoleType};
use super::command_line::CommandFlags;
use crate::script::ScriptRuntime;

/// A saved command line submission
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HistoryEntry {
    pub text: String,
    pub action: Option<String>,
    pub prompt: Option<String>,
    pub flags: CommandFlags,
}

impl HistoryEntry {
    /// Run the submission.
    ///
    /// `/command` with the execute flag runs as script; otherwise a prompt
    /// action runs with the text in the `commandbuf` alias; otherwise the text
    /// is echoed to the console.
    pub fn run(&self, rt: &mut dyn ScriptRuntime, console: &mut ConsoleBuffer, now: u64) {
        if self.flags.contains(CommandFlags::EXECUTE) {
            if let Some(stmt) = self.text.strip_prefix('/') {
                rt.execute_str(stmt);
                return;
            }
        }
        match &self.action {
            Some(action) => {
                rt.set_alias("commandbuf", &self.text);
                rt.execute_str(action);
            }
            None => console.append(ConsoleType::INFO, &self.text, now),
        }
    }
}

/// Bounded list of past submissions, oldest first
pub struct History {
    entries: VecDeque<HistoryEntry>,
    /// Browse position; `len()` means "past the newest"
    pos: usize,
    max_history: usize,
    running: bool,
}

impl History {
    pub fn new(max_history: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            pos: 0,
            max_history,
            running: false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn newest(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    /// `n` entries back from the newest (0 = newest)
    pub fn nth_newest(&self, n: usize) -> Option<&HistoryEntry> {
        let len = self.entries.len();
        (n < len).then(|| &self.entries[len - 1 - n])
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// Change the cap; 0 means unbounded
    pub fn set_max_history(&mut self, max_history: usize) {
        self.max_history = max_history;
        if max_history > 0 && self.entries.len() > max_history {
            let excess = self.entries.len() - max_history;
            self.entries.drain(..excess);
            tracing::debug!("Trimmed {} history entries", excess);
        }
        self.pos = self.pos.min(self.entries.len());
    }

    /// True if `entry` differs from the newest entry in text, action, prompt
    /// or flags
    pub fn should_save(&self, entry: &HistoryEntry) -> bool {
        self.entries.back() != Some(entry)
    }

    /// Record a submission and return the entry to run.
    ///
    /// A repeat of the newest entry reuses it instead of appending.
    pub fn submit(&mut self, entry: HistoryEntry) -> HistoryEntry {
        if self.should_save(&entry) {
            if self.max_history > 0 && self.entries.len() >= self.max_history {
                let excess = self.entries.len() + 1 - self.max_history;
                self.entries.drain(..excess);
            }
            self.entries.push_back(entry.clone());
        }
        self.reset_browse();
        entry
    }

    /// Put the browse position past the newest entry
    pub fn reset_browse(&mut self) {
        self.pos = self.entries.len();
    }

    /// Step back toward older entries
    pub fn older(&mut self) -> Option<&HistoryEntry> {
        if self.pos > self.entries.len() {
            self.pos = self.entries.len();
        }
        if self.pos == 0 {
            return None;
        }
        self.pos -= 1;
        self.entries.get(self.pos)
    }

    /// Step forward toward newer entries
    pub fn newer(&mut self) -> Option<&HistoryEntry> {
        if self.pos + 1 >= self.entries.len() {
            return None;
        }
        self.pos += 1;
        self.entries.get(self.pos)
    }

    /// Re-run the `n`th most recent entry. Nested calls are ignored.
    pub fn rerun(&mut self, n: usize, rt: &mut dyn ScriptRuntime, console: &mut ConsoleBuffer, now: u64) {
        if self.running {
            return;
        }
        let Some(entry) = self.nth_newest(n).cloned() else {
            return;
        };
        self.running = true;
        entry.run(rt, console, now);
        self.running = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::NativeRuntime;

    fn entry(text: &str) -> HistoryEntry {
        HistoryEntry {
            text: text.to_string(),
            flags: CommandFlags::COMPLETE | CommandFlags::EXECUTE,
            ..Default::default()
        }
    }

    #[test]
    fn test_repeat_submission_reuses_entry() {
        let mut history = History::new(10);
        history.submit(entry("say hi"));
        history.submit(entry("say hi"));
        assert_eq!(history.len(), 1);

        // A distinct entry after the reuse still appends
        history.submit(entry("say bye"));
        assert_eq!(history.len(), 2);
        assert_eq!(history.newest().map(|e| e.text.as_str()), Some("say bye"));
    }

    #[test]
    fn test_flags_and_prompt_make_entries_distinct() {
        let mut history = History::new(10);
        history.submit(entry("x"));
        let mut other = entry("x");
        other.prompt = Some("name:".to_string());
        assert!(history.should_save(&other));
        history.submit(other);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_cap_evicts_oldest() {
        let mut history = History::new(3);
        for t in ["a", "b", "c", "d", "e"] {
            history.submit(entry(t));
        }
        let texts: Vec<&str> = history.entries().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["c", "d", "e"]);

        history.set_max_history(2);
        let texts: Vec<&str> = history.entries().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["d", "e"]);
    }

    #[test]
    fn test_browse_older_and_newer() {
        let mut history = History::new(10);
        for t in ["a", "b", "c"] {
            history.submit(entry(t));
        }
        assert_eq!(history.older().map(|e| e.text.clone()), Some("c".into()));
        assert_eq!(history.older().map(|e| e.text.clone()), Some("b".into()));
        assert_eq!(history.newer().map(|e| e.text.clone()), Some("c".into()));
        // Already at the newest
        assert!(history.newer().is_none());
    }

    #[test]
    fn test_run_paths() {
        let mut rt = NativeRuntime::new();
        let mut console = ConsoleBuffer::new(8);

        // Plain text echoes
        let plain = HistoryEntry {
            text: "hello".into(),
            ..Default::default()
        };
        plain.run(&mut rt, &mut console, 0);
        assert_eq!(console.nth_newest(0).map(|l| l.text.as_str()), Some("hello"));

        // Slash command with execute flag runs as script
        entry("/echo hi").run(&mut rt, &mut console, 0);
        assert_eq!(rt.executed.last().map(String::as_str), Some("echo hi"));

        // Prompt action sees the text through commandbuf
        let prompted = HistoryEntry {
            text: "bob".into(),
            action: Some("setname $commandbuf".into()),
            ..Default::default()
        };
        prompted.run(&mut rt, &mut console, 0);
        assert_eq!(rt.alias_value("commandbuf"), Some("bob"));
        assert_eq!(rt.executed.last().map(String::as_str), Some("setname $commandbuf"));
    }

    #[test]
    fn test_rerun_nth() {
        let mut rt = NativeRuntime::new();
        let mut console = ConsoleBuffer::new(8);
        let mut history = History::new(10);
        history.submit(entry("/first"));
        history.submit(entry("/second"));

        history.rerun(1, &mut rt, &mut console, 0);
        assert_eq!(rt.executed.last().map(String::as_str), Some("first"));

        // Out of range is a no-op
        history.rerun(5, &mut rt, &mut console, 0);
        assert_eq!(rt.executed.len(), 1);
    }
}
