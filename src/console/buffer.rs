use bitflags::bitflags;
use std::collections::VecDeque;

use crate::ui::text::TextMetrics;

/// Longest line kept, in bytes
pub const MAX_LINE_LEN: usize = 512;

bitflags! {
    /// Console line categories, used by the per-view filters
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ConsoleType: u32 {
        const INFO = 1 << 0;
        const WARN = 1 << 1;
        const ERROR = 1 << 2;
        const DEBUG = 1 << 3;
        const INIT = 1 << 4;
        const ECHO = 1 << 5;
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConsoleLine {
    pub text: String,
    pub kind: ConsoleType,
    /// Frame clock (ms) when the line was added
    pub outtime: u64,
}

/// One way of looking at the scrollback: a skip offset, a fade timeout and a
/// type filter. The main console and the mini console each have one.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConsoleView {
    pub skip: usize,
    pub fade_secs: u32,
    pub filter: ConsoleType,
}

/// Result of fitting the scrollback into a box
#[derive(Debug, Default)]
pub struct VisibleLines<'a> {
    /// Top to bottom, oldest first
    pub lines: Vec<&'a ConsoleLine>,
    pub height: f32,
}

/// Console scrollback (rendering-agnostic)
///
/// A bounded ring of lines. When full, the oldest line's storage is reused
/// for the new one.
pub struct ConsoleBuffer {
    /// Oldest at the front
    lines: VecDeque<ConsoleLine>,
    capacity: usize,
    /// Skip offset of the main console
    pub skip: usize,
    /// Skip offset of the mini console
    pub mini_skip: usize,
}

impl ConsoleBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
            skip: 0,
            mini_skip: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest to newest
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &ConsoleLine> {
        self.lines.iter()
    }

    /// `n` lines back from the newest (0 = newest)
    pub fn nth_newest(&self, n: usize) -> Option<&ConsoleLine> {
        let len = self.lines.len();
        if n >= len {
            return None;
        }
        self.lines.get(len - 1 - n)
    }

    /// Add a line, evicting the oldest one if the ring is full
    pub fn append(&mut self, kind: ConsoleType, text: &str, now: u64) {
        log_line(kind, text);

        let text = truncate_line(text);
        if self.lines.len() >= self.capacity {
            if let Some(mut recycled) = self.lines.pop_front() {
                recycled.text.clear();
                recycled.text.push_str(text);
                recycled.kind = kind;
                recycled.outtime = now;
                self.lines.push_back(recycled);
                return;
            }
        }

        let mut buf = String::with_capacity(MAX_LINE_LEN);
        buf.push_str(text);
        self.lines.push_back(ConsoleLine {
            text: buf,
            kind,
            outtime: now,
        });
    }

    /// Resize the ring, dropping the oldest lines if it shrinks
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.lines.len() > self.capacity {
            self.lines.pop_front();
        }
        self.clamp_skips();
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.skip = 0;
        self.mini_skip = 0;
    }

    /// Scroll the main console by `n` lines that pass `filter`
    pub fn scroll(&mut self, n: i32, filter: ConsoleType) {
        self.skip = self.skip_by(self.skip, n, filter);
    }

    /// Scroll the mini console by `n` lines that pass `filter`
    pub fn scroll_mini(&mut self, n: i32, filter: ConsoleType) {
        self.mini_skip = self.skip_by(self.mini_skip, n, filter);
    }

    fn skip_by(&self, skip: usize, n: i32, filter: ConsoleType) -> usize {
        let last = self.lines.len().saturating_sub(1) as i64;
        let mut skip = (skip as i64).clamp(0, last);
        let dir = if n < 0 { -1 } else { 1 };
        let mut remaining = n.unsigned_abs();
        while remaining > 0 {
            skip += dir;
            if skip < 0 || skip > last {
                return skip.clamp(0, last) as usize;
            }
            let matches = self
                .nth_newest(skip as usize)
                .is_some_and(|l| l.kind.intersects(filter));
            if matches {
                remaining -= 1;
            }
        }
        skip as usize
    }

    fn clamp_skips(&mut self) {
        let last = self.lines.len().saturating_sub(1);
        self.skip = self.skip.min(last);
        self.mini_skip = self.mini_skip.min(last);
    }

    /// Pick the lines that fit a `width` x `height` box.
    ///
    /// With no skip and a fade timeout, only lines younger than the timeout
    /// are candidates. With a skip, the window starts `skip` lines back and
    /// slides toward older lines when it runs out of newer ones. Lines that
    /// do not pass the filter take no room. A line that would overflow the
    /// box ends the set.
    pub fn visible_lines<'a>(
        &'a self,
        view: &ConsoleView,
        width: f32,
        height: f32,
        metrics: &dyn TextMetrics,
        now: u64,
    ) -> VisibleLines<'a> {
        let len = self.lines.len() as i64;
        let mut numl = len;
        let mut offset = (view.skip as i64).min(numl);

        if view.fade_secs > 0 && view.skip == 0 {
            let fade_ms = view.fade_secs as u64 * 1000;
            numl = 0;
            for i in (0..len).rev() {
                let young = self
                    .nth_newest(i as usize)
                    .is_some_and(|l| now.saturating_sub(l.outtime) < fade_ms);
                if young {
                    numl = i + 1;
                    break;
                }
            }
        }

        let wrap = (width > 0.0).then_some(width);
        let mut total = 0.0;
        for i in 0..numl {
            let idx = if offset + i < numl {
                offset + i
            } else {
                offset -= 1;
                offset
            };
            if idx < 0 {
                numl = i;
                break;
            }
            let Some(line) = self.nth_newest(idx as usize) else {
                numl = i;
                break;
            };
            if !line.kind.intersects(view.filter) {
                continue;
            }
            let (_, h) = metrics.bounds(&line.text, wrap);
            if total + h > height {
                numl = i;
                if offset == idx {
                    offset += 1;
                }
                break;
            }
            total += h;
        }

        let lines = (0..numl)
            .rev()
            .filter_map(|i| self.nth_newest((offset + i) as usize))
            .filter(|l| l.kind.intersects(view.filter))
            .collect();

        VisibleLines {
            lines,
            height: total,
        }
    }
}

fn truncate_line(text: &str) -> &str {
    if text.len() < MAX_LINE_LEN {
        return text;
    }
    let mut end = MAX_LINE_LEN - 1;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn log_line(kind: ConsoleType, text: &str) {
    if kind.contains(ConsoleType::ERROR) {
        tracing::error!("{}", text);
    } else if kind.contains(ConsoleType::WARN) {
        tracing::warn!("{}", text);
    } else if kind.contains(ConsoleType::DEBUG) {
        tracing::debug!("{}", text);
    } else {
        tracing::info!("{}", text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::text::MonoMetrics;

    fn texts(buf: &ConsoleBuffer) -> Vec<&str> {
        buf.iter().map(|l| l.text.as_str()).collect()
    }

    fn all_view() -> ConsoleView {
        ConsoleView {
            skip: 0,
            fade_secs: 0,
            filter: ConsoleType::all(),
        }
    }

    #[test]
    fn test_ring_keeps_newest() {
        let mut buf = ConsoleBuffer::new(3);
        for s in ["a", "b", "c", "d"] {
            buf.append(ConsoleType::INFO, s, 0);
        }
        assert_eq!(texts(&buf), vec!["b", "c", "d"]);

        buf.append(ConsoleType::INFO, "e", 0);
        assert_eq!(texts(&buf), vec!["c", "d", "e"]);
    }

    #[test]
    fn test_ring_length_is_bounded() {
        for cap in [1usize, 2, 5] {
            let mut buf = ConsoleBuffer::new(cap);
            for n in 0..12usize {
                buf.append(ConsoleType::INFO, &n.to_string(), 0);
                assert_eq!(buf.len(), (n + 1).min(cap));
                // Newest line is always the last appended
                assert_eq!(buf.nth_newest(0).map(|l| l.text.clone()), Some(n.to_string()));
            }
        }
    }

    #[test]
    fn test_recycled_line_keeps_allocation() {
        let mut buf = ConsoleBuffer::new(1);
        buf.append(ConsoleType::INFO, "first", 0);
        let cap_before = buf.nth_newest(0).map(|l| l.text.capacity());
        buf.append(ConsoleType::WARN, "second", 5);
        assert_eq!(buf.nth_newest(0).map(|l| l.text.capacity()), cap_before);
        let line = buf.nth_newest(0).unwrap();
        assert_eq!(line.text, "second");
        assert_eq!(line.kind, ConsoleType::WARN);
        assert_eq!(line.outtime, 5);
    }

    #[test]
    fn test_long_line_truncated() {
        let mut buf = ConsoleBuffer::new(4);
        let long = "é".repeat(400);
        buf.append(ConsoleType::INFO, &long, 0);
        let stored = &buf.nth_newest(0).unwrap().text;
        assert!(stored.len() < MAX_LINE_LEN);
        assert!(long.starts_with(stored.as_str()));
    }

    #[test]
    fn test_set_capacity_trims_oldest() {
        let mut buf = ConsoleBuffer::new(10);
        for s in ["a", "b", "c", "d"] {
            buf.append(ConsoleType::INFO, s, 0);
        }
        buf.set_capacity(2);
        assert_eq!(texts(&buf), vec!["c", "d"]);
    }

    #[test]
    fn test_scroll_counts_filtered_lines() {
        let mut buf = ConsoleBuffer::new(10);
        buf.append(ConsoleType::INFO, "i0", 0);
        buf.append(ConsoleType::DEBUG, "d1", 0);
        buf.append(ConsoleType::INFO, "i2", 0);
        buf.append(ConsoleType::DEBUG, "d3", 0);

        // newest-first: d3 i2 d1 i0; one INFO step from 0 lands on i2
        buf.scroll(1, ConsoleType::INFO);
        assert_eq!(buf.skip, 1);
        buf.scroll(1, ConsoleType::INFO);
        assert_eq!(buf.skip, 3);
        // Runs off the end and clamps
        buf.scroll(5, ConsoleType::INFO);
        assert_eq!(buf.skip, 3);
        buf.scroll(-10, ConsoleType::INFO);
        assert_eq!(buf.skip, 0);
    }

    #[test]
    fn test_visible_lines_fit_height() {
        let mut buf = ConsoleBuffer::new(10);
        for s in ["a", "b", "c", "d", "e"] {
            buf.append(ConsoleType::INFO, s, 0);
        }
        let metrics = MonoMetrics::default();
        let vis = buf.visible_lines(&all_view(), 80.0, 3.0, &metrics, 0);
        let got: Vec<&str> = vis.lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(got, vec!["c", "d", "e"]);
        assert_eq!(vis.height, 3.0);
    }

    #[test]
    fn test_visible_lines_fade() {
        let mut buf = ConsoleBuffer::new(10);
        buf.append(ConsoleType::INFO, "old", 0);
        buf.append(ConsoleType::INFO, "new", 9_000);
        let view = ConsoleView {
            fade_secs: 5,
            ..all_view()
        };
        let metrics = MonoMetrics::default();
        let vis = buf.visible_lines(&view, 80.0, 10.0, &metrics, 10_000);
        let got: Vec<&str> = vis.lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(got, vec!["new"]);

        // Everything faded
        let vis = buf.visible_lines(&view, 80.0, 10.0, &metrics, 60_000);
        assert!(vis.lines.is_empty());
    }

    #[test]
    fn test_visible_lines_skip_ignores_fade() {
        let mut buf = ConsoleBuffer::new(10);
        for s in ["a", "b", "c", "d"] {
            buf.append(ConsoleType::INFO, s, 0);
        }
        let view = ConsoleView {
            skip: 1,
            fade_secs: 1,
            filter: ConsoleType::all(),
        };
        let metrics = MonoMetrics::default();
        let vis = buf.visible_lines(&view, 80.0, 2.0, &metrics, 100_000);
        let got: Vec<&str> = vis.lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(got, vec!["b", "c"]);
    }

    #[test]
    fn test_visible_lines_shuffle_fill() {
        let mut buf = ConsoleBuffer::new(10);
        for s in ["a", "b", "c", "d"] {
            buf.append(ConsoleType::INFO, s, 0);
        }
        // Skip past the end of the newer lines: window slides back to fill
        let view = ConsoleView {
            skip: 3,
            fade_secs: 0,
            filter: ConsoleType::all(),
        };
        let metrics = MonoMetrics::default();
        let vis = buf.visible_lines(&view, 80.0, 3.0, &metrics, 0);
        let got: Vec<&str> = vis.lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(got, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_visible_lines_filter() {
        let mut buf = ConsoleBuffer::new(10);
        buf.append(ConsoleType::INFO, "info", 0);
        buf.append(ConsoleType::DEBUG, "debug", 0);
        let view = ConsoleView {
            filter: ConsoleType::INFO,
            ..all_view()
        };
        let metrics = MonoMetrics::default();
        let vis = buf.visible_lines(&view, 80.0, 5.0, &metrics, 0);
        let got: Vec<&str> = vis.lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(got, vec!["info"]);
    }
}
