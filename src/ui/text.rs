//! Text measurement
//!
//! Font rasterization lives outside the core. Layout and the console only need
//! to know how big a run of text is once wrapped.

/// Text size oracle supplied by the renderer
pub trait TextMetrics {
    /// Size of `text` laid out with an optional wrap width
    fn bounds(&self, text: &str, wrap: Option<f32>) -> (f32, f32);

    /// Height of one unwrapped line
    fn line_height(&self) -> f32;
}

/// Fixed-pitch metrics, good enough for terminals and tests
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MonoMetrics {
    pub char_width: f32,
    pub line_height: f32,
}

impl Default for MonoMetrics {
    fn default() -> Self {
        Self {
            char_width: 1.0,
            line_height: 1.0,
        }
    }
}

impl TextMetrics for MonoMetrics {
    fn bounds(&self, text: &str, wrap: Option<f32>) -> (f32, f32) {
        let per_line = wrap
            .filter(|w| *w > 0.0)
            .map(|w| ((w / self.char_width).floor() as usize).max(1));

        let mut rows = 0usize;
        let mut widest = 0usize;
        for line in text.split('\n') {
            let len = line.chars().count();
            match per_line {
                Some(n) if len > n => {
                    rows += len.div_ceil(n);
                    widest = widest.max(n);
                }
                _ => {
                    rows += 1;
                    widest = widest.max(len);
                }
            }
        }
        (widest as f32 * self.char_width, rows as f32 * self.line_height)
    }

    fn line_height(&self) -> f32 {
        self.line_height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mono_bounds_unwrapped() {
        let m = MonoMetrics::default();
        assert_eq!(m.bounds("hello", None), (5.0, 1.0));
        assert_eq!(m.bounds("ab\nabcd", None), (4.0, 2.0));
    }

    #[test]
    fn test_mono_bounds_wrapped() {
        let m = MonoMetrics {
            char_width: 2.0,
            line_height: 3.0,
        };
        // 4 chars per row at width 8
        assert_eq!(m.bounds("abcdefghij", Some(8.0)), (8.0, 9.0));
        assert_eq!(m.bounds("", Some(8.0)), (0.0, 3.0));
    }
}
