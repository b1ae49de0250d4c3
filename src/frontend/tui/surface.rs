//! Terminal cells as a draw surface
//!
//! Every primitive is snapped to the cell grid of a ratatui [`Buffer`]. The
//! HUD is measured in cells, so scissor boxes (bottom-left origin) map
//! straight onto rows after a flip.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Color as CellColor;

use crate::ui::draw::{DrawSurface, Projection, Scissor};
use crate::ui::kind::{Blend, Color, ShapeMode, Texture};

fn cell_color(c: Color) -> CellColor {
    CellColor::Rgb(c.r, c.g, c.b)
}

pub struct CellSurface<'a> {
    buf: &'a mut Buffer,
    area: Rect,
    proj: Projection,
    /// Visible cells as (x1, y1, x2, y2), exclusive, relative to `area`
    clip: (i32, i32, i32, i32),
}

impl<'a> CellSurface<'a> {
    pub fn new(buf: &'a mut Buffer, area: Rect) -> Self {
        Self {
            buf,
            area,
            proj: Projection {
                px: 0.0,
                py: 0.0,
                pw: 1.0,
                ph: 1.0,
            },
            clip: (0, 0, area.width as i32, area.height as i32),
        }
    }

    /// Cell under the UI point `(x, y)`
    fn cell(&self, x: f32, y: f32) -> (i32, i32) {
        let (sx, sy) = self.proj.to_screen(x, y);
        (
            (sx * self.area.width as f32).floor() as i32,
            (sy * self.area.height as f32).floor() as i32,
        )
    }

    /// Cells covered by a rectangle, rounded to the nearest edges
    fn span(&self, x: f32, y: f32, w: f32, h: f32) -> (i32, i32, i32, i32) {
        let (sx1, sy1) = self.proj.to_screen(x, y);
        let (sx2, sy2) = self.proj.to_screen(x + w, y + h);
        let (cw, ch) = (self.area.width as f32, self.area.height as f32);
        (
            (sx1 * cw).round() as i32,
            (sy1 * ch).round() as i32,
            (sx2 * cw).round() as i32,
            (sy2 * ch).round() as i32,
        )
    }

    fn visit(&mut self, cx: i32, cy: i32, f: impl FnOnce(&mut ratatui::buffer::Cell)) {
        let (x1, y1, x2, y2) = self.clip;
        if cx < x1 || cy < y1 || cx >= x2 || cy >= y2 {
            return;
        }
        let pos = (self.area.x + cx as u16, self.area.y + cy as u16);
        if let Some(cell) = self.buf.cell_mut(pos) {
            f(cell);
        }
    }

    fn paint_bg(&mut self, cx: i32, cy: i32, color: Color) {
        self.visit(cx, cy, |cell| {
            cell.set_bg(cell_color(color));
        });
    }

    fn put(&mut self, cx: i32, cy: i32, symbol: &str, color: Color) {
        self.visit(cx, cy, |cell| {
            cell.set_symbol(symbol).set_fg(cell_color(color));
        });
    }

    fn cell_line(&mut self, from: (i32, i32), to: (i32, i32), color: Color) {
        let symbol = if from.1 == to.1 {
            "─"
        } else if from.0 == to.0 {
            "│"
        } else {
            "·"
        };
        let steps = (to.0 - from.0).abs().max((to.1 - from.1).abs());
        for i in 0..=steps {
            let t = if steps == 0 { 0.0 } else { i as f32 / steps as f32 };
            let cx = from.0 as f32 + (to.0 - from.0) as f32 * t;
            let cy = from.1 as f32 + (to.1 - from.1) as f32 * t;
            self.put(cx.round() as i32, cy.round() as i32, symbol, color);
        }
    }

    fn fill_cells(&mut self, span: (i32, i32, i32, i32), mut color_at: impl FnMut(i32, i32) -> Color) {
        let (x1, y1, x2, y2) = span;
        for cy in y1..y2 {
            for cx in x1..x2 {
                let color = color_at(cx, cy);
                self.paint_bg(cx, cy, color);
            }
        }
    }
}

fn lerp(a: u8, b: u8, t: f32) -> u8 {
    (a as f32 + (b as f32 - a as f32) * t).round() as u8
}

impl DrawSurface for CellSurface<'_> {
    fn set_projection(&mut self, proj: Projection) {
        self.proj = proj;
    }

    fn set_scissor(&mut self, scissor: Option<Scissor>) {
        let (w, h) = (self.area.width as i32, self.area.height as i32);
        self.clip = match scissor {
            None => (0, 0, w, h),
            // Bottom-left origin to rows from the top
            Some(s) => (s.x1.max(0), (h - s.y2).max(0), s.x2.min(w), (h - s.y1).min(h)),
        };
    }

    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Color, _blend: Blend) {
        let span = self.span(x, y, w, h);
        self.fill_cells(span, |_, _| color);
    }

    fn gradient(&mut self, x: f32, y: f32, w: f32, h: f32, horizontal: bool, from: Color, to: Color, _blend: Blend) {
        let span = self.span(x, y, w, h);
        let (x1, y1, x2, y2) = span;
        let len = (if horizontal { x2 - x1 } else { y2 - y1 }).max(1) as f32;
        self.fill_cells(span, |cx, cy| {
            let t = (if horizontal { cx - x1 } else { cy - y1 }) as f32 / len;
            Color::rgba(lerp(from.r, to.r, t), lerp(from.g, to.g, t), lerp(from.b, to.b, t), 255)
        });
    }

    fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, color: Color) {
        let (a, b) = (self.cell(x1, y1), self.cell(x2, y2));
        self.cell_line(a, b, color);
    }

    fn outline(&mut self, x: f32, y: f32, w: f32, h: f32, color: Color) {
        let (x1, y1, x2, y2) = self.span(x, y, w, h);
        if x2 <= x1 || y2 <= y1 {
            return;
        }
        let (r, b) = (x2 - 1, y2 - 1);
        self.cell_line((x1, y1), (x1, b), color);
        self.cell_line((r, y1), (r, b), color);
        self.cell_line((x1, y1), (r, y1), color);
        self.cell_line((x1, b), (r, b), color);
    }

    fn textured_quad(&mut self, x: f32, y: f32, w: f32, h: f32, tex: &Texture, _uv: [f32; 4]) {
        let symbol = if tex.is_missing() { "?" } else { "▒" };
        let (x1, y1, x2, y2) = self.span(x, y, w, h);
        for cy in y1..y2 {
            for cx in x1..x2 {
                self.put(cx, cy, symbol, Color::WHITE);
            }
        }
    }

    fn triangle(&mut self, pts: [[f32; 2]; 3], color: Color, mode: ShapeMode) {
        let cells = pts.map(|[x, y]| self.cell(x, y));
        if mode == ShapeMode::Outline {
            for i in 0..3 {
                self.cell_line(cells[i], cells[(i + 1) % 3], color);
            }
            return;
        }
        let edge = |a: (i32, i32), b: (i32, i32), p: (f32, f32)| {
            (b.0 - a.0) as f32 * (p.1 - a.1 as f32) - (b.1 - a.1) as f32 * (p.0 - a.0 as f32)
        };
        let xs = cells.map(|c| c.0);
        let ys = cells.map(|c| c.1);
        let (x1, x2) = (xs.iter().min().copied().unwrap_or(0), xs.iter().max().copied().unwrap_or(0));
        let (y1, y2) = (ys.iter().min().copied().unwrap_or(0), ys.iter().max().copied().unwrap_or(0));
        for cy in y1..=y2 {
            for cx in x1..=x2 {
                let p = (cx as f32, cy as f32);
                let d = [
                    edge(cells[0], cells[1], p),
                    edge(cells[1], cells[2], p),
                    edge(cells[2], cells[0], p),
                ];
                let inside = d.iter().all(|v| *v >= 0.0) || d.iter().all(|v| *v <= 0.0);
                if inside {
                    self.paint_bg(cx, cy, color);
                }
            }
        }
    }

    fn circle(&mut self, cx: f32, cy: f32, radius: f32, color: Color, mode: ShapeMode) {
        let (x1, y1, x2, y2) = self.span(cx - radius, cy - radius, radius * 2.0, radius * 2.0);
        let rx = (x2 - x1) as f32 / 2.0;
        let ry = (y2 - y1) as f32 / 2.0;
        if rx <= 0.0 || ry <= 0.0 {
            return;
        }
        let (mx, my) = (x1 as f32 + rx, y1 as f32 + ry);
        for y in y1..y2 {
            for x in x1..x2 {
                let dx = (x as f32 + 0.5 - mx) / rx;
                let dy = (y as f32 + 0.5 - my) / ry;
                let d = (dx * dx + dy * dy).sqrt();
                let hit = match mode {
                    ShapeMode::Outline => d <= 1.0 && d >= 1.0 - 1.0 / rx.min(ry),
                    _ => d <= 1.0,
                };
                if hit {
                    self.paint_bg(x, y, color);
                }
            }
        }
    }

    fn text(&mut self, x: f32, y: f32, text: &str, scale: f32, color: Color, wrap: Option<f32>) {
        let (x0, y0) = self.cell(x, y);
        let per_line = wrap.filter(|w| *w > 0.0).map(|w| (w.floor() as usize).max(1));
        let mut row = 0;
        for line in text.split('\n') {
            let chars: Vec<char> = line.chars().collect();
            let chunks: Vec<&[char]> = match per_line {
                Some(n) if !chars.is_empty() => chars.chunks(n).collect(),
                _ => vec![&chars[..]],
            };
            for chunk in chunks {
                let (_, cy) = self.cell(x, y + row as f32 * scale);
                let cy = cy.max(y0 + row);
                for (i, c) in chunk.iter().enumerate() {
                    let mut tmp = [0u8; 4];
                    self.put(x0 + i as i32, cy, c.encode_utf8(&mut tmp), color);
                }
                row += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface(buf: &mut Buffer) -> CellSurface<'_> {
        let area = buf.area;
        let mut s = CellSurface::new(buf, area);
        // 10x5 cells covering a 2x1 UI projection
        s.set_projection(Projection {
            px: 0.0,
            py: 0.0,
            pw: 2.0,
            ph: 1.0,
        });
        s
    }

    fn symbols(buf: &Buffer, y: u16) -> String {
        (0..buf.area.width).map(|x| buf[(x, y)].symbol().to_string()).collect()
    }

    #[test]
    fn test_text_lands_on_cells() {
        let mut buf = Buffer::empty(Rect::new(0, 0, 10, 5));
        surface(&mut buf).text(0.4, 0.2, "hi", 0.2, Color::WHITE, None);
        assert_eq!(symbols(&buf, 1), "  hi      ");
    }

    #[test]
    fn test_wrapped_text_moves_down_a_row() {
        let mut buf = Buffer::empty(Rect::new(0, 0, 10, 5));
        surface(&mut buf).text(0.0, 0.0, "abcd", 0.2, Color::WHITE, Some(2.0));
        assert_eq!(symbols(&buf, 0), "ab        ");
        assert_eq!(symbols(&buf, 1), "cd        ");
    }

    #[test]
    fn test_fill_sets_background() {
        let mut buf = Buffer::empty(Rect::new(0, 0, 10, 5));
        surface(&mut buf).fill_rect(0.0, 0.0, 0.4, 0.4, Color::rgba(1, 2, 3, 255), Blend::Alpha);
        assert_eq!(buf[(1, 1)].bg, CellColor::Rgb(1, 2, 3));
        assert_eq!(buf[(2, 1)].bg, CellColor::Reset);
    }

    #[test]
    fn test_scissor_flips_rows() {
        let mut buf = Buffer::empty(Rect::new(0, 0, 10, 5));
        let mut s = surface(&mut buf);
        // Bottom two rows only
        s.set_scissor(Some(Scissor { x1: 0, y1: 0, x2: 10, y2: 2 }));
        s.fill_rect(0.0, 0.0, 2.0, 1.0, Color::rgba(9, 9, 9, 255), Blend::Alpha);
        assert_eq!(buf[(0, 2)].bg, CellColor::Reset);
        assert_eq!(buf[(0, 3)].bg, CellColor::Rgb(9, 9, 9));
        assert_eq!(buf[(0, 4)].bg, CellColor::Rgb(9, 9, 9));
    }

    #[test]
    fn test_outline_draws_box_edges() {
        let mut buf = Buffer::empty(Rect::new(0, 0, 10, 5));
        surface(&mut buf).outline(0.0, 0.0, 0.8, 0.6, Color::WHITE);
        assert_eq!(symbols(&buf, 0), "────      ");
        assert_eq!(buf[(0, 1)].symbol(), "│");
        assert_eq!(buf[(1, 1)].symbol(), " ");
    }
}
