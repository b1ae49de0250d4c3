//! Draw traversal
//!
//! The tree never talks to a graphics API. Each window sets a projection on a
//! [`DrawSurface`] and then emits primitives in window-local units; clippers
//! and scrollers narrow the scissor through a stack of rectangles kept in
//! [`DrawContext`].

use serde::Serialize;

use super::kind::{Blend, Color, ImageData, ImageStyle, ShapeMode, Texture, WidgetKind};
use super::state::StateFlags;
use super::text::TextMetrics;
use super::tree::{WidgetId, WidgetTree};
use crate::console::buffer::{ConsoleBuffer, ConsoleView};

/// Orthographic mapping of a window's virtual space onto the HUD
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Projection {
    pub px: f32,
    pub py: f32,
    pub pw: f32,
    pub ph: f32,
}

impl Projection {
    /// Normalized surface position, origin top-left
    pub fn to_screen(&self, x: f32, y: f32) -> (f32, f32) {
        if self.pw <= 0.0 || self.ph <= 0.0 {
            return (0.0, 0.0);
        }
        ((x - self.px) / self.pw, (y - self.py) / self.ph)
    }

    /// Scissor box for the local rectangle `(x1, y1)-(x2, y2)` in HUD
    /// pixels, origin bottom-left. With `clip` the box is kept on the HUD.
    pub fn calc_scissor(&self, x1: f32, y1: f32, x2: f32, y2: f32, hud: (i32, i32), clip: bool) -> Scissor {
        let (hudw, hudh) = hud;
        let (sx1, sy1t) = self.to_screen(x1, y2);
        let (sx2, sy2t) = self.to_screen(x2, y1);
        // Flip y: bottom edge of the box first
        let px = |v: f32, size: i32| (v * size as f32 + 0.5).floor() as i32;
        let mut s = Scissor {
            x1: px(sx1, hudw),
            y1: px(1.0 - sy1t, hudh),
            x2: px(sx2, hudw),
            y2: px(1.0 - sy2t, hudh),
        };
        if clip {
            s.x1 = s.x1.clamp(0, hudw);
            s.y1 = s.y1.clamp(0, hudh);
            s.x2 = s.x2.clamp(0, hudw);
            s.y2 = s.y2.clamp(0, hudh);
        }
        s
    }

    /// Fraction of the HUD height above local `y`
    pub fn calc_above_hud(&self, y: f32) -> f32 {
        self.to_screen(0.0, y).1
    }
}

/// Pixel scissor box, origin bottom-left
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Scissor {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

/// Abstract drawing backend. Coordinates are window-local UI units under
/// the last projection set.
pub trait DrawSurface {
    fn set_projection(&mut self, proj: Projection);
    /// `None` turns clipping off
    fn set_scissor(&mut self, scissor: Option<Scissor>);
    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Color, blend: Blend);
    #[allow(clippy::too_many_arguments)]
    fn gradient(&mut self, x: f32, y: f32, w: f32, h: f32, horizontal: bool, from: Color, to: Color, blend: Blend);
    fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, color: Color);
    fn outline(&mut self, x: f32, y: f32, w: f32, h: f32, color: Color);
    /// Texture region `uv = [u, v, du, dv]` stretched over the rectangle
    fn textured_quad(&mut self, x: f32, y: f32, w: f32, h: f32, tex: &Texture, uv: [f32; 4]);
    fn triangle(&mut self, pts: [[f32; 2]; 3], color: Color, mode: ShapeMode);
    fn circle(&mut self, cx: f32, cy: f32, radius: f32, color: Color, mode: ShapeMode);
    /// Text at `scale` UI units per metric unit, wrapped at `wrap` metric units
    fn text(&mut self, x: f32, y: f32, text: &str, scale: f32, color: Color, wrap: Option<f32>);
}

/// One recorded primitive
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawCommand {
    Projection(Projection),
    Scissor { rect: Option<Scissor> },
    Fill { x: f32, y: f32, w: f32, h: f32, color: Color, blend: Blend },
    Gradient { x: f32, y: f32, w: f32, h: f32, horizontal: bool, from: Color, to: Color, blend: Blend },
    Line { x1: f32, y1: f32, x2: f32, y2: f32, color: Color },
    Outline { x: f32, y: f32, w: f32, h: f32, color: Color },
    Quad { x: f32, y: f32, w: f32, h: f32, texture: String, uv: [f32; 4] },
    Triangle { pts: [[f32; 2]; 3], color: Color, outline: bool, blend: Blend },
    Circle { cx: f32, cy: f32, radius: f32, color: Color, outline: bool, blend: Blend },
    Text { x: f32, y: f32, text: String, scale: f32, color: Color },
}

/// Surface that records what it is asked to draw
#[derive(Debug, Default, Serialize)]
pub struct DrawList {
    pub commands: Vec<DrawCommand>,
}

impl DrawList {
    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().filter_map(|c| match c {
            DrawCommand::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

impl DrawSurface for DrawList {
    fn set_projection(&mut self, proj: Projection) {
        self.commands.push(DrawCommand::Projection(proj));
    }

    fn set_scissor(&mut self, rect: Option<Scissor>) {
        self.commands.push(DrawCommand::Scissor { rect });
    }

    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Color, blend: Blend) {
        self.commands.push(DrawCommand::Fill { x, y, w, h, color, blend });
    }

    fn gradient(&mut self, x: f32, y: f32, w: f32, h: f32, horizontal: bool, from: Color, to: Color, blend: Blend) {
        self.commands.push(DrawCommand::Gradient {
            x,
            y,
            w,
            h,
            horizontal,
            from,
            to,
            blend,
        });
    }

    fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, color: Color) {
        self.commands.push(DrawCommand::Line { x1, y1, x2, y2, color });
    }

    fn outline(&mut self, x: f32, y: f32, w: f32, h: f32, color: Color) {
        self.commands.push(DrawCommand::Outline { x, y, w, h, color });
    }

    fn textured_quad(&mut self, x: f32, y: f32, w: f32, h: f32, tex: &Texture, uv: [f32; 4]) {
        self.commands.push(DrawCommand::Quad {
            x,
            y,
            w,
            h,
            texture: tex.name.clone(),
            uv,
        });
    }

    fn triangle(&mut self, pts: [[f32; 2]; 3], color: Color, mode: ShapeMode) {
        self.commands.push(DrawCommand::Triangle {
            pts,
            color,
            outline: mode == ShapeMode::Outline,
            blend: mode.blend(),
        });
    }

    fn circle(&mut self, cx: f32, cy: f32, radius: f32, color: Color, mode: ShapeMode) {
        self.commands.push(DrawCommand::Circle {
            cx,
            cy,
            radius,
            color,
            outline: mode == ShapeMode::Outline,
            blend: mode.blend(),
        });
    }

    fn text(&mut self, x: f32, y: f32, text: &str, scale: f32, color: Color, _wrap: Option<f32>) {
        self.commands.push(DrawCommand::Text {
            x,
            y,
            text: text.to_string(),
            scale,
            color,
        });
    }
}

/// Axis-aligned clip rectangle in window-local units
#[derive(Clone, Copy, Debug, PartialEq)]
struct ClipArea {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
}

impl ClipArea {
    fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            x1: x,
            y1: y,
            x2: x + w,
            y2: y + h,
        }
    }

    fn intersect(&mut self, c: &ClipArea) {
        self.x1 = self.x1.max(c.x1);
        self.y1 = self.y1.max(c.y1);
        self.x2 = self.x1.max(self.x2.min(c.x2));
        self.y2 = self.y1.max(self.y2.min(c.y2));
    }

    fn is_fully_clipped(&self, x: f32, y: f32, w: f32, h: f32) -> bool {
        self.x1 == self.x2 || self.y1 == self.y2 || x >= self.x2 || y >= self.y2 || x + w <= self.x1 || y + h <= self.y1
    }
}

/// Everything a draw pass needs besides the tree
pub struct DrawContext<'a> {
    pub surface: &'a mut dyn DrawSurface,
    pub metrics: &'a dyn TextMetrics,
    /// HUD size in pixels
    pub hud: (i32, i32),
    pub now: u64,
    /// Scrollback shown by console widgets
    pub console: Option<(&'a ConsoleBuffer, ConsoleView)>,
    /// Editor holding keyboard focus
    pub focus: Option<WidgetId>,
    projection: Projection,
    clip_stack: Vec<ClipArea>,
}

impl<'a> DrawContext<'a> {
    pub fn new(surface: &'a mut dyn DrawSurface, metrics: &'a dyn TextMetrics, hud: (i32, i32), now: u64) -> Self {
        Self {
            surface,
            metrics,
            hud,
            now,
            console: None,
            focus: None,
            projection: Projection::default(),
            clip_stack: Vec::new(),
        }
    }

    pub fn with_console(mut self, console: &'a ConsoleBuffer, view: ConsoleView) -> Self {
        self.console = Some((console, view));
        self
    }

    pub fn set_projection(&mut self, proj: Projection) {
        self.projection = proj;
        self.surface.set_projection(proj);
    }

    pub fn push_clip(&mut self, x: f32, y: f32, w: f32, h: f32) {
        let mut c = ClipArea::new(x, y, w, h);
        if let Some(top) = self.clip_stack.last() {
            c.intersect(top);
        }
        self.clip_stack.push(c);
        self.scissor(Some(c));
    }

    pub fn pop_clip(&mut self) {
        self.clip_stack.pop();
        let top = self.clip_stack.last().copied();
        self.scissor(top);
    }

    pub fn clip_depth(&self) -> usize {
        self.clip_stack.len()
    }

    fn scissor(&mut self, area: Option<ClipArea>) {
        let rect = area.map(|c| self.projection.calc_scissor(c.x1, c.y1, c.x2, c.y2, self.hud, true));
        self.surface.set_scissor(rect);
    }

    pub fn is_fully_clipped(&self, x: f32, y: f32, w: f32, h: f32) -> bool {
        self.clip_stack.last().is_some_and(|c| c.is_fully_clipped(x, y, w, h))
    }
}

/// Draw every shown window of the world rooted at `root`, back to front
pub fn draw_world(tree: &WidgetTree, root: WidgetId, ctx: &mut DrawContext<'_>) {
    for &win in tree.children(root) {
        draw_window(tree, win, ctx);
    }
}

pub fn draw_window(tree: &WidgetTree, id: WidgetId, ctx: &mut DrawContext<'_>) {
    let Some(node) = tree.get(id) else {
        return;
    };
    let WidgetKind::Window(w) = &node.kind else {
        return;
    };
    if node.state.contains(StateFlags::HIDDEN) {
        return;
    }
    ctx.set_projection(Projection {
        px: w.px,
        py: w.py,
        pw: w.pw,
        ph: w.ph,
    });
    draw_children(tree, id, node.x, node.y, ctx);
}

fn draw_children(tree: &WidgetTree, id: WidgetId, sx: f32, sy: f32, ctx: &mut DrawContext<'_>) {
    draw_child_range(tree, tree.children(id), sx, sy, ctx);
}

fn draw_child_range(tree: &WidgetTree, children: &[WidgetId], sx: f32, sy: f32, ctx: &mut DrawContext<'_>) {
    for &c in children {
        let o = &tree[c];
        if !ctx.is_fully_clipped(sx + o.x, sy + o.y, o.w, o.h) {
            draw(tree, c, sx + o.x, sy + o.y, ctx);
        }
    }
}

/// Draw `id` with its top-left corner at `(sx, sy)`
pub fn draw(tree: &WidgetTree, id: WidgetId, sx: f32, sy: f32, ctx: &mut DrawContext<'_>) {
    let node = &tree[id];
    let (w, h) = (node.w, node.h);
    match &node.kind {
        WidgetKind::FillColor { color, blend, .. } => {
            ctx.surface.fill_rect(sx, sy, w, h, *color, *blend);
            draw_children(tree, id, sx, sy, ctx);
        }
        WidgetKind::Gradient {
            blend,
            horizontal,
            color,
            color2,
            ..
        } => {
            ctx.surface.gradient(sx, sy, w, h, *horizontal, *color, *color2, *blend);
            draw_children(tree, id, sx, sy, ctx);
        }
        WidgetKind::Line { color, .. } => {
            ctx.surface.line(sx, sy, sx + w, sy + h, *color);
            draw_children(tree, id, sx, sy, ctx);
        }
        WidgetKind::Outline { color, .. } => {
            ctx.surface.outline(sx, sy, w, h, *color);
            draw_children(tree, id, sx, sy, ctx);
        }
        WidgetKind::Image(img) => {
            if !img.tex.is_missing() {
                draw_image(img, sx, sy, w, h, ctx.surface);
            }
            draw_children(tree, id, sx, sy, ctx);
        }
        WidgetKind::Triangle(t) => {
            draw_children(tree, id, sx, sy, ctx);
            let at = |p: [f32; 2]| [sx + p[0], sy + p[1]];
            ctx.surface.triangle([at(t.a), at(t.b), at(t.c)], t.color, t.mode);
        }
        WidgetKind::Circle(c) => {
            draw_children(tree, id, sx, sy, ctx);
            let r = c.effective_radius(w, h);
            ctx.surface.circle(sx + r, sy + r, r, c.color, c.mode);
        }
        WidgetKind::Text(t) => {
            draw_children(tree, id, sx, sy, ctx);
            let k = t.scale / ctx.metrics.line_height().max(f32::EPSILON);
            let wrap = (t.wrap >= 0.0).then(|| t.wrap / k);
            ctx.surface.text(sx, sy, &t.text, k, t.color, wrap);
        }
        WidgetKind::Editor(e) => {
            draw_children(tree, id, sx, sy, ctx);
            let k = e.scale / ctx.metrics.line_height().max(f32::EPSILON);
            let (cw, _) = ctx.metrics.bounds("0", None);
            let lh = ctx.metrics.line_height();
            let focused = ctx.focus == Some(id);
            if focused {
                if let Some((from, to)) = e.edit.selection() {
                    let x = sx + (cw / 2.0 + from as f32 * cw) * k;
                    ctx.surface
                        .fill_rect(x, sy, (to - from) as f32 * cw * k, lh * k, Color::rgba(0xA0, 0x80, 0x80, 0xFF), Blend::Alpha);
                }
            }
            ctx.surface.text(sx + cw / 2.0 * k, sy, e.edit.text(), k, Color::WHITE, None);
            if focused {
                let x = sx + (cw / 2.0 + e.edit.cursor() as f32 * cw) * k;
                ctx.surface.line(x, sy, x, sy + lh * k, Color::WHITE);
            }
        }
        WidgetKind::Console(_) => {
            draw_children(tree, id, sx, sy, ctx);
            draw_console(sx, sy, w, h, ctx);
        }
        WidgetKind::TableHeader(_) => {
            // Header decorations sit behind the column cells
            let columns = node.kind.child_columns(node.children.len()).min(node.children.len());
            draw_child_range(tree, &node.children[columns..], sx, sy, ctx);
            draw_child_range(tree, &node.children[..columns], sx, sy, ctx);
        }
        WidgetKind::Clipper(c) => {
            if c.overflows() {
                ctx.push_clip(sx, sy, w, h);
                draw_children(tree, id, sx, sy, ctx);
                ctx.pop_clip();
            } else {
                draw_children(tree, id, sx, sy, ctx);
            }
        }
        WidgetKind::Scroller(s) => {
            if s.clip.overflows() {
                ctx.push_clip(sx, sy, w, h);
                draw_children(tree, id, sx - s.offsetx, sy - s.offsety, ctx);
                ctx.pop_clip();
            } else {
                draw_children(tree, id, sx - s.offsetx, sy - s.offsety, ctx);
            }
        }
        WidgetKind::Window(_) => draw_window(tree, id, ctx),
        _ => draw_children(tree, id, sx, sy, ctx),
    }
}

fn draw_image(img: &ImageData, sx: f32, sy: f32, w: f32, h: f32, surface: &mut dyn DrawSurface) {
    let tex = &img.tex;
    match &img.style {
        ImageStyle::Plain => surface.textured_quad(sx, sy, w, h, tex, [0.0, 0.0, 1.0, 1.0]),
        ImageStyle::Cropped { x, y, w: cw, h: ch } => surface.textured_quad(sx, sy, w, h, tex, [*x, *y, *cw, *ch]),
        ImageStyle::Stretched => {
            // Corners keep their size; the middle row and column stretch
            let splitw = if img.fill.minw > 0.0 { img.fill.minw.min(w) } else { w } / 2.0;
            let splith = if img.fill.minh > 0.0 { img.fill.minh.min(h) } else { h } / 2.0;
            let rows = stretch_spans(h, splith);
            let cols = stretch_spans(w, splitw);
            nine_patch(surface, tex, sx, sy, &rows, &cols);
        }
        ImageStyle::Bordered { texborder, screenborder } => {
            let spans = [
                (*screenborder, *texborder),
                (0.0, 1.0 - 2.0 * texborder),
                (*screenborder, *texborder),
            ];
            let mut rows = spans;
            rows[1].0 = h - 2.0 * screenborder;
            let mut cols = spans;
            cols[1].0 = w - 2.0 * screenborder;
            nine_patch(surface, tex, sx, sy, &rows, &cols);
        }
        ImageStyle::Tiled { tilew, tileh } => {
            if *tilew <= 0.0 || *tileh <= 0.0 {
                return;
            }
            if tex.clamp {
                let mut dy = 0.0;
                while dy < h {
                    let dh = tileh.min(h - dy);
                    let mut dx = 0.0;
                    while dx < w {
                        let dw = tilew.min(w - dx);
                        surface.textured_quad(sx + dx, sy + dy, dw, dh, tex, [0.0, 0.0, dw / tilew, dh / tileh]);
                        dx += tilew;
                    }
                    dy += tileh;
                }
            } else {
                surface.textured_quad(sx, sy, w, h, tex, [0.0, 0.0, w / tilew, h / tileh]);
            }
        }
    }
}

/// Screen and texture extents of the three bands of a stretched image.
/// When the box is too small for two halves the first band takes it all.
fn stretch_spans(size: f32, split: f32) -> [(f32, f32); 3] {
    if split < size - split {
        [(split, 0.5), (size - 2.0 * split, 0.0), (split, 0.5)]
    } else {
        [(size, 1.0), (0.0, 0.0), (0.0, 0.0)]
    }
}

fn nine_patch(
    surface: &mut dyn DrawSurface,
    tex: &Texture,
    sx: f32,
    sy: f32,
    rows: &[(f32, f32); 3],
    cols: &[(f32, f32); 3],
) {
    let (mut vy, mut ty) = (sy, 0.0);
    for &(vh, th) in rows {
        let (mut vx, mut tx) = (sx, 0.0);
        for &(vw, tw) in cols {
            if vw > 0.0 && vh > 0.0 {
                surface.textured_quad(vx, vy, vw, vh, tex, [tx, ty, tw, th]);
            }
            vx += vw;
            tx += tw;
        }
        vy += vh;
        ty += th;
    }
}

fn draw_console(sx: f32, sy: f32, w: f32, h: f32, ctx: &mut DrawContext<'_>) {
    let Some((console, view)) = ctx.console else {
        return;
    };
    let metrics = ctx.metrics;
    let visible = console.visible_lines(&view, w, h, metrics, ctx.now);
    let mut y = sy;
    for line in visible.lines {
        ctx.surface.text(sx, y, &line.text, 1.0, Color::WHITE, Some(w));
        y += metrics.bounds(&line.text, Some(w)).1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::buffer::ConsoleType;
    use crate::script::{Code, NativeRuntime, Value};
    use crate::ui::build::UiBuilder;
    use crate::ui::kind::{TextureCache, WindowData};
    use crate::ui::layout::{self, LayoutEnv};
    use crate::ui::text::MonoMetrics;

    const METRICS: MonoMetrics = MonoMetrics {
        char_width: 1.0,
        line_height: 1.0,
    };

    fn drawn(code: Code, textures: &TextureCache) -> (DrawList, usize) {
        let mut tree = WidgetTree::new();
        let root = tree.root();
        let win = tree.insert(WidgetKind::Window(WindowData::new("t", Code::Exit, Code::Exit, Code::Exit)));
        tree[root].children.push(win);
        tree[win].parent = Some(root);
        let mut rt = NativeRuntime::new();
        UiBuilder::new(&mut tree, textures, Some(win), 1.0).build_children(&mut rt, win, &code);
        let env = LayoutEnv {
            metrics: &METRICS,
            hud_w: 100.0,
            hud_h: 100.0,
        };
        layout::layout(&mut tree, root, &env);
        layout::adjust_children(&mut tree, root, &env);

        let mut list = DrawList::default();
        let depth = {
            let mut ctx = DrawContext::new(&mut list, &METRICS, (100, 100), 0);
            draw_world(&tree, root, &mut ctx);
            ctx.clip_depth()
        };
        (list, depth)
    }

    #[test]
    fn test_projection_and_scissor_flip() {
        let proj = Projection {
            px: 0.0,
            py: 0.0,
            pw: 2.0,
            ph: 1.0,
        };
        assert_eq!(proj.to_screen(1.0, 0.5), (0.5, 0.5));
        // Top-left quarter of the window, in bottom-left pixel space
        let s = proj.calc_scissor(0.0, 0.0, 1.0, 0.5, (200, 100), true);
        assert_eq!(s, Scissor { x1: 0, y1: 50, x2: 100, y2: 100 });
        let wide = proj.calc_scissor(-1.0, 0.0, 3.0, 1.0, (200, 100), true);
        assert_eq!((wide.x1, wide.x2), (0, 200));
        assert_eq!(proj.calc_above_hud(0.25), 0.25);
    }

    #[test]
    fn test_clip_stack_intersects_and_restores() {
        let mut list = DrawList::default();
        let mut ctx = DrawContext::new(&mut list, &METRICS, (100, 100), 0);
        ctx.set_projection(Projection {
            px: 0.0,
            py: 0.0,
            pw: 1.0,
            ph: 1.0,
        });
        assert!(!ctx.is_fully_clipped(5.0, 5.0, 1.0, 1.0));
        ctx.push_clip(0.0, 0.0, 0.5, 0.5);
        ctx.push_clip(0.25, 0.25, 1.0, 1.0);
        assert!(ctx.is_fully_clipped(0.5, 0.0, 0.1, 0.1));
        assert!(!ctx.is_fully_clipped(0.3, 0.3, 0.1, 0.1));
        ctx.pop_clip();
        ctx.pop_clip();
        assert_eq!(ctx.clip_depth(), 0);
        drop(ctx);
        assert_eq!(list.commands.last(), Some(&DrawCommand::Scissor { rect: None }));
        let inner = list.commands.iter().filter_map(|c| match c {
            DrawCommand::Scissor { rect: Some(r) } => Some(*r),
            _ => None,
        });
        assert_eq!(
            inner.collect::<Vec<_>>()[1],
            Scissor {
                x1: 25,
                y1: 50,
                x2: 50,
                y2: 75
            }
        );
    }

    #[test]
    fn test_fill_draws_before_children_and_shapes_after() {
        let textures = TextureCache::default();
        let (list, _) = drawn(
            Code::build(|rt, ui| {
                ui.color(
                    rt,
                    0xFF0000,
                    1.0,
                    1.0,
                    &Code::build(|rt, ui| {
                        ui.circle(
                            rt,
                            0x00FF00,
                            0.5,
                            ShapeMode::Solid,
                            &Code::build(|rt, ui| {
                                ui.text(rt, &Value::from("x"), 1.0, &Code::Exit);
                                Value::Null
                            }),
                        );
                        Value::Null
                    }),
                );
                Value::Null
            }),
            &textures,
        );
        let ops: Vec<&str> = list
            .commands
            .iter()
            .map(|c| match c {
                DrawCommand::Projection(_) => "proj",
                DrawCommand::Fill { .. } => "fill",
                DrawCommand::Circle { .. } => "circle",
                DrawCommand::Text { .. } => "text",
                _ => "other",
            })
            .collect();
        assert_eq!(ops, vec!["proj", "fill", "text", "circle"]);
    }

    #[test]
    fn test_overflowing_scroller_clips_and_skips_hidden_rows() {
        let textures = TextureCache::default();
        let (list, depth) = drawn(
            Code::build(|rt, ui| {
                ui.scroll(
                    rt,
                    0.0,
                    1.0,
                    &Code::build(|rt, ui| {
                        ui.vlist(
                            rt,
                            0.0,
                            &Code::build(|rt, ui| {
                                for s in ["a", "b", "c"] {
                                    ui.text(rt, &Value::from(s), 1.0, &Code::Exit);
                                }
                                Value::Null
                            }),
                        );
                        Value::Null
                    }),
                );
                Value::Null
            }),
            &textures,
        );
        assert_eq!(depth, 0);
        assert_eq!(list.texts().collect::<Vec<_>>(), vec!["a"]);
        assert!(matches!(list.commands.last(), Some(DrawCommand::Scissor { rect: None })));
    }

    #[test]
    fn test_missing_texture_draws_only_children() {
        let textures = TextureCache::default();
        let (list, _) = drawn(
            Code::build(|rt, ui| {
                ui.image(
                    rt,
                    "nope.png",
                    1.0,
                    1.0,
                    &Code::build(|rt, ui| {
                        ui.text(rt, &Value::from("fallback"), 1.0, &Code::Exit);
                        Value::Null
                    }),
                );
                Value::Null
            }),
            &textures,
        );
        assert!(!list.commands.iter().any(|c| matches!(c, DrawCommand::Quad { .. })));
        assert_eq!(list.texts().collect::<Vec<_>>(), vec!["fallback"]);
    }

    #[test]
    fn test_bordered_image_emits_nine_quads() {
        let mut textures = TextureCache::default();
        textures.register(Texture::new("frame.png", 16, 16));
        let (list, _) = drawn(
            Code::build(|rt, ui| {
                ui.bordered_image(rt, "frame.png", &Value::Float(0.25), 0.1, &Code::build(|rt, ui| {
                    ui.fill(rt, 1.0, 1.0, &Code::Exit);
                    Value::Null
                }));
                Value::Null
            }),
            &textures,
        );
        let quads: Vec<[f32; 4]> = list
            .commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Quad { uv, .. } => Some(*uv),
                _ => None,
            })
            .collect();
        assert_eq!(quads.len(), 9);
        assert_eq!(quads[4], [0.25, 0.25, 0.5, 0.5]);
    }

    #[test]
    fn test_console_widget_shows_recent_lines() {
        let mut console = ConsoleBuffer::new(10);
        console.append(ConsoleType::INFO, "first", 0);
        console.append(ConsoleType::INFO, "second", 0);
        console.append(ConsoleType::INFO, "third", 0);

        let textures = TextureCache::default();
        let mut tree = WidgetTree::new();
        let root = tree.root();
        let win = tree.insert(WidgetKind::Window(WindowData::new("c", Code::Exit, Code::Exit, Code::Exit)));
        tree[root].children.push(win);
        tree[win].parent = Some(root);
        let mut rt = NativeRuntime::new();
        let code = Code::build(|rt, ui| {
            ui.console(rt, 10.0, 2.0, &Code::Exit);
            Value::Null
        });
        UiBuilder::new(&mut tree, &textures, Some(win), 1.0).build_children(&mut rt, win, &code);
        let env = LayoutEnv {
            metrics: &METRICS,
            hud_w: 100.0,
            hud_h: 100.0,
        };
        layout::layout(&mut tree, root, &env);
        layout::adjust_children(&mut tree, root, &env);

        let mut list = DrawList::default();
        let view = ConsoleView {
            skip: 0,
            fade_secs: 0,
            filter: ConsoleType::all(),
        };
        let mut ctx = DrawContext::new(&mut list, &METRICS, (100, 100), 0).with_console(&console, view);
        draw_world(&tree, root, &mut ctx);
        drop(ctx);
        assert_eq!(list.texts().collect::<Vec<_>>(), vec!["second", "third"]);
    }
}
