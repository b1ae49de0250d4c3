//! Two-pass layout
//!
//! `layout` runs bottom-up and gives every widget its natural size with
//! children parked at their local origin. `adjust_layout` then runs top-down:
//! the parent hands each child a slot, the child aligns (or clamps) itself
//! inside it and places its own children.

use super::kind::{Orientation, WidgetKind};
use super::state::{Adjust, StateFlags};
use super::text::TextMetrics;
use super::tree::{WidgetId, WidgetTree};

/// What layout needs from the outside world
pub struct LayoutEnv<'a> {
    pub metrics: &'a dyn TextMetrics,
    /// Output surface size in pixels, for the window aspect ratio
    pub hud_w: f32,
    pub hud_h: f32,
}

impl LayoutEnv<'_> {
    fn aspect(&self) -> f32 {
        if self.hud_h > 0.0 {
            self.hud_w / self.hud_h
        } else {
            1.0
        }
    }
}

fn child_at(tree: &WidgetTree, id: WidgetId, i: usize) -> WidgetId {
    tree.children(id)[i]
}

/// Natural size of `id` and everything under it
pub fn layout(tree: &mut WidgetTree, id: WidgetId, env: &LayoutEnv<'_>) {
    let node = &tree[id];
    match &node.kind {
        WidgetKind::Window(_) if node.state.contains(StateFlags::HIDDEN) => {
            let node = &mut tree[id];
            node.w = 0.0;
            node.h = 0.0;
        }
        WidgetKind::HorizontalList(l) => {
            let space = l.space;
            layout_list(tree, id, Orientation::Horizontal, space, env);
        }
        WidgetKind::VerticalList(l) => {
            let space = l.space;
            layout_list(tree, id, Orientation::Vertical, space, env);
        }
        WidgetKind::Grid(g) => {
            let (columns, spacew, spaceh) = (g.columns, g.spacew, g.spaceh);
            layout_grid(tree, id, columns, spacew, spaceh, env);
        }
        WidgetKind::Table(t) => {
            let (spacew, spaceh) = (t.spacew, t.spaceh);
            layout_table(tree, id, spacew, spaceh, env);
        }
        WidgetKind::Spacer { spacew, spaceh } => {
            let (spacew, spaceh) = (*spacew, *spaceh);
            let (mut w, mut h) = (spacew, spaceh);
            for i in 0..tree.children(id).len() {
                let c = child_at(tree, id, i);
                tree[c].x = spacew;
                tree[c].y = spaceh;
                layout(tree, c, env);
                let child = &tree[c];
                w = w.max(child.x + child.w);
                h = h.max(child.y + child.h);
            }
            let node = &mut tree[id];
            node.w = w + spacew;
            node.h = h + spaceh;
        }
        WidgetKind::Offsetter { offsetx, offsety } => {
            let (offsetx, offsety) = (*offsetx, *offsety);
            layout_default(tree, id, env);
            for i in 0..tree.children(id).len() {
                let c = child_at(tree, id, i);
                tree[c].x += offsetx;
                tree[c].y += offsety;
            }
            let node = &mut tree[id];
            node.w += offsetx;
            node.h += offsety;
        }
        WidgetKind::Text(t) => {
            let k = t.scale / env.metrics.line_height().max(f32::EPSILON);
            let wrap = (t.wrap >= 0.0).then(|| t.wrap / k);
            let (tw, th) = env.metrics.bounds(&t.text, wrap);
            layout_default(tree, id, env);
            let node = &mut tree[id];
            node.w = node.w.max(tw * k);
            node.h = node.h.max(th * k);
        }
        WidgetKind::Editor(e) => {
            let lh = env.metrics.line_height().max(f32::EPSILON);
            let k = e.scale / lh;
            let chars = if e.length > 0 {
                e.length as usize
            } else {
                e.edit.text().chars().count()
            };
            let (cw, _) = env.metrics.bounds("0", None);
            let (tw, th) = ((chars as f32 * cw + cw) * k, lh * k);
            layout_default(tree, id, env);
            let node = &mut tree[id];
            node.w = node.w.max(tw);
            node.h = node.h.max(th);
        }
        WidgetKind::Clipper(_) | WidgetKind::Scroller(_) => layout_clipper(tree, id, env),
        kind => match kind.filler() {
            Some(fill) => {
                layout_default(tree, id, env);
                let node = &mut tree[id];
                node.w = node.w.max(fill.minw);
                node.h = node.h.max(fill.minh);
            }
            None => layout_default(tree, id, env),
        },
    }
}

/// Bounding box of the children laid out at the origin
fn layout_default(tree: &mut WidgetTree, id: WidgetId, env: &LayoutEnv<'_>) {
    let (mut w, mut h) = (0.0f32, 0.0f32);
    for i in 0..tree.children(id).len() {
        let c = child_at(tree, id, i);
        tree[c].x = 0.0;
        tree[c].y = 0.0;
        layout(tree, c, env);
        let child = &tree[c];
        w = w.max(child.x + child.w);
        h = h.max(child.y + child.h);
    }
    let node = &mut tree[id];
    node.w = w;
    node.h = h;
}

fn layout_list(tree: &mut WidgetTree, id: WidgetId, orientation: Orientation, space: f32, env: &LayoutEnv<'_>) {
    let n = tree.children(id).len();
    let (mut sub, mut cross) = (0.0f32, 0.0f32);
    for i in 0..n {
        let c = child_at(tree, id, i);
        match orientation {
            Orientation::Horizontal => {
                tree[c].x = sub;
                tree[c].y = 0.0;
            }
            Orientation::Vertical => {
                tree[c].x = 0.0;
                tree[c].y = sub;
            }
        }
        layout(tree, c, env);
        let child = &tree[c];
        match orientation {
            Orientation::Horizontal => {
                sub += child.w;
                cross = cross.max(child.y + child.h);
            }
            Orientation::Vertical => {
                sub += child.h;
                cross = cross.max(child.x + child.w);
            }
        }
    }
    let along = sub + space * n.saturating_sub(1) as f32;
    let node = &mut tree[id];
    match (&mut node.kind, orientation) {
        (WidgetKind::HorizontalList(l), Orientation::Horizontal) | (WidgetKind::VerticalList(l), Orientation::Vertical) => {
            l.subw = sub;
        }
        _ => {}
    }
    match orientation {
        Orientation::Horizontal => {
            node.w = along;
            node.h = cross;
        }
        Orientation::Vertical => {
            node.w = cross;
            node.h = along;
        }
    }
}

fn layout_grid(tree: &mut WidgetTree, id: WidgetId, columns: i32, spacew: f32, spaceh: f32, env: &LayoutEnv<'_>) {
    let columns = columns.max(1) as usize;
    let mut widths: Vec<f32> = Vec::new();
    let mut heights: Vec<f32> = Vec::new();
    for i in 0..tree.children(id).len() {
        let c = child_at(tree, id, i);
        layout(tree, c, env);
        let (column, row) = (i % columns, i / columns);
        let child = &tree[c];
        match widths.get_mut(column) {
            Some(w) => *w = w.max(child.w),
            None => widths.push(child.w),
        }
        match heights.get_mut(row) {
            Some(h) => *h = h.max(child.h),
            None => heights.push(child.h),
        }
    }
    let subw: f32 = widths.iter().sum();
    let subh: f32 = heights.iter().sum();
    let w = subw + spacew * widths.len().saturating_sub(1) as f32;
    let h = subh + spaceh * heights.len().saturating_sub(1) as f32;
    let node = &mut tree[id];
    node.w = w;
    node.h = h;
    if let WidgetKind::Grid(g) = &mut node.kind {
        g.subw = subw;
        g.subh = subh;
        g.widths = widths;
        g.heights = heights;
    }
}

fn layout_table(tree: &mut WidgetTree, id: WidgetId, spacew: f32, spaceh: f32, env: &LayoutEnv<'_>) {
    let n = tree.children(id).len();
    let mut widths: Vec<f32> = Vec::new();
    let (mut w, mut subh) = (0.0f32, 0.0f32);
    for i in 0..n {
        let row = child_at(tree, id, i);
        layout(tree, row, env);
        let cells = tree.children(row);
        let cols = tree[row].kind.child_columns(cells.len()).min(cells.len());
        if widths.len() < cols {
            widths.resize(cols, 0.0);
        }
        for (j, &cell) in cells[..cols].iter().enumerate() {
            widths[j] = widths[j].max(tree[cell].w);
        }
        w = w.max(tree[row].w);
        subh += tree[row].h;
    }
    let subw: f32 = widths.iter().sum();
    let w = w.max(subw + spacew * widths.len().saturating_sub(1) as f32);
    let h = subh + spaceh * n.saturating_sub(1) as f32;
    let node = &mut tree[id];
    node.w = w;
    node.h = h;
    if let WidgetKind::Table(t) = &mut node.kind {
        t.subw = subw;
        t.subh = subh;
        t.widths = widths;
    }
}

fn layout_clipper(tree: &mut WidgetTree, id: WidgetId, env: &LayoutEnv<'_>) {
    layout_default(tree, id, env);
    let node = &mut tree[id];
    let (w, h) = (node.w, node.h);
    let clip = match &mut node.kind {
        WidgetKind::Clipper(c) => c,
        WidgetKind::Scroller(s) => &mut s.clip,
        _ => return,
    };
    clip.virtw = w;
    clip.virth = h;
    let (clipw, cliph) = (clip.clipw, clip.cliph);
    if clipw != 0.0 {
        node.w = w.min(clipw);
    }
    if cliph != 0.0 {
        node.h = h.min(cliph);
    }
    let (w, h) = (node.w, node.h);
    if let WidgetKind::Scroller(s) = &mut node.kind {
        s.offsetx = s.offsetx.min(s.hlimit(w));
        s.offsety = s.offsety.min(s.vlimit(h));
    }
}

/// Place `id` inside the slot `(px, py, pw, ph)` of its parent, then its
/// children inside it
pub fn adjust_layout(tree: &mut WidgetTree, id: WidgetId, px: f32, py: f32, pw: f32, ph: f32, env: &LayoutEnv<'_>) {
    let node = &mut tree[id];
    let adjust = node.adjust;

    let h = adjust.horizontal();
    if h == Adjust::LEFT {
        node.x = px;
    } else if h == Adjust::HCENTER {
        node.x = px + (pw - node.w) / 2.0;
    } else if h == Adjust::RIGHT {
        node.x = px + pw - node.w;
    }

    let v = adjust.vertical();
    if v == Adjust::TOP {
        node.y = py;
    } else if v == Adjust::VCENTER {
        node.y = py + (ph - node.h) / 2.0;
    } else if v == Adjust::BOTTOM {
        node.y = py + ph - node.h;
    }

    if adjust.contains(Adjust::CLAMP_LEFT) {
        node.w += node.x - px;
        node.x = px;
    }
    if adjust.contains(Adjust::CLAMP_RIGHT) {
        node.w = px + pw - node.x;
    }
    if adjust.contains(Adjust::CLAMP_TOP) {
        node.h += node.y - py;
        node.y = py;
    }
    if adjust.contains(Adjust::CLAMP_BOTTOM) {
        node.h = py + ph - node.y;
    }

    adjust_children(tree, id, env);
}

/// Give every child the same slot
fn adjust_children_to(tree: &mut WidgetTree, id: WidgetId, px: f32, py: f32, pw: f32, ph: f32, env: &LayoutEnv<'_>) {
    for i in 0..tree.children(id).len() {
        let c = child_at(tree, id, i);
        adjust_layout(tree, c, px, py, pw, ph, env);
    }
}

/// Size the window's projection box to the surface aspect ratio and
/// place it inside
pub fn adjust_window(tree: &mut WidgetTree, id: WidgetId, env: &LayoutEnv<'_>) {
    let aspect = env.aspect();
    let node = &mut tree[id];
    let ph = node.h.max(node.w / aspect).max(1.0);
    let pw = aspect * ph;
    if let WidgetKind::Window(win) = &mut node.kind {
        win.pw = pw;
        win.ph = ph;
    }
    adjust_layout(tree, id, 0.0, 0.0, pw, ph, env);
}

/// Top-down placement of the children of `id`
pub fn adjust_children(tree: &mut WidgetTree, id: WidgetId, env: &LayoutEnv<'_>) {
    let node = &tree[id];
    let (w, h) = (node.w, node.h);
    match &node.kind {
        WidgetKind::World => {
            for i in 0..tree.children(id).len() {
                let win = child_at(tree, id, i);
                adjust_window(tree, win, env);
            }
        }
        WidgetKind::Window(_) if node.state.contains(StateFlags::HIDDEN) => {}
        WidgetKind::HorizontalList(l) | WidgetKind::VerticalList(l) => {
            let horizontal = matches!(node.kind, WidgetKind::HorizontalList(_));
            let sub = l.subw;
            adjust_list(tree, id, horizontal, sub, env);
        }
        WidgetKind::Grid(g) => {
            let g = g.clone();
            let n = tree.children(id).len();
            if n == 0 {
                return;
            }
            let columns = g.columns.max(1) as usize;
            let cols = g.widths.len().max(1);
            let rows = g.heights.len().max(1);
            let cspace = (w - g.subw) / cols.saturating_sub(1).max(1) as f32;
            let cstep = (w - g.subw) / cols as f32;
            let rspace = (h - g.subh) / rows.saturating_sub(1).max(1) as f32;
            let rstep = (h - g.subh) / rows as f32;
            let (mut offsetx, mut sx, mut offsety, mut sy) = (0.0, 0.0, 0.0, 0.0);
            for i in 0..n {
                let (column, row) = (i % columns, i / columns);
                let (cw, rh) = (
                    g.widths.get(column).copied().unwrap_or(0.0),
                    g.heights.get(row).copied().unwrap_or(0.0),
                );
                let c = child_at(tree, id, i);
                tree[c].x = offsetx;
                tree[c].y = offsety;
                adjust_layout(tree, c, sx, sy, cw + cstep, rh + rstep, env);
                offsetx += cw + cspace;
                sx += cw + cstep;
                if column + 1 == columns {
                    offsetx = 0.0;
                    sx = 0.0;
                    offsety += rh + rspace;
                    sy += rh + rstep;
                }
            }
        }
        WidgetKind::Table(t) => {
            let t = t.clone();
            adjust_table(tree, id, &t, env);
        }
        WidgetKind::TableHeader(r) | WidgetKind::TableRow(r) => {
            // Cells are placed by the table; the rest fill the row
            let columns = r.columns.max(0) as usize;
            for i in columns..tree.children(id).len() {
                let c = child_at(tree, id, i);
                adjust_layout(tree, c, 0.0, 0.0, w, h, env);
            }
        }
        WidgetKind::Spacer { spacew, spaceh } => {
            let (sw, sh) = (*spacew, *spaceh);
            adjust_children_to(tree, id, sw, sh, w - 2.0 * sw, h - 2.0 * sh, env);
        }
        WidgetKind::Offsetter { offsetx, offsety } => {
            let (ox, oy) = (*offsetx, *offsety);
            adjust_children_to(tree, id, ox, oy, w - ox, h - oy, env);
        }
        WidgetKind::Clipper(c) | WidgetKind::Scroller(super::kind::ScrollerData { clip: c, .. }) => {
            let (vw, vh) = (c.virtw, c.virth);
            adjust_children_to(tree, id, 0.0, 0.0, vw, vh, env);
        }
        WidgetKind::ScrollBar(sb) => {
            let orientation = sb.orientation;
            place_scroll_button(tree, id, orientation);
            adjust_children_to(tree, id, 0.0, 0.0, w, h, env);
        }
        WidgetKind::Slider(s) => {
            let s = s.clone();
            place_slider_button(tree, id, &s);
            adjust_children_to(tree, id, 0.0, 0.0, w, h, env);
        }
        _ => adjust_children_to(tree, id, 0.0, 0.0, w, h, env),
    }
}

fn adjust_list(tree: &mut WidgetTree, id: WidgetId, horizontal: bool, sub: f32, env: &LayoutEnv<'_>) {
    let n = tree.children(id).len();
    if n == 0 {
        return;
    }
    let (w, h) = (tree[id].w, tree[id].h);
    let extent = if horizontal { w } else { h };
    let space = (extent - sub) / n.saturating_sub(1).max(1) as f32;
    let step = (extent - sub) / n as f32;
    let (mut offset, mut s) = (0.0, 0.0);
    for i in 0..n {
        let c = child_at(tree, id, i);
        if horizontal {
            tree[c].x = offset;
            let size = tree[c].w + step;
            offset += tree[c].w + space;
            adjust_layout(tree, c, s, 0.0, size, h, env);
            s += size;
        } else {
            tree[c].y = offset;
            let size = tree[c].h + step;
            offset += tree[c].h + space;
            adjust_layout(tree, c, 0.0, s, w, size, env);
            s += size;
        }
    }
}

fn adjust_table(tree: &mut WidgetTree, id: WidgetId, t: &super::kind::TableData, env: &LayoutEnv<'_>) {
    let n = tree.children(id).len();
    if n == 0 {
        return;
    }
    let (w, h) = (tree[id].w, tree[id].h);
    let cols = t.widths.len().max(1);
    let cspace = (w - t.subw) / cols.saturating_sub(1).max(1) as f32;
    let cstep = (w - t.subw) / cols as f32;
    let rspace = (h - t.subh) / n.saturating_sub(1).max(1) as f32;
    let rstep = (h - t.subh) / n as f32;
    let (mut offsety, mut sy) = (0.0, 0.0);
    for i in 0..n {
        let row = child_at(tree, id, i);
        let rh = tree[row].h;
        tree[row].x = 0.0;
        tree[row].y = offsety;
        tree[row].w = w;
        offsety += rh + rspace;
        let sh = rh + rstep;
        adjust_layout(tree, row, 0.0, sy, w, sh, env);
        sy += sh;

        let row_h = tree[row].h;
        let cells = tree.children(row).len();
        let ncols = tree[row].kind.child_columns(cells).min(cells);
        let (mut offsetx, mut sx) = (0.0, 0.0);
        for j in 0..ncols {
            let cell = child_at(tree, row, j);
            let cw = t.widths.get(j).copied().unwrap_or(0.0);
            tree[cell].x = offsetx;
            offsetx += cw + cspace;
            let sw = cw + cstep;
            adjust_layout(tree, cell, sx, 0.0, sw, row_h, env);
            sx += sw;
        }
    }
}

/// Size and place the scroll button from the paired scroller's view
fn place_scroll_button(tree: &mut WidgetTree, id: WidgetId, orientation: Orientation) {
    let Some(scroller) = tree.find_sibling(id, "#Scroller") else {
        return;
    };
    let Some(button) = tree.find(id, "#ScrollButton", false, None) else {
        return;
    };
    let (sw, sh) = (tree[scroller].w, tree[scroller].h);
    let WidgetKind::Scroller(s) = tree[scroller].kind.clone() else {
        return;
    };
    let (w, h) = (tree[id].w, tree[id].h);
    let b = &mut tree[button];
    match orientation {
        Orientation::Horizontal => {
            let scale = s.hscale(sw);
            b.w = b.w.max(w * scale);
            let bscale = if scale < 1.0 { (w - b.w) / (1.0 - scale) } else { 1.0 };
            b.x = s.hoffset(sw) * bscale;
            b.adjust.remove(Adjust::HMASK);
        }
        Orientation::Vertical => {
            let scale = s.vscale(sh);
            b.h = b.h.max(h * scale);
            let bscale = if scale < 1.0 { (h - b.h) / (1.0 - scale) } else { 1.0 };
            b.y = s.voffset(sh) * bscale;
            b.adjust.remove(Adjust::VMASK);
        }
    }
}

/// Put the slider button on the step nearest the current value
fn place_slider_button(tree: &mut WidgetTree, id: WidgetId, s: &super::kind::SliderData) {
    let Some(button) = tree.find(id, "#SliderButton", false, None) else {
        return;
    };
    let (w, h) = (tree[id].w, tree[id].h);
    let range = s.vmax - s.vmin;
    let frac = if range != 0.0 {
        (s.step_index() as f64 * s.vstep / range).clamp(0.0, 1.0) as f32
    } else {
        0.0
    };
    let b = &mut tree[button];
    match s.orientation {
        Orientation::Horizontal => {
            b.x = (w - b.w).max(0.0) * frac;
            b.adjust.remove(Adjust::HMASK);
        }
        Orientation::Vertical => {
            b.y = (h - b.h).max(0.0) * frac;
            b.adjust.remove(Adjust::VMASK);
        }
    }
}
