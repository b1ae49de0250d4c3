//! Pointer state propagation and keyboard routing
//!
//! One routine drives all twelve propagated flags. It walks children
//! topmost-first, translating the cursor into each child's space, lets
//! every visited widget claim the flag through its hit test and then runs
//! the widget's handler for that flag. Each parent folds what its children
//! claimed into `childstate` on the way back up.

use super::kind::{EditorFlavor, Orientation, WidgetKind};
use super::state::StateFlags;
use super::text::TextMetrics;
use super::tree::{WidgetId, WidgetTree};
use crate::core::keys;

/// Per-dispatch timing and side-effect sink
pub struct InputEnv<'a> {
    /// Current time in milliseconds
    pub now: u64,
    /// Duration of the current frame in milliseconds
    pub frame_ms: u64,
    pub scroll_step_ms: u32,
    pub slider_step_ms: u32,
    pub metrics: &'a dyn TextMetrics,
    /// Windows closed by escape-release, applied once propagation is done
    pub hides: Vec<WidgetId>,
}

/// Propagate `flag` from `id` down. Returns whether `id` or anything below
/// it now holds the flag.
#[allow(clippy::too_many_arguments)]
pub fn set_state(
    tree: &mut WidgetTree,
    id: WidgetId,
    flag: StateFlags,
    cx: f32,
    cy: f32,
    mask: StateFlags,
    inside: bool,
    setflags: StateFlags,
    env: &mut InputEnv<'_>,
) -> bool {
    propagate(tree, id, flag, cx, cy, mask, inside, setflags | flag, env);
    tree.get(id).is_some_and(|n| n.has_child_state(flag))
}

#[allow(clippy::too_many_arguments)]
fn propagate(
    tree: &mut WidgetTree,
    id: WidgetId,
    flag: StateFlags,
    mut cx: f32,
    mut cy: f32,
    mask: StateFlags,
    inside: bool,
    setflags: StateFlags,
    env: &mut InputEnv<'_>,
) {
    let Some(node) = tree.get(id) else {
        return;
    };
    match &node.kind {
        WidgetKind::World => {
            // Topmost window first; the first one to claim anything wins
            for i in (0..node.children.len()).rev() {
                let Some(win) = tree.children(id).get(i).copied() else {
                    continue;
                };
                if !tree[win].has_all(mask) {
                    continue;
                }
                propagate(tree, win, flag, cx, cy, mask, inside, setflags, env);
                let claimed = (tree[win].state | tree[win].childstate) & setflags;
                if !claimed.is_empty() {
                    tree[id].childstate |= claimed;
                    break;
                }
            }
        }
        WidgetKind::Window(w) => {
            if !w.allowinput || node.state.contains(StateFlags::HIDDEN) || w.pw <= 0.0 || w.ph <= 0.0 {
                return;
            }
            // Cursor arrives normalized to the surface
            cx = cx * w.pw + w.px - node.x;
            cy = cy * w.ph + w.py - node.y;
            if !inside || (cx >= 0.0 && cy >= 0.0 && cx < node.w && cy < node.h) {
                propagate_object(tree, id, flag, cx, cy, mask, inside, setflags, env);
            }
        }
        WidgetKind::Scroller(s) => {
            cx += s.offsetx;
            cy += s.offsety;
            if cx < s.clip.virtw && cy < s.clip.virth {
                propagate_object(tree, id, flag, cx, cy, mask, inside, setflags, env);
            }
        }
        _ => propagate_object(tree, id, flag, cx, cy, mask, inside, setflags, env),
    }
}

#[allow(clippy::too_many_arguments)]
fn propagate_object(
    tree: &mut WidgetTree,
    id: WidgetId,
    flag: StateFlags,
    cx: f32,
    cy: f32,
    mask: StateFlags,
    inside: bool,
    setflags: StateFlags,
    env: &mut InputEnv<'_>,
) {
    for i in (0..tree.children(id).len()).rev() {
        let Some(c) = tree.children(id).get(i).copied() else {
            continue;
        };
        let child = &tree[c];
        if !child.has_all(mask) {
            continue;
        }
        let (mut ox, mut oy) = (cx - child.x, cy - child.y);
        if !inside {
            ox = ox.clamp(0.0, child.w.max(0.0));
            oy = oy.clamp(0.0, child.h.max(0.0));
        } else if !(ox >= 0.0 && ox < child.w && oy >= 0.0 && oy < child.h) {
            continue;
        }
        propagate(tree, c, flag, ox, oy, mask, inside, setflags, env);
        let claimed = (tree[c].state | tree[c].childstate) & setflags;
        tree[id].childstate |= claimed;
    }

    let node = &mut tree[id];
    if node.kind.target(cx, cy, node.w, node.h) {
        node.state |= setflags;
    }
    handle(tree, id, flag, cx, cy, env);
}

/// Per-variant reaction to a flag reaching the widget
fn handle(tree: &mut WidgetTree, id: WidgetId, flag: StateFlags, cx: f32, cy: f32, env: &mut InputEnv<'_>) {
    match &tree[id].kind {
        WidgetKind::Window(w) => {
            if flag == StateFlags::ESC_RELEASE && w.eschide && !env.hides.contains(&id) {
                env.hides.push(id);
            }
        }
        WidgetKind::Scroller(_) => {
            let dir = match flag {
                f if f == StateFlags::SCROLL_UP => -1.0,
                f if f == StateFlags::SCROLL_DOWN => 1.0,
                _ => return,
            };
            if let Some(bar) = tree.find_sibling(id, "#ScrollBar") {
                let wheel = match &tree[bar].kind {
                    WidgetKind::ScrollBar(sb) => sb.orientation.wheel_direction(),
                    _ => return,
                };
                wheel_scroll(tree, bar, dir * wheel, env);
            }
        }
        WidgetKind::ScrollBar(_) => {
            if flag == StateFlags::PRESS {
                scrollbar_press(tree, id, cx, cy);
            } else if flag == StateFlags::HOLD {
                scrollbar_hold(tree, id, cx, cy);
            }
        }
        WidgetKind::ScrollArrow { arrowspeed } => {
            if flag == StateFlags::HOLD {
                let speed = *arrowspeed;
                if let Some(bar) = tree.find_sibling(id, "#ScrollBar") {
                    add_scroll(tree, bar, speed * env.frame_ms as f32 / 1000.0);
                }
            }
        }
        WidgetKind::Slider(s) => {
            let wheel = s.orientation.wheel_direction() as f64;
            if flag == StateFlags::SCROLL_UP {
                slider_wheel(tree, id, -wheel);
            } else if flag == StateFlags::SCROLL_DOWN {
                slider_wheel(tree, id, wheel);
            } else if flag == StateFlags::HOLD {
                slider_scroll_to(tree, id, cx, cy);
            }
        }
        WidgetKind::SliderArrow(a) => {
            let step_ms = env.slider_step_ms as u64;
            let (stepdir, laststep) = (a.stepdir, a.laststep);
            let next = if flag == StateFlags::PRESS {
                // First repeat waits two intervals
                env.now + 2 * step_ms
            } else if flag == StateFlags::HOLD {
                if env.now < laststep + step_ms {
                    return;
                }
                env.now
            } else {
                return;
            };
            if let WidgetKind::SliderArrow(a) = &mut tree[id].kind {
                a.laststep = next;
            }
            if let Some(slider) = tree.find_sibling(id, "#Slider") {
                if let WidgetKind::Slider(s) = &mut tree[slider].kind {
                    s.arrow_scroll(stepdir);
                }
            }
        }
        WidgetKind::Editor(_) => {
            if flag == StateFlags::PRESS {
                editor_press(tree, id, cx, cy);
            } else if flag == StateFlags::HOLD {
                editor_hold(tree, id, cx, cy, env.metrics);
            }
        }
        _ => {}
    }
}

/// Find the scroller paired with `bar` and its view geometry
fn paired_scroller(tree: &WidgetTree, bar: WidgetId) -> Option<WidgetId> {
    tree.find_sibling(bar, "#Scroller")
}

fn bar_orientation(tree: &WidgetTree, bar: WidgetId) -> Option<Orientation> {
    match &tree.get(bar)?.kind {
        WidgetKind::ScrollBar(sb) => Some(sb.orientation),
        _ => None,
    }
}

/// Scroll the paired scroller by `dir` along the bar's axis
pub fn add_scroll(tree: &mut WidgetTree, bar: WidgetId, dir: f32) {
    let (Some(orientation), Some(scroller)) = (bar_orientation(tree, bar), paired_scroller(tree, bar)) else {
        return;
    };
    let node = &mut tree[scroller];
    let (w, h) = (node.w, node.h);
    if let WidgetKind::Scroller(s) = &mut node.kind {
        match orientation {
            Orientation::Horizontal => s.set_hscroll(w, s.offsetx + dir),
            Orientation::Vertical => s.set_vscroll(h, s.offsety + dir),
        }
    }
}

/// Wheel step, paced by the sibling arrow's speed
fn wheel_scroll(tree: &mut WidgetTree, bar: WidgetId, step: f32, env: &InputEnv<'_>) {
    let Some(arrow) = tree.find_sibling(bar, "#ScrollArrow") else {
        return;
    };
    if let WidgetKind::ScrollArrow { arrowspeed } = tree[arrow].kind {
        add_scroll(tree, bar, arrowspeed * step * env.scroll_step_ms as f32 / 1000.0);
    }
}

/// Jump the scroller so the button lands under `(cx, cy)`. With `closest`,
/// a point past the button lines up the button's far edge instead.
fn scroll_to(tree: &mut WidgetTree, bar: WidgetId, cx: f32, cy: f32, closest: bool) {
    let Some(orientation) = bar_orientation(tree, bar) else {
        return;
    };
    let Some(scroller) = paired_scroller(tree, bar) else {
        return;
    };
    let Some(button) = tree.find(bar, "#ScrollButton", false, None) else {
        return;
    };
    let (bw, bh, bx, by) = (tree[button].w, tree[button].h, tree[button].x, tree[button].y);
    let (w, h) = (tree[bar].w, tree[bar].h);
    let node = &mut tree[scroller];
    let (sw, sh) = (node.w, node.h);
    let WidgetKind::Scroller(s) = &mut node.kind else {
        return;
    };
    match orientation {
        Orientation::Horizontal => {
            let bscale = (w - bw) / (1.0 - s.hscale(sw));
            let offset = if bscale > 1e-3 {
                (if closest && cx >= bx + bw { cx - bw } else { cx }) / bscale
            } else {
                0.0
            };
            let virtw = s.clip.virtw;
            s.set_hscroll(sw, offset * virtw);
        }
        Orientation::Vertical => {
            let bscale = (h - bh) / (1.0 - s.vscale(sh));
            let offset = if bscale > 1e-3 {
                (if closest && cy >= by + bh { cy - bh } else { cy }) / bscale
            } else {
                0.0
            };
            let virth = s.clip.virth;
            s.set_vscroll(sh, offset * virth);
        }
    }
}

fn scrollbar_press(tree: &mut WidgetTree, bar: WidgetId, cx: f32, cy: f32) {
    let button = tree.find(bar, "#ScrollButton", false, None);
    match button {
        Some(b) if tree[b].has_child_state(StateFlags::PRESS) => {
            let (bx, by) = (tree[b].x, tree[b].y);
            if let WidgetKind::ScrollBar(sb) = &mut tree[bar].kind {
                sb.offsetx = cx - bx;
                sb.offsety = cy - by;
            }
        }
        _ => scroll_to(tree, bar, cx, cy, true),
    }
}

fn scrollbar_hold(tree: &mut WidgetTree, bar: WidgetId, cx: f32, cy: f32) {
    let Some(b) = tree.find(bar, "#ScrollButton", false, None) else {
        return;
    };
    if !tree[b].has_child_state(StateFlags::HOLD) {
        return;
    }
    let WidgetKind::ScrollBar(sb) = &tree[bar].kind else {
        return;
    };
    let (fromx, fromy) = (sb.offsetx, sb.offsety);
    let (bx, by) = (tree[b].x, tree[b].y);
    // Drag keeps the grab point under the cursor
    let (tox, toy) = (cx - bx, cy - by);
    scroll_to(tree, bar, bx + tox - fromx, by + toy - fromy, false);
}

fn slider_wheel(tree: &mut WidgetTree, slider: WidgetId, mut step: f64) {
    if let Some(arrow) = tree.find_sibling(slider, "#SliderArrow") {
        if let WidgetKind::SliderArrow(a) = &tree[arrow].kind {
            step *= a.stepdir;
        }
    }
    if let WidgetKind::Slider(s) = &mut tree[slider].kind {
        s.arrow_scroll(step);
    }
}

/// Move the slider to the step under the cursor
fn slider_scroll_to(tree: &mut WidgetTree, slider: WidgetId, cx: f32, cy: f32) {
    let Some(button) = tree.find(slider, "#SliderButton", false, None) else {
        return;
    };
    let (bw, bh) = (tree[button].w, tree[button].h);
    let node = &mut tree[slider];
    let (w, h) = (node.w, node.h);
    let WidgetKind::Slider(s) = &mut node.kind else {
        return;
    };
    let offset = match s.orientation {
        Orientation::Horizontal if w > bw => ((cx - bw / 2.0) / (w - bw)).clamp(0.0, 1.0),
        Orientation::Vertical if h > bh => ((cy - bh / 2.0) / (h - bh)).clamp(0.0, 1.0),
        _ => 0.0,
    } as f64;
    let target = (offset * (s.vmax - s.vmin) / s.vstep).round() as i64;
    if target != s.step_index() {
        let val = s.step_value(target);
        s.change(val);
    }
}

fn editor_press(tree: &mut WidgetTree, id: WidgetId, cx: f32, cy: f32) {
    tree.focus = Some(id);
    if let WidgetKind::Editor(e) = &mut tree[id].kind {
        if e.flavor == EditorFlavor::KeyField {
            e.edit.clear();
        }
        e.edit.set_mark(false);
        e.offsetx = cx;
        e.offsety = cy;
    }
}

fn editor_hold(tree: &mut WidgetTree, id: WidgetId, cx: f32, cy: f32, metrics: &dyn TextMetrics) {
    if tree.focus != Some(id) {
        return;
    }
    let WidgetKind::Editor(e) = &mut tree[id].kind else {
        return;
    };
    let lh = metrics.line_height().max(f32::EPSILON);
    let (cw, _) = metrics.bounds("0", None);
    let k = e.scale / lh;
    if k <= 0.0 || cw <= 0.0 {
        return;
    }
    let dragged = (cx - e.offsetx).abs().max((cy - e.offsety).abs()) > lh / 8.0 * k;
    let col = ((cx / k - cw / 2.0) / cw).floor() as i32;
    e.edit.hit(col, dragged);
}

/// Leave the editor, keeping its text. A field writes it back on the next
/// rebuild.
pub fn commit(tree: &mut WidgetTree, id: WidgetId) {
    if tree.focus == Some(id) {
        tree.focus = None;
    }
    if let Some(WidgetKind::Editor(e)) = tree.get_mut(id).map(|n| &mut n.kind) {
        if let Some(field) = &mut e.field {
            field.changed = true;
        }
    }
}

/// Leave the editor and drop the edit
pub fn cancel(tree: &mut WidgetTree, id: WidgetId) {
    if tree.focus == Some(id) {
        tree.focus = None;
    }
    if let Some(WidgetKind::Editor(e)) = tree.get_mut(id).map(|n| &mut n.kind) {
        if let Some(field) = &mut e.field {
            field.changed = false;
        }
    }
}

/// Raw key, before any text translation. Only key fields use it, to record
/// the names of keys as they are pressed.
pub fn raw_key(
    tree: &mut WidgetTree,
    id: WidgetId,
    code: i32,
    down: bool,
    key_name: &dyn Fn(i32) -> Option<String>,
) -> bool {
    for i in (0..tree.children(id).len()).rev() {
        let Some(c) = tree.children(id).get(i).copied() else {
            continue;
        };
        if raw_key(tree, c, code, down, key_name) {
            return true;
        }
    }
    let focused = tree.focus == Some(id);
    let Some(WidgetKind::Editor(e)) = tree.get_mut(id).map(|n| &mut n.kind) else {
        return false;
    };
    if e.flavor != EditorFlavor::KeyField || !focused || !down {
        return false;
    }
    if code == keys::ESCAPE {
        commit(tree, id);
    } else if let Some(name) = key_name(code) {
        if !e.edit.is_empty() {
            e.edit.insert(" ");
        }
        e.edit.insert(&name);
    }
    true
}

/// Editing keys for the focused editor
pub fn key(tree: &mut WidgetTree, id: WidgetId, code: i32, down: bool) -> bool {
    for i in (0..tree.children(id).len()).rev() {
        let Some(c) = tree.children(id).get(i).copied() else {
            continue;
        };
        if key(tree, c, code, down) {
            return true;
        }
    }
    if tree.focus != Some(id) {
        return false;
    }
    match code {
        keys::ESCAPE => {
            if down {
                cancel(tree, id);
            }
        }
        keys::RETURN | keys::TAB | keys::KP_ENTER => {
            if down {
                commit(tree, id);
            }
        }
        _ => {
            if down {
                if let WidgetKind::Editor(e) = &mut tree[id].kind {
                    e.edit.key(code);
                }
            }
        }
    }
    true
}

/// Typed text for the focused editor
pub fn text_input(tree: &mut WidgetTree, id: WidgetId, text: &str) -> bool {
    for i in (0..tree.children(id).len()).rev() {
        let Some(c) = tree.children(id).get(i).copied() else {
            continue;
        };
        if text_input(tree, c, text) {
            return true;
        }
    }
    if tree.focus != Some(id) {
        return false;
    }
    let Some(WidgetKind::Editor(e)) = tree.get_mut(id).map(|n| &mut n.kind) else {
        return false;
    };
    if !e.allows_text_input() {
        return false;
    }
    let filter = e.keyfilter.clone();
    e.edit.input_filtered(text, filter.as_deref());
    true
}
