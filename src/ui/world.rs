//! The window registry and per-frame driver
//!
//! [`Interface`] owns the widget arena. Windows are created once by name and
//! live detached in the arena while hidden; showing one appends it to the
//! world's children, which are drawn back to front and hit-tested front to
//! back.

use std::collections::HashMap;

use tracing::debug;

use super::build::UiBuilder;
use super::draw::{self, DrawContext, DrawSurface, Projection};
use super::kind::{TextureCache, WidgetKind, WindowData};
use super::layout::{self, LayoutEnv};
use super::propagate::{self, InputEnv};
use super::state::{Adjust, StateFlags};
use super::text::{MonoMetrics, TextMetrics};
use super::tree::{WidgetId, WidgetTree};
use crate::console::buffer::{ConsoleBuffer, ConsoleView};
use crate::core::keys;
use crate::script::{Code, ScriptRuntime};

/// Step intervals and pointer speed taken from the config
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InterfaceSettings {
    pub text_rows: u32,
    pub scroll_step_ms: u32,
    pub slider_step_ms: u32,
    pub sensitivity: f32,
}

impl Default for InterfaceSettings {
    fn default() -> Self {
        Self {
            text_rows: 24,
            scroll_step_ms: 50,
            slider_step_ms: 50,
            sensitivity: 1.0,
        }
    }
}

pub struct Interface {
    tree: WidgetTree,
    windows: HashMap<String, WidgetId>,
    pub textures: TextureCache,
    metrics: Box<dyn TextMetrics>,
    pub settings: InterfaceSettings,
    /// Pointer position, normalized to the HUD
    cursor: (f32, f32),
    /// HUD size in pixels
    hud: (i32, i32),
    now: u64,
    frame_ms: u64,
}

impl Default for Interface {
    fn default() -> Self {
        Self::new(InterfaceSettings::default())
    }
}

impl Interface {
    pub fn new(settings: InterfaceSettings) -> Self {
        Self {
            tree: WidgetTree::new(),
            windows: HashMap::new(),
            textures: TextureCache::default(),
            metrics: Box::new(MonoMetrics::default()),
            settings,
            cursor: (0.5, 0.5),
            hud: (800, 600),
            now: 0,
            frame_ms: 0,
        }
    }

    pub fn set_metrics(&mut self, metrics: Box<dyn TextMetrics>) {
        self.metrics = metrics;
    }

    pub fn set_hud_size(&mut self, width: i32, height: i32) {
        self.hud = (width.max(1), height.max(1));
    }

    pub fn hud_size(&self) -> (i32, i32) {
        self.hud
    }

    pub fn tree(&self) -> &WidgetTree {
        &self.tree
    }

    fn root(&self) -> WidgetId {
        self.tree.root()
    }

    pub fn window(&self, name: &str) -> Option<WidgetId> {
        self.windows.get(name).copied()
    }

    fn window_data(&self, id: WidgetId) -> Option<&WindowData> {
        match &self.tree.get(id)?.kind {
            WidgetKind::Window(w) => Some(w),
            _ => None,
        }
    }

    fn shown_index(&self, id: WidgetId) -> Option<usize> {
        self.tree.children(self.root()).iter().position(|&w| w == id)
    }

    /// Shown windows, back to front
    pub fn shown(&self) -> impl Iterator<Item = &str> + '_ {
        self.tree
            .children(self.root())
            .iter()
            .filter_map(|&w| self.tree.get(w).and_then(|n| n.name()))
    }

    /// Declare a window. An existing window of that name is hidden and
    /// replaced.
    pub fn new_ui(&mut self, rt: &mut dyn ScriptRuntime, name: &str, contents: Code, onshow: Code, onhide: Code) {
        if let Some(old) = self.windows.remove(name) {
            debug!("Replacing window '{}'", name);
            self.hide_id(rt, old);
            self.tree.destroy(old);
        }
        let id = self
            .tree
            .insert(WidgetKind::Window(WindowData::new(name, contents, onshow, onhide)));
        self.windows.insert(name.to_string(), id);
    }

    pub fn show(&mut self, rt: &mut dyn ScriptRuntime, name: &str) -> bool {
        match self.window(name) {
            Some(id) => self.show_id(rt, id),
            None => false,
        }
    }

    fn show_id(&mut self, rt: &mut dyn ScriptRuntime, id: WidgetId) -> bool {
        if self.shown_index(id).is_some() {
            return false;
        }
        let root = self.root();
        self.tree.reset_child_state(id);
        self.tree[root].children.push(id);
        self.tree[id].parent = Some(root);
        // Hidden until its first rebuild
        self.tree[id].state |= StateFlags::HIDDEN;
        self.tree.clear_state(id, StateFlags::HOLD_MASK);
        let onshow = self.window_data(id).map(|w| w.onshow.clone()).unwrap_or_default();
        debug!("Showing window '{}'", self.tree[id].name().unwrap_or_default());
        if !onshow.is_exit() {
            rt.execute(&onshow);
        }
        true
    }

    pub fn hide(&mut self, rt: &mut dyn ScriptRuntime, name: &str) -> bool {
        match self.window(name) {
            Some(id) => self.hide_id(rt, id),
            None => false,
        }
    }

    fn hide_id(&mut self, rt: &mut dyn ScriptRuntime, id: WidgetId) -> bool {
        let Some(index) = self.shown_index(id) else {
            return false;
        };
        let root = self.root();
        self.tree[root].children.remove(index);
        self.tree[id].parent = None;
        let childstate = self
            .tree
            .children(root)
            .iter()
            .fold(StateFlags::empty(), |acc, &w| acc | self.tree[w].state | self.tree[w].childstate);
        self.tree[root].childstate = childstate;
        if self.tree.focus.is_some_and(|f| self.is_under(f, id)) {
            self.tree.focus = None;
        }
        let onhide = self.window_data(id).map(|w| w.onhide.clone()).unwrap_or_default();
        debug!("Hiding window '{}'", self.tree[id].name().unwrap_or_default());
        if !onhide.is_exit() {
            rt.execute(&onhide);
        }
        true
    }

    fn is_under(&self, mut node: WidgetId, ancestor: WidgetId) -> bool {
        loop {
            if node == ancestor {
                return true;
            }
            match self.tree.get(node).and_then(|n| n.parent) {
                Some(p) => node = p,
                None => return false,
            }
        }
    }

    /// Show a hidden window or hide a shown one. Returns whether it is shown
    /// afterwards.
    pub fn toggle(&mut self, rt: &mut dyn ScriptRuntime, name: &str) -> bool {
        if self.show(rt, name) {
            return true;
        }
        self.hide(rt, name);
        false
    }

    /// Keep a window shown while `on` holds
    pub fn hold(&mut self, rt: &mut dyn ScriptRuntime, name: &str, on: bool) {
        if on {
            self.show(rt, name);
        } else {
            self.hide(rt, name);
        }
    }

    pub fn visible(&self, name: &str) -> bool {
        self.window(name).is_some_and(|id| self.shown_index(id).is_some())
    }

    /// Hide the topmost window that takes input
    pub fn hide_top(&mut self, rt: &mut dyn ScriptRuntime) -> bool {
        let top = self.tree.children(self.root()).iter().rev().copied().find(|&w| {
            !self.tree[w].state.contains(StateFlags::HIDDEN) && self.window_data(w).is_some_and(|d| d.allowinput)
        });
        match top {
            Some(id) => self.hide_id(rt, id),
            None => false,
        }
    }

    pub fn hide_all(&mut self, rt: &mut dyn ScriptRuntime) -> usize {
        let shown: Vec<WidgetId> = self.tree.children(self.root()).iter().rev().copied().collect();
        shown.into_iter().filter(|&w| self.hide_id(rt, w)).count()
    }

    /// Any shown window takes input
    pub fn allow_input(&self) -> bool {
        self.tree.children(self.root()).iter().any(|&w| {
            !self.tree[w].state.contains(StateFlags::HIDDEN) && self.window_data(w).is_some_and(|d| d.allowinput)
        })
    }

    /// Lowest fraction of the HUD, from the top, reached by a shown
    /// above-HUD window. 1 when there is none.
    pub fn above_hud(&self) -> f32 {
        self.tree
            .children(self.root())
            .iter()
            .filter(|&&w| !self.tree[w].state.contains(StateFlags::HIDDEN))
            .filter_map(|&w| {
                let d = self.window_data(w)?;
                d.abovehud.then(|| {
                    Projection {
                        px: d.px,
                        py: d.py,
                        pw: d.pw,
                        ph: d.ph,
                    }
                    .calc_above_hud(self.tree[w].y)
                })
            })
            .fold(1.0, f32::min)
    }

    pub fn cursor(&self) -> (f32, f32) {
        self.cursor
    }

    pub fn set_cursor(&mut self, x: f32, y: f32) {
        self.cursor = (x.clamp(0.0, 1.0), y.clamp(0.0, 1.0));
    }

    /// Relative pointer motion in pixels. Ignored unless a window takes
    /// input.
    pub fn move_cursor(&mut self, dx: f32, dy: f32) -> bool {
        if !self.allow_input() {
            return false;
        }
        let s = self.settings.sensitivity;
        let (x, y) = self.cursor;
        self.set_cursor(x + dx * s / self.hud.0 as f32, y + dy * s / self.hud.1 as f32);
        true
    }

    /// Send `flag` from the world, then apply escape-hides it queued
    #[allow(clippy::too_many_arguments)]
    fn dispatch(
        &mut self,
        rt: &mut dyn ScriptRuntime,
        flag: StateFlags,
        mask: StateFlags,
        inside: bool,
        setflags: StateFlags,
    ) -> bool {
        let root = self.root();
        let (cx, cy) = self.cursor;
        let mut env = InputEnv {
            now: self.now,
            frame_ms: self.frame_ms,
            scroll_step_ms: self.settings.scroll_step_ms,
            slider_step_ms: self.settings.slider_step_ms,
            metrics: self.metrics.as_ref(),
            hides: Vec::new(),
        };
        let claimed = propagate::set_state(&mut self.tree, root, flag, cx, cy, mask, inside, setflags, &mut env);
        let InputEnv { hides, .. } = env;
        for id in hides {
            self.hide_id(rt, id);
        }
        claimed
    }

    /// Per-frame input upkeep and rebuild of every shown window
    pub fn update(&mut self, rt: &mut dyn ScriptRuntime, now: u64) {
        self.frame_ms = now.saturating_sub(self.now);
        self.now = now;

        let root = self.root();
        let holding = self.tree[root].childstate & StateFlags::HOLD_MASK;
        self.dispatch(rt, StateFlags::HOVER, holding, true, StateFlags::empty());
        for hold in [StateFlags::HOLD, StateFlags::ALT_HOLD, StateFlags::ESC_HOLD] {
            if self.tree[root].childstate.contains(hold) {
                self.dispatch(rt, hold, hold, false, StateFlags::empty());
            }
        }

        let text_scale = 1.0 / self.settings.text_rows.max(1) as f32;
        let shown: Vec<WidgetId> = self.tree.children(root).to_vec();
        for win in shown {
            let Some(node) = self.tree.get_mut(win) else {
                continue;
            };
            node.reset_layout();
            node.adjust = Adjust::CENTER;
            let WidgetKind::Window(data) = &mut node.kind else {
                continue;
            };
            data.setup();
            let contents = data.contents.clone();
            UiBuilder::new(&mut self.tree, &self.textures, Some(win), text_scale).build_children(rt, win, &contents);
        }
        self.tree.reset_state(root);
    }

    /// Size and place every shown window
    pub fn layout(&mut self) {
        let root = self.root();
        let env = LayoutEnv {
            metrics: self.metrics.as_ref(),
            hud_w: self.hud.0 as f32,
            hud_h: self.hud.1 as f32,
        };
        layout::layout(&mut self.tree, root, &env);
        layout::adjust_children(&mut self.tree, root, &env);
    }

    /// Lay out and draw. `console` feeds console widgets.
    pub fn render(&mut self, surface: &mut dyn DrawSurface, console: Option<(&ConsoleBuffer, ConsoleView)>) {
        self.layout();
        let root = self.root();
        let mut ctx = DrawContext::new(surface, self.metrics.as_ref(), self.hud, self.now);
        ctx.console = console;
        ctx.focus = self.tree.focus;
        draw::draw_world(&self.tree, root, &mut ctx);
    }

    /// Key or mouse button. Returns true when the UI consumed it.
    pub fn key_press(
        &mut self,
        rt: &mut dyn ScriptRuntime,
        code: i32,
        down: bool,
        key_name: &dyn Fn(i32) -> Option<String>,
    ) -> bool {
        let root = self.root();
        if propagate::raw_key(&mut self.tree, root, code, down, key_name) {
            return true;
        }
        let (action, hold) = match code {
            keys::MOUSE_LEFT => (
                if down { StateFlags::PRESS } else { StateFlags::RELEASE },
                StateFlags::HOLD,
            ),
            keys::MOUSE_MIDDLE => (
                if down { StateFlags::ALT_PRESS } else { StateFlags::ALT_RELEASE },
                StateFlags::ALT_HOLD,
            ),
            keys::MOUSE_RIGHT => (
                if down { StateFlags::ESC_PRESS } else { StateFlags::ESC_RELEASE },
                StateFlags::ESC_HOLD,
            ),
            keys::MOUSE_WHEEL_UP => (StateFlags::SCROLL_UP, StateFlags::empty()),
            keys::MOUSE_WHEEL_DOWN => (StateFlags::SCROLL_DOWN, StateFlags::empty()),
            _ => return propagate::key(&mut self.tree, root, code, down),
        };
        if down {
            if !hold.is_empty() {
                self.tree.clear_state(root, hold);
            }
            if self.dispatch(rt, action, StateFlags::empty(), true, action | hold) {
                return true;
            }
        } else if !hold.is_empty() {
            let claimed = self.dispatch(rt, action, hold, true, action);
            let root = self.root();
            self.tree.clear_state(root, hold);
            if claimed {
                return true;
            }
        }
        self.allow_input()
    }

    /// Typed text for the focused editor
    pub fn text_input(&mut self, text: &str) -> bool {
        let root = self.root();
        propagate::text_input(&mut self.tree, root, text)
    }

    /// A text editor has keyboard focus
    pub fn has_focus(&self) -> bool {
        self.tree.focus.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{NativeRuntime, Value};
    use crate::ui::draw::{DrawCommand, DrawList};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn no_names(_: i32) -> Option<String> {
        None
    }

    fn button_ui(ui: &mut Interface, rt: &mut NativeRuntime, name: &str, clicks: Rc<RefCell<u32>>) {
        let contents = Code::build(move |rt, b| {
            if b.next_state(StateFlags::RELEASE) {
                *clicks.borrow_mut() += 1;
            }
            b.target(rt, 1.0, 1.0, &Code::Exit);
            Value::Null
        });
        ui.new_ui(rt, name, contents, Code::Exit, Code::Exit);
    }

    #[test]
    fn test_show_hide_toggle() {
        let mut rt = NativeRuntime::new();
        let mut ui = Interface::default();
        ui.new_ui(&mut rt, "main", Code::Exit, Code::source("shown"), Code::source("hidden"));
        assert!(!ui.visible("main"));
        assert!(ui.show(&mut rt, "main"));
        assert!(!ui.show(&mut rt, "main"));
        assert!(ui.visible("main"));
        assert!(ui.hide(&mut rt, "main"));
        assert!(!ui.hide(&mut rt, "main"));
        assert!(ui.toggle(&mut rt, "main"));
        assert!(!ui.toggle(&mut rt, "main"));
        assert!(!ui.show(&mut rt, "missing"));
        assert_eq!(rt.executed, vec!["shown", "hidden", "shown", "hidden"]);
    }

    #[test]
    fn test_shown_window_hidden_until_first_build() {
        let mut rt = NativeRuntime::new();
        let mut ui = Interface::default();
        ui.new_ui(&mut rt, "main", Code::Exit, Code::Exit, Code::Exit);
        ui.show(&mut rt, "main");
        let id = ui.window("main").unwrap();
        assert!(ui.tree()[id].state.contains(StateFlags::HIDDEN));
        assert!(!ui.allow_input());
        ui.update(&mut rt, 16);
        assert!(!ui.tree()[id].state.contains(StateFlags::HIDDEN));
        assert!(ui.allow_input());
    }

    #[test]
    fn test_new_ui_replaces_and_hides_old() {
        let mut rt = NativeRuntime::new();
        let mut ui = Interface::default();
        ui.new_ui(&mut rt, "main", Code::Exit, Code::Exit, Code::source("bye"));
        ui.show(&mut rt, "main");
        let old = ui.window("main").unwrap();
        ui.new_ui(&mut rt, "main", Code::Exit, Code::Exit, Code::Exit);
        assert_ne!(ui.window("main"), Some(old));
        assert!(ui.tree().get(old).is_none());
        assert!(!ui.visible("main"));
        assert_eq!(rt.executed, vec!["bye"]);
    }

    #[test]
    fn test_hide_top_and_hide_all() {
        let mut rt = NativeRuntime::new();
        let mut ui = Interface::default();
        for name in ["a", "b", "c"] {
            ui.new_ui(&mut rt, name, Code::Exit, Code::Exit, Code::Exit);
            ui.show(&mut rt, name);
        }
        ui.update(&mut rt, 16);
        assert!(ui.hide_top(&mut rt));
        assert_eq!(ui.shown().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(ui.hide_all(&mut rt), 2);
        assert!(!ui.hide_top(&mut rt));
    }

    #[test]
    fn test_click_reaches_target_and_release_is_seen_on_rebuild() {
        let mut rt = NativeRuntime::new();
        let mut ui = Interface::default();
        ui.set_hud_size(100, 100);
        let clicks = Rc::new(RefCell::new(0));
        button_ui(&mut ui, &mut rt, "btn", clicks.clone());
        ui.show(&mut rt, "btn");
        ui.update(&mut rt, 0);
        ui.layout();

        // The 1x1 window fills the square HUD
        ui.set_cursor(0.5, 0.5);
        assert!(ui.key_press(&mut rt, keys::MOUSE_LEFT, true, &no_names));
        let root = ui.tree().root();
        assert!(ui.tree()[root].childstate.contains(StateFlags::HOLD));
        assert!(ui.key_press(&mut rt, keys::MOUSE_LEFT, false, &no_names));
        assert!(!ui.tree()[root].childstate.contains(StateFlags::HOLD));
        ui.update(&mut rt, 16);
        assert_eq!(*clicks.borrow(), 1);
        ui.update(&mut rt, 32);
        assert_eq!(*clicks.borrow(), 1);
    }

    #[test]
    fn test_escape_release_hides_window() {
        let mut rt = NativeRuntime::new();
        let mut ui = Interface::default();
        ui.set_hud_size(100, 100);
        button_ui(&mut ui, &mut rt, "btn", Rc::new(RefCell::new(0)));
        ui.show(&mut rt, "btn");
        ui.update(&mut rt, 0);
        ui.layout();
        ui.key_press(&mut rt, keys::MOUSE_RIGHT, true, &no_names);
        ui.key_press(&mut rt, keys::MOUSE_RIGHT, false, &no_names);
        assert!(!ui.visible("btn"));
    }

    #[test]
    fn test_cursor_motion_needs_input_window() {
        let mut rt = NativeRuntime::new();
        let mut ui = Interface::default();
        ui.set_hud_size(100, 100);
        assert!(!ui.move_cursor(10.0, 0.0));
        ui.new_ui(&mut rt, "m", Code::Exit, Code::Exit, Code::Exit);
        ui.show(&mut rt, "m");
        ui.update(&mut rt, 0);
        assert!(ui.move_cursor(10.0, -100.0));
        let (x, y) = ui.cursor();
        assert!((x - 0.6).abs() < 1e-6);
        assert_eq!(y, 0.0);
    }

    #[test]
    fn test_render_projects_each_window() {
        let mut rt = NativeRuntime::new();
        let mut ui = Interface::default();
        ui.set_hud_size(200, 100);
        ui.new_ui(
            &mut rt,
            "m",
            Code::build(|rt, b| {
                b.color(rt, 0xFFFFFF, 0.5, 0.5, &Code::Exit);
                Value::Null
            }),
            Code::Exit,
            Code::Exit,
        );
        ui.show(&mut rt, "m");
        ui.update(&mut rt, 0);
        let mut list = DrawList::default();
        ui.render(&mut list, None);
        assert!(matches!(list.commands[0], DrawCommand::Projection(p) if p.pw == 2.0 && p.ph == 1.0));
        assert!(list.commands.iter().any(|c| matches!(c, DrawCommand::Fill { .. })));
    }
}
