//! Widget arena
//!
//! All nodes (the world, every window and their descendants) live in one
//! slotmap. Keys carry a generation, so a stale id left over from a node
//! that was rebuilt away simply fails to resolve.

use slotmap::{new_key_type, SlotMap};

use super::kind::WidgetKind;
use super::state::{Adjust, StateFlags};

new_key_type! {
    /// Handle into the widget arena
    pub struct WidgetId;
}

/// One node of the UI tree
#[derive(Clone, Debug)]
pub struct Widget {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub adjust: Adjust,
    pub state: StateFlags,
    pub childstate: StateFlags,
    pub parent: Option<WidgetId>,
    pub children: Vec<WidgetId>,
    pub kind: WidgetKind,
}

impl Widget {
    pub fn new(kind: WidgetKind) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            w: 0.0,
            h: 0.0,
            adjust: Adjust::CENTER,
            state: StateFlags::empty(),
            childstate: StateFlags::empty(),
            parent: None,
            children: Vec::new(),
            kind,
        }
    }

    /// Flags this widget holds itself and not through a child
    pub fn has_state(&self, flags: StateFlags) -> bool {
        (self.state - self.childstate).intersects(flags)
    }

    /// Flags held by this widget or anything below it
    pub fn has_child_state(&self, flags: StateFlags) -> bool {
        (self.state | self.childstate).intersects(flags)
    }

    /// Every bit of `mask` is held here or below
    pub fn has_all(&self, mask: StateFlags) -> bool {
        (self.state | self.childstate).contains(mask)
    }

    pub fn reset_layout(&mut self) {
        self.x = 0.0;
        self.y = 0.0;
        self.w = 0.0;
        self.h = 0.0;
    }

    /// Keep only the hold bits across a rebuild
    pub fn reset_state(&mut self) {
        self.state &= StateFlags::HOLD_MASK;
        self.childstate &= StateFlags::HOLD_MASK;
    }

    /// Window name, for `find` by name
    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            WidgetKind::Window(w) => Some(&w.name),
            _ => None,
        }
    }

    fn is_named(&self, name: &str) -> bool {
        if name.starts_with('#') {
            self.kind.lookup_name() == name
        } else {
            self.name() == Some(name)
        }
    }
}

/// Construct/destroy counters, to check that an unchanged rebuild is free
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub constructed: usize,
    pub destroyed: usize,
}

pub struct WidgetTree {
    nodes: SlotMap<WidgetId, Widget>,
    root: WidgetId,
    /// Text editor that receives keys and text
    pub focus: Option<WidgetId>,
    pub stats: BuildStats,
}

impl Default for WidgetTree {
    fn default() -> Self {
        Self::new()
    }
}

impl WidgetTree {
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(Widget::new(WidgetKind::World));
        Self {
            nodes,
            root,
            focus: None,
            stats: BuildStats::default(),
        }
    }

    /// The world node
    pub fn root(&self) -> WidgetId {
        self.root
    }

    pub fn get(&self, id: WidgetId) -> Option<&Widget> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: WidgetId) -> Option<&mut Widget> {
        self.nodes.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn children(&self, id: WidgetId) -> &[WidgetId] {
        self.nodes.get(id).map_or(&[], |n| n.children.as_slice())
    }

    /// Insert a detached node (windows live here while hidden)
    pub fn insert(&mut self, kind: WidgetKind) -> WidgetId {
        self.stats.constructed += 1;
        self.nodes.insert(Widget::new(kind))
    }

    /// Remove a node and everything under it
    pub fn destroy(&mut self, id: WidgetId) {
        let Some(node) = self.nodes.remove(id) else {
            return;
        };
        self.stats.destroyed += 1;
        if self.focus == Some(id) {
            self.focus = None;
        }
        for child in node.children {
            self.destroy(child);
        }
    }

    /// Reuse the child at `index` if its variant matches `type_name`,
    /// otherwise put a fresh node there. The node's layout is zeroed, its
    /// parent set and its alignment taken from the parent.
    pub fn build_type<F>(&mut self, parent: WidgetId, index: usize, type_name: &str, make: F) -> Option<WidgetId>
    where
        F: FnOnce() -> WidgetKind,
    {
        let align = self.nodes.get(parent)?.kind.child_align();
        let existing = self.nodes[parent].children.get(index).copied();
        let id = match existing {
            Some(old) if self.nodes.get(old).is_some_and(|n| n.kind.type_name() == type_name) => old,
            Some(old) => {
                self.destroy(old);
                let fresh = self.insert(make());
                self.nodes[parent].children[index] = fresh;
                fresh
            }
            None => {
                let fresh = self.insert(make());
                self.nodes[parent].children.push(fresh);
                fresh
            }
        };
        let node = &mut self.nodes[id];
        node.reset_layout();
        node.parent = Some(parent);
        node.adjust = align;
        Some(id)
    }

    /// Drop children past `len`
    pub fn truncate_children(&mut self, id: WidgetId, len: usize) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        if node.children.len() <= len {
            return;
        }
        let surplus = node.children.split_off(len);
        for child in surplus {
            self.destroy(child);
        }
    }

    pub fn reset_state(&mut self, id: WidgetId) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.reset_state();
        }
    }

    /// Reset state on a whole subtree
    pub fn reset_child_state(&mut self, id: WidgetId) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        node.reset_state();
        let children = node.children.clone();
        for child in children {
            self.reset_child_state(child);
        }
    }

    /// Clear `flags` here and in every descendant holding them
    pub fn clear_state(&mut self, id: WidgetId, flags: StateFlags) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        node.state -= flags;
        if !node.childstate.intersects(flags) {
            return;
        }
        let children = node.children.clone();
        for child in children {
            if self.nodes.get(child).is_some_and(|c| c.has_child_state(flags)) {
                self.clear_state(child, flags);
            }
        }
        if let Some(node) = self.nodes.get_mut(id) {
            node.childstate -= flags;
        }
    }

    /// Look for `name` among the children of `id` (then deeper, if
    /// `recurse`), skipping `exclude`. `#Type` names match variants,
    /// plain names match windows.
    pub fn find(&self, id: WidgetId, name: &str, recurse: bool, exclude: Option<WidgetId>) -> Option<WidgetId> {
        let children = self.children(id);
        let found = children
            .iter()
            .copied()
            .find(|&c| Some(c) != exclude && self.nodes.get(c).is_some_and(|n| n.is_named(name)));
        if found.is_some() || !recurse {
            return found;
        }
        children
            .iter()
            .copied()
            .filter(|&c| Some(c) != exclude)
            .find_map(|c| self.find(c, name, true, None))
    }

    /// Nearest match in the enclosing subtrees, searching outward one
    /// ancestor at a time
    pub fn find_sibling(&self, id: WidgetId, name: &str) -> Option<WidgetId> {
        let mut prev = id;
        let mut cur = self.nodes.get(id)?.parent;
        while let Some(p) = cur {
            if let Some(found) = self.find(p, name, true, Some(prev)) {
                return Some(found);
            }
            prev = p;
            cur = self.nodes.get(p)?.parent;
        }
        None
    }

    /// True if `childstate` equals the OR of the children's `state|childstate`
    /// at every node under `id`
    pub fn childstate_consistent(&self, id: WidgetId) -> bool {
        let Some(node) = self.nodes.get(id) else {
            return true;
        };
        let mut expected = StateFlags::empty();
        for &c in &node.children {
            let Some(child) = self.nodes.get(c) else {
                return false;
            };
            expected |= child.state | child.childstate;
            if !self.childstate_consistent(c) {
                return false;
            }
        }
        node.childstate == expected
    }
}

impl std::ops::Index<WidgetId> for WidgetTree {
    type Output = Widget;

    fn index(&self, id: WidgetId) -> &Widget {
        &self.nodes[id]
    }
}

impl std::ops::IndexMut<WidgetId> for WidgetTree {
    fn index_mut(&mut self, id: WidgetId) -> &mut Widget {
        &mut self.nodes[id]
    }
}
