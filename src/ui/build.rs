//! Per-frame tree reconciliation
//!
//! A window's build block runs once per frame with a `UiBuilder`. Each
//! construction call claims the child slot at the build cursor: a node of
//! the same variant is reused with its runtime fields intact, anything else
//! is destroyed and replaced. Slots past the cursor when the block returns
//! are trimmed, so an unchanged block costs no allocations.

use super::kind::{
    pixel_offset, Blend, CircleData, ClipData, Color, EditorData, EditorFlavor, FieldBinding, Filler, GridData,
    ImageData, ImageStyle, ListData, Orientation, RowData, ScrollBarData, ScrollerData, ShapeMode, SliderArrowData,
    SliderData, TableData, TextData, TextValue, TextureCache, TriangleData, WidgetKind,
};
use super::state::StateFlags;
use super::tree::{Widget, WidgetId, WidgetTree};
use crate::script::{Code, ScriptRuntime, Value};

/// Build context handed to build blocks
pub struct UiBuilder<'a> {
    tree: &'a mut WidgetTree,
    textures: &'a TextureCache,
    window: Option<WidgetId>,
    parent: WidgetId,
    child: usize,
    text_scale: f32,
}

impl<'a> UiBuilder<'a> {
    pub fn new(tree: &'a mut WidgetTree, textures: &'a TextureCache, window: Option<WidgetId>, text_scale: f32) -> Self {
        let parent = window.unwrap_or_else(|| tree.root());
        Self {
            tree,
            textures,
            window,
            parent,
            child: 0,
            text_scale,
        }
    }

    /// Widget whose children are being declared
    pub fn parent(&self) -> WidgetId {
        self.parent
    }

    /// Build cursor inside the parent
    pub fn cursor(&self) -> usize {
        self.child
    }

    pub fn tree(&self) -> &WidgetTree {
        self.tree
    }

    /// Run `contents` to declare the children of `id`, then trim the
    /// leftovers. An empty block clears the children without running.
    pub(crate) fn build_children(&mut self, rt: &mut dyn ScriptRuntime, id: WidgetId, contents: &Code) {
        if contents.is_exit() {
            self.tree.truncate_children(id, 0);
        } else {
            let saved = (self.parent, self.child);
            self.parent = id;
            self.child = 0;
            rt.execute_build(contents, self);
            self.tree.truncate_children(id, self.child);
            (self.parent, self.child) = saved;
        }
        self.tree.reset_state(id);
    }

    /// Header/row build: `columns` declares the table cells, `contents`
    /// anything else in the row
    fn build_columns(&mut self, rt: &mut dyn ScriptRuntime, id: WidgetId, columns: &Code, contents: &Code) {
        let saved = (self.parent, self.child);
        self.parent = id;
        self.child = 0;
        rt.execute_build(columns, self);
        let built = self.child as i32;
        let recount = match &mut self.tree[id].kind {
            WidgetKind::TableHeader(row) | WidgetKind::TableRow(row) if row.columns != built => {
                row.columns = built;
                true
            }
            _ => false,
        };
        if recount {
            self.tree.truncate_children(id, self.child);
        }
        if !contents.is_exit() {
            rt.execute_build(contents, self);
        }
        self.tree.truncate_children(id, self.child);
        (self.parent, self.child) = saved;
        self.tree.reset_state(id);
    }

    /// Claim the slot at the cursor for a `type_name` node
    fn claim<F>(&mut self, type_name: &str, make: F) -> Option<WidgetId>
    where
        F: FnOnce() -> WidgetKind,
    {
        let id = self.tree.build_type(self.parent, self.child, type_name, make)?;
        self.child += 1;
        Some(id)
    }

    /// Claim, configure, then build children
    fn node<F, S>(&mut self, rt: &mut dyn ScriptRuntime, type_name: &str, make: F, setup: S, contents: &Code)
    where
        F: FnOnce() -> WidgetKind,
        S: FnOnce(&mut WidgetKind),
    {
        if let Some(id) = self.claim(type_name, make) {
            setup(&mut self.tree[id].kind);
            self.build_children(rt, id, contents);
        }
    }

    // ---- containers ----

    pub fn group(&mut self, rt: &mut dyn ScriptRuntime, contents: &Code) {
        self.node(rt, "#Object", || WidgetKind::Group, |_| {}, contents);
    }

    pub fn hlist(&mut self, rt: &mut dyn ScriptRuntime, space: f32, contents: &Code) {
        self.list_node(rt, Orientation::Horizontal, space, contents);
    }

    pub fn vlist(&mut self, rt: &mut dyn ScriptRuntime, space: f32, contents: &Code) {
        self.list_node(rt, Orientation::Vertical, space, contents);
    }

    /// A list running across the nearest enclosing list: vertical inside a
    /// horizontal list, horizontal otherwise
    pub fn list(&mut self, rt: &mut dyn ScriptRuntime, space: f32, contents: &Code) {
        let mut cur = Some(self.parent);
        let mut vertical = false;
        while let Some(node) = cur.and_then(|id| self.tree.get(id)) {
            match node.kind {
                WidgetKind::VerticalList(_) => break,
                WidgetKind::HorizontalList(_) => {
                    vertical = true;
                    break;
                }
                _ => cur = node.parent,
            }
        }
        if vertical {
            self.vlist(rt, space, contents);
        } else {
            self.hlist(rt, space, contents);
        }
    }

    fn list_node(&mut self, rt: &mut dyn ScriptRuntime, orientation: Orientation, space: f32, contents: &Code) {
        let set = move |k: &mut WidgetKind| {
            if let WidgetKind::HorizontalList(l) | WidgetKind::VerticalList(l) = k {
                l.space = space;
            }
        };
        match orientation {
            Orientation::Horizontal => self.node(
                rt,
                "#HorizontalList",
                || WidgetKind::HorizontalList(ListData::default()),
                set,
                contents,
            ),
            Orientation::Vertical => {
                self.node(rt, "#VerticalList", || WidgetKind::VerticalList(ListData::default()), set, contents)
            }
        }
    }

    pub fn grid(&mut self, rt: &mut dyn ScriptRuntime, columns: i32, spacew: f32, spaceh: f32, contents: &Code) {
        self.node(
            rt,
            "#Grid",
            || WidgetKind::Grid(GridData::default()),
            |k| {
                if let WidgetKind::Grid(g) = k {
                    g.columns = columns;
                    g.spacew = spacew;
                    g.spaceh = spaceh;
                }
            },
            contents,
        );
    }

    pub fn table(&mut self, rt: &mut dyn ScriptRuntime, spacew: f32, spaceh: f32, contents: &Code) {
        self.node(
            rt,
            "#Table",
            || WidgetKind::Table(TableData::default()),
            |k| {
                if let WidgetKind::Table(t) = k {
                    t.spacew = spacew;
                    t.spaceh = spaceh;
                }
            },
            contents,
        );
    }

    pub fn table_header(&mut self, rt: &mut dyn ScriptRuntime, columns: &Code, contents: &Code) {
        if let Some(id) = self.claim("#TableHeader", || WidgetKind::TableHeader(RowData::default())) {
            self.build_columns(rt, id, columns, contents);
        }
    }

    pub fn table_row(&mut self, rt: &mut dyn ScriptRuntime, columns: &Code, contents: &Code) {
        if let Some(id) = self.claim("#TableRow", || WidgetKind::TableRow(RowData::default())) {
            self.build_columns(rt, id, columns, contents);
        }
    }

    pub fn space(&mut self, rt: &mut dyn ScriptRuntime, spacew: f32, spaceh: f32, contents: &Code) {
        self.node(
            rt,
            "#Spacer",
            || WidgetKind::Spacer { spacew, spaceh },
            |k| *k = WidgetKind::Spacer { spacew, spaceh },
            contents,
        );
    }

    pub fn offset(&mut self, rt: &mut dyn ScriptRuntime, offsetx: f32, offsety: f32, contents: &Code) {
        self.node(
            rt,
            "#Offsetter",
            || WidgetKind::Offsetter { offsetx, offsety },
            |k| *k = WidgetKind::Offsetter { offsetx, offsety },
            contents,
        );
    }

    pub fn fill(&mut self, rt: &mut dyn ScriptRuntime, minw: f32, minh: f32, contents: &Code) {
        let fill = Filler::new(minw, minh);
        self.node(rt, "#Filler", || WidgetKind::Filler(fill), |k| *k = WidgetKind::Filler(fill), contents);
    }

    pub fn target(&mut self, rt: &mut dyn ScriptRuntime, minw: f32, minh: f32, contents: &Code) {
        let fill = Filler::new(minw, minh);
        self.node(rt, "#Target", || WidgetKind::Target(fill), |k| *k = WidgetKind::Target(fill), contents);
    }

    /// Filler sized in text cells
    pub fn text_fill(&mut self, rt: &mut dyn ScriptRuntime, minw: f32, minh: f32, contents: &Code) {
        let scale = self.text_scale;
        self.fill(rt, minw * scale * 0.5, minh * scale, contents);
    }

    pub fn clip(&mut self, rt: &mut dyn ScriptRuntime, clipw: f32, cliph: f32, contents: &Code) {
        self.node(
            rt,
            "#Clipper",
            || WidgetKind::Clipper(ClipData::default()),
            |k| {
                if let WidgetKind::Clipper(c) = k {
                    *c = ClipData {
                        clipw,
                        cliph,
                        ..ClipData::default()
                    };
                }
            },
            contents,
        );
    }

    pub fn scroll(&mut self, rt: &mut dyn ScriptRuntime, clipw: f32, cliph: f32, contents: &Code) {
        self.node(
            rt,
            "#Scroller",
            || WidgetKind::Scroller(ScrollerData::default()),
            |k| {
                if let WidgetKind::Scroller(s) = k {
                    s.clip = ClipData {
                        clipw,
                        cliph,
                        ..ClipData::default()
                    };
                }
            },
            contents,
        );
    }

    // ---- drawables ----

    pub fn color(&mut self, rt: &mut dyn ScriptRuntime, color: u32, minw: f32, minh: f32, contents: &Code) {
        self.fill_color(rt, Blend::Alpha, color, minw, minh, contents);
    }

    pub fn mod_color(&mut self, rt: &mut dyn ScriptRuntime, color: u32, minw: f32, minh: f32, contents: &Code) {
        self.fill_color(rt, Blend::Modulate, color, minw, minh, contents);
    }

    fn fill_color(&mut self, rt: &mut dyn ScriptRuntime, blend: Blend, color: u32, minw: f32, minh: f32, contents: &Code) {
        let kind = WidgetKind::FillColor {
            fill: Filler::new(minw, minh),
            blend,
            color: Color::from_u32(color),
        };
        let fresh = kind.clone();
        self.node(rt, "#FillColor", move || fresh, move |k| *k = kind, contents);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn gradient(
        &mut self,
        rt: &mut dyn ScriptRuntime,
        blend: Blend,
        horizontal: bool,
        color: u32,
        color2: u32,
        minw: f32,
        minh: f32,
        contents: &Code,
    ) {
        let kind = WidgetKind::Gradient {
            fill: Filler::new(minw, minh),
            blend,
            horizontal,
            color: Color::from_u32(color),
            color2: Color::from_u32(color2),
        };
        let fresh = kind.clone();
        self.node(rt, "#Gradient", move || fresh, move |k| *k = kind, contents);
    }

    pub fn line(&mut self, rt: &mut dyn ScriptRuntime, color: u32, minw: f32, minh: f32, contents: &Code) {
        let kind = WidgetKind::Line {
            fill: Filler::new(minw, minh),
            color: Color::from_u32(color),
        };
        let fresh = kind.clone();
        self.node(rt, "#Line", move || fresh, move |k| *k = kind, contents);
    }

    pub fn outline(&mut self, rt: &mut dyn ScriptRuntime, color: u32, minw: f32, minh: f32, contents: &Code) {
        let kind = WidgetKind::Outline {
            fill: Filler::new(minw, minh),
            color: Color::from_u32(color),
        };
        let fresh = kind.clone();
        self.node(rt, "#Outline", move || fresh, move |k| *k = kind, contents);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn triangle(
        &mut self,
        rt: &mut dyn ScriptRuntime,
        color: u32,
        w: f32,
        h: f32,
        angle: i32,
        mode: ShapeMode,
        contents: &Code,
    ) {
        let tri = TriangleData::new(Color::from_u32(color), w, h, angle, mode);
        self.node(rt, "#Triangle", move || WidgetKind::Triangle(tri), move |k| *k = WidgetKind::Triangle(tri), contents);
    }

    pub fn circle(&mut self, rt: &mut dyn ScriptRuntime, color: u32, size: f32, mode: ShapeMode, contents: &Code) {
        let circle = CircleData {
            fill: Filler::new(size, size),
            color: Color::from_u32(color),
            mode,
            radius: size / 2.0,
        };
        self.node(rt, "#Circle", move || WidgetKind::Circle(circle), move |k| *k = WidgetKind::Circle(circle), contents);
    }

    fn image_node(&mut self, rt: &mut dyn ScriptRuntime, name: &str, fill: Filler, style: ImageStyle, contents: &Code) {
        let tex = self.textures.lookup(name);
        if tex.is_missing() {
            tracing::trace!("Texture '{}' not found, using placeholder", name);
        }
        let data = ImageData { fill, tex, style };
        let type_name = WidgetKind::Image(data.clone()).type_name();
        let fresh = data.clone();
        self.node(
            rt,
            type_name,
            move || WidgetKind::Image(fresh),
            move |k| *k = WidgetKind::Image(data),
            contents,
        );
    }

    pub fn image(&mut self, rt: &mut dyn ScriptRuntime, name: &str, minw: f32, minh: f32, contents: &Code) {
        self.image_node(rt, name, Filler::new(minw, minh), ImageStyle::Plain, contents);
    }

    pub fn stretched_image(&mut self, rt: &mut dyn ScriptRuntime, name: &str, minw: f32, minh: f32, contents: &Code) {
        self.image_node(rt, name, Filler::new(minw, minh), ImageStyle::Stretched, contents);
    }

    /// Crop arguments are fractions of the texture, or `"<n>p"` pixels
    #[allow(clippy::too_many_arguments)]
    pub fn cropped_image(
        &mut self,
        rt: &mut dyn ScriptRuntime,
        name: &str,
        minw: f32,
        minh: f32,
        crop: [&Value; 4],
        contents: &Code,
    ) {
        let tex = self.textures.lookup(name);
        let style = ImageStyle::Cropped {
            x: pixel_offset(crop[0], tex.width),
            y: pixel_offset(crop[1], tex.height),
            w: pixel_offset(crop[2], tex.width),
            h: pixel_offset(crop[3], tex.height),
        };
        self.image_node(rt, name, Filler::new(minw, minh), style, contents);
    }

    pub fn bordered_image(
        &mut self,
        rt: &mut dyn ScriptRuntime,
        name: &str,
        texborder: &Value,
        screenborder: f32,
        contents: &Code,
    ) {
        let tex = self.textures.lookup(name);
        let style = ImageStyle::Bordered {
            texborder: pixel_offset(texborder, tex.width),
            screenborder,
        };
        self.image_node(rt, name, Filler::default(), style, contents);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn tiled_image(
        &mut self,
        rt: &mut dyn ScriptRuntime,
        name: &str,
        tilew: f32,
        tileh: f32,
        minw: f32,
        minh: f32,
        contents: &Code,
    ) {
        let style = ImageStyle::Tiled {
            tilew: if tilew <= 0.0 { 1.0 } else { tilew },
            tileh: if tileh <= 0.0 { 1.0 } else { tileh },
        };
        self.image_node(rt, name, Filler::new(minw, minh), style, contents);
    }

    /// Text from a script value: ints and floats keep their own variants,
    /// an empty value builds a plain group
    pub fn text(&mut self, rt: &mut dyn ScriptRuntime, value: &Value, scale: f32, contents: &Code) {
        self.build_text(rt, value, scale, Color::WHITE, -1.0, contents);
    }

    pub fn color_text(&mut self, rt: &mut dyn ScriptRuntime, value: &Value, color: u32, scale: f32, contents: &Code) {
        self.build_text(rt, value, scale, Color::from_u32(color), -1.0, contents);
    }

    pub fn wrap_text(&mut self, rt: &mut dyn ScriptRuntime, value: &Value, wrap: f32, scale: f32, contents: &Code) {
        self.build_text(rt, value, scale, Color::WHITE, wrap, contents);
    }

    pub fn wrap_color_text(
        &mut self,
        rt: &mut dyn ScriptRuntime,
        value: &Value,
        wrap: f32,
        color: u32,
        scale: f32,
        contents: &Code,
    ) {
        self.build_text(rt, value, scale, Color::from_u32(color), wrap, contents);
    }

    fn build_text(&mut self, rt: &mut dyn ScriptRuntime, value: &Value, scale: f32, color: Color, wrap: f32, contents: &Code) {
        let scale = if scale <= 0.0 { 1.0 } else { scale } * self.text_scale;
        let value = match value {
            Value::Int(i) => TextValue::Int(*i),
            Value::Float(f) => TextValue::Float(*f),
            Value::Str(s) if !s.is_empty() => TextValue::Str(s.clone()),
            _ => return self.group(rt, contents),
        };
        let fresh = TextData {
            text: value.render(),
            value: value.clone(),
            scale,
            color,
            wrap,
        };
        let type_name = WidgetKind::Text(fresh.clone()).type_name();
        self.node(
            rt,
            type_name,
            move || WidgetKind::Text(fresh),
            move |k| {
                if let WidgetKind::Text(t) = k {
                    t.set_value(value);
                    t.scale = scale;
                    t.color = color;
                    t.wrap = wrap;
                }
            },
            contents,
        );
    }

    /// The console scrollback as a widget
    pub fn console(&mut self, rt: &mut dyn ScriptRuntime, minw: f32, minh: f32, contents: &Code) {
        let fill = Filler::new(minw, minh);
        self.node(rt, "#Console", || WidgetKind::Console(fill), |k| *k = WidgetKind::Console(fill), contents);
    }

    // ---- scrolling ----

    pub fn hscrollbar(&mut self, rt: &mut dyn ScriptRuntime, contents: &Code) {
        self.scrollbar(rt, Orientation::Horizontal, contents);
    }

    pub fn vscrollbar(&mut self, rt: &mut dyn ScriptRuntime, contents: &Code) {
        self.scrollbar(rt, Orientation::Vertical, contents);
    }

    fn scrollbar(&mut self, rt: &mut dyn ScriptRuntime, orientation: Orientation, contents: &Code) {
        let fresh = WidgetKind::ScrollBar(ScrollBarData {
            orientation,
            offsetx: 0.0,
            offsety: 0.0,
        });
        let type_name = fresh.type_name();
        self.node(rt, type_name, move || fresh, |_| {}, contents);
    }

    pub fn scroll_arrow(&mut self, rt: &mut dyn ScriptRuntime, arrowspeed: f32, contents: &Code) {
        self.node(
            rt,
            "#ScrollArrow",
            || WidgetKind::ScrollArrow { arrowspeed },
            |k| *k = WidgetKind::ScrollArrow { arrowspeed },
            contents,
        );
    }

    pub fn scroll_button(&mut self, rt: &mut dyn ScriptRuntime, contents: &Code) {
        self.node(rt, "#ScrollButton", || WidgetKind::ScrollButton, |_| {}, contents);
    }

    // ---- sliders ----

    #[allow(clippy::too_many_arguments)]
    pub fn hslider(
        &mut self,
        rt: &mut dyn ScriptRuntime,
        var: &str,
        vmin: f64,
        vmax: f64,
        vstep: f64,
        onchange: &Code,
        contents: &Code,
    ) {
        self.slider(rt, Orientation::Horizontal, var, [vmin, vmax, vstep], onchange, contents);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn vslider(
        &mut self,
        rt: &mut dyn ScriptRuntime,
        var: &str,
        vmin: f64,
        vmax: f64,
        vstep: f64,
        onchange: &Code,
        contents: &Code,
    ) {
        self.slider(rt, Orientation::Vertical, var, [vmin, vmax, vstep], onchange, contents);
    }

    /// Reads the variable into the slider, or, if input moved the slider
    /// since the last rebuild, writes the slider back and runs `onchange`.
    /// A zero range takes the variable's own bounds.
    fn slider(
        &mut self,
        rt: &mut dyn ScriptRuntime,
        orientation: Orientation,
        var: &str,
        [mut vmin, mut vmax, vstep]: [f64; 3],
        onchange: &Code,
        contents: &Code,
    ) {
        let fresh = WidgetKind::Slider(SliderData {
            orientation,
            var: var.to_string(),
            val: 0.0,
            vmin: 0.0,
            vmax: 0.0,
            vstep: 1.0,
            changed: false,
        });
        let Some(id) = self.claim(fresh.type_name(), move || fresh) else {
            return;
        };
        if vmin == 0.0 && vmax == 0.0 {
            if let Some((lo, hi)) = rt.var_bounds(var) {
                vmin = lo as f64;
                vmax = hi as f64;
            }
        }
        if let WidgetKind::Slider(s) = &mut self.tree[id].kind {
            if s.var != var {
                s.changed = false;
                s.var = var.to_string();
            }
            s.vmin = vmin;
            s.vmax = vmax;
            s.vstep = if vstep > 0.0 { vstep } else { 1.0 };
            if s.changed {
                rt.set_var(var, Value::Float(s.val as f32));
                if !onchange.is_exit() {
                    rt.execute(onchange);
                }
                s.changed = false;
            } else {
                s.val = rt.get_var(var).map_or(vmin, |v| v.as_float() as f64);
            }
        }
        self.build_children(rt, id, contents);
    }

    pub fn slider_arrow(&mut self, rt: &mut dyn ScriptRuntime, stepdir: f64, contents: &Code) {
        self.node(
            rt,
            "#SliderArrow",
            || WidgetKind::SliderArrow(SliderArrowData { stepdir, laststep: 0 }),
            |k| {
                if let WidgetKind::SliderArrow(a) = k {
                    a.stepdir = stepdir;
                }
            },
            contents,
        );
    }

    pub fn slider_button(&mut self, rt: &mut dyn ScriptRuntime, contents: &Code) {
        self.node(rt, "#SliderButton", || WidgetKind::SliderButton, |_| {}, contents);
    }

    // ---- text editors ----

    /// Free-standing editor. `initval` seeds a newly created editor only.
    pub fn text_editor(
        &mut self,
        rt: &mut dyn ScriptRuntime,
        length: i32,
        scale: f32,
        initval: Option<&str>,
        contents: &Code,
    ) {
        let scale = if scale <= 0.0 { 1.0 } else { scale } * self.text_scale;
        let init = initval.map(str::to_string);
        let Some(id) = self.claim("#TextEditor", move || {
            let mut data = EditorData::new(EditorFlavor::Plain, length);
            if let Some(text) = init {
                data.edit.init(&text);
            }
            WidgetKind::Editor(data)
        }) else {
            return;
        };
        if self.tree.focus == Some(id) && !self.tree[id].has_state(StateFlags::HOVER) {
            self.tree.focus = None;
        }
        if let WidgetKind::Editor(e) = &mut self.tree[id].kind {
            configure_editor(e, length, scale, None);
        }
        self.build_children(rt, id, contents);
    }

    /// Editor bound to a variable. The committed text is written back, and
    /// `onchange` run, on the rebuild after the commit.
    #[allow(clippy::too_many_arguments)]
    pub fn field(
        &mut self,
        rt: &mut dyn ScriptRuntime,
        var: &str,
        length: i32,
        onchange: &Code,
        scale: f32,
        keyfilter: Option<&str>,
        contents: &Code,
    ) {
        self.field_node(rt, EditorFlavor::Field, var, length, onchange, scale, keyfilter, contents);
    }

    /// Field that records key names instead of typed text
    pub fn key_field(
        &mut self,
        rt: &mut dyn ScriptRuntime,
        var: &str,
        length: i32,
        onchange: &Code,
        scale: f32,
        contents: &Code,
    ) {
        self.field_node(rt, EditorFlavor::KeyField, var, length, onchange, scale, None, contents);
    }

    #[allow(clippy::too_many_arguments)]
    fn field_node(
        &mut self,
        rt: &mut dyn ScriptRuntime,
        flavor: EditorFlavor,
        var: &str,
        length: i32,
        onchange: &Code,
        scale: f32,
        keyfilter: Option<&str>,
        contents: &Code,
    ) {
        let scale = if scale <= 0.0 { 1.0 } else { scale } * self.text_scale;
        let fresh = WidgetKind::Editor(EditorData::new(flavor, length));
        let Some(id) = self.claim(fresh.type_name(), move || fresh) else {
            return;
        };
        let focused = self.tree.focus == Some(id);
        let hovered = self.tree[id].has_state(StateFlags::HOVER);
        let WidgetKind::Editor(e) = &mut self.tree[id].kind else {
            return;
        };
        let field = e.field.get_or_insert_with(|| FieldBinding {
            var: String::new(),
            onchange: Code::Exit,
            changed: false,
        });
        let mut focused = focused;
        if focused && !hovered {
            // Leaving the field commits it
            focused = false;
            field.changed = true;
        }
        if field.changed {
            if field.var == var {
                rt.set_var(var, Value::Str(e.edit.text().to_string()));
                if !onchange.is_exit() {
                    rt.execute(onchange);
                }
            }
            field.changed = false;
        }
        let reload = field.var != var || !focused;
        field.var = var.to_string();
        field.onchange = onchange.clone();
        configure_editor(e, length, scale, keyfilter);
        if reload {
            let current = rt.get_var(var).map(|v| v.to_string()).unwrap_or_default();
            if e.edit.text() != current {
                e.edit.init(&current);
            }
        }
        if !focused && self.tree.focus == Some(id) {
            self.tree.focus = None;
        }
        self.build_children(rt, id, contents);
    }

    // ---- build-context queries ----

    /// Name of the window being built
    pub fn window_name(&self) -> Option<&str> {
        self.window.and_then(|w| self.tree.get(w)).and_then(Widget::name)
    }

    /// The widget under construction holds (or has a child holding) `flags`
    pub fn state(&self, flags: StateFlags) -> bool {
        self.tree.get(self.parent).is_some_and(|n| n.has_child_state(flags))
    }

    /// Same check on the child at the build cursor, as of last frame
    pub fn next_state(&self, flags: StateFlags) -> bool {
        self.next_child()
            .and_then(|c| self.tree.get(c))
            .is_some_and(|n| n.has_child_state(flags))
    }

    /// Run `t` if `state(flags)`, else `f`
    pub fn if_state(&mut self, rt: &mut dyn ScriptRuntime, flags: StateFlags, t: &Code, f: &Code) -> Value {
        let code = if self.state(flags) { t } else { f };
        rt.execute_build(code, self)
    }

    pub fn if_next_state(&mut self, rt: &mut dyn ScriptRuntime, flags: StateFlags, t: &Code, f: &Code) -> Value {
        let code = if self.next_state(flags) { t } else { f };
        rt.execute_build(code, self)
    }

    /// The widget under construction is the focused text editor
    pub fn focused(&self) -> bool {
        self.tree.focus == Some(self.parent)
    }

    pub fn next_focused(&self) -> bool {
        self.next_child().is_some_and(|c| self.tree.focus == Some(c))
    }

    fn next_child(&self) -> Option<WidgetId> {
        self.tree.children(self.parent).get(self.child).copied()
    }

    /// Align the widget under construction
    pub fn align(&mut self, xalign: i32, yalign: i32) {
        self.tree[self.parent].adjust.set_align(xalign, yalign);
    }

    /// Align the most recently built child
    pub fn align_last(&mut self, xalign: i32, yalign: i32) {
        if let Some(id) = self.last_child() {
            self.tree[id].adjust.set_align(xalign, yalign);
        }
    }

    /// Align every child built so far
    pub fn align_all(&mut self, xalign: i32, yalign: i32) {
        for id in self.built_children() {
            self.tree[id].adjust.set_align(xalign, yalign);
        }
    }

    pub fn clamp(&mut self, left: bool, right: bool, top: bool, bottom: bool) {
        self.tree[self.parent].adjust.set_clamp(left, right, top, bottom);
    }

    pub fn clamp_last(&mut self, left: bool, right: bool, top: bool, bottom: bool) {
        if let Some(id) = self.last_child() {
            self.tree[id].adjust.set_clamp(left, right, top, bottom);
        }
    }

    pub fn clamp_all(&mut self, left: bool, right: bool, top: bool, bottom: bool) {
        for id in self.built_children() {
            self.tree[id].adjust.set_clamp(left, right, top, bottom);
        }
    }

    fn last_child(&self) -> Option<WidgetId> {
        self.child
            .checked_sub(1)
            .and_then(|i| self.tree.children(self.parent).get(i).copied())
    }

    fn built_children(&self) -> Vec<WidgetId> {
        let children = self.tree.children(self.parent);
        children[..self.child.min(children.len())].to_vec()
    }

    fn window_flag<F>(&mut self, set: Option<bool>, field: F) -> bool
    where
        F: FnOnce(&mut super::kind::WindowData) -> &mut bool,
    {
        let Some(id) = self.window else {
            return false;
        };
        let WidgetKind::Window(w) = &mut self.tree[id].kind else {
            return false;
        };
        let flag = field(w);
        if let Some(on) = set {
            *flag = on;
        }
        *flag
    }

    /// Whether the window takes pointer input; `Some` sets it first
    pub fn allow_input(&mut self, set: Option<bool>) -> bool {
        self.window_flag(set, |w| &mut w.allowinput)
    }

    /// Whether escape-release hides the window
    pub fn esc_hide(&mut self, set: Option<bool>) -> bool {
        self.window_flag(set, |w| &mut w.eschide)
    }

    /// Whether the window sits above the HUD
    pub fn above_hud(&mut self, set: Option<bool>) -> bool {
        self.window_flag(set, |w| &mut w.abovehud)
    }
}

fn configure_editor(e: &mut EditorData, length: i32, scale: f32, keyfilter: Option<&str>) {
    e.length = length;
    e.scale = scale;
    e.edit.max_len = (length > 0).then_some(length as usize);
    e.keyfilter = keyfilter.map(str::to_string);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::NativeRuntime;
    use crate::ui::kind::WindowData;

    fn window_tree(name: &str) -> (WidgetTree, WidgetId) {
        let mut tree = WidgetTree::new();
        let win = tree.insert(WidgetKind::Window(WindowData::new(name, Code::Exit, Code::Exit, Code::Exit)));
        let root = tree.root();
        tree[root].children.push(win);
        tree[win].parent = Some(root);
        (tree, win)
    }

    fn run(tree: &mut WidgetTree, win: WidgetId, rt: &mut NativeRuntime, code: &Code) {
        let textures = TextureCache::default();
        let mut ui = UiBuilder::new(tree, &textures, Some(win), 1.0);
        ui.build_children(rt, win, code);
    }

    #[test]
    fn test_unchanged_rebuild_constructs_nothing() {
        let (mut tree, win) = window_tree("menu");
        let mut rt = NativeRuntime::new();
        let code = Code::build(|rt, ui| {
            ui.vlist(
                rt,
                0.1,
                &Code::build(|rt, ui| {
                    ui.text(rt, &Value::from("Play"), 1.0, &Code::Exit);
                    ui.text(rt, &Value::Int(3), 1.0, &Code::Exit);
                    ui.fill(rt, 1.0, 0.5, &Code::Exit);
                    Value::Null
                }),
            );
            Value::Null
        });

        run(&mut tree, win, &mut rt, &code);
        let first: Vec<WidgetId> = tree.children(tree.children(win)[0]).to_vec();
        assert_eq!(first.len(), 3);

        let before = tree.stats;
        run(&mut tree, win, &mut rt, &code);
        assert_eq!(tree.stats, before);
        assert_eq!(tree.children(tree.children(win)[0]), first.as_slice());
    }

    #[test]
    fn test_diverging_suffix_rebuilt() {
        let (mut tree, win) = window_tree("menu");
        let mut rt = NativeRuntime::new();
        let a = Code::build(|rt, ui| {
            ui.fill(rt, 1.0, 1.0, &Code::Exit);
            ui.target(rt, 1.0, 1.0, &Code::Exit);
            ui.target(rt, 1.0, 1.0, &Code::Exit);
            Value::Null
        });
        let b = Code::build(|rt, ui| {
            ui.fill(rt, 1.0, 1.0, &Code::Exit);
            ui.group(rt, &Code::Exit);
            Value::Null
        });
        run(&mut tree, win, &mut rt, &a);
        let kept = tree.children(win)[0];
        let before = tree.stats;
        run(&mut tree, win, &mut rt, &b);

        assert_eq!(tree.children(win)[0], kept);
        assert_eq!(tree.children(win).len(), 2);
        assert_eq!(tree.stats.constructed - before.constructed, 1);
        assert_eq!(tree.stats.destroyed - before.destroyed, 2);
    }

    #[test]
    fn test_exit_block_clears_without_running() {
        let (mut tree, win) = window_tree("menu");
        let mut rt = NativeRuntime::new();
        run(
            &mut tree,
            win,
            &mut rt,
            &Code::build(|rt, ui| {
                ui.group(rt, &Code::Exit);
                Value::Null
            }),
        );
        assert_eq!(tree.children(win).len(), 1);
        run(&mut tree, win, &mut rt, &Code::Exit);
        assert!(tree.children(win).is_empty());
    }

    #[test]
    fn test_list_orientation_follows_ancestor() {
        let (mut tree, win) = window_tree("menu");
        let mut rt = NativeRuntime::new();
        let code = Code::build(|rt, ui| {
            ui.hlist(
                rt,
                0.0,
                &Code::build(|rt, ui| {
                    ui.group(
                        rt,
                        &Code::build(|rt, ui| {
                            ui.list(rt, 0.0, &Code::Exit);
                            Value::Null
                        }),
                    );
                    Value::Null
                }),
            );
            ui.list(rt, 0.0, &Code::Exit);
            Value::Null
        });
        run(&mut tree, win, &mut rt, &code);
        let top = tree.children(win).to_vec();
        let group = tree.children(top[0])[0];
        let inner = tree.children(group)[0];
        assert_eq!(tree[inner].kind.type_name(), "#VerticalList");
        assert_eq!(tree[top[1]].kind.type_name(), "#HorizontalList");
    }

    #[test]
    fn test_table_header_columns_count() {
        let (mut tree, win) = window_tree("menu");
        let mut rt = NativeRuntime::new();
        let code = Code::build(|rt, ui| {
            ui.table_header(
                rt,
                &Code::build(|rt, ui| {
                    ui.fill(rt, 1.0, 1.0, &Code::Exit);
                    ui.fill(rt, 2.0, 1.0, &Code::Exit);
                    Value::Null
                }),
                &Code::build(|rt, ui| {
                    ui.color(rt, 0x202020, 0.0, 0.0, &Code::Exit);
                    Value::Null
                }),
            );
            Value::Null
        });
        run(&mut tree, win, &mut rt, &code);
        let header = tree.children(win)[0];
        assert_eq!(tree.children(header).len(), 3);
        match &tree[header].kind {
            WidgetKind::TableHeader(r) => assert_eq!(r.columns, 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_slider_reads_var_and_bounds() {
        let (mut tree, win) = window_tree("opts");
        let mut rt = NativeRuntime::new();
        rt.define_var("volume", Value::Int(40), Some((0.0, 100.0)));
        let code = Code::build(|rt, ui| {
            ui.hslider(rt, "volume", 0.0, 0.0, 5.0, &Code::Exit, &Code::Exit);
            Value::Null
        });
        run(&mut tree, win, &mut rt, &code);
        let slider = tree.children(win)[0];
        match &tree[slider].kind {
            WidgetKind::Slider(s) => {
                assert_eq!((s.vmin, s.vmax, s.vstep), (0.0, 100.0, 5.0));
                assert_eq!(s.val, 40.0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_slider_change_written_on_next_build() {
        let (mut tree, win) = window_tree("opts");
        let mut rt = NativeRuntime::new();
        rt.define_var("volume", Value::Int(40), Some((0.0, 100.0)));
        rt.set_alias("onvol", "echo changed");
        let code = Code::build(|rt, ui| {
            ui.hslider(rt, "volume", 0.0, 100.0, 10.0, &Code::source("onvol"), &Code::Exit);
            Value::Null
        });
        run(&mut tree, win, &mut rt, &code);
        let slider = tree.children(win)[0];
        if let WidgetKind::Slider(s) = &mut tree[slider].kind {
            s.arrow_scroll(1.0);
        }
        // Not written until the rebuild
        assert_eq!(rt.get_var("volume"), Some(Value::Int(40)));
        run(&mut tree, win, &mut rt, &code);
        assert_eq!(rt.get_var("volume"), Some(Value::Int(50)));
        assert!(rt.executed.iter().any(|s| s == "onvol"));
    }

    #[test]
    fn test_field_loads_variable() {
        let (mut tree, win) = window_tree("opts");
        let mut rt = NativeRuntime::new();
        rt.set_var("playername", Value::from("bob"));
        let code = Code::build(|rt, ui| {
            ui.field(rt, "playername", 12, &Code::Exit, 1.0, None, &Code::Exit);
            Value::Null
        });
        run(&mut tree, win, &mut rt, &code);
        let field = tree.children(win)[0];
        match &tree[field].kind {
            WidgetKind::Editor(e) => {
                assert_eq!(e.edit.text(), "bob");
                assert_eq!(e.edit.max_len, Some(12));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_align_last_and_all() {
        let (mut tree, win) = window_tree("menu");
        let mut rt = NativeRuntime::new();
        let code = Code::build(|rt, ui| {
            ui.fill(rt, 1.0, 1.0, &Code::Exit);
            ui.fill(rt, 1.0, 1.0, &Code::Exit);
            ui.align_last(-1, -1);
            ui.clamp_all(true, true, false, false);
            Value::Null
        });
        run(&mut tree, win, &mut rt, &code);
        let kids = tree.children(win).to_vec();
        use crate::ui::state::Adjust;
        assert_eq!(tree[kids[0]].adjust, Adjust::CENTER | Adjust::CLAMP_LEFT | Adjust::CLAMP_RIGHT);
        assert_eq!(tree[kids[1]].adjust, Adjust::LEFT | Adjust::TOP | Adjust::CLAMP_LEFT | Adjust::CLAMP_RIGHT);
    }

    #[test]
    fn test_window_flags_and_name() {
        let (mut tree, win) = window_tree("scoreboard");
        let mut rt = NativeRuntime::new();
        let seen = std::rc::Rc::new(std::cell::RefCell::new(String::new()));
        let sink = seen.clone();
        let code = Code::build(move |_rt, ui| {
            *sink.borrow_mut() = ui.window_name().unwrap_or_default().to_string();
            ui.esc_hide(Some(false));
            Value::from(ui.allow_input(None))
        });
        run(&mut tree, win, &mut rt, &code);
        assert_eq!(*seen.borrow(), "scoreboard");
        match &tree[win].kind {
            WidgetKind::Window(w) => {
                assert!(!w.eschide);
                assert!(w.allowinput);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
