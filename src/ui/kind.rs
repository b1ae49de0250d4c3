//! Widget variants
//!
//! Every node in the tree carries one `WidgetKind`. The variant decides how
//! the node lays out its children, what it draws, whether a point inside it
//! is a hit target and which input handlers it has. Shared behavior (minimum
//! size, colors) is plain struct fields instead of base classes.

use std::collections::HashMap;
use std::rc::Rc;

use serde::Serialize;

use super::editor::LineEditor;
use crate::script::{Code, Value};

/// RGBA color
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgba(255, 255, 255, 255);

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// `0xAARRGGBB`; an alpha byte of zero means opaque
    pub fn from_u32(c: u32) -> Self {
        let a = (c >> 24) as u8;
        Self {
            r: (c >> 16) as u8,
            g: (c >> 8) as u8,
            b: c as u8,
            a: if a != 0 { a } else { 0xFF },
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

/// Blending for solid fills and shapes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Blend {
    #[default]
    Alpha,
    Modulate,
}

/// An image as far as the UI cares: a size and an optional 1-bit alpha mask
#[derive(Clone, Debug, PartialEq)]
pub struct Texture {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// The image has an alpha channel, so hit tests consult the mask
    pub has_alpha: bool,
    /// Row-major bits, rows padded to whole bytes, LSB first
    pub alpha_mask: Option<Vec<u8>>,
    /// Edge-clamped sampling (tiled images draw one quad per tile)
    pub clamp: bool,
    missing: bool,
}

impl Texture {
    pub fn new(name: &str, width: u32, height: u32) -> Self {
        Self {
            name: name.to_string(),
            width: width.max(1),
            height: height.max(1),
            has_alpha: false,
            alpha_mask: None,
            clamp: false,
            missing: false,
        }
    }

    /// Attach an alpha mask built from per-pixel opacity (row-major)
    pub fn with_alpha(mut self, opaque: &[bool]) -> Self {
        let stride = self.width.div_ceil(8) as usize;
        let mut mask = vec![0u8; stride * self.height as usize];
        for (i, &on) in opaque.iter().enumerate().take((self.width * self.height) as usize) {
            if on {
                let (x, y) = (i % self.width as usize, i / self.width as usize);
                mask[y * stride + x / 8] |= 1 << (x % 8);
            }
        }
        self.has_alpha = true;
        self.alpha_mask = Some(mask);
        self
    }

    /// The placeholder used when a named texture cannot be found
    pub fn missing() -> Rc<Texture> {
        Rc::new(Texture {
            missing: true,
            ..Texture::new("<missing>", 1, 1)
        })
    }

    pub fn is_missing(&self) -> bool {
        self.missing
    }

    /// Alpha-mask hit test at normalized `(x, y)`. Textures without an alpha
    /// channel, or whose mask is unavailable, are solid.
    pub fn hit(&self, x: f32, y: f32) -> bool {
        if !self.has_alpha {
            return true;
        }
        let Some(mask) = &self.alpha_mask else {
            return true;
        };
        let (xs, ys) = (self.width as i32, self.height as i32);
        let tx = ((x * xs as f32) as i32).clamp(0, xs - 1) as usize;
        let ty = ((y * ys as f32) as i32).clamp(0, ys - 1) as usize;
        let stride = self.width.div_ceil(8) as usize;
        mask.get(ty * stride + tx / 8)
            .is_some_and(|byte| byte & (1 << (tx % 8)) != 0)
    }
}

/// Named textures known to the UI
#[derive(Debug)]
pub struct TextureCache {
    textures: HashMap<String, Rc<Texture>>,
    missing: Rc<Texture>,
}

impl Default for TextureCache {
    fn default() -> Self {
        Self {
            textures: HashMap::new(),
            missing: Texture::missing(),
        }
    }
}

impl TextureCache {
    pub fn register(&mut self, tex: Texture) {
        tracing::debug!("Registered texture '{}' ({}x{})", tex.name, tex.width, tex.height);
        self.textures.insert(tex.name.clone(), Rc::new(tex));
    }

    /// The named texture, or the shared "missing" placeholder
    pub fn lookup(&self, name: &str) -> Rc<Texture> {
        match self.textures.get(name) {
            Some(tex) => Rc::clone(tex),
            None => Rc::clone(&self.missing),
        }
    }
}

/// Minimum size shared by every leaf that fills space
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Filler {
    pub minw: f32,
    pub minh: f32,
}

impl Filler {
    pub fn new(minw: f32, minh: f32) -> Self {
        Self { minw, minh }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ListData {
    pub space: f32,
    pub subw: f32,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GridData {
    pub columns: i32,
    pub spacew: f32,
    pub spaceh: f32,
    pub subw: f32,
    pub subh: f32,
    pub widths: Vec<f32>,
    pub heights: Vec<f32>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TableData {
    pub spacew: f32,
    pub spaceh: f32,
    pub subw: f32,
    pub subh: f32,
    pub widths: Vec<f32>,
}

/// Table header or row: the first `columns` children are table cells
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RowData {
    /// -1 until the column block has run once
    pub columns: i32,
}

impl Default for RowData {
    fn default() -> Self {
        Self { columns: -1 }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ClipData {
    pub clipw: f32,
    pub cliph: f32,
    pub virtw: f32,
    pub virth: f32,
}

impl ClipData {
    /// Content overflows the clip box in either direction
    pub fn overflows(&self) -> bool {
        (self.clipw != 0.0 && self.virtw > self.clipw) || (self.cliph != 0.0 && self.virth > self.cliph)
    }
}

/// Scrolling clip box. Geometry helpers need the widget's own size.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScrollerData {
    pub clip: ClipData,
    pub offsetx: f32,
    pub offsety: f32,
}

impl ScrollerData {
    pub fn hlimit(&self, w: f32) -> f32 {
        (self.clip.virtw - w).max(0.0)
    }

    pub fn vlimit(&self, h: f32) -> f32 {
        (self.clip.virth - h).max(0.0)
    }

    pub fn hoffset(&self, w: f32) -> f32 {
        ratio(self.offsetx, self.clip.virtw.max(w), 0.0)
    }

    pub fn voffset(&self, h: f32) -> f32 {
        ratio(self.offsety, self.clip.virth.max(h), 0.0)
    }

    /// Visible fraction of the content width
    pub fn hscale(&self, w: f32) -> f32 {
        ratio(w, self.clip.virtw.max(w), 1.0)
    }

    pub fn vscale(&self, h: f32) -> f32 {
        ratio(h, self.clip.virth.max(h), 1.0)
    }

    pub fn set_hscroll(&mut self, w: f32, offset: f32) {
        self.offsetx = offset.clamp(0.0, self.hlimit(w));
    }

    pub fn set_vscroll(&mut self, h: f32, offset: f32) {
        self.offsety = offset.clamp(0.0, self.vlimit(h));
    }
}

fn ratio(num: f32, den: f32, empty: f32) -> f32 {
    if den > 0.0 {
        num / den
    } else {
        empty
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

impl Orientation {
    /// Sign applied to wheel steps; vertical bars and sliders invert it
    pub fn wheel_direction(self) -> f32 {
        match self {
            Orientation::Horizontal => 1.0,
            Orientation::Vertical => -1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScrollBarData {
    pub orientation: Orientation,
    /// Grab offset inside the button while dragging
    pub offsetx: f32,
    pub offsety: f32,
}

/// A slider bound to a script variable
#[derive(Clone, Debug)]
pub struct SliderData {
    pub orientation: Orientation,
    pub var: String,
    pub val: f64,
    pub vmin: f64,
    pub vmax: f64,
    pub vstep: f64,
    /// Set by input; the variable is written on the next rebuild
    pub changed: bool,
}

impl SliderData {
    /// Index of the step nearest to the current value
    pub fn step_index(&self) -> i64 {
        ((self.val - self.vmin) / self.vstep).round() as i64
    }

    /// Value of step `index`, clamped into the range
    pub fn step_value(&self, index: i64) -> f64 {
        self.clamp(self.vmin + index as f64 * self.vstep)
    }

    pub fn clamp(&self, v: f64) -> f64 {
        v.clamp(self.vmin.min(self.vmax), self.vmin.max(self.vmax))
    }

    /// Move one step in `dir`, landing on the nearest step beyond the
    /// current value (5 -> 6 with steps of 2, 6 -> 8).
    pub fn arrow_scroll(&mut self, dir: f64) {
        if dir == 0.0 {
            return;
        }
        let k = (self.val - self.vmin) / self.vstep;
        let base = if dir > 0.0 { k.floor() } else { k.ceil() };
        let newval = self.clamp(self.vmin + (base + dir) * self.vstep);
        if newval != self.val {
            self.change(newval);
        }
    }

    pub fn change(&mut self, newval: f64) {
        self.val = newval;
        self.changed = true;
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SliderArrowData {
    pub stepdir: f64,
    /// Time (ms) of the last repeat step
    pub laststep: u64,
}

/// Which flavor of text editor a node is
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditorFlavor {
    Plain,
    Field,
    KeyField,
}

/// Variable binding of a Field or KeyField
#[derive(Clone, Debug)]
pub struct FieldBinding {
    pub var: String,
    pub onchange: Code,
    pub changed: bool,
}

#[derive(Clone, Debug)]
pub struct EditorData {
    pub flavor: EditorFlavor,
    /// Width in characters; zero or negative means unbounded
    pub length: i32,
    pub scale: f32,
    /// Press position, for drag detection
    pub offsetx: f32,
    pub offsety: f32,
    pub edit: LineEditor,
    pub keyfilter: Option<String>,
    pub field: Option<FieldBinding>,
}

impl EditorData {
    pub fn new(flavor: EditorFlavor, length: i32) -> Self {
        Self {
            flavor,
            length,
            scale: 1.0,
            offsetx: 0.0,
            offsety: 0.0,
            edit: LineEditor::new((length > 0).then_some(length as usize)),
            keyfilter: None,
            field: None,
        }
    }

    pub fn allows_text_input(&self) -> bool {
        self.flavor != EditorFlavor::KeyField
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ImageStyle {
    Plain,
    Stretched,
    Cropped { x: f32, y: f32, w: f32, h: f32 },
    Bordered { texborder: f32, screenborder: f32 },
    Tiled { tilew: f32, tileh: f32 },
}

#[derive(Clone, Debug)]
pub struct ImageData {
    pub fill: Filler,
    pub tex: Rc<Texture>,
    pub style: ImageStyle,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ShapeMode {
    #[default]
    Solid,
    Outline,
    Modulate,
}

impl ShapeMode {
    pub fn blend(self) -> Blend {
        match self {
            ShapeMode::Modulate => Blend::Modulate,
            _ => Blend::Alpha,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TriangleData {
    pub fill: Filler,
    pub color: Color,
    pub mode: ShapeMode,
    pub a: [f32; 2],
    pub b: [f32; 2],
    pub c: [f32; 2],
}

impl TriangleData {
    /// Triangle of width `w` and height `h` pointing up, rotated by
    /// `angle` degrees, moved so its bounding box starts at the origin.
    pub fn new(color: Color, w: f32, h: f32, angle: i32, mode: ShapeMode) -> Self {
        let mut pts = [[0.0, -h * 2.0 / 3.0], [-w / 2.0, h / 3.0], [w / 2.0, h / 3.0]];
        if angle != 0 {
            let rad = (-(angle.rem_euclid(360)) as f32).to_radians();
            let (s, c) = rad.sin_cos();
            for p in &mut pts {
                *p = [p[0] * c - p[1] * s, p[0] * s + p[1] * c];
            }
        }
        let minx = pts.iter().map(|p| p[0]).fold(f32::INFINITY, f32::min);
        let miny = pts.iter().map(|p| p[1]).fold(f32::INFINITY, f32::min);
        for p in &mut pts {
            p[0] -= minx;
            p[1] -= miny;
        }
        let maxx = pts.iter().map(|p| p[0]).fold(0.0, f32::max);
        let maxy = pts.iter().map(|p| p[1]).fold(0.0, f32::max);
        Self {
            fill: Filler::new(maxx, maxy),
            color,
            mode,
            a: pts[0],
            b: pts[1],
            c: pts[2],
        }
    }

    pub fn contains(&self, cx: f32, cy: f32) -> bool {
        if self.mode == ShapeMode::Outline {
            return false;
        }
        let cross = |p: [f32; 2], from: [f32; 2], to: [f32; 2]| {
            let (dx, dy) = (p[0] - from[0], p[1] - from[1]);
            let (ex, ey) = (to[0] - from[0], to[1] - from[1]);
            dx * ey - dy * ex
        };
        let p = [cx, cy];
        let side = cross(p, self.b, self.a) < 0.0;
        (cross(p, self.c, self.b) < 0.0) == side && (cross(p, self.a, self.c) < 0.0) == side
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CircleData {
    pub fill: Filler,
    pub color: Color,
    pub mode: ShapeMode,
    pub radius: f32,
}

impl CircleData {
    pub fn effective_radius(&self, w: f32, h: f32) -> f32 {
        if self.radius <= 0.0 {
            w.min(h) / 2.0
        } else {
            self.radius
        }
    }

    pub fn contains(&self, cx: f32, cy: f32, w: f32, h: f32) -> bool {
        if self.mode == ShapeMode::Outline {
            return false;
        }
        let r = self.effective_radius(w, h);
        let (dx, dy) = (cx - r, cy - r);
        dx * dx + dy * dy <= r * r
    }
}

/// What a text widget shows
#[derive(Clone, Debug, PartialEq)]
pub enum TextValue {
    Str(String),
    Int(i32),
    Float(f32),
}

impl TextValue {
    pub fn render(&self) -> String {
        match self {
            TextValue::Str(s) => s.clone(),
            TextValue::Int(i) => i.to_string(),
            TextValue::Float(f) => crate::script::float_str(*f),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextData {
    pub value: TextValue,
    /// Cached rendering of `value`
    pub text: String,
    pub scale: f32,
    pub color: Color,
    /// Wrap width in UI units; negative means no wrapping
    pub wrap: f32,
}

impl TextData {
    pub fn set_value(&mut self, value: TextValue) {
        if self.value != value {
            self.text = value.render();
            self.value = value;
        }
    }
}

/// Window content and flags
#[derive(Clone, Debug)]
pub struct WindowData {
    pub name: String,
    pub contents: Code,
    pub onshow: Code,
    pub onhide: Code,
    pub allowinput: bool,
    pub eschide: bool,
    pub abovehud: bool,
    /// Projection box in window space, set by the world layout
    pub px: f32,
    pub py: f32,
    pub pw: f32,
    pub ph: f32,
}

impl WindowData {
    pub fn new(name: &str, contents: Code, onshow: Code, onhide: Code) -> Self {
        Self {
            name: name.to_string(),
            contents,
            onshow,
            onhide,
            allowinput: true,
            eschide: true,
            abovehud: false,
            px: 0.0,
            py: 0.0,
            pw: 0.0,
            ph: 0.0,
        }
    }

    /// Per-rebuild reset of the flags the build block may set
    pub fn setup(&mut self) {
        self.allowinput = true;
        self.eschide = true;
        self.abovehud = false;
        self.px = 0.0;
        self.py = 0.0;
        self.pw = 0.0;
        self.ph = 0.0;
    }
}

#[derive(Clone, Debug)]
pub enum WidgetKind {
    World,
    Window(WindowData),
    Group,
    HorizontalList(ListData),
    VerticalList(ListData),
    Grid(GridData),
    Table(TableData),
    TableHeader(RowData),
    TableRow(RowData),
    Spacer { spacew: f32, spaceh: f32 },
    Offsetter { offsetx: f32, offsety: f32 },
    Filler(Filler),
    Target(Filler),
    FillColor { fill: Filler, blend: Blend, color: Color },
    Gradient { fill: Filler, blend: Blend, horizontal: bool, color: Color, color2: Color },
    Line { fill: Filler, color: Color },
    Outline { fill: Filler, color: Color },
    Image(ImageData),
    Triangle(TriangleData),
    Circle(CircleData),
    Text(TextData),
    Console(Filler),
    Clipper(ClipData),
    Scroller(ScrollerData),
    ScrollButton,
    ScrollBar(ScrollBarData),
    ScrollArrow { arrowspeed: f32 },
    Slider(SliderData),
    SliderArrow(SliderArrowData),
    SliderButton,
    Editor(EditorData),
}

impl WidgetKind {
    /// Exact variant name; reconciliation reuses a node only on a match
    pub fn type_name(&self) -> &'static str {
        match self {
            WidgetKind::World => "#World",
            WidgetKind::Window(_) => "#Window",
            WidgetKind::Group => "#Object",
            WidgetKind::HorizontalList(_) => "#HorizontalList",
            WidgetKind::VerticalList(_) => "#VerticalList",
            WidgetKind::Grid(_) => "#Grid",
            WidgetKind::Table(_) => "#Table",
            WidgetKind::TableHeader(_) => "#TableHeader",
            WidgetKind::TableRow(_) => "#TableRow",
            WidgetKind::Spacer { .. } => "#Spacer",
            WidgetKind::Offsetter { .. } => "#Offsetter",
            WidgetKind::Filler(_) => "#Filler",
            WidgetKind::Target(_) => "#Target",
            WidgetKind::FillColor { .. } => "#FillColor",
            WidgetKind::Gradient { .. } => "#Gradient",
            WidgetKind::Line { .. } => "#Line",
            WidgetKind::Outline { .. } => "#Outline",
            WidgetKind::Image(img) => match img.style {
                ImageStyle::Plain => "#Image",
                ImageStyle::Stretched => "#StretchedImage",
                ImageStyle::Cropped { .. } => "#CroppedImage",
                ImageStyle::Bordered { .. } => "#BorderedImage",
                ImageStyle::Tiled { .. } => "#TiledImage",
            },
            WidgetKind::Triangle(_) => "#Triangle",
            WidgetKind::Circle(_) => "#Circle",
            WidgetKind::Text(t) => match t.value {
                TextValue::Str(_) => "#TextString",
                TextValue::Int(_) => "#TextInt",
                TextValue::Float(_) => "#TextFloat",
            },
            WidgetKind::Console(_) => "#Console",
            WidgetKind::Clipper(_) => "#Clipper",
            WidgetKind::Scroller(_) => "#Scroller",
            WidgetKind::ScrollButton => "#ScrollButton",
            WidgetKind::ScrollBar(sb) => match sb.orientation {
                Orientation::Horizontal => "#HorizontalScrollBar",
                Orientation::Vertical => "#VerticalScrollBar",
            },
            WidgetKind::ScrollArrow { .. } => "#ScrollArrow",
            WidgetKind::Slider(s) => match s.orientation {
                Orientation::Horizontal => "#HorizontalSlider",
                Orientation::Vertical => "#VerticalSlider",
            },
            WidgetKind::SliderArrow(_) => "#SliderArrow",
            WidgetKind::SliderButton => "#SliderButton",
            WidgetKind::Editor(e) => match e.flavor {
                EditorFlavor::Plain => "#TextEditor",
                EditorFlavor::Field => "#Field",
                EditorFlavor::KeyField => "#KeyField",
            },
        }
    }

    /// Name used by `#type` lookups. Both scrollbar orientations answer to
    /// `#ScrollBar`, both sliders to `#Slider`.
    pub fn lookup_name(&self) -> &'static str {
        match self {
            WidgetKind::ScrollBar(_) => "#ScrollBar",
            WidgetKind::Slider(_) => "#Slider",
            _ => self.type_name(),
        }
    }

    /// Alignment given to children when they are (re)built
    pub fn child_align(&self) -> super::state::Adjust {
        use super::state::Adjust;
        match self {
            WidgetKind::HorizontalList(_) => Adjust::VCENTER,
            WidgetKind::VerticalList(_) => Adjust::HCENTER,
            WidgetKind::Grid(_) | WidgetKind::Table(_) => Adjust::empty(),
            WidgetKind::TableHeader(r) | WidgetKind::TableRow(r) => {
                if r.columns < 0 {
                    Adjust::VCENTER
                } else {
                    Adjust::CENTER
                }
            }
            _ => Adjust::CENTER,
        }
    }

    /// Minimum size of filler-like leaves
    pub fn filler(&self) -> Option<Filler> {
        match self {
            WidgetKind::Filler(f)
            | WidgetKind::Target(f)
            | WidgetKind::Console(f)
            | WidgetKind::FillColor { fill: f, .. }
            | WidgetKind::Gradient { fill: f, .. }
            | WidgetKind::Line { fill: f, .. }
            | WidgetKind::Outline { fill: f, .. } => Some(*f),
            WidgetKind::Image(img) => Some(img.fill),
            WidgetKind::Triangle(t) => Some(t.fill),
            WidgetKind::Circle(c) => Some(c.fill),
            _ => None,
        }
    }

    /// Hit test in the widget's local space
    pub fn target(&self, cx: f32, cy: f32, w: f32, h: f32) -> bool {
        match self {
            WidgetKind::Target(_)
            | WidgetKind::FillColor { .. }
            | WidgetKind::Gradient { .. }
            | WidgetKind::TableRow(_)
            | WidgetKind::ScrollBar(_)
            | WidgetKind::Slider(_)
            | WidgetKind::Editor(_) => true,
            WidgetKind::Image(img) => image_target(img, cx, cy, w, h),
            WidgetKind::Triangle(t) => t.contains(cx, cy),
            WidgetKind::Circle(c) => c.contains(cx, cy, w, h),
            _ => false,
        }
    }

    /// Columns a table lines up across rows
    pub fn child_columns(&self, nchildren: usize) -> usize {
        match self {
            WidgetKind::TableHeader(r) | WidgetKind::TableRow(r) => r.columns.max(0) as usize,
            _ => nchildren,
        }
    }
}

fn image_target(img: &ImageData, cx: f32, cy: f32, w: f32, h: f32) -> bool {
    let tex = &img.tex;
    if !tex.has_alpha {
        return true;
    }
    let (minw, minh) = (img.fill.minw, img.fill.minh);
    match img.style {
        ImageStyle::Plain => tex.hit(cx / w, cy / h),
        ImageStyle::Cropped { x, y, w: cw, h: ch } => tex.hit(x + cx / w * cw, y + cy / h * ch),
        ImageStyle::Stretched => {
            let stretch = |c: f32, size: f32, min: f32| {
                if size <= min {
                    c / size
                } else if c < min / 2.0 {
                    c / min
                } else if c >= size - min / 2.0 {
                    1.0 - (size - c) / min
                } else {
                    0.5
                }
            };
            tex.hit(stretch(cx, w, minw), stretch(cy, h, minh))
        }
        ImageStyle::Bordered { texborder, screenborder } => {
            let border = |c: f32, size: f32| {
                if c < screenborder {
                    c / screenborder * texborder
                } else if c >= size - screenborder {
                    1.0 - texborder + (c - (size - screenborder)) / screenborder * texborder
                } else {
                    texborder + (c - screenborder) / (size - 2.0 * screenborder) * (1.0 - 2.0 * texborder)
                }
            };
            tex.hit(border(cx, w), border(cy, h))
        }
        ImageStyle::Tiled { tilew, tileh } => tex.hit((cx / tilew) % 1.0, (cy / tileh) % 1.0),
    }
}

/// Crop and border arguments: a number, or `"<n>p"` for pixels of `size`
pub fn pixel_offset(v: &Value, size: u32) -> f32 {
    match v {
        Value::Null => 0.0,
        Value::Int(i) => *i as f32,
        Value::Float(f) => *f,
        Value::Str(s) => match s.trim().strip_suffix('p') {
            Some(px) => px.trim().parse::<f32>().unwrap_or(0.0) / size.max(1) as f32,
            None => s.trim().parse().unwrap_or(0.0),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_from_u32() {
        assert_eq!(Color::from_u32(0x00FF8000), Color::rgba(255, 128, 0, 255));
        assert_eq!(Color::from_u32(0x80000000).a, 0x80);
    }

    #[test]
    fn test_missing_texture_is_solid() {
        let tex = Texture::missing();
        assert!(tex.is_missing());
        assert!(tex.hit(0.3, 0.7));
    }

    #[test]
    fn test_alpha_mask_hit() {
        // 2x2, only the top-left pixel is opaque
        let tex = Texture::new("t", 2, 2).with_alpha(&[true, false, false, false]);
        assert!(tex.hit(0.1, 0.1));
        assert!(!tex.hit(0.9, 0.1));
        assert!(!tex.hit(0.1, 0.9));
        // Out of range coordinates clamp to the edge texel
        assert!(tex.hit(-1.0, -1.0));
    }

    #[test]
    fn test_triangle_hit_and_outline() {
        let tri = TriangleData::new(Color::WHITE, 2.0, 3.0, 0, ShapeMode::Solid);
        assert_eq!((tri.fill.minw, tri.fill.minh), (2.0, 3.0));
        // Apex at (1, 0), base from (0, 3) to (2, 3)
        assert!(tri.contains(1.0, 2.0));
        assert!(!tri.contains(0.1, 0.2));

        let outline = TriangleData { mode: ShapeMode::Outline, ..tri };
        assert!(!outline.contains(1.0, 2.0));
    }

    #[test]
    fn test_circle_hit() {
        let c = CircleData {
            fill: Filler::new(2.0, 2.0),
            color: Color::WHITE,
            mode: ShapeMode::Solid,
            radius: 1.0,
        };
        assert!(c.contains(1.0, 1.0, 2.0, 2.0));
        assert!(!c.contains(0.05, 0.05, 2.0, 2.0));
    }

    #[test]
    fn test_texture_cache_fallback() {
        let mut cache = TextureCache::default();
        cache.register(Texture::new("logo", 4, 4));
        assert!(!cache.lookup("logo").is_missing());
        let a = cache.lookup("nope");
        let b = cache.lookup("also-nope");
        assert!(a.is_missing());
        assert!(Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_pixel_offset() {
        assert_eq!(pixel_offset(&Value::from("16p"), 64), 0.25);
        assert_eq!(pixel_offset(&Value::Float(0.5), 64), 0.5);
        assert_eq!(pixel_offset(&Value::Null, 64), 0.0);
    }

    #[test]
    fn test_slider_arrow_steps() {
        let mut s = SliderData {
            orientation: Orientation::Horizontal,
            var: "v".into(),
            val: 5.0,
            vmin: 0.0,
            vmax: 10.0,
            vstep: 2.0,
            changed: false,
        };
        s.arrow_scroll(1.0);
        assert_eq!(s.val, 6.0);
        assert!(s.changed);
        s.arrow_scroll(1.0);
        assert_eq!(s.val, 8.0);
        s.val = 5.0;
        s.arrow_scroll(-1.0);
        assert_eq!(s.val, 4.0);
        s.arrow_scroll(-1.0);
        assert_eq!(s.val, 2.0);
        // Clamped at the top
        s.val = 10.0;
        s.changed = false;
        s.arrow_scroll(1.0);
        assert_eq!(s.val, 10.0);
        assert!(!s.changed);
    }

    #[test]
    fn test_slider_descending_range_clamps() {
        let mut s = SliderData {
            orientation: Orientation::Vertical,
            var: "v".into(),
            val: 3.0,
            vmin: 10.0,
            vmax: 0.0,
            vstep: 1.0,
            changed: false,
        };
        assert_eq!(s.clamp(-4.0), 0.0);
        assert_eq!(s.clamp(14.0), 10.0);
        s.arrow_scroll(-1.0);
        assert_eq!(s.val, 2.0);
    }

    #[test]
    fn test_slider_round_trip_within_half_step() {
        let s = SliderData {
            orientation: Orientation::Horizontal,
            var: "v".into(),
            val: 0.0,
            vmin: 0.0,
            vmax: 10.0,
            vstep: 2.0,
            changed: false,
        };
        let mut v = 0.0;
        while v <= 10.0 {
            let probe = SliderData { val: v, ..s.clone() };
            let back = probe.step_value(probe.step_index());
            assert!((back - v).abs() <= s.vstep / 2.0, "{} -> {}", v, back);
            v += 0.25;
        }
    }

    #[test]
    fn test_type_names_split_by_variant() {
        let bar = WidgetKind::ScrollBar(ScrollBarData {
            orientation: Orientation::Vertical,
            offsetx: 0.0,
            offsety: 0.0,
        });
        assert_eq!(bar.type_name(), "#VerticalScrollBar");
        assert_eq!(bar.lookup_name(), "#ScrollBar");

        let text = WidgetKind::Text(TextData {
            value: TextValue::Int(3),
            text: "3".into(),
            scale: 1.0,
            color: Color::WHITE,
            wrap: -1.0,
        });
        assert_eq!(text.type_name(), "#TextInt");
    }
}
