//! Computed style – the flat per-element record produced by the cascade and
//! consumed by the layout engine.
//!
//! Box lengths are kept as the author wrote them (`"50%"`, `"2em"`,
//! `"auto"`) and resolved during layout once the containing block is known.
//! Font size and colours are resolved here because inheritance needs them.

use crate::css::Declaration;
use crate::length::{clamp_length, Length, LengthContext, BASE_FONT_SIZE};

/// Fully resolved style for a single node.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedStyle {
    // Display / positioning
    pub display: Display,
    pub position: Position,
    pub z_index: Option<i32>,
    pub top: String,
    pub right: String,
    pub bottom: String,
    pub left: String,

    // Flex
    pub flex_direction: FlexDirection,
    pub gap: String,

    // Sizing
    pub width: String,
    pub height: String,
    pub min_width: String,
    pub max_width: String,
    pub min_height: String,
    pub max_height: String,

    // Box edges
    pub margin: BoxEdges,
    pub padding: BoxEdges,
    pub border_width: BoxEdges,
    pub border_style: BorderStyle,
    pub border_color: Rgba,

    // Typography
    pub font_family: String,
    /// Resolved font size in px.
    pub font_size: f32,
    pub font_weight: FontWeight,
    pub font_style: FontStyle,
    pub font_stretch: FontStretch,
    pub color: Rgba,
    pub text_align: TextAlign,
    pub text_decoration: TextDecoration,
    pub text_transform: TextTransform,
    pub white_space: WhiteSpace,
    pub line_height: LineHeight,
    pub list_style: ListStyle,

    // Background
    pub background_color: Rgba,

    // Page break
    pub page_break_before: bool,
    pub page_break_after: bool,
    pub page_break_inside_avoid: bool,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        let auto = || "auto".to_string();
        Self {
            display: Display::Inline,
            position: Position::Static,
            z_index: None,
            top: auto(),
            right: auto(),
            bottom: auto(),
            left: auto(),
            flex_direction: FlexDirection::Row,
            gap: "0".to_string(),
            width: auto(),
            height: auto(),
            min_width: "0".to_string(),
            max_width: "none".to_string(),
            min_height: "0".to_string(),
            max_height: "none".to_string(),
            margin: BoxEdges::uniform("0"),
            padding: BoxEdges::uniform("0"),
            border_width: BoxEdges::uniform("3px"),
            border_style: BorderStyle::None,
            border_color: Rgba::BLACK,
            font_family: "helvetica".to_string(),
            font_size: BASE_FONT_SIZE,
            font_weight: FontWeight::Normal,
            font_style: FontStyle::Normal,
            font_stretch: FontStretch::Normal,
            color: Rgba::BLACK,
            text_align: TextAlign::Left,
            text_decoration: TextDecoration::None,
            text_transform: TextTransform::None,
            white_space: WhiteSpace::Normal,
            line_height: LineHeight::Normal,
            list_style: ListStyle::Disc,
            background_color: Rgba::TRANSPARENT,
            page_break_before: false,
            page_break_after: false,
            page_break_inside_avoid: false,
        }
    }
}

impl ComputedStyle {
    /// Copy the inherited properties of `parent` onto `self`.
    pub fn inherit_from(&mut self, parent: &ComputedStyle) {
        self.font_family = parent.font_family.clone();
        self.font_size = parent.font_size;
        self.font_weight = parent.font_weight;
        self.font_style = parent.font_style;
        self.font_stretch = parent.font_stretch;
        self.color = parent.color;
        self.text_align = parent.text_align;
        // Decorations propagate to descendant text.
        self.text_decoration = parent.text_decoration;
        self.text_transform = parent.text_transform;
        self.white_space = parent.white_space;
        self.line_height = parent.line_height;
        self.list_style = parent.list_style;
    }

    /// Line height in px.
    pub fn line_height_px(&self) -> f32 {
        match self.line_height {
            LineHeight::Normal => self.font_size * 1.2,
            LineHeight::Number(n) => self.font_size * n,
            LineHeight::Px(px) => px,
        }
    }

    /// Line-height factor relative to the font size.
    pub fn line_height_factor(&self) -> f32 {
        if self.font_size <= 0.0 {
            return 1.2;
        }
        self.line_height_px() / self.font_size
    }

    pub fn is_positioned(&self) -> bool {
        self.position != Position::Static
    }

    pub fn is_out_of_flow(&self) -> bool {
        matches!(self.position, Position::Absolute | Position::Fixed)
    }
}

// ---------------------------------------------------------------------------
// Supporting enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Display {
    Block,
    Inline,
    InlineBlock,
    Flex,
    ListItem,
    Table,
    TableRow,
    TableCell,
    None,
}

impl Display {
    pub fn is_block_level(&self) -> bool {
        matches!(
            self,
            Display::Block
                | Display::Flex
                | Display::ListItem
                | Display::Table
                | Display::TableRow
                | Display::TableCell
        )
    }

    fn parse(v: &str) -> Option<Self> {
        Some(match v {
            "block" | "contents" | "grid" | "flow-root" | "table-row-group"
            | "table-header-group" | "table-footer-group" | "table-caption" => Display::Block,
            "inline" => Display::Inline,
            "inline-block" | "inline-table" | "inline-flex" | "inline-grid" => {
                Display::InlineBlock
            }
            "flex" => Display::Flex,
            "list-item" => Display::ListItem,
            "table" => Display::Table,
            "table-row" => Display::TableRow,
            "table-cell" => Display::TableCell,
            "none" => Display::None,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Static,
    Relative,
    Absolute,
    Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlexDirection {
    Row,
    Column,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorderStyle {
    None,
    Solid,
    Dashed,
    Dotted,
    Double,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontWeight {
    Light,
    Normal,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontStyle {
    Normal,
    Italic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontStretch {
    Normal,
    Condensed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
    Justify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextDecoration {
    None,
    Underline,
    LineThrough,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextTransform {
    None,
    Uppercase,
    Lowercase,
    Capitalize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhiteSpace {
    Normal,
    Pre,
    PreWrap,
    PreLine,
    NoWrap,
}

impl WhiteSpace {
    /// Whether runs of whitespace are kept as written.
    pub fn preserves_spaces(&self) -> bool {
        matches!(self, WhiteSpace::Pre | WhiteSpace::PreWrap)
    }

    /// Whether newlines in the source force line breaks.
    pub fn preserves_newlines(&self) -> bool {
        matches!(self, WhiteSpace::Pre | WhiteSpace::PreWrap | WhiteSpace::PreLine)
    }

    pub fn wraps(&self) -> bool {
        !matches!(self, WhiteSpace::Pre | WhiteSpace::NoWrap)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineHeight {
    Normal,
    Number(f32),
    Px(f32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListStyle {
    Disc,
    Decimal,
    None,
}

/// Four length strings in top/right/bottom/left order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxEdges {
    pub top: String,
    pub right: String,
    pub bottom: String,
    pub left: String,
}

impl BoxEdges {
    pub fn uniform(v: &str) -> Self {
        Self {
            top: v.to_string(),
            right: v.to_string(),
            bottom: v.to_string(),
            left: v.to_string(),
        }
    }

    fn side_mut(&mut self, side: &str) -> Option<&mut String> {
        match side {
            "top" => Some(&mut self.top),
            "right" => Some(&mut self.right),
            "bottom" => Some(&mut self.bottom),
            "left" => Some(&mut self.left),
            _ => None,
        }
    }

    /// Apply the 1–4 value shorthand form.
    fn set_shorthand(&mut self, parts: &[&str]) -> bool {
        let (t, r, b, l) = match parts {
            [a] => (a, a, a, a),
            [v, h] => (v, h, v, h),
            [t, h, b] => (t, h, b, h),
            [t, r, b, l] => (t, r, b, l),
            _ => return false,
        };
        self.top = t.to_string();
        self.right = r.to_string();
        self.bottom = b.to_string();
        self.left = l.to_string();
        true
    }
}

/// RGBA colour, 0–255 per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    pub const TRANSPARENT: Self = Self {
        r: 0,
        g: 0,
        b: 0,
        a: 0,
    };

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parse any CSS colour syntax (`#rgb`, `rgb()`, `hsl()`, named colours).
    pub fn parse(value: &str) -> Option<Self> {
        let color = value.trim().parse::<csscolorparser::Color>().ok()?;
        let [r, g, b, a] = color.to_rgba8();
        Some(Self { r, g, b, a })
    }

    pub fn is_transparent(&self) -> bool {
        self.a == 0
    }

    /// Channels normalized to 0.0–1.0.
    pub fn to_f32(&self) -> [f32; 4] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
            self.a as f32 / 255.0,
        ]
    }

    /// Luminance-preserving grey.
    pub fn to_grayscale(&self) -> Self {
        let y = (0.299 * self.r as f32 + 0.587 * self.g as f32 + 0.114 * self.b as f32)
            .round()
            .clamp(0.0, 255.0) as u8;
        Self {
            r: y,
            g: y,
            b: y,
            a: self.a,
        }
    }

    /// `#rrggbb` form, alpha ignored.
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

// ---------------------------------------------------------------------------
// User-agent defaults
// ---------------------------------------------------------------------------

/// Default declarations for a tag, applied before author rules.
pub fn tag_defaults(tag: &str) -> &'static [(&'static str, &'static str)] {
    match tag {
        "html" | "body" | "div" | "section" | "article" | "header" | "footer" | "nav"
        | "aside" | "main" | "figcaption" | "address" | "dl" | "dt" | "caption"
        | "thead" | "tbody" | "tfoot" => &[("display", "block")],
        "center" => &[("display", "block"), ("text-align", "center")],
        "p" => &[("display", "block"), ("margin", "0 0 10px 0")],
        "h1" => &[
            ("display", "block"),
            ("font-size", "32px"),
            ("font-weight", "bold"),
            ("margin", "16px 0 12px 0"),
        ],
        "h2" => &[
            ("display", "block"),
            ("font-size", "24px"),
            ("font-weight", "bold"),
            ("margin", "14px 0 10px 0"),
        ],
        "h3" => &[
            ("display", "block"),
            ("font-size", "20px"),
            ("font-weight", "bold"),
            ("margin", "12px 0 8px 0"),
        ],
        "h4" => &[
            ("display", "block"),
            ("font-size", "16px"),
            ("font-weight", "bold"),
            ("margin", "10px 0 8px 0"),
        ],
        "h5" | "h6" => &[
            ("display", "block"),
            ("font-size", "13px"),
            ("font-weight", "bold"),
            ("margin", "10px 0 6px 0"),
        ],
        "ul" => &[
            ("display", "block"),
            ("margin", "0 0 10px 0"),
            ("padding-left", "24px"),
            ("list-style-type", "disc"),
        ],
        "ol" => &[
            ("display", "block"),
            ("margin", "0 0 10px 0"),
            ("padding-left", "24px"),
            ("list-style-type", "decimal"),
        ],
        "li" => &[("display", "list-item"), ("margin-bottom", "4px")],
        "dd" => &[("display", "block"), ("margin-left", "40px")],
        "blockquote" | "figure" => &[("display", "block"), ("margin", "10px 40px")],
        "pre" => &[
            ("display", "block"),
            ("white-space", "pre"),
            ("font-family", "monospace"),
            ("margin", "0 0 10px 0"),
        ],
        "hr" => &[
            ("display", "block"),
            ("border-top", "1px solid #808080"),
            ("margin", "8px 0"),
        ],
        "table" => &[("display", "table"), ("border-color", "#808080")],
        "tr" => &[("display", "table-row")],
        "td" => &[("display", "table-cell"), ("padding", "4px 8px")],
        "th" => &[
            ("display", "table-cell"),
            ("padding", "4px 8px"),
            ("font-weight", "bold"),
            ("background-color", "#eeeeee"),
        ],
        "b" | "strong" => &[("font-weight", "bold")],
        "i" | "em" | "cite" | "var" | "dfn" => &[("font-style", "italic")],
        "u" | "ins" => &[("text-decoration", "underline")],
        "s" | "strike" | "del" => &[("text-decoration", "line-through")],
        "a" => &[("color", "#0000ee"), ("text-decoration", "underline")],
        "code" | "kbd" | "samp" | "tt" => &[("font-family", "monospace")],
        "small" | "sub" | "sup" => &[("font-size", "smaller")],
        "big" => &[("font-size", "larger")],
        "mark" => &[("background-color", "yellow")],
        "img" => &[("display", "inline-block")],
        "head" | "title" | "style" | "script" | "meta" | "link" | "template" | "base"
        | "noscript" => &[("display", "none")],
        _ => &[],
    }
}

// ---------------------------------------------------------------------------
// Declaration application
// ---------------------------------------------------------------------------

/// Apply one declaration. `inherit` and `initial` are handled here too.
/// Returns `false` for unknown properties or unusable values.
pub fn apply_declaration(s: &mut ComputedStyle, decl: &Declaration, parent: &ComputedStyle) -> bool {
    let value = decl.value.trim();
    match value.to_ascii_lowercase().as_str() {
        "inherit" => return copy_property(s, parent, &decl.property),
        "initial" | "unset" => {
            let initial = ComputedStyle::default();
            return copy_property(s, &initial, &decl.property);
        }
        _ => {}
    }
    apply_css_property(s, &decl.property, value, parent)
}

/// Copy a single property (or shorthand group) from `from`.
fn copy_property(s: &mut ComputedStyle, from: &ComputedStyle, prop: &str) -> bool {
    match prop {
        "display" => s.display = from.display,
        "position" => s.position = from.position,
        "z-index" => s.z_index = from.z_index,
        "top" => s.top = from.top.clone(),
        "right" => s.right = from.right.clone(),
        "bottom" => s.bottom = from.bottom.clone(),
        "left" => s.left = from.left.clone(),
        "flex-direction" => s.flex_direction = from.flex_direction,
        "gap" | "column-gap" => s.gap = from.gap.clone(),
        "width" => s.width = from.width.clone(),
        "height" => s.height = from.height.clone(),
        "min-width" => s.min_width = from.min_width.clone(),
        "max-width" => s.max_width = from.max_width.clone(),
        "min-height" => s.min_height = from.min_height.clone(),
        "max-height" => s.max_height = from.max_height.clone(),
        "margin" => s.margin = from.margin.clone(),
        "padding" => s.padding = from.padding.clone(),
        "border" => {
            s.border_width = from.border_width.clone();
            s.border_style = from.border_style;
            s.border_color = from.border_color;
        }
        "border-width" => s.border_width = from.border_width.clone(),
        "border-style" => s.border_style = from.border_style,
        "border-color" => s.border_color = from.border_color,
        "background" | "background-color" => s.background_color = from.background_color,
        "color" => s.color = from.color,
        "font" => {
            s.font_family = from.font_family.clone();
            s.font_size = from.font_size;
            s.font_weight = from.font_weight;
            s.font_style = from.font_style;
            s.line_height = from.line_height;
        }
        "font-family" => s.font_family = from.font_family.clone(),
        "font-size" => s.font_size = from.font_size,
        "font-weight" => s.font_weight = from.font_weight,
        "font-style" => s.font_style = from.font_style,
        "font-stretch" => s.font_stretch = from.font_stretch,
        "text-align" => s.text_align = from.text_align,
        "text-decoration" | "text-decoration-line" => s.text_decoration = from.text_decoration,
        "text-transform" => s.text_transform = from.text_transform,
        "white-space" => s.white_space = from.white_space,
        "line-height" => s.line_height = from.line_height,
        "list-style" | "list-style-type" => s.list_style = from.list_style,
        "page-break-before" | "break-before" => s.page_break_before = from.page_break_before,
        "page-break-after" | "break-after" => s.page_break_after = from.page_break_after,
        "page-break-inside" | "break-inside" => {
            s.page_break_inside_avoid = from.page_break_inside_avoid
        }
        other => {
            if let Some((group, side)) = edge_property(other) {
                let (dst, src) = match group {
                    EdgeGroup::Margin => (&mut s.margin, &from.margin),
                    EdgeGroup::Padding => (&mut s.padding, &from.padding),
                    EdgeGroup::BorderWidth => (&mut s.border_width, &from.border_width),
                };
                let value = src.clone().side_mut(side).map(|v| v.clone());
                match (dst.side_mut(side), value) {
                    (Some(slot), Some(v)) => *slot = v,
                    _ => return false,
                }
            } else {
                return false;
            }
        }
    }
    true
}

#[derive(Debug, Clone, Copy)]
enum EdgeGroup {
    Margin,
    Padding,
    BorderWidth,
}

/// Split `margin-top`, `padding-left`, `border-right-width` and friends.
fn edge_property(prop: &str) -> Option<(EdgeGroup, &str)> {
    if let Some(side) = prop.strip_prefix("margin-") {
        return Some((EdgeGroup::Margin, side));
    }
    if let Some(side) = prop.strip_prefix("padding-") {
        return Some((EdgeGroup::Padding, side));
    }
    let side = prop.strip_prefix("border-")?.strip_suffix("-width")?;
    Some((EdgeGroup::BorderWidth, side))
}

fn apply_css_property(s: &mut ComputedStyle, prop: &str, val: &str, parent: &ComputedStyle) -> bool {
    let lower = val.to_ascii_lowercase();
    let v = lower.as_str();
    match prop {
        "display" => match Display::parse(v) {
            Some(d) => s.display = d,
            None => return false,
        },
        "position" => {
            s.position = match v {
                "static" => Position::Static,
                "relative" => Position::Relative,
                "absolute" => Position::Absolute,
                "fixed" => Position::Fixed,
                "sticky" => Position::Relative,
                _ => return false,
            }
        }
        "z-index" => {
            s.z_index = match v {
                "auto" => None,
                _ => match v.parse::<i32>() {
                    Ok(z) => Some(z),
                    Err(_) => return false,
                },
            }
        }
        "top" => s.top = v.to_string(),
        "right" => s.right = v.to_string(),
        "bottom" => s.bottom = v.to_string(),
        "left" => s.left = v.to_string(),
        "width" => s.width = v.to_string(),
        "height" => s.height = v.to_string(),
        "min-width" => s.min_width = v.to_string(),
        "max-width" => s.max_width = v.to_string(),
        "min-height" => s.min_height = v.to_string(),
        "max-height" => s.max_height = v.to_string(),
        "gap" | "column-gap" => {
            // `gap: row column` – the column gap is what separates flex items.
            let parts: Vec<&str> = v.split_whitespace().collect();
            match parts.last() {
                Some(g) => s.gap = g.to_string(),
                None => return false,
            }
        }
        "row-gap" => {}
        "flex-direction" => {
            s.flex_direction = match v {
                "row" | "row-reverse" => FlexDirection::Row,
                "column" | "column-reverse" => FlexDirection::Column,
                _ => return false,
            }
        }
        "margin" => return s.margin.set_shorthand(&v.split_whitespace().collect::<Vec<_>>()),
        "padding" => return s.padding.set_shorthand(&v.split_whitespace().collect::<Vec<_>>()),
        "border-width" => {
            let parts: Vec<String> = v.split_whitespace().map(border_width_keyword).collect();
            let refs: Vec<&str> = parts.iter().map(String::as_str).collect();
            return s.border_width.set_shorthand(&refs);
        }
        "border-style" => match parse_border_style(v.split_whitespace().next().unwrap_or("")) {
            Some(bs) => s.border_style = bs,
            None => return false,
        },
        "border-color" => {
            match v.split_whitespace().next().and_then(|c| parse_color(c, s.color)) {
                Some(c) => s.border_color = c,
                None => return false,
            }
        }
        "border" => return apply_border_shorthand(s, v, None),
        "border-top" | "border-right" | "border-bottom" | "border-left" => {
            return apply_border_shorthand(s, v, prop.strip_prefix("border-"));
        }
        "border-top-style" | "border-right-style" | "border-bottom-style"
        | "border-left-style" => match parse_border_style(v) {
            Some(bs) => s.border_style = bs,
            None => return false,
        },
        "border-top-color" | "border-right-color" | "border-bottom-color"
        | "border-left-color" => match parse_color(v, s.color) {
            Some(c) => s.border_color = c,
            None => return false,
        },
        "color" => match parse_color(v, parent.color) {
            Some(c) => s.color = c,
            None => return false,
        },
        "background-color" => match parse_color(v, s.color) {
            Some(c) => s.background_color = c,
            None => return false,
        },
        "background" => {
            // Only the colour component of the shorthand is used.
            let color = split_top_level(v)
                .into_iter()
                .find_map(|tok| parse_color(tok, s.color));
            s.background_color = color.unwrap_or(Rgba::TRANSPARENT);
        }
        "font-family" => s.font_family = v.to_string(),
        "font-size" => match parse_font_size(v, parent.font_size) {
            Some(px) => s.font_size = px,
            None => return false,
        },
        "font-weight" => match parse_font_weight(v, parent.font_weight) {
            Some(w) => s.font_weight = w,
            None => return false,
        },
        "font-style" => {
            s.font_style = match v {
                "italic" | "oblique" => FontStyle::Italic,
                "normal" => FontStyle::Normal,
                _ => return false,
            }
        }
        "font-stretch" => {
            s.font_stretch = if v.contains("condensed") {
                FontStretch::Condensed
            } else {
                FontStretch::Normal
            }
        }
        "font" => return apply_font_shorthand(s, v, parent),
        "text-align" => {
            s.text_align = match v {
                "left" | "start" => TextAlign::Left,
                "center" => TextAlign::Center,
                "right" | "end" => TextAlign::Right,
                "justify" => TextAlign::Justify,
                _ => return false,
            }
        }
        "text-decoration" | "text-decoration-line" => {
            s.text_decoration = if v.contains("underline") {
                TextDecoration::Underline
            } else if v.contains("line-through") {
                TextDecoration::LineThrough
            } else if v.starts_with("none") {
                TextDecoration::None
            } else {
                return false;
            }
        }
        "text-transform" => {
            s.text_transform = match v {
                "uppercase" => TextTransform::Uppercase,
                "lowercase" => TextTransform::Lowercase,
                "capitalize" => TextTransform::Capitalize,
                "none" => TextTransform::None,
                _ => return false,
            }
        }
        "white-space" => {
            s.white_space = match v {
                "normal" => WhiteSpace::Normal,
                "pre" => WhiteSpace::Pre,
                "pre-wrap" | "break-spaces" => WhiteSpace::PreWrap,
                "pre-line" => WhiteSpace::PreLine,
                "nowrap" => WhiteSpace::NoWrap,
                _ => return false,
            }
        }
        "line-height" => match parse_line_height(v) {
            Some(lh) => s.line_height = lh,
            None => return false,
        },
        "list-style" | "list-style-type" => {
            let mut found = false;
            for tok in v.split_whitespace() {
                if let Some(ls) = parse_list_style(tok) {
                    s.list_style = ls;
                    found = true;
                }
            }
            return found;
        }
        "page-break-before" | "break-before" => s.page_break_before = is_forced_break(v),
        "page-break-after" | "break-after" => s.page_break_after = is_forced_break(v),
        "page-break-inside" | "break-inside" => s.page_break_inside_avoid = v.starts_with("avoid"),
        other => match edge_property(other) {
            Some((group, side)) => {
                let value = match group {
                    EdgeGroup::BorderWidth => border_width_keyword(v),
                    _ => v.to_string(),
                };
                let edges = match group {
                    EdgeGroup::Margin => &mut s.margin,
                    EdgeGroup::Padding => &mut s.padding,
                    EdgeGroup::BorderWidth => &mut s.border_width,
                };
                match edges.side_mut(side) {
                    Some(slot) => *slot = value,
                    None => return false,
                }
            }
            None => return false,
        },
    }
    true
}

/// `border` / `border-<side>`: width, style and colour in any order.
/// A side-specific shorthand sets that side's width and the shared style and colour.
fn apply_border_shorthand(s: &mut ComputedStyle, v: &str, side: Option<&str>) -> bool {
    if v == "none" || v == "0" {
        match side {
            Some(side) => {
                if let Some(slot) = s.border_width.side_mut(side) {
                    *slot = "0".to_string();
                }
            }
            None => s.border_style = BorderStyle::None,
        }
        return true;
    }

    let mut width = None;
    let mut style = None;
    let mut color = None;
    for tok in split_top_level(v) {
        let numeric = tok.starts_with(|c: char| c.is_ascii_digit() || c == '.' || c == '-');
        if let Some(bs) = parse_border_style(tok) {
            style = Some(bs);
        } else if matches!(tok, "thin" | "medium" | "thick") || (numeric && Length::parse(tok).is_some()) {
            width = Some(border_width_keyword(tok));
        } else if let Some(c) = parse_color(tok, s.color) {
            color = Some(c);
        } else {
            return false;
        }
    }

    let width = width.unwrap_or_else(|| "3px".to_string());
    // A single side on an unbordered box leaves the other sides at zero.
    if side.is_some() && s.border_style == BorderStyle::None {
        s.border_width = BoxEdges::uniform("0");
    }
    match side {
        Some(side) => match s.border_width.side_mut(side) {
            Some(slot) => *slot = width,
            None => return false,
        },
        None => s.border_width = BoxEdges::uniform(&width),
    }
    s.border_style = style.unwrap_or(BorderStyle::None);
    if let Some(c) = color {
        s.border_color = c;
    } else if side.is_none() {
        s.border_color = s.color;
    }
    true
}

fn apply_font_shorthand(s: &mut ComputedStyle, v: &str, parent: &ComputedStyle) -> bool {
    let tokens: Vec<&str> = v.split_whitespace().collect();
    // The size token is the first one that parses as a font size.
    let Some(size_idx) = tokens.iter().position(|t| {
        let size = t.split('/').next().unwrap_or("");
        parse_font_size(size, parent.font_size).is_some()
            && !matches!(size, "bold" | "normal")
    }) else {
        return false;
    };

    for tok in &tokens[..size_idx] {
        match *tok {
            "italic" | "oblique" => s.font_style = FontStyle::Italic,
            "normal" => {}
            t => {
                if let Some(w) = parse_font_weight(t, parent.font_weight) {
                    s.font_weight = w;
                } else if t.contains("condensed") {
                    s.font_stretch = FontStretch::Condensed;
                }
            }
        }
    }

    let mut size_parts = tokens[size_idx].splitn(2, '/');
    if let Some(px) = size_parts.next().and_then(|t| parse_font_size(t, parent.font_size)) {
        s.font_size = px;
    }
    if let Some(lh) = size_parts.next().and_then(|t| parse_line_height(t)) {
        s.line_height = lh;
    }

    let family = tokens[size_idx + 1..].join(" ");
    if !family.is_empty() {
        s.font_family = family;
    }
    true
}

// ---------------------------------------------------------------------------
// Value parsers
// ---------------------------------------------------------------------------

/// Parse a colour; `currentcolor` resolves to `current`.
pub fn parse_color(v: &str, current: Rgba) -> Option<Rgba> {
    if v.eq_ignore_ascii_case("currentcolor") {
        return Some(current);
    }
    Rgba::parse(v)
}

fn parse_border_style(v: &str) -> Option<BorderStyle> {
    Some(match v {
        "none" | "hidden" => BorderStyle::None,
        "solid" | "groove" | "ridge" | "inset" | "outset" => BorderStyle::Solid,
        "dashed" => BorderStyle::Dashed,
        "dotted" => BorderStyle::Dotted,
        "double" => BorderStyle::Double,
        _ => return None,
    })
}

fn border_width_keyword(v: &str) -> String {
    match v {
        "thin" => "1px".to_string(),
        "medium" => "3px".to_string(),
        "thick" => "5px".to_string(),
        other => other.to_string(),
    }
}

fn parse_font_size(v: &str, parent_size: f32) -> Option<f32> {
    let px = match v {
        "xx-small" => 9.0,
        "x-small" => 10.0,
        "small" => 13.0,
        "medium" => 16.0,
        "large" => 18.0,
        "x-large" => 24.0,
        "xx-large" => 32.0,
        "xxx-large" => 48.0,
        "smaller" => parent_size * 0.83,
        "larger" => parent_size * 1.2,
        _ => {
            let ctx = LengthContext {
                percent_base: parent_size,
                ..LengthContext::default()
            };
            Length::parse(v)?.to_px(&ctx)?
        }
    };
    Some(clamp_length(px).clamp(0.0, 1000.0))
}

fn parse_font_weight(v: &str, parent: FontWeight) -> Option<FontWeight> {
    Some(match v {
        "normal" => FontWeight::Normal,
        "bold" => FontWeight::Bold,
        "bolder" => match parent {
            FontWeight::Light => FontWeight::Normal,
            _ => FontWeight::Bold,
        },
        "lighter" => match parent {
            FontWeight::Bold => FontWeight::Normal,
            _ => FontWeight::Light,
        },
        n => {
            let weight = n.parse::<u32>().ok()?;
            match weight {
                0..=350 => FontWeight::Light,
                351..=550 => FontWeight::Normal,
                _ => FontWeight::Bold,
            }
        }
    })
}

fn parse_line_height(v: &str) -> Option<LineHeight> {
    if v == "normal" {
        return Some(LineHeight::Normal);
    }
    if let Ok(n) = v.parse::<f32>() {
        return (n.is_finite() && n >= 0.0).then_some(LineHeight::Number(n.min(100.0)));
    }
    if let Some(p) = v.strip_suffix('%') {
        let n = p.trim().parse::<f32>().ok()?;
        return (n.is_finite() && n >= 0.0).then_some(LineHeight::Number((n / 100.0).min(100.0)));
    }
    let px = Length::parse(v)?.to_px(&LengthContext::default())?;
    Some(LineHeight::Px(px.max(0.0)))
}

fn parse_list_style(v: &str) -> Option<ListStyle> {
    Some(match v {
        "disc" | "circle" | "square" => ListStyle::Disc,
        "decimal" | "decimal-leading-zero" | "lower-alpha" | "upper-alpha" | "lower-roman"
        | "upper-roman" => ListStyle::Decimal,
        "none" => ListStyle::None,
        _ => return None,
    })
}

fn is_forced_break(v: &str) -> bool {
    matches!(v, "always" | "page" | "left" | "right" | "recto" | "verso")
}

/// Split on whitespace outside parentheses, so `rgb(1, 2, 3)` stays one token.
fn split_top_level(v: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut start: Option<usize> = None;
    for (i, c) in v.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = (depth - 1).max(0),
            c if c.is_whitespace() && depth == 0 => {
                if let Some(st) = start.take() {
                    out.push(&v[st..i]);
                }
                continue;
            }
            _ => {}
        }
        if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(st) = start {
        out.push(&v[st..]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decl(property: &str, value: &str) -> Declaration {
        Declaration {
            property: property.to_string(),
            value: value.to_string(),
            important: false,
        }
    }

    fn apply(s: &mut ComputedStyle, property: &str, value: &str) -> bool {
        let parent = ComputedStyle::default();
        apply_declaration(s, &decl(property, value), &parent)
    }

    #[test]
    fn margin_shorthand_forms() {
        let mut s = ComputedStyle::default();
        assert!(apply(&mut s, "margin", "1px 2px 3px"));
        assert_eq!(s.margin.top, "1px");
        assert_eq!(s.margin.right, "2px");
        assert_eq!(s.margin.bottom, "3px");
        assert_eq!(s.margin.left, "2px");
        assert!(apply(&mut s, "margin-left", "auto"));
        assert_eq!(s.margin.left, "auto");
    }

    #[test]
    fn border_shorthand() {
        let mut s = ComputedStyle::default();
        assert!(apply(&mut s, "border", "2px dashed rgb(255, 0, 0)"));
        assert_eq!(s.border_width.left, "2px");
        assert_eq!(s.border_style, BorderStyle::Dashed);
        assert_eq!(s.border_color, Rgba::rgb(255, 0, 0));

        let mut s = ComputedStyle::default();
        assert!(apply(&mut s, "border-bottom", "thin solid"));
        assert_eq!(s.border_width.bottom, "1px");
        assert_eq!(s.border_width.top, "3px");
        assert_eq!(s.border_style, BorderStyle::Solid);
    }

    #[test]
    fn colors_via_csscolorparser() {
        assert_eq!(Rgba::parse("#ff8800"), Some(Rgba::rgb(255, 136, 0)));
        assert_eq!(Rgba::parse("red"), Some(Rgba::rgb(255, 0, 0)));
        assert_eq!(Rgba::parse("transparent").map(|c| c.a), Some(0));
        assert_eq!(Rgba::parse("not-a-colour"), None);
        assert_eq!(Rgba::rgb(255, 255, 255).to_grayscale(), Rgba::WHITE);
    }

    #[test]
    fn font_size_units() {
        let mut parent = ComputedStyle::default();
        parent.font_size = 20.0;
        let mut s = ComputedStyle::default();
        s.inherit_from(&parent);
        assert!(apply_declaration(&mut s, &decl("font-size", "1.5em"), &parent));
        assert_eq!(s.font_size, 24.0);
        assert!(apply_declaration(&mut s, &decl("font-size", "50%"), &parent));
        assert_eq!(s.font_size, 10.0);
        assert!(apply_declaration(&mut s, &decl("font-size", "12pt"), &parent));
        assert_eq!(s.font_size, 16.0);
    }

    #[test]
    fn inherit_and_initial_keywords() {
        let mut parent = ComputedStyle::default();
        parent.width = "300px".to_string();
        parent.background_color = Rgba::WHITE;
        let mut s = ComputedStyle::default();
        assert!(apply_declaration(&mut s, &decl("width", "inherit"), &parent));
        assert_eq!(s.width, "300px");
        assert!(apply_declaration(&mut s, &decl("background-color", "INHERIT"), &parent));
        assert_eq!(s.background_color, Rgba::WHITE);
        assert!(apply_declaration(&mut s, &decl("width", "initial"), &parent));
        assert_eq!(s.width, "auto");
        assert!(apply_declaration(&mut s, &decl("padding-top", "inherit"), &parent));
    }

    #[test]
    fn font_shorthand() {
        let mut s = ComputedStyle::default();
        assert!(apply(&mut s, "font", "italic bold 12px/1.5 Georgia, serif"));
        assert_eq!(s.font_style, FontStyle::Italic);
        assert_eq!(s.font_weight, FontWeight::Bold);
        assert_eq!(s.font_size, 12.0);
        assert_eq!(s.line_height, LineHeight::Number(1.5));
        assert_eq!(s.font_family, "georgia, serif");
    }

    #[test]
    fn unknown_values_are_rejected() {
        let mut s = ComputedStyle::default();
        assert!(!apply(&mut s, "display", "bogus"));
        assert_eq!(s.display, Display::Inline);
        assert!(!apply(&mut s, "no-such-property", "1"));
        assert!(!apply(&mut s, "color", "nope"));
    }

    #[test]
    fn page_break_hints() {
        let mut s = ComputedStyle::default();
        assert!(apply(&mut s, "page-break-before", "always"));
        assert!(apply(&mut s, "break-after", "page"));
        assert!(apply(&mut s, "page-break-inside", "avoid"));
        assert!(s.page_break_before && s.page_break_after && s.page_break_inside_avoid);
    }

    #[test]
    fn line_height_forms() {
        let mut s = ComputedStyle::default();
        s.font_size = 10.0;
        assert!(apply(&mut s, "line-height", "2"));
        assert_eq!(s.line_height_px(), 20.0);
        assert!(apply(&mut s, "line-height", "150%"));
        assert_eq!(s.line_height_px(), 15.0);
        assert!(apply(&mut s, "line-height", "24px"));
        assert_eq!(s.line_height_px(), 24.0);
    }
}
