//! Layout engine – turns the styled tree into a tree of absolutely positioned
//! boxes in CSS pixels.
//!
//! Layout runs in two passes. The first sizes and places every box in normal
//! flow: block children stack vertically, inline content is broken into line
//! boxes, flex rows and table rows split their width evenly. The second pass
//! applies `relative`, `absolute` and `fixed` positioning against the final
//! geometry of the containing blocks.

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};
use log::{debug, warn};

use crate::cascade::StyledNode;
use crate::dom::Attributes;
use crate::error::Warnings;
use crate::fonts::{wrap_text, FontMetrics};
use crate::length::{resolve_length, LengthContext};
use crate::style::{
    BorderStyle, BoxEdges, ComputedStyle, Display, FlexDirection, ListStyle, Position, TextAlign,
    TextTransform, WhiteSpace,
};

const EPS: f32 = 0.01;

// ---------------------------------------------------------------------------
// Layout tree
// ---------------------------------------------------------------------------

/// Axis-aligned rectangle in CSS px.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LayoutBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl LayoutBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Grow outward by `edges`.
    pub fn expand(&self, edges: &Edges) -> LayoutBox {
        LayoutBox {
            x: self.x - edges.left,
            y: self.y - edges.top,
            width: self.width + edges.left + edges.right,
            height: self.height + edges.top + edges.bottom,
        }
    }

    pub fn union(&self, other: &LayoutBox) -> LayoutBox {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        LayoutBox {
            x,
            y,
            width: self.right().max(other.right()) - x,
            height: self.bottom().max(other.bottom()) - y,
        }
    }
}

/// Resolved edge widths in px.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Edges {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Edges {
    pub fn horizontal(&self) -> f32 {
        self.left + self.right
    }

    pub fn vertical(&self) -> f32 {
        self.top + self.bottom
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Anonymous root covering the whole document.
    Root,
    Element(String),
    Text,
}

/// One wrapped line of a text run, positioned in its line box.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    pub x: f32,
    /// Top of the line box.
    pub y: f32,
    pub width: f32,
    /// Height of the line box.
    pub height: f32,
}

impl TextLine {
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageContent {
    pub src: String,
    /// Pixel size decoded from a data URI, when available.
    pub intrinsic: Option<(u32, u32)>,
}

/// A laid-out box.
#[derive(Debug, Clone)]
pub struct LayoutNode {
    pub id: usize,
    pub kind: NodeKind,
    pub style: ComputedStyle,
    /// Content box.
    pub content: LayoutBox,
    pub padding: Edges,
    pub border: Edges,
    pub margin: Edges,
    pub children: Vec<LayoutNode>,
    /// Wrapped lines; only text nodes carry any.
    pub lines: Vec<TextLine>,
    pub image: Option<ImageContent>,
    pub marker: Option<String>,
    /// Stacking key; non-zero only for positioned elements.
    pub z_index: i32,
}

impl LayoutNode {
    fn new(id: usize, kind: NodeKind, style: ComputedStyle) -> Self {
        Self {
            id,
            kind,
            style,
            content: LayoutBox::default(),
            padding: Edges::default(),
            border: Edges::default(),
            margin: Edges::default(),
            children: Vec::new(),
            lines: Vec::new(),
            image: None,
            marker: None,
            z_index: 0,
        }
    }

    pub fn padding_box(&self) -> LayoutBox {
        self.content.expand(&self.padding)
    }

    pub fn border_box(&self) -> LayoutBox {
        self.padding_box().expand(&self.border)
    }

    pub fn margin_box(&self) -> LayoutBox {
        self.border_box().expand(&self.margin)
    }

    pub fn tag(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Element(tag) => Some(tag),
            _ => None,
        }
    }

    pub fn is_text(&self) -> bool {
        self.kind == NodeKind::Text
    }

    pub fn is_out_of_flow(&self) -> bool {
        self.style.is_out_of_flow()
    }

    pub fn is_block_level(&self) -> bool {
        match self.kind {
            NodeKind::Root => true,
            NodeKind::Element(_) => self.style.display.is_block_level(),
            NodeKind::Text => false,
        }
    }

    /// Move this subtree by `(dx, dy)`.
    pub fn translate(&mut self, dx: f32, dy: f32) {
        self.content.x += dx;
        self.content.y += dy;
        for line in &mut self.lines {
            line.x += dx;
            line.y += dy;
        }
        for child in &mut self.children {
            child.translate(dx, dy);
        }
    }

    /// Children in painting order: a stable sort on the stacking key.
    pub fn paint_order(&self) -> Vec<&LayoutNode> {
        let mut ordered: Vec<&LayoutNode> = self.children.iter().collect();
        ordered.sort_by_key(|c| c.z_index);
        ordered
    }

    /// Pre-order walk.
    pub fn walk<'a>(&'a self, f: &mut dyn FnMut(&'a LayoutNode)) {
        f(self);
        for child in &self.children {
            child.walk(f);
        }
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(LayoutNode::node_count).sum::<usize>()
    }

    /// Largest bottom edge in this subtree, including text lines.
    pub fn max_bottom(&self) -> f32 {
        let mut bottom = self.margin_box().bottom();
        for line in &self.lines {
            bottom = bottom.max(line.bottom());
        }
        for child in &self.children {
            bottom = bottom.max(child.max_bottom());
        }
        bottom
    }
}

/// Size of the initial containing block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    fn rect(&self) -> LayoutBox {
        LayoutBox::new(0.0, 0.0, self.width, self.height)
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Lay out a styled tree inside `viewport`. Anomalies such as unmeasurable
/// lengths or unloadable images are reported through `warnings`.
pub fn compute_layout(styled: &[StyledNode], viewport: Viewport, warnings: &mut Warnings) -> LayoutNode {
    let mut layouter = Layouter {
        viewport,
        next_id: 1,
        warnings,
    };

    let root_style = ComputedStyle {
        display: Display::Block,
        ..ComputedStyle::default()
    };
    let mut root = LayoutNode::new(0, NodeKind::Root, root_style.clone());
    root.content = LayoutBox::new(0.0, 0.0, viewport.width, 0.0);

    let frame = Frame {
        cb_width: viewport.width,
        cb_height: None,
        abs_width: viewport.width,
        abs_height: Some(viewport.height),
    };
    let height = layouter.layout_flow(&mut root, &root_style, styled, &Attributes::new(), frame, false);
    root.content.height = height;

    let rect = viewport.rect();
    layouter.apply_positioning(&mut root, rect, rect);
    debug!(
        "layout produced {} nodes, document height {:.1}px",
        root.node_count(),
        root.content.height
    );
    root
}

// ---------------------------------------------------------------------------
// Flow layout
// ---------------------------------------------------------------------------

/// Containing-block sizes handed down the tree.
#[derive(Debug, Clone, Copy)]
struct Frame {
    cb_width: f32,
    /// Definite height of the containing block, if any.
    cb_height: Option<f32>,
    /// Padding box of the nearest positioned ancestor.
    abs_width: f32,
    abs_height: Option<f32>,
}

struct Layouter<'w> {
    viewport: Viewport,
    next_id: usize,
    warnings: &'w mut Warnings,
}

impl Layouter<'_> {
    fn alloc_id(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn ctx(&self, percent_base: f32) -> LengthContext {
        LengthContext {
            percent_base,
            viewport_width: self.viewport.width,
            viewport_height: self.viewport.height,
        }
    }

    fn resolve(&mut self, value: &str, ctx: &LengthContext) -> Option<f32> {
        resolve_length(value, ctx, self.warnings)
    }

    fn resolve_edges(&mut self, edges: &BoxEdges, ctx: &LengthContext, non_negative: bool) -> Edges {
        let mut side = |v: &str| {
            let px = resolve_length(v, ctx, self.warnings).unwrap_or(0.0);
            if non_negative {
                px.max(0.0)
            } else {
                px
            }
        };
        Edges {
            top: side(&edges.top),
            right: side(&edges.right),
            bottom: side(&edges.bottom),
            left: side(&edges.left),
        }
    }

    fn border_edges(&mut self, style: &ComputedStyle, ctx: &LengthContext) -> Edges {
        if style.border_style == BorderStyle::None {
            return Edges::default();
        }
        self.resolve_edges(&style.border_width, ctx, true)
    }

    /// Lay out an element whose margin box starts at `(x, y)`.
    /// `shrink` selects shrink-to-fit instead of filling the containing block.
    #[allow(clippy::too_many_arguments)]
    fn layout_element(
        &mut self,
        tag: &str,
        style: &ComputedStyle,
        children: &[StyledNode],
        attrs: &Attributes,
        x: f32,
        y: f32,
        frame: Frame,
        shrink: bool,
    ) -> LayoutNode {
        let id = self.alloc_id();
        let mut out = LayoutNode::new(id, NodeKind::Element(tag.to_string()), style.clone());
        let ctx = self.ctx(frame.cb_width);

        let margin_auto_left = style.margin.left.trim() == "auto";
        let margin_auto_right = style.margin.right.trim() == "auto";
        out.margin = self.resolve_edges(&style.margin, &ctx, false);
        out.padding = self.resolve_edges(&style.padding, &ctx, true);
        out.border = self.border_edges(style, &ctx);
        let h_edges = out.padding.horizontal() + out.border.horizontal();

        let height_base = frame.cb_height.unwrap_or(self.viewport.height);
        let height_ctx = ctx.with_percent_base(height_base);
        let specified_w = self.resolve(&style.width, &ctx).map(|w| w.max(0.0));
        let mut specified_h = self.resolve(&style.height, &height_ctx).map(|h| h.max(0.0));
        let min_w = self.resolve(&style.min_width, &ctx).unwrap_or(0.0);
        let max_w = self.resolve(&style.max_width, &ctx);
        let min_h = self.resolve(&style.min_height, &height_ctx).unwrap_or(0.0);
        let max_h = self.resolve(&style.max_height, &height_ctx);

        let available = (frame.cb_width - out.margin.horizontal() - h_edges).max(0.0);

        let image = if tag == "img" {
            let src = attrs.get("src").unwrap_or("").to_string();
            let intrinsic = image_intrinsic_size(&src);
            if intrinsic.is_none() {
                if src.is_empty() {
                    self.warnings.push("Image without src skipped");
                } else {
                    warn!("image '{}' could not be decoded", truncate(&src, 40));
                    self.warnings
                        .push(format!("Image '{}' could not be loaded", truncate(&src, 60)));
                }
            }
            Some(ImageContent { src, intrinsic })
        } else {
            None
        };

        let mut width = match (specified_w, &image) {
            (Some(w), _) => w,
            (None, Some(img)) => match (img.intrinsic, specified_h) {
                (Some((iw, ih)), Some(h)) if ih > 0 => h * iw as f32 / ih as f32,
                (Some((iw, _)), _) => (iw as f32).min(available),
                (None, _) => 0.0,
            },
            (None, None) if shrink => {
                let mut scratch = Warnings::new();
                let content = self.max_content_children(style, children, available, &mut scratch);
                content.min(available)
            }
            (None, None) => available,
        };
        width = clamp_range(width, min_w, max_w);

        if let (Some(img), None) = (&image, specified_h) {
            specified_h = Some(match img.intrinsic {
                Some((iw, ih)) if iw > 0 => width * ih as f32 / iw as f32,
                _ => 0.0,
            });
        }

        // Auto horizontal margins centre a block with a definite width.
        if !shrink && specified_w.is_some() {
            let leftover = frame.cb_width - width - h_edges - out.margin.horizontal();
            match (margin_auto_left, margin_auto_right) {
                (true, true) => {
                    out.margin.left = (leftover / 2.0).max(0.0);
                    out.margin.right = (leftover / 2.0).max(0.0);
                }
                (true, false) => out.margin.left = leftover.max(0.0),
                (false, true) => out.margin.right = leftover.max(0.0),
                (false, false) => {}
            }
        }

        out.content = LayoutBox::new(
            x + out.margin.left + out.border.left + out.padding.left,
            y + out.margin.top + out.border.top + out.padding.top,
            width,
            0.0,
        );

        let child_frame = if style.is_positioned() {
            Frame {
                cb_width: width,
                cb_height: specified_h,
                abs_width: width + out.padding.horizontal(),
                abs_height: specified_h.map(|h| h + out.padding.vertical()),
            }
        } else {
            Frame {
                cb_width: width,
                cb_height: specified_h,
                ..frame
            }
        };

        let content_height = if image.is_some() {
            0.0
        } else {
            match style.display {
                Display::Flex if style.flex_direction == FlexDirection::Row => {
                    self.layout_row(&mut out, style, children, child_frame, true)
                }
                Display::TableRow => self.layout_row(&mut out, style, children, child_frame, false),
                Display::Flex => self.layout_flow(&mut out, style, children, attrs, child_frame, true),
                _ => self.layout_flow(&mut out, style, children, attrs, child_frame, false),
            }
        };

        out.content.height = clamp_range(specified_h.unwrap_or(content_height), min_h, max_h);
        out.image = image;
        out.z_index = if style.is_positioned() {
            style.z_index.unwrap_or(0)
        } else {
            0
        };
        out
    }

    /// Block flow: block-level children stack, inline runs become line boxes.
    /// Returns the content height used. With `blockify`, element children are
    /// treated as blocks (flex column items) and separated by `gap`.
    fn layout_flow(
        &mut self,
        out: &mut LayoutNode,
        style: &ComputedStyle,
        children: &[StyledNode],
        attrs: &Attributes,
        frame: Frame,
        blockify: bool,
    ) -> f32 {
        let x0 = out.content.x;
        let y0 = out.content.y;
        let width = out.content.width;
        let gap = if blockify {
            let ctx = self.ctx(width);
            self.resolve(&style.gap, &ctx).unwrap_or(0.0).max(0.0)
        } else {
            0.0
        };

        let mut cursor = y0;
        let mut placed_any = false;
        let mut run: Vec<&StyledNode> = Vec::new();
        let mut counter: i64 = attrs
            .get("start")
            .and_then(|s| s.trim().parse::<i64>().ok())
            .map(|s| s - 1)
            .unwrap_or(0);

        for child in children {
            let inline_level = match child {
                StyledNode::Text { .. } => true,
                StyledNode::Element { style: cs, .. } => {
                    !blockify && !cs.is_out_of_flow() && !cs.display.is_block_level()
                }
            };
            if inline_level {
                run.push(child);
                continue;
            }
            self.flush_run(out, &mut run, x0, &mut cursor, width, style, frame, gap, &mut placed_any);

            let StyledNode::Element {
                tag,
                style: cs,
                children: grandchildren,
                attrs: child_attrs,
            } = child
            else {
                continue;
            };

            if cs.is_out_of_flow() {
                // Static position; does not advance the flow.
                let abs_frame = if cs.position == Position::Fixed {
                    Frame {
                        cb_width: self.viewport.width,
                        cb_height: Some(self.viewport.height),
                        abs_width: self.viewport.width,
                        abs_height: Some(self.viewport.height),
                    }
                } else {
                    Frame {
                        cb_width: frame.abs_width,
                        cb_height: frame.abs_height,
                        ..frame
                    }
                };
                let node =
                    self.layout_element(tag, cs, grandchildren, child_attrs, x0, cursor, abs_frame, true);
                out.children.push(node);
                continue;
            }

            if placed_any {
                cursor += gap;
            }
            let mut node =
                self.layout_element(tag, cs, grandchildren, child_attrs, x0, cursor, frame, false);
            if cs.display == Display::ListItem {
                counter += 1;
                node.marker = match cs.list_style {
                    ListStyle::Disc => Some("\u{2022}".to_string()),
                    ListStyle::Decimal => Some(format!("{counter}.")),
                    ListStyle::None => None,
                };
            }
            cursor = cursor.max(node.margin_box().bottom());
            placed_any = true;
            out.children.push(node);
        }
        self.flush_run(out, &mut run, x0, &mut cursor, width, style, frame, gap, &mut placed_any);

        (cursor - y0).max(0.0)
    }

    #[allow(clippy::too_many_arguments)]
    fn flush_run(
        &mut self,
        out: &mut LayoutNode,
        run: &mut Vec<&StyledNode>,
        x0: f32,
        cursor: &mut f32,
        width: f32,
        style: &ComputedStyle,
        frame: Frame,
        gap: f32,
        placed_any: &mut bool,
    ) {
        if run.is_empty() {
            return;
        }
        let offset = if *placed_any { gap } else { 0.0 };
        let (nodes, height) = self.layout_inline_run(run, x0, *cursor + offset, width, style, frame);
        run.clear();
        if nodes.is_empty() && height <= 0.0 {
            return;
        }
        *cursor += offset + height;
        *placed_any = true;
        out.children.extend(nodes);
    }

    /// Flex rows and table rows: every item gets an equal share of the width
    /// and items are stretched to the tallest one.
    fn layout_row(
        &mut self,
        out: &mut LayoutNode,
        style: &ComputedStyle,
        children: &[StyledNode],
        frame: Frame,
        use_gap: bool,
    ) -> f32 {
        let x0 = out.content.x;
        let y0 = out.content.y;
        let width = out.content.width;
        let gap = if use_gap {
            let ctx = self.ctx(width);
            self.resolve(&style.gap, &ctx).unwrap_or(0.0).max(0.0)
        } else {
            0.0
        };

        // Group children into items: elements stand alone, text runs are anonymous.
        let mut items: Vec<RowItem> = Vec::new();
        let mut run: Vec<&StyledNode> = Vec::new();
        let mut out_of_flow: Vec<&StyledNode> = Vec::new();
        for child in children {
            match child {
                StyledNode::Text { .. } => run.push(child),
                StyledNode::Element { style: cs, .. } if cs.is_out_of_flow() => out_of_flow.push(child),
                StyledNode::Element { .. } => {
                    if has_visible_text(&run) {
                        items.push(RowItem::Run(std::mem::take(&mut run)));
                    }
                    run.clear();
                    items.push(RowItem::Element(child));
                }
            }
        }
        if has_visible_text(&run) {
            items.push(RowItem::Run(run));
        }

        let n = items.len();
        let mut row_height: f32 = 0.0;
        let mut stretchable = Vec::new();
        if n > 0 {
            let share = ((width - gap * (n - 1) as f32) / n as f32).max(0.0);
            let item_frame = Frame {
                cb_width: share,
                ..frame
            };
            for (i, item) in items.iter().enumerate() {
                let x = x0 + i as f32 * (share + gap);
                match item {
                    RowItem::Element(StyledNode::Element {
                        tag,
                        style: cs,
                        children: gc,
                        attrs,
                    }) => {
                        let node = self.layout_element(tag, cs, gc, attrs, x, y0, item_frame, false);
                        row_height = row_height.max(node.margin_box().height);
                        if cs.height.trim() == "auto" {
                            stretchable.push(out.children.len());
                        }
                        out.children.push(node);
                    }
                    RowItem::Element(StyledNode::Text { .. }) => {}
                    RowItem::Run(run) => {
                        let (nodes, h) = self.layout_inline_run(run, x, y0, share, style, item_frame);
                        row_height = row_height.max(h);
                        out.children.extend(nodes);
                    }
                }
            }
        }

        for idx in stretchable {
            let node = &mut out.children[idx];
            let extra = row_height - node.margin_box().height;
            if extra > 0.0 {
                node.content.height += extra;
            }
        }

        for child in out_of_flow {
            if let StyledNode::Element {
                tag,
                style: cs,
                children: gc,
                attrs,
            } = child
            {
                let abs_frame = Frame {
                    cb_width: frame.abs_width,
                    cb_height: frame.abs_height,
                    ..frame
                };
                let node = self.layout_element(tag, cs, gc, attrs, x0, y0, abs_frame, true);
                out.children.push(node);
            }
        }
        row_height
    }

    // -----------------------------------------------------------------------
    // Intrinsic widths
    // -----------------------------------------------------------------------

    /// Max-content width of a node's margin box.
    fn max_content_width(&mut self, node: &StyledNode, cb_width: f32, scratch: &mut Warnings) -> f32 {
        match node {
            StyledNode::Text { text, style } => {
                let metrics = FontMetrics::for_style(style);
                let mut last_space = true;
                let processed = process_text(text, style, &mut last_space);
                processed
                    .split('\n')
                    .map(|l| metrics.measure(l.trim_end_matches(' ')))
                    .fold(0.0, f32::max)
            }
            StyledNode::Element {
                tag,
                style,
                children,
                attrs,
            } => {
                let ctx = self.ctx(cb_width);
                let mut edges = 0.0;
                for v in [&style.margin.left, &style.margin.right, &style.padding.left, &style.padding.right] {
                    edges += resolve_length(v, &ctx, scratch).unwrap_or(0.0);
                }
                if style.border_style != BorderStyle::None {
                    for v in [&style.border_width.left, &style.border_width.right] {
                        edges += resolve_length(v, &ctx, scratch).unwrap_or(0.0).max(0.0);
                    }
                }
                if let Some(w) = resolve_length(&style.width, &ctx, scratch) {
                    return w.max(0.0) + edges;
                }
                if tag == "img" {
                    let iw = attrs
                        .get("src")
                        .and_then(image_intrinsic_size)
                        .map(|(w, _)| w as f32)
                        .unwrap_or(0.0);
                    return iw + edges;
                }
                self.max_content_children(style, children, cb_width, scratch) + edges
            }
        }
    }

    fn max_content_children(
        &mut self,
        style: &ComputedStyle,
        children: &[StyledNode],
        cb_width: f32,
        scratch: &mut Warnings,
    ) -> f32 {
        let row = matches!(style.display, Display::TableRow)
            || (style.display == Display::Flex && style.flex_direction == FlexDirection::Row);
        let mut best: f32 = 0.0;
        let mut run: f32 = 0.0;
        for child in children {
            if let StyledNode::Element { style: cs, .. } = child {
                if cs.is_out_of_flow() {
                    continue;
                }
            }
            let w = self.max_content_width(child, cb_width, scratch);
            let inline_level = match child {
                StyledNode::Text { .. } => true,
                StyledNode::Element { style: cs, .. } => !cs.display.is_block_level(),
            };
            if row || inline_level {
                run += w;
            } else {
                best = best.max(run).max(w);
                run = 0.0;
            }
        }
        best.max(run)
    }

    // -----------------------------------------------------------------------
    // Inline formatting
    // -----------------------------------------------------------------------

    /// Break a run of inline-level nodes into line boxes starting at
    /// `(x0, y0)`. Returns the positioned nodes and the total height.
    fn layout_inline_run(
        &mut self,
        run: &[&StyledNode],
        x0: f32,
        y0: f32,
        width: f32,
        block_style: &ComputedStyle,
        frame: Frame,
    ) -> (Vec<LayoutNode>, f32) {
        let mut st = InlineState {
            width,
            cursor: 0.0,
            lines: vec![LineInfo::default()],
            last_was_space: true,
            slots: Vec::new(),
            placements: Vec::new(),
        };
        let inline_frame = Frame {
            cb_width: width,
            ..frame
        };
        for node in run {
            self.inline_walk(&mut st, node, None, inline_frame);
        }

        // Line geometry.
        let strut = block_style.line_height_px();
        let mut tops = Vec::with_capacity(st.lines.len());
        let mut y = y0;
        for line in &st.lines {
            tops.push(y);
            y += line.final_height(strut);
        }
        let total = y - y0;

        for p in std::mem::take(&mut st.placements) {
            let line = &st.lines[p.line];
            let line_h = line.final_height(strut);
            let slack = (width - line.used).max(0.0);
            let align = match block_style.text_align {
                TextAlign::Center => slack / 2.0,
                TextAlign::Right => slack,
                TextAlign::Left | TextAlign::Justify => 0.0,
            };
            let x = x0 + p.x + align;
            let Some(node) = st.slots[p.slot].node.as_mut() else {
                continue;
            };
            match p.kind {
                PlacementKind::Text { text, width } => node.lines.push(TextLine {
                    text,
                    x,
                    y: tops[p.line],
                    width,
                    height: line_h,
                }),
                PlacementKind::Atomic { height } => {
                    let mb = node.margin_box();
                    let target_y = tops[p.line] + (line_h - height).max(0.0);
                    node.translate(x - mb.x, target_y - mb.y);
                }
            }
        }

        // Assemble the tree bottom-up; slots are in pre-order.
        let mut roots = Vec::new();
        for i in (0..st.slots.len()).rev() {
            let Some(mut node) = st.slots[i].node.take() else {
                continue;
            };
            node.children.reverse();
            match st.slots[i].kind {
                SlotKind::Text => {
                    if node.lines.is_empty() {
                        continue;
                    }
                    let mut bbox: Option<LayoutBox> = None;
                    for l in &node.lines {
                        let b = LayoutBox::new(l.x, l.y, l.width, l.height);
                        bbox = Some(bbox.map_or(b, |acc| acc.union(&b)));
                    }
                    node.content = bbox.unwrap_or_default();
                }
                SlotKind::Inline { open_line, open_x } => {
                    let mut bbox: Option<LayoutBox> = None;
                    for c in &node.children {
                        let b = c.margin_box();
                        bbox = Some(bbox.map_or(b, |acc| acc.union(&b)));
                    }
                    node.content = bbox.unwrap_or_else(|| {
                        let top = tops.get(open_line).copied().unwrap_or(y0);
                        LayoutBox::new(x0 + open_x, top, 0.0, 0.0)
                    });
                }
                SlotKind::Atomic => {}
            }
            match st.slots[i].parent {
                Some(p) => {
                    if let Some(parent) = st.slots[p].node.as_mut() {
                        parent.children.push(node);
                    }
                }
                None => roots.push(node),
            }
        }
        roots.reverse();
        (roots, total)
    }

    fn inline_walk(&mut self, st: &mut InlineState, node: &StyledNode, parent: Option<usize>, frame: Frame) {
        match node {
            StyledNode::Text { text, style } => self.inline_text(st, text, style, parent),
            StyledNode::Element {
                tag,
                style,
                children,
                attrs,
            } => {
                if tag == "br" {
                    st.break_line(true);
                    return;
                }
                if style.display == Display::Inline && !style.is_out_of_flow() && tag != "img" {
                    let ctx = self.ctx(frame.cb_width);
                    let mut margin = self.resolve_edges(&style.margin, &ctx, false);
                    let mut padding = self.resolve_edges(&style.padding, &ctx, true);
                    let mut border = self.border_edges(style, &ctx);
                    // Vertical edges of inline boxes do not affect line layout.
                    for e in [&mut margin, &mut padding, &mut border] {
                        e.top = 0.0;
                        e.bottom = 0.0;
                    }
                    let id = self.alloc_id();
                    let mut inline = LayoutNode::new(id, NodeKind::Element(tag.clone()), style.clone());
                    inline.margin = margin;
                    inline.padding = padding;
                    inline.border = border;
                    inline.z_index = if style.is_positioned() {
                        style.z_index.unwrap_or(0)
                    } else {
                        0
                    };
                    st.cursor += margin.left + border.left + padding.left;
                    let slot = st.push_slot(
                        inline,
                        parent,
                        SlotKind::Inline {
                            open_line: st.lines.len() - 1,
                            open_x: st.cursor,
                        },
                    );
                    for child in children {
                        self.inline_walk(st, child, Some(slot), frame);
                    }
                    st.cursor += margin.right + border.right + padding.right;
                    return;
                }

                // Atomic: inline-block, image, or a block nested in inline content.
                let block_in_inline = style.display.is_block_level() && !style.is_out_of_flow();
                if block_in_inline && st.cursor > 0.0 {
                    st.break_line(false);
                }
                let shrink = !block_in_inline;
                let node = self.layout_element(tag, style, children, attrs, 0.0, 0.0, frame, shrink);
                let mb = node.margin_box();
                if style.is_out_of_flow() {
                    let line = st.lines.len() - 1;
                    let x = st.cursor;
                    let slot = st.push_slot(node, parent, SlotKind::Atomic);
                    st.placements.push(Placement {
                        slot,
                        line,
                        x,
                        kind: PlacementKind::Atomic { height: 0.0 },
                    });
                    return;
                }
                if st.cursor > 0.0 && st.cursor + mb.width > st.width + EPS {
                    st.break_line(false);
                }
                let line = st.lines.len() - 1;
                let x = st.cursor;
                let slot = st.push_slot(node, parent, SlotKind::Atomic);
                st.placements.push(Placement {
                    slot,
                    line,
                    x,
                    kind: PlacementKind::Atomic { height: mb.height },
                });
                st.cursor += mb.width;
                let info = st.current_line();
                info.height = info.height.max(mb.height);
                info.used = info.used.max(x + mb.width);
                info.has_content = true;
                st.last_was_space = false;
                if block_in_inline {
                    st.break_line(false);
                }
            }
        }
    }

    fn inline_text(&mut self, st: &mut InlineState, text: &str, style: &ComputedStyle, parent: Option<usize>) {
        let processed = process_text(text, style, &mut st.last_was_space);
        if processed.is_empty() {
            return;
        }
        let id = self.alloc_id();
        let slot = st.push_slot(LayoutNode::new(id, NodeKind::Text, style.clone()), parent, SlotKind::Text);

        let metrics = FontMetrics::for_style(style);
        let line_height = style.line_height_px();
        let preserve = style.white_space.preserves_spaces();
        let wraps = style.white_space.wraps();

        for (k, segment) in processed.split('\n').enumerate() {
            if k > 0 {
                st.break_line(true);
            }
            if segment.is_empty() {
                continue;
            }
            let first_width = (st.width - st.cursor).max(0.0);
            let wrapped = wrap_text(segment, &metrics, first_width, st.width, wraps, preserve);
            for (i, wl) in wrapped.into_iter().enumerate() {
                if i > 0 {
                    st.break_line(false);
                }
                let (text, width, advance) = if st.cursor <= 0.0 && !preserve {
                    let trimmed = wl.text.trim_start_matches(' ');
                    let removed = wl.text.len() - trimmed.len();
                    let shift = metrics.measure(&wl.text[..removed]);
                    (trimmed.to_string(), wl.width - shift, wl.advance - shift)
                } else {
                    (wl.text, wl.width, wl.advance)
                };
                if text.is_empty() && advance <= 0.0 {
                    continue;
                }
                let line = st.lines.len() - 1;
                let x = st.cursor;
                st.placements.push(Placement {
                    slot,
                    line,
                    x,
                    kind: PlacementKind::Text { text, width },
                });
                st.cursor += advance;
                let info = st.current_line();
                info.height = info.height.max(line_height);
                info.used = info.used.max(x + width);
                info.has_content = true;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Positioning pass
    // -----------------------------------------------------------------------

    fn apply_positioning(&mut self, node: &mut LayoutNode, abs_cb: LayoutBox, viewport: LayoutBox) {
        let parent_content = node.content;
        for child in &mut node.children {
            match child.style.position {
                Position::Static => {}
                Position::Relative => {
                    let (dx, dy) = self.relative_offset(child, &parent_content);
                    child.translate(dx, dy);
                }
                Position::Absolute => self.place_absolute(child, &abs_cb),
                Position::Fixed => self.place_absolute(child, &viewport),
            }
            let next_cb = if child.style.is_positioned() {
                child.padding_box()
            } else {
                abs_cb
            };
            self.apply_positioning(child, next_cb, viewport);
        }
    }

    fn offsets(&mut self, node: &LayoutNode, cb: &LayoutBox) -> [Option<f32>; 4] {
        let style = &node.style;
        let wctx = self.ctx(cb.width);
        let hctx = self.ctx(cb.height);
        [
            self.resolve(&style.top, &hctx),
            self.resolve(&style.right, &wctx),
            self.resolve(&style.bottom, &hctx),
            self.resolve(&style.left, &wctx),
        ]
    }

    fn relative_offset(&mut self, node: &LayoutNode, cb: &LayoutBox) -> (f32, f32) {
        let [top, right, bottom, left] = self.offsets(node, cb);
        let dx = left.or(right.map(|r| -r)).unwrap_or(0.0);
        let dy = top.or(bottom.map(|b| -b)).unwrap_or(0.0);
        (dx, dy)
    }

    fn place_absolute(&mut self, node: &mut LayoutNode, cb: &LayoutBox) {
        let [top, right, bottom, left] = self.offsets(node, cb);
        let mb = node.margin_box();
        let x = match (left, right) {
            (Some(l), _) => cb.x + l,
            (None, Some(r)) => cb.right() - r - mb.width,
            (None, None) => mb.x,
        };
        let y = match (top, bottom) {
            (Some(t), _) => cb.y + t,
            (None, Some(b)) => cb.bottom() - b - mb.height,
            (None, None) => mb.y,
        };
        node.translate(x - mb.x, y - mb.y);
    }
}

// ---------------------------------------------------------------------------
// Inline state
// ---------------------------------------------------------------------------

enum RowItem<'a> {
    Element(&'a StyledNode),
    Run(Vec<&'a StyledNode>),
}

fn has_visible_text(run: &[&StyledNode]) -> bool {
    run.iter().any(|n| match n {
        StyledNode::Text { text, style } => {
            style.white_space.preserves_spaces() || !text.trim_matches(is_collapsible_space).is_empty()
        }
        StyledNode::Element { .. } => true,
    })
}

#[derive(Debug, Default)]
struct LineInfo {
    /// Tallest item placed on the line.
    height: f32,
    /// Rightmost extent of placed content.
    used: f32,
    has_content: bool,
    /// Ended by `<br>` or a preserved newline.
    forced: bool,
}

impl LineInfo {
    fn final_height(&self, strut: f32) -> f32 {
        if self.has_content || self.forced {
            self.height.max(strut)
        } else {
            0.0
        }
    }
}

enum SlotKind {
    Text,
    Inline { open_line: usize, open_x: f32 },
    Atomic,
}

struct Slot {
    node: Option<LayoutNode>,
    parent: Option<usize>,
    kind: SlotKind,
}

enum PlacementKind {
    Text { text: String, width: f32 },
    Atomic { height: f32 },
}

struct Placement {
    slot: usize,
    line: usize,
    /// Offset from the start of the line box.
    x: f32,
    kind: PlacementKind,
}

struct InlineState {
    width: f32,
    cursor: f32,
    lines: Vec<LineInfo>,
    last_was_space: bool,
    slots: Vec<Slot>,
    placements: Vec<Placement>,
}

impl InlineState {
    fn push_slot(&mut self, node: LayoutNode, parent: Option<usize>, kind: SlotKind) -> usize {
        self.slots.push(Slot {
            node: Some(node),
            parent,
            kind,
        });
        self.slots.len() - 1
    }

    fn current_line(&mut self) -> &mut LineInfo {
        let last = self.lines.len() - 1;
        &mut self.lines[last]
    }

    fn break_line(&mut self, forced: bool) {
        if forced {
            self.current_line().forced = true;
        }
        self.lines.push(LineInfo::default());
        self.cursor = 0.0;
        self.last_was_space = true;
    }
}

// ---------------------------------------------------------------------------
// Text processing
// ---------------------------------------------------------------------------

fn is_collapsible_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r' | '\u{000C}')
}

/// Apply `text-transform` and `white-space` processing. Collapsing modes
/// fold whitespace runs into one space and drop a leading space when the
/// previous content already ended in one. Hard line breaks come back as `\n`.
fn process_text(text: &str, style: &ComputedStyle, last_was_space: &mut bool) -> String {
    let transformed = match style.text_transform {
        TextTransform::None => text.to_string(),
        TextTransform::Uppercase => text.to_uppercase(),
        TextTransform::Lowercase => text.to_lowercase(),
        TextTransform::Capitalize => capitalize(text, *last_was_space),
    };

    let out = match style.white_space {
        WhiteSpace::Pre | WhiteSpace::PreWrap => {
            let normalized = transformed
                .replace("\r\n", "\n")
                .replace('\r', "\n")
                .replace('\t', "    ");
            if let Some(c) = normalized.chars().last() {
                *last_was_space = c == ' ' || c == '\n';
            }
            return normalized;
        }
        WhiteSpace::PreLine => {
            let normalized = transformed.replace("\r\n", "\n").replace('\r', "\n");
            let mut lines = Vec::new();
            for (i, line) in normalized.split('\n').enumerate() {
                if i > 0 {
                    *last_was_space = true;
                }
                lines.push(collapse_spaces(line, last_was_space));
            }
            lines.join("\n")
        }
        WhiteSpace::Normal | WhiteSpace::NoWrap => collapse_spaces(&transformed, last_was_space),
    };
    out
}

fn collapse_spaces(text: &str, last_was_space: &mut bool) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if is_collapsible_space(c) {
            if !*last_was_space {
                out.push(' ');
                *last_was_space = true;
            }
        } else {
            out.push(c);
            *last_was_space = false;
        }
    }
    out
}

fn capitalize(text: &str, mut at_word_start: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if at_word_start && c.is_alphabetic() {
            out.extend(c.to_uppercase());
            at_word_start = false;
        } else {
            out.push(c);
            if c.is_whitespace() {
                at_word_start = true;
            } else if c.is_alphanumeric() {
                at_word_start = false;
            }
        }
    }
    out
}

fn clamp_range(value: f32, min: f32, max: Option<f32>) -> f32 {
    let v = match max {
        Some(m) => value.min(m),
        None => value,
    };
    v.max(min).max(0.0)
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

/// Split a `data:` URI into its media type and decoded bytes.
pub fn decode_data_uri(src: &str) -> Option<(String, Vec<u8>)> {
    let rest = src.trim().strip_prefix("data:")?;
    let (meta, payload) = rest.split_once(',')?;
    let mime = meta.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    let bytes = if meta.contains(";base64") {
        let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        BASE64_STD.decode(cleaned).ok()?
    } else {
        payload.as_bytes().to_vec()
    };
    Some((mime, bytes))
}

/// Pixel dimensions of a data-URI image, read from its header.
pub fn image_intrinsic_size(src: &str) -> Option<(u32, u32)> {
    let (mime, bytes) = decode_data_uri(src)?;
    if !mime.starts_with("image/") {
        return None;
    }
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?;
    let (w, h) = reader.into_dimensions().ok()?;
    (w > 0 && h > 0).then_some((w, h))
}
