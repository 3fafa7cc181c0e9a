//! Shared page painter.
//!
//! Walks one page fragment of a [`PagedDocument`] depth-first and issues
//! drawing calls on a [`Canvas`]. Coordinates handed to the canvas are
//! physical CSS px on the sheet, origin at the top-left corner of the page.
//! Each output format implements the canvas; the painting order and geometry
//! are decided here once.

use std::collections::{HashMap, HashSet};

use image::RgbaImage;
use log::warn;

use crate::fonts::{BaseFont, FontMetrics, FontVariant};
use crate::layout::{decode_data_uri, LayoutBox, LayoutNode};
use crate::options::{ColorProfile, PageGeometry, PrintOptions};
use crate::pagination::{PageFragment, PagedDocument};
use crate::style::{BorderStyle, Rgba, TextDecoration};

/// Gap between a list marker and the item's content box.
const MARKER_GAP: f32 = 6.0;

/// One line of text, ready to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan<'a> {
    pub text: &'a str,
    pub x: f32,
    pub baseline: f32,
    /// Font size in page px.
    pub size: f32,
    pub base: BaseFont,
    pub variant: FontVariant,
    /// Estimated advance per character in page px.
    pub char_width: f32,
    pub color: Rgba,
}

/// Drawing surface for one page.
pub trait Canvas {
    fn fill_rect(&mut self, rect: LayoutBox, color: Rgba);
    fn draw_text(&mut self, span: &TextSpan<'_>);
    fn draw_image(&mut self, src: &str, image: &RgbaImage, rect: LayoutBox);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaintOptions {
    /// Paint background colours.
    pub background: bool,
    pub grayscale: bool,
}

impl Default for PaintOptions {
    fn default() -> Self {
        Self {
            background: true,
            grayscale: false,
        }
    }
}

impl PaintOptions {
    pub fn from_options(options: &PrintOptions) -> Self {
        Self {
            background: options.page.background,
            grayscale: options.render.color_profile == ColorProfile::Grayscale,
        }
    }
}

// ---------------------------------------------------------------------------
// Decoded images
// ---------------------------------------------------------------------------

/// Data-URI images of a document, decoded once and shared by all pages.
#[derive(Debug, Default)]
pub struct ImageStore {
    images: HashMap<String, RgbaImage>,
}

impl ImageStore {
    pub fn collect(root: &LayoutNode, grayscale: bool) -> Self {
        let mut srcs: HashSet<&str> = HashSet::new();
        root.walk(&mut |n| {
            if let Some(img) = &n.image {
                srcs.insert(img.src.as_str());
            }
        });

        let mut images = HashMap::new();
        for src in srcs {
            let Some((_, bytes)) = decode_data_uri(src) else {
                continue;
            };
            match image::load_from_memory(&bytes) {
                Ok(decoded) => {
                    let rgba = if grayscale {
                        image::DynamicImage::ImageLumaA8(decoded.to_luma_alpha8()).to_rgba8()
                    } else {
                        decoded.to_rgba8()
                    };
                    images.insert(src.to_string(), rgba);
                }
                Err(e) => warn!("Skipping image: decode error: {e}"),
            }
        }
        Self { images }
    }

    pub fn get(&self, src: &str) -> Option<&RgbaImage> {
        self.images.get(src)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RgbaImage)> {
        self.images.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Painter
// ---------------------------------------------------------------------------

/// Paint `page` of `doc` onto `canvas`.
pub fn paint_page(
    doc: &PagedDocument,
    page: &PageFragment,
    images: &ImageStore,
    options: PaintOptions,
    canvas: &mut dyn Canvas,
) {
    let painter = Painter {
        geometry: doc.geometry,
        band_start: page.y_start,
        band_end: page.y_end,
        members: page.node_set(),
        options,
        images,
    };
    painter.paint_node(&doc.root, canvas);
}

struct Painter<'a> {
    geometry: PageGeometry,
    band_start: f32,
    band_end: f32,
    members: HashSet<usize>,
    options: PaintOptions,
    images: &'a ImageStore,
}

impl Painter<'_> {
    fn paint_node(&self, node: &LayoutNode, canvas: &mut dyn Canvas) {
        if self.members.contains(&node.id) {
            self.paint_background(node, canvas);
            self.paint_borders(node, canvas);
            self.paint_marker(node, canvas);
            self.paint_lines(node, canvas);
            self.paint_image(node, canvas);
        }
        for child in node.paint_order() {
            self.paint_node(child, canvas);
        }
    }

    fn color(&self, c: Rgba) -> Option<Rgba> {
        if c.is_transparent() {
            None
        } else if self.options.grayscale {
            Some(c.to_grayscale())
        } else {
            Some(c)
        }
    }

    fn scale(&self) -> f32 {
        self.geometry.scale
    }

    fn page_x(&self, x: f32) -> f32 {
        self.geometry.margin_left + x * self.scale()
    }

    fn page_y(&self, y: f32) -> f32 {
        self.geometry.margin_top + (y - self.band_start) * self.scale()
    }

    fn in_band(&self, y: f32) -> bool {
        y >= self.band_start - 0.01 && y < self.band_end - 0.01
    }

    /// Clip `rect` (layout px) to the page band and map it onto the page.
    fn to_page(&self, rect: LayoutBox) -> Option<LayoutBox> {
        let top = rect.y.max(self.band_start);
        let bottom = rect.bottom().min(self.band_end);
        if bottom <= top || rect.width <= 0.0 {
            return None;
        }
        Some(LayoutBox::new(
            self.page_x(rect.x),
            self.page_y(top),
            rect.width * self.scale(),
            (bottom - top) * self.scale(),
        ))
    }

    fn fill(&self, rect: LayoutBox, color: Rgba, canvas: &mut dyn Canvas) {
        if let Some(r) = self.to_page(rect) {
            canvas.fill_rect(r, color);
        }
    }

    fn paint_background(&self, node: &LayoutNode, canvas: &mut dyn Canvas) {
        if !self.options.background {
            return;
        }
        if let Some(color) = self.color(node.style.background_color) {
            self.fill(node.border_box(), color, canvas);
        }
    }

    fn paint_borders(&self, node: &LayoutNode, canvas: &mut dyn Canvas) {
        if node.style.border_style == BorderStyle::None {
            return;
        }
        let Some(color) = self.color(node.style.border_color) else {
            return;
        };
        let bb = node.border_box();
        let b = node.border;
        let sides = [
            (LayoutBox::new(bb.x, bb.y, bb.width, b.top), true),
            (LayoutBox::new(bb.x, bb.bottom() - b.bottom, bb.width, b.bottom), true),
            (LayoutBox::new(bb.x, bb.y, b.left, bb.height), false),
            (LayoutBox::new(bb.right() - b.right, bb.y, b.right, bb.height), false),
        ];
        for (strip, horizontal) in sides {
            if strip.width <= 0.0 || strip.height <= 0.0 {
                continue;
            }
            let thickness = if horizontal { strip.height } else { strip.width };
            match node.style.border_style {
                BorderStyle::Solid | BorderStyle::None => self.fill(strip, color, canvas),
                BorderStyle::Dashed => {
                    self.fill_dashes(strip, horizontal, thickness * 3.0, thickness * 2.0, color, canvas)
                }
                BorderStyle::Dotted => self.fill_dashes(strip, horizontal, thickness, thickness, color, canvas),
                BorderStyle::Double => {
                    let third = thickness / 3.0;
                    let (a, c) = if horizontal {
                        (
                            LayoutBox::new(strip.x, strip.y, strip.width, third),
                            LayoutBox::new(strip.x, strip.bottom() - third, strip.width, third),
                        )
                    } else {
                        (
                            LayoutBox::new(strip.x, strip.y, third, strip.height),
                            LayoutBox::new(strip.right() - third, strip.y, third, strip.height),
                        )
                    };
                    self.fill(a, color, canvas);
                    self.fill(c, color, canvas);
                }
            }
        }
    }

    fn fill_dashes(
        &self,
        strip: LayoutBox,
        horizontal: bool,
        dash: f32,
        gap: f32,
        color: Rgba,
        canvas: &mut dyn Canvas,
    ) {
        let dash = dash.max(1.0);
        let step = dash + gap.max(1.0);
        let length = if horizontal { strip.width } else { strip.height };
        let mut offset = 0.0;
        while offset < length {
            let len = dash.min(length - offset);
            let seg = if horizontal {
                LayoutBox::new(strip.x + offset, strip.y, len, strip.height)
            } else {
                LayoutBox::new(strip.x, strip.y + offset, strip.width, len)
            };
            self.fill(seg, color, canvas);
            offset += step;
        }
    }

    fn span<'t>(&self, node: &LayoutNode, text: &'t str, x: f32, line_top: f32, line_height: f32) -> Option<TextSpan<'t>> {
        let color = self.color(node.style.color)?;
        let metrics = FontMetrics::for_style(&node.style);
        let half_leading = (line_height - metrics.font_size) / 2.0;
        let baseline = line_top + half_leading + metrics.ascent();
        Some(TextSpan {
            text,
            x: self.page_x(x),
            baseline: self.page_y(baseline),
            size: metrics.font_size * self.scale(),
            base: metrics.base,
            variant: metrics.variant,
            char_width: metrics.char_width * self.scale(),
            color,
        })
    }

    fn paint_marker(&self, node: &LayoutNode, canvas: &mut dyn Canvas) {
        let Some(marker) = &node.marker else {
            return;
        };
        if !self.in_band(node.content.y) {
            return;
        }
        let metrics = FontMetrics::for_style(&node.style);
        let x = node.content.x - metrics.measure(marker) - MARKER_GAP;
        if let Some(span) = self.span(node, marker, x, node.content.y, node.style.line_height_px()) {
            canvas.draw_text(&span);
        }
    }

    fn paint_lines(&self, node: &LayoutNode, canvas: &mut dyn Canvas) {
        for line in &node.lines {
            if line.text.is_empty() || !self.in_band(line.y) {
                continue;
            }
            let Some(span) = self.span(node, &line.text, line.x, line.y, line.height) else {
                continue;
            };
            canvas.draw_text(&span);

            let size = span.size;
            let thickness = (size / 16.0).max(1.0);
            let rule_y = match node.style.text_decoration {
                TextDecoration::None => continue,
                TextDecoration::Underline => span.baseline + size * 0.1,
                TextDecoration::LineThrough => span.baseline - size * 0.3,
            };
            canvas.fill_rect(
                LayoutBox::new(span.x, rule_y, line.width * self.scale(), thickness),
                span.color,
            );
        }
    }

    fn paint_image(&self, node: &LayoutNode, canvas: &mut dyn Canvas) {
        let Some(img) = &node.image else {
            return;
        };
        let Some(decoded) = self.images.get(&img.src) else {
            return;
        };
        if !self.in_band(node.content.y) || node.content.width <= 0.0 || node.content.height <= 0.0 {
            return;
        }
        let rect = LayoutBox::new(
            self.page_x(node.content.x),
            self.page_y(node.content.y),
            node.content.width * self.scale(),
            node.content.height * self.scale(),
        );
        canvas.draw_image(&img.src, decoded, rect);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::{build_styled_tree, collect_stylesheets};
    use crate::dom::{parse_markup, ParseLimits};
    use crate::error::Warnings;
    use crate::layout::{compute_layout, Viewport};
    use crate::options::{LayoutOptions, PageOptions};
    use crate::pagination::paginate_document;

    #[derive(Default)]
    struct Recorder {
        rects: Vec<(LayoutBox, Rgba)>,
        texts: Vec<(String, f32, Rgba)>,
        images: usize,
    }

    impl Canvas for Recorder {
        fn fill_rect(&mut self, rect: LayoutBox, color: Rgba) {
            self.rects.push((rect, color));
        }

        fn draw_text(&mut self, span: &TextSpan<'_>) {
            self.texts.push((span.text.to_string(), span.baseline, span.color));
        }

        fn draw_image(&mut self, _src: &str, _image: &RgbaImage, _rect: LayoutBox) {
            self.images += 1;
        }
    }

    fn document(html: &str) -> PagedDocument {
        let geometry = PageGeometry::new(&PageOptions::default(), &LayoutOptions::default());
        let doc = parse_markup(html, &ParseLimits::default()).unwrap().document;
        let rules = collect_stylesheets(&doc);
        let styled = build_styled_tree(&doc, &rules);
        let mut warnings = Warnings::new();
        let root = compute_layout(
            &styled,
            Viewport {
                width: geometry.layout_width,
                height: geometry.viewport_height,
            },
            &mut warnings,
        );
        paginate_document(root, geometry, 100).unwrap()
    }

    fn record(doc: &PagedDocument, page: usize, options: PaintOptions) -> Recorder {
        let images = ImageStore::collect(&doc.root, options.grayscale);
        let mut rec = Recorder::default();
        paint_page(doc, &doc.pages[page], &images, options, &mut rec);
        rec
    }

    #[test]
    fn paints_text_and_background() {
        let doc = document("<p style='background-color:#ff0000'>Hello</p>");
        let rec = record(&doc, 0, PaintOptions::default());
        assert_eq!(rec.texts.len(), 1);
        assert_eq!(rec.texts[0].0, "Hello");
        assert!(rec.rects.iter().any(|(_, c)| *c == Rgba::rgb(255, 0, 0)));
    }

    #[test]
    fn background_can_be_disabled() {
        let doc = document("<p style='background-color:#ff0000'>Hello</p>");
        let options = PaintOptions {
            background: false,
            grayscale: false,
        };
        assert!(record(&doc, 0, options).rects.is_empty());
    }

    #[test]
    fn transparent_colours_are_skipped() {
        let doc = document("<p style='color: transparent'>invisible</p>");
        assert!(record(&doc, 0, PaintOptions::default()).texts.is_empty());
    }

    #[test]
    fn grayscale_converts_colours() {
        let doc = document("<p style='color:#ff0000'>red</p>");
        let options = PaintOptions {
            background: true,
            grayscale: true,
        };
        let rec = record(&doc, 0, options);
        let c = rec.texts[0].2;
        assert_eq!(c.r, c.g);
        assert_eq!(c.g, c.b);
    }

    #[test]
    fn borders_and_decorations() {
        let doc = document("<div style='border:2px dashed #0000ff;height:40px'><u>under</u></div>");
        let rec = record(&doc, 0, PaintOptions::default());
        let blue = rec.rects.iter().filter(|(_, c)| *c == Rgba::rgb(0, 0, 255)).count();
        assert!(blue > 4, "dashed border should produce several segments");
        // Underline rule in the text colour.
        assert!(rec.rects.iter().any(|(_, c)| *c == Rgba::BLACK));
    }

    #[test]
    fn each_page_paints_only_its_band() {
        let html: String = (0..120).map(|i| format!("<p>Line {i}</p>")).collect();
        let doc = document(&html);
        assert!(doc.pages.len() > 1);
        let first = record(&doc, 0, PaintOptions::default());
        let second = record(&doc, 1, PaintOptions::default());
        assert!(first.texts.iter().any(|(t, _, _)| t == "Line 0"));
        assert!(!second.texts.iter().any(|(t, _, _)| t == "Line 0"));
        let total: usize = (0..doc.pages.len())
            .map(|p| record(&doc, p, PaintOptions::default()).texts.len())
            .sum();
        assert_eq!(total, 120);
        // Baselines stay inside the printable area.
        let geo = doc.geometry;
        for (_, baseline, _) in &second.texts {
            assert!(*baseline >= geo.margin_top);
            assert!(*baseline <= geo.page_height - geo.margin_bottom + 1.0);
        }
    }

    #[test]
    fn list_markers_are_drawn() {
        let doc = document("<ol><li>first</li></ol>");
        let rec = record(&doc, 0, PaintOptions::default());
        assert!(rec.texts.iter().any(|(t, _, _)| t == "1."));
    }
}
