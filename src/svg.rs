//! SVG renderer – one `<svg>` document with the pages stacked vertically,
//! each page in its own translated `<g>`.

use std::fmt::Write as _;

use image::RgbaImage;
use log::debug;

use crate::dom::{escape_attr, escape_text};
use crate::error::{RenderError, Result};
use crate::fonts::BaseFont;
use crate::layout::LayoutBox;
use crate::paint::{paint_page, Canvas, ImageStore, PaintOptions, TextSpan};
use crate::pagination::PagedDocument;
use crate::style::Rgba;

/// Render `doc` as an SVG document.
pub fn render_svg(doc: &PagedDocument, options: PaintOptions) -> Result<Vec<u8>> {
    let geo = doc.geometry;
    let page_count = doc.pages.len().max(1);
    let total_height = geo.page_height * page_count as f32;

    let mut out = String::new();
    writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = num(geo.page_width),
        h = num(total_height)
    )
    .map_err(fmt_failed)?;

    let store = ImageStore::collect(&doc.root, options.grayscale);
    for (index, fragment) in doc.pages.iter().enumerate() {
        let offset = geo.page_height * index as f32;
        writeln!(
            out,
            r##"<g class="page" transform="translate(0 {})"><rect width="{}" height="{}" fill="#ffffff"/>"##,
            num(offset),
            num(geo.page_width),
            num(geo.page_height)
        )
        .map_err(fmt_failed)?;
        let mut canvas = SvgCanvas { out: &mut out };
        paint_page(doc, fragment, &store, options, &mut canvas);
        out.push_str("</g>\n");
    }
    out.push_str("</svg>\n");

    debug!("SVG: {} page(s), {} bytes", page_count, out.len());
    Ok(out.into_bytes())
}

fn fmt_failed(e: std::fmt::Error) -> RenderError {
    RenderError::RenderFailed(format!("svg write failed: {e}"))
}

/// Compact decimal form for coordinates.
fn num(v: f32) -> String {
    let rounded = (v * 100.0).round() / 100.0;
    if rounded.fract() == 0.0 {
        format!("{}", rounded as i64)
    } else {
        format!("{rounded}")
    }
}

fn fill_attrs(color: Rgba) -> String {
    if color.a == 255 {
        format!(r#"fill="{}""#, color.to_hex())
    } else {
        format!(
            r#"fill="{}" fill-opacity="{}""#,
            color.to_hex(),
            num(color.a as f32 / 255.0)
        )
    }
}

fn font_family(base: BaseFont) -> &'static str {
    match base {
        BaseFont::Helvetica => "Helvetica, Arial, sans-serif",
        BaseFont::Times => "Times New Roman, Times, serif",
        BaseFont::Courier => "Courier New, Courier, monospace",
    }
}

struct SvgCanvas<'a> {
    out: &'a mut String,
}

// Writing into a String cannot fail.
impl Canvas for SvgCanvas<'_> {
    fn fill_rect(&mut self, rect: LayoutBox, color: Rgba) {
        let _ = writeln!(
            self.out,
            r#"<rect x="{}" y="{}" width="{}" height="{}" {}/>"#,
            num(rect.x),
            num(rect.y),
            num(rect.width),
            num(rect.height),
            fill_attrs(color)
        );
    }

    fn draw_text(&mut self, span: &TextSpan<'_>) {
        let weight = if span.variant.is_bold() { " font-weight=\"bold\"" } else { "" };
        let style = if span.variant.is_italic() {
            " font-style=\"italic\""
        } else {
            ""
        };
        let _ = writeln!(
            self.out,
            r#"<text x="{}" y="{}" font-family="{}" font-size="{}"{}{} xml:space="preserve" {}>{}</text>"#,
            num(span.x),
            num(span.baseline),
            font_family(span.base),
            num(span.size),
            weight,
            style,
            fill_attrs(span.color),
            escape_text(span.text)
        );
    }

    fn draw_image(&mut self, src: &str, _image: &RgbaImage, rect: LayoutBox) {
        let _ = writeln!(
            self.out,
            r#"<image x="{}" y="{}" width="{}" height="{}" preserveAspectRatio="none" href="{}"/>"#,
            num(rect.x),
            num(rect.y),
            num(rect.width),
            num(rect.height),
            escape_attr(src)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::{build_styled_tree, collect_stylesheets};
    use crate::dom::{parse_markup, ParseLimits};
    use crate::error::Warnings;
    use crate::layout::{compute_layout, Viewport};
    use crate::options::{LayoutOptions, PageGeometry, PageOptions};
    use crate::pagination::paginate_document;

    fn svg(html: &str) -> String {
        let geometry = PageGeometry::new(&PageOptions::default(), &LayoutOptions::default());
        let doc = parse_markup(html, &ParseLimits::default()).unwrap().document;
        let styled = build_styled_tree(&doc, &collect_stylesheets(&doc));
        let mut warnings = Warnings::new();
        let root = compute_layout(
            &styled,
            Viewport {
                width: geometry.layout_width,
                height: geometry.viewport_height,
            },
            &mut warnings,
        );
        let paged = paginate_document(root, geometry, 100).unwrap();
        String::from_utf8(render_svg(&paged, PaintOptions::default()).unwrap()).unwrap()
    }

    #[test]
    fn text_is_escaped() {
        let out = svg("<p>a &lt; b &amp; c</p>");
        assert!(out.starts_with("<svg "));
        assert!(out.contains("a &lt; b &amp; c"), "{out}");
        assert!(out.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn one_group_per_page() {
        let html: String = (0..200).map(|i| format!("<p>Row {i}</p>")).collect();
        let out = svg(&html);
        let groups = out.matches(r#"<g class="page""#).count();
        assert!(groups > 1);
        assert_eq!(out.matches("</g>").count(), groups);
    }

    #[test]
    fn fonts_and_colors() {
        let out = svg("<p style='color:red'><b>bold</b> <code>mono</code></p>");
        assert!(out.contains(r#"font-weight="bold""#));
        assert!(out.contains("monospace"));
        assert!(out.contains(r##"fill="#ff0000""##));
    }

    #[test]
    fn numbers_are_compact() {
        assert_eq!(num(12.0), "12");
        assert_eq!(num(1.256), "1.26");
    }
}
