//! PDF renderer – paints a [`PagedDocument`] into PDF bytes using `printpdf`
//! (v0.8 ops-based API).

use std::collections::HashMap;
use std::io::Cursor;

use log::{debug, warn};
use printpdf::*;

use crate::error::{RenderError, Result};
use crate::fonts::{BaseFont, FontVariant};
use crate::layout::LayoutBox;
use crate::paint::{paint_page, Canvas, ImageStore, PaintOptions, TextSpan};
use crate::pagination::PagedDocument;
use crate::style::Rgba;

/// CSS px → PDF points.
const PX_TO_PT: f32 = 0.75;
/// CSS px → millimetres.
const PX_TO_MM: f32 = 25.4 / 96.0;

/// Document information written into the PDF.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfMetadata {
    pub title: String,
    pub author: Option<String>,
    pub creator: String,
}

impl Default for PdfMetadata {
    fn default() -> Self {
        Self {
            title: "Untitled".to_string(),
            author: None,
            creator: concat!("print-forge ", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// A printpdf XObject together with the pixel dimensions of the source image.
struct ImageResource {
    xobj_id: XObjectId,
    px_width: u32,
    px_height: u32,
}

/// Render every page of `doc` into a PDF file.
///
/// Images that cannot be re-encoded for PDF are skipped with a `log::warn`.
pub fn render_pdf(doc: &PagedDocument, meta: &PdfMetadata, options: PaintOptions) -> Result<Vec<u8>> {
    let geo = doc.geometry;
    let page_w = Mm(geo.page_width * PX_TO_MM);
    let page_h = Mm(geo.page_height * PX_TO_MM);
    let page_height_pt = geo.page_height * PX_TO_PT;

    let mut pdf = PdfDocument::new(&meta.title);
    pdf.metadata.info.author = meta.author.clone().unwrap_or_default();
    pdf.metadata.info.creator = meta.creator.clone();
    pdf.metadata.info.producer = meta.creator.clone();

    // Register images once; pages refer to them by id.
    let store = ImageStore::collect(&doc.root, options.grayscale);
    let mut images: HashMap<String, ImageResource> = HashMap::new();
    let mut img_warnings: Vec<PdfWarnMsg> = Vec::new();
    for (src, rgba) in store.iter() {
        let mut png = Vec::new();
        if let Err(e) = rgba.write_to(&mut Cursor::new(&mut png), ::image::ImageFormat::Png) {
            warn!("Skipping image: PNG encode error: {e}");
            continue;
        }
        let raw = match RawImage::decode_from_bytes(&png, &mut img_warnings) {
            Ok(r) => r,
            Err(e) => {
                warn!("Skipping image: PDF encode error: {e}");
                continue;
            }
        };
        let xobj_id = pdf.add_image(&raw);
        images.insert(
            src.to_string(),
            ImageResource {
                xobj_id,
                px_width: rgba.width(),
                px_height: rgba.height(),
            },
        );
    }

    // Pages
    let mut pages = Vec::with_capacity(doc.pages.len());
    for fragment in &doc.pages {
        let mut canvas = PdfCanvas {
            ops: Vec::new(),
            page_height_pt,
            images: &images,
        };
        paint_page(doc, fragment, &store, options, &mut canvas);
        pages.push(PdfPage::new(page_w, page_h, canvas.ops));
    }
    if pages.is_empty() {
        pages.push(PdfPage::new(page_w, page_h, Vec::new()));
    }
    let page_count = pages.len();

    pdf.with_pages(pages);
    let bytes = pdf.save(&PdfSaveOptions::default(), &mut Vec::new());
    if !bytes.starts_with(b"%PDF-") {
        return Err(RenderError::RenderFailed("PDF writer produced no header".to_string()));
    }
    debug!("PDF: {} page(s), {} bytes", page_count, bytes.len());
    Ok(bytes)
}

struct PdfCanvas<'a> {
    ops: Vec<Op>,
    page_height_pt: f32,
    images: &'a HashMap<String, ImageResource>,
}

impl PdfCanvas<'_> {
    fn point(&self, x: f32, y: f32) -> Point {
        // PDF origin is bottom-left; page coordinates are top-left.
        Point {
            x: Pt(x * PX_TO_PT),
            y: Pt(self.page_height_pt - y * PX_TO_PT),
        }
    }
}

fn pdf_color(c: Rgba) -> Color {
    let [r, g, b, _] = c.to_f32();
    Color::Rgb(Rgb {
        r,
        g,
        b,
        icc_profile: None,
    })
}

impl Canvas for PdfCanvas<'_> {
    fn fill_rect(&mut self, rect: LayoutBox, color: Rgba) {
        let corners = [
            (rect.x, rect.y),
            (rect.right(), rect.y),
            (rect.right(), rect.bottom()),
            (rect.x, rect.bottom()),
        ];
        let points = corners
            .iter()
            .map(|&(x, y)| LinePoint {
                p: self.point(x, y),
                bezier: false,
            })
            .collect();
        self.ops.push(Op::SetFillColor {
            col: pdf_color(color),
        });
        self.ops.push(Op::DrawPolygon {
            polygon: Polygon {
                rings: vec![PolygonRing { points }],
                mode: PaintMode::Fill,
                winding_order: WindingOrder::NonZero,
            },
        });
    }

    fn draw_text(&mut self, span: &TextSpan<'_>) {
        let font = builtin_font(span.base, span.variant);
        let pos = self.point(span.x, span.baseline);
        self.ops.push(Op::StartTextSection);
        self.ops.push(Op::SetTextCursor { pos });
        self.ops.push(Op::SetFontSizeBuiltinFont {
            size: Pt(span.size * PX_TO_PT),
            font,
        });
        self.ops.push(Op::SetFillColor {
            col: pdf_color(span.color),
        });
        self.ops.push(Op::WriteTextBuiltinFont {
            items: vec![TextItem::Text(to_pdf_text(span.text))],
            font,
        });
        self.ops.push(Op::EndTextSection);
    }

    fn draw_image(&mut self, src: &str, _image: &::image::RgbaImage, rect: LayoutBox) {
        let Some(res) = self.images.get(src) else {
            return;
        };
        let width_pt = rect.width * PX_TO_PT;
        let height_pt = rect.height * PX_TO_PT;
        // At dpi=72 printpdf maps one image pixel to one point.
        let scale_x = if res.px_width > 0 {
            width_pt / res.px_width as f32
        } else {
            1.0
        };
        let scale_y = if res.px_height > 0 {
            height_pt / res.px_height as f32
        } else {
            1.0
        };
        let bottom_left = self.point(rect.x, rect.bottom());
        self.ops.push(Op::UseXobject {
            id: res.xobj_id.clone(),
            transform: XObjectTransform {
                translate_x: Some(bottom_left.x),
                translate_y: Some(bottom_left.y),
                dpi: Some(72.0),
                scale_x: Some(scale_x),
                scale_y: Some(scale_y),
                rotate: None,
            },
        });
    }
}

fn builtin_font(base: BaseFont, variant: FontVariant) -> BuiltinFont {
    match (base, variant) {
        (BaseFont::Helvetica, FontVariant::Regular) => BuiltinFont::Helvetica,
        (BaseFont::Helvetica, FontVariant::Bold) => BuiltinFont::HelveticaBold,
        (BaseFont::Helvetica, FontVariant::Italic) => BuiltinFont::HelveticaOblique,
        (BaseFont::Helvetica, FontVariant::BoldItalic) => BuiltinFont::HelveticaBoldOblique,
        (BaseFont::Times, FontVariant::Regular) => BuiltinFont::TimesRoman,
        (BaseFont::Times, FontVariant::Bold) => BuiltinFont::TimesBold,
        (BaseFont::Times, FontVariant::Italic) => BuiltinFont::TimesItalic,
        (BaseFont::Times, FontVariant::BoldItalic) => BuiltinFont::TimesBoldItalic,
        (BaseFont::Courier, FontVariant::Regular) => BuiltinFont::Courier,
        (BaseFont::Courier, FontVariant::Bold) => BuiltinFont::CourierBold,
        (BaseFont::Courier, FontVariant::Italic) => BuiltinFont::CourierOblique,
        (BaseFont::Courier, FontVariant::BoldItalic) => BuiltinFont::CourierBoldOblique,
    }
}

/// Restrict text to what the base-14 fonts can show: typographic punctuation
/// folds to ASCII, Latin-1 passes through, anything else becomes `?`.
fn to_pdf_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\u{2018}' | '\u{2019}' | '\u{201A}' => out.push('\''),
            '\u{201C}' | '\u{201D}' | '\u{201E}' => out.push('"'),
            '\u{2013}' | '\u{2014}' | '\u{2212}' => out.push('-'),
            '\u{2026}' => out.push_str("..."),
            '\u{2022}' => out.push('\u{00B7}'),
            '\u{00A0}' => out.push(' '),
            c if c.is_control() => {}
            c if (c as u32) < 256 => out.push(c),
            _ => out.push('?'),
        }
    }
    out
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

    fn paged(html: &str) -> PagedDocument {
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
        paginate_document(root, geometry, 100).unwrap()
    }

    #[test]
    fn render_empty_page() {
        let bytes = render_pdf(&paged(""), &PdfMetadata::default(), PaintOptions::default()).unwrap();
        assert!(bytes.len() > 100, "PDF should have content");
        assert_eq!(&bytes[0..5], b"%PDF-");
    }

    #[test]
    fn render_styled_content() {
        let doc = paged(
            "<h1>Title</h1><p style='border:1px solid red;background:#eee'>Body <b>bold</b> <i>it</i></p>\
             <pre>code</pre><ul><li>item</li></ul>",
        );
        let meta = PdfMetadata {
            title: "Report".to_string(),
            author: Some("QA".to_string()),
            ..PdfMetadata::default()
        };
        let bytes = render_pdf(&doc, &meta, PaintOptions::default()).unwrap();
        assert_eq!(&bytes[0..5], b"%PDF-");
    }

    #[test]
    fn more_pages_more_bytes() {
        let short = render_pdf(&paged("<p>x</p>"), &PdfMetadata::default(), PaintOptions::default()).unwrap();
        let html: String = (0..200).map(|i| format!("<p>Paragraph {i}</p>")).collect();
        let doc = paged(&html);
        assert!(doc.page_count() > 1);
        let long = render_pdf(&doc, &PdfMetadata::default(), PaintOptions::default()).unwrap();
        assert!(long.len() > short.len());
    }

    #[test]
    fn text_is_limited_to_latin1() {
        assert_eq!(to_pdf_text("\u{201C}hi\u{201D} \u{2014} caf\u{e9}"), "\"hi\" - caf\u{e9}");
        assert_eq!(to_pdf_text("\u{4e2d}"), "?");
        assert_eq!(to_pdf_text("a\u{7}b"), "ab");
    }

    #[test]
    fn font_mapping_covers_style_codes() {
        assert_eq!(
            builtin_font(BaseFont::Times, FontVariant::BoldItalic),
            BuiltinFont::TimesBoldItalic
        );
        assert_eq!(
            builtin_font(BaseFont::Courier, FontVariant::Regular),
            BuiltinFont::Courier
        );
    }
}
