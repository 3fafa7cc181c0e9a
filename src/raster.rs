//! Raster renderer – paints a [`PagedDocument`] into a single PNG or JPEG
//! image using `tiny-skia`, pages stacked top to bottom.
//!
//! Text uses the built-in bitmap font from [`crate::glyphs`]; there is no
//! font rasterizer in this backend.

use std::collections::HashMap;
use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder, RgbaImage};
use log::debug;
use tiny_skia::{
    Color, FillRule, FilterQuality, Paint, Path, PathBuilder, Pixmap, PixmapPaint, Rect, Transform,
};

use crate::error::{RenderError, Result};
use crate::glyphs::{glyph, row_runs};
use crate::layout::LayoutBox;
use crate::options::{OutputFormat, PrintOptions};
use crate::paint::{paint_page, Canvas, ImageStore, PaintOptions, TextSpan};
use crate::pagination::PagedDocument;
use crate::style::Rgba;

/// Vertical size of one glyph row as a fraction of the font size.
const GLYPH_ROW: f32 = 0.1;

/// Settings for [`render_raster`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterOptions {
    pub dpi: u32,
    /// Use the strongest PNG compression.
    pub compression: bool,
    /// JPEG quality, 1–100.
    pub quality: u8,
    /// Upper bound for the pixel buffer in bytes.
    pub max_memory: usize,
    pub paint: PaintOptions,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            dpi: 96,
            compression: true,
            quality: 90,
            max_memory: 512 * 1024 * 1024,
            paint: PaintOptions::default(),
        }
    }
}

impl RasterOptions {
    pub fn from_options(options: &PrintOptions) -> Self {
        Self {
            dpi: options.layout.dpi,
            compression: options.render.compression,
            quality: options.render.quality,
            max_memory: options.performance.max_memory,
            paint: PaintOptions::from_options(options),
        }
    }
}

/// Render all pages of `doc` into one encoded image.
///
/// `format` must be [`OutputFormat::Png`] or [`OutputFormat::Jpeg`].
pub fn render_raster(doc: &PagedDocument, format: OutputFormat, options: &RasterOptions) -> Result<Vec<u8>> {
    if !matches!(format, OutputFormat::Png | OutputFormat::Jpeg) {
        return Err(RenderError::RenderFailed(format!(
            "{} is not a raster format",
            format.extension()
        )));
    }

    let scale = options.dpi.max(1) as f32 / 96.0;
    let geo = doc.geometry;
    let page_w = (geo.page_width * scale).ceil().max(1.0) as u32;
    let page_h = (geo.page_height * scale).ceil().max(1.0) as u32;
    let page_count = doc.pages.len().max(1) as u32;
    let total_h = page_h.checked_mul(page_count).ok_or_else(|| {
        RenderError::ResourceLimit(format!("raster height overflows for {page_count} pages"))
    })?;

    let bytes = page_w as u64 * total_h as u64 * 4;
    if bytes > options.max_memory as u64 {
        return Err(RenderError::ResourceLimit(format!(
            "raster buffer of {bytes} bytes exceeds max_memory ({} bytes)",
            options.max_memory
        )));
    }

    let mut pixmap = Pixmap::new(page_w, total_h).ok_or_else(|| {
        RenderError::RenderFailed(format!(
            "invalid raster size {}x{} at {} DPI",
            page_w, total_h, options.dpi
        ))
    })?;
    pixmap.fill(Color::from_rgba8(255, 255, 255, 255));

    let store = ImageStore::collect(&doc.root, options.paint.grayscale);
    let mut image_cache: HashMap<String, Option<Pixmap>> = HashMap::new();

    for (index, fragment) in doc.pages.iter().enumerate() {
        let mut canvas = PixmapCanvas {
            pixmap: &mut pixmap,
            base: Transform::from_row(scale, 0.0, 0.0, scale, 0.0, (index as u32 * page_h) as f32),
            image_cache: &mut image_cache,
        };
        paint_page(doc, fragment, &store, options.paint, &mut canvas);
    }

    let encoded = encode(&pixmap, format, options)?;
    debug!(
        "Raster: {}x{} px, {} page(s), {} bytes {}",
        page_w,
        total_h,
        page_count,
        encoded.len(),
        format.extension()
    );
    Ok(encoded)
}

struct PixmapCanvas<'a> {
    pixmap: &'a mut Pixmap,
    /// Page px → device px for the current page.
    base: Transform,
    image_cache: &'a mut HashMap<String, Option<Pixmap>>,
}

impl PixmapCanvas<'_> {
    fn fill(&mut self, path: Option<Path>, color: Rgba) {
        let Some(path) = path else {
            return;
        };
        let mut paint = Paint::default();
        paint.set_color_rgba8(color.r, color.g, color.b, color.a);
        paint.anti_alias = false;
        self.pixmap
            .fill_path(&path, &paint, FillRule::Winding, self.base, None);
    }
}

impl Canvas for PixmapCanvas<'_> {
    fn fill_rect(&mut self, rect: LayoutBox, color: Rgba) {
        let Some(r) = Rect::from_xywh(rect.x, rect.y, rect.width, rect.height) else {
            return;
        };
        self.fill(Some(PathBuilder::from_rect(r)), color);
    }

    fn draw_text(&mut self, span: &TextSpan<'_>) {
        let unit_x = span.char_width / 8.0;
        let unit_y = span.size * GLYPH_ROW;
        // Rows 0..7 sit above the baseline, row 7 is the blank descender row.
        let top = span.baseline - 7.0 * unit_y;

        let mut pb = PathBuilder::new();
        for (i, c) in span.text.chars().enumerate() {
            let Some(bits) = glyph(c) else {
                continue;
            };
            let x0 = span.x + i as f32 * span.char_width;
            for (row, &line) in bits.iter().enumerate() {
                for (col, len) in row_runs(line) {
                    if let Some(r) = Rect::from_xywh(
                        x0 + col as f32 * unit_x,
                        top + row as f32 * unit_y,
                        len as f32 * unit_x,
                        unit_y,
                    ) {
                        pb.push_rect(r);
                    }
                }
            }
        }
        self.fill(pb.finish(), span.color);
    }

    fn draw_image(&mut self, src: &str, image: &RgbaImage, rect: LayoutBox) {
        let entry = self
            .image_cache
            .entry(src.to_string())
            .or_insert_with(|| rgba_to_pixmap(image));
        let Some(source) = entry.as_ref() else {
            return;
        };
        let (w, h) = (source.width() as f32, source.height() as f32);
        if w <= 0.0 || h <= 0.0 {
            return;
        }
        let local = Transform::from_row(rect.width / w, 0.0, 0.0, rect.height / h, rect.x, rect.y);
        let paint = PixmapPaint {
            quality: FilterQuality::Bilinear,
            ..PixmapPaint::default()
        };
        self.pixmap
            .draw_pixmap(0, 0, source.as_ref(), &paint, self.base.pre_concat(local), None);
    }
}

// ---------------------------------------------------------------------------
// Pixel conversion and encoding
// ---------------------------------------------------------------------------

fn rgba_to_pixmap(image: &RgbaImage) -> Option<Pixmap> {
    let (width, height) = image.dimensions();
    let mut pixmap = Pixmap::new(width, height)?;
    for (src, dst) in image
        .as_raw()
        .chunks_exact(4)
        .zip(pixmap.data_mut().chunks_exact_mut(4))
    {
        let a = src[3];
        dst[0] = premul_u8(src[0], a);
        dst[1] = premul_u8(src[1], a);
        dst[2] = premul_u8(src[2], a);
        dst[3] = a;
    }
    Some(pixmap)
}

fn premul_u8(channel: u8, alpha: u8) -> u8 {
    let prod = (channel as u16) * (alpha as u16) + 127;
    ((prod + (prod >> 8)) >> 8) as u8
}

fn encode(pixmap: &Pixmap, format: OutputFormat, options: &RasterOptions) -> Result<Vec<u8>> {
    let (w, h) = (pixmap.width(), pixmap.height());
    let mut data = Vec::with_capacity(pixmap.data().len());
    for px in pixmap.pixels() {
        let c = px.demultiply();
        data.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }

    let mut out = Vec::new();
    match format {
        OutputFormat::Jpeg => {
            let rgba = RgbaImage::from_raw(w, h, data)
                .ok_or_else(|| RenderError::RenderFailed("raster buffer size mismatch".to_string()))?;
            let rgb = image::DynamicImage::ImageRgba8(rgba).to_rgb8();
            let mut encoder =
                JpegEncoder::new_with_quality(Cursor::new(&mut out), options.quality.clamp(1, 100));
            encoder
                .encode_image(&rgb)
                .map_err(|e| RenderError::RenderFailed(format!("jpeg encode failed: {e}")))?;
        }
        _ => {
            let compression = if options.compression {
                CompressionType::Best
            } else {
                CompressionType::Fast
            };
            PngEncoder::new_with_quality(Cursor::new(&mut out), compression, FilterType::Adaptive)
                .write_image(&data, w, h, ExtendedColorType::Rgba8)
                .map_err(|e| RenderError::RenderFailed(format!("png encode failed: {e}")))?;
        }
    }
    Ok(out)
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

    fn pixel_inside_first_block(doc: &PagedDocument) -> (u32, u32) {
        let g = doc.geometry;
        ((g.margin_left + 20.0) as u32, (g.margin_top + 20.0) as u32)
    }

    #[test]
    fn png_has_page_dimensions() {
        let doc = paged("<p>Hello</p>");
        let png = render_raster(&doc, OutputFormat::Png, &RasterOptions::default()).unwrap();
        assert_eq!(&png[1..4], b"PNG");
        let img = image::load_from_memory(&png).unwrap();
        assert_eq!(img.width(), doc.geometry.page_width.ceil() as u32);
        assert_eq!(img.height(), doc.geometry.page_height.ceil() as u32);
    }

    #[test]
    fn pages_are_stacked() {
        let html: String = (0..200).map(|i| format!("<p>Line {i}</p>")).collect();
        let doc = paged(&html);
        let pages = doc.page_count() as u32;
        assert!(pages > 1);
        let png = render_raster(&doc, OutputFormat::Png, &RasterOptions::default()).unwrap();
        let img = image::load_from_memory(&png).unwrap();
        assert_eq!(img.height(), doc.geometry.page_height.ceil() as u32 * pages);
    }

    #[test]
    fn backgrounds_are_painted() {
        let doc = paged("<div style='background:#ff0000;height:40px'></div>");
        let png = render_raster(&doc, OutputFormat::Png, &RasterOptions::default()).unwrap();
        let img = image::load_from_memory(&png).unwrap().to_rgba8();
        let (x, y) = pixel_inside_first_block(&doc);
        assert_eq!(img.get_pixel(x, y).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(1, 1).0, [255, 255, 255, 255]);
    }

    #[test]
    fn grayscale_and_no_background() {
        let doc = paged("<div style='background:#ff0000;height:40px'></div>");
        let (x, y) = pixel_inside_first_block(&doc);

        let gray = RasterOptions {
            paint: PaintOptions {
                background: true,
                grayscale: true,
            },
            ..RasterOptions::default()
        };
        let img = image::load_from_memory(&render_raster(&doc, OutputFormat::Png, &gray).unwrap())
            .unwrap()
            .to_rgba8();
        let [r, g, b, _] = img.get_pixel(x, y).0;
        assert!(r == g && g == b && r < 255);

        let bare = RasterOptions {
            paint: PaintOptions {
                background: false,
                grayscale: false,
            },
            ..RasterOptions::default()
        };
        let img = image::load_from_memory(&render_raster(&doc, OutputFormat::Png, &bare).unwrap())
            .unwrap()
            .to_rgba8();
        assert_eq!(img.get_pixel(x, y).0, [255, 255, 255, 255]);
    }

    #[test]
    fn text_leaves_ink() {
        let doc = paged("<p style='font-size:32px'>HHHH</p>");
        let png = render_raster(&doc, OutputFormat::Png, &RasterOptions::default()).unwrap();
        let img = image::load_from_memory(&png).unwrap().to_rgba8();
        let dark = img.pixels().filter(|p| p.0[0] < 128).count();
        assert!(dark > 50, "expected glyph pixels, found {dark}");
    }

    #[test]
    fn jpeg_output() {
        let doc = paged("<h1>Photo</h1>");
        let opts = RasterOptions {
            quality: 50,
            ..RasterOptions::default()
        };
        let jpg = render_raster(&doc, OutputFormat::Jpeg, &opts).unwrap();
        assert_eq!(&jpg[0..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn memory_limit() {
        let doc = paged("<p>x</p>");
        let opts = RasterOptions {
            max_memory: 1024,
            ..RasterOptions::default()
        };
        let err = render_raster(&doc, OutputFormat::Png, &opts).unwrap_err();
        assert!(matches!(err, RenderError::ResourceLimit(_)));
    }

    #[test]
    fn rejects_vector_formats() {
        let doc = paged("");
        let err = render_raster(&doc, OutputFormat::Svg, &RasterOptions::default()).unwrap_err();
        assert!(matches!(err, RenderError::RenderFailed(_)));
    }

    #[test]
    fn premultiply_rounds() {
        assert_eq!(premul_u8(255, 255), 255);
        assert_eq!(premul_u8(255, 0), 0);
        assert_eq!(premul_u8(200, 128), 100);
    }
}
