//! Print options – the configuration struct accepted by
//! [`process_document`](crate::pipeline::process_document), plus the page
//! geometry derived from it.
//!
//! Every group deserialises with defaults so partial JSON documents such as
//! `{"page": {"size": "letter"}}` load cleanly.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RenderError, Result};

/// CSS pixels per millimetre (96 px per inch).
pub const PX_PER_MM: f32 = 96.0 / 25.4;

/// Hard ceiling on `security.max_tree_depth`; every stage after parsing walks
/// the tree recursively.
pub const MAX_TREE_DEPTH_CEILING: usize = 1024;

/// Complete set of options for one render.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PrintOptions {
    pub page: PageOptions,
    pub layout: LayoutOptions,
    pub render: RenderOptions,
    pub output: OutputOptions,
    pub security: SecurityOptions,
    pub performance: PerformanceOptions,
}

// ---------------------------------------------------------------------------
// Page
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PageOptions {
    pub size: PageSize,
    pub orientation: PageOrientation,
    /// Page margins in millimetres.
    pub margins: Margins,
    /// Zoom factor applied to the laid-out content.
    pub scale: f32,
    /// Paint background colours ("print backgrounds").
    pub background: bool,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            size: PageSize::A4,
            orientation: PageOrientation::Portrait,
            margins: Margins::default(),
            scale: 1.0,
            background: true,
        }
    }
}

/// Standard paper sizes, or a custom size in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageSize {
    A3,
    A4,
    A5,
    Letter,
    Legal,
    Tabloid,
    #[serde(rename_all = "camelCase")]
    Custom { width_mm: f32, height_mm: f32 },
}

impl PageSize {
    /// Portrait dimensions in millimetres.
    pub fn dimensions_mm(&self) -> (f32, f32) {
        match self {
            PageSize::A3 => (297.0, 420.0),
            PageSize::A4 => (210.0, 297.0),
            PageSize::A5 => (148.0, 210.0),
            PageSize::Letter => (215.9, 279.4),
            PageSize::Legal => (215.9, 355.6),
            PageSize::Tabloid => (279.4, 431.8),
            PageSize::Custom {
                width_mm,
                height_mm,
            } => (*width_mm, *height_mm),
        }
    }
}

/// Page orientation for the generated output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageOrientation {
    /// Portrait mode: height > width (default).
    #[default]
    Portrait,
    /// Landscape mode: width and height swapped.
    Landscape,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Margins {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Default for Margins {
    fn default() -> Self {
        Self::uniform(10.0)
    }
}

impl Margins {
    pub fn uniform(mm: f32) -> Self {
        Self {
            top: mm,
            right: mm,
            bottom: mm,
            left: mm,
        }
    }
}

// ---------------------------------------------------------------------------
// Layout / render / output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutOptions {
    /// Width in CSS px the document is laid out at; the result is scaled to
    /// fit the printable width. `None` lays out at the printable width.
    pub viewport_width: Option<f32>,
    /// Height of the initial containing block for fixed/absolute boxes.
    pub viewport_height: Option<f32>,
    /// Raster resolution.
    pub dpi: u32,
    /// Accepted for compatibility; there is no script execution to wait for.
    pub wait_timeout: u64,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            viewport_width: None,
            viewport_height: None,
            dpi: 96,
            wait_timeout: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderOptions {
    /// JPEG quality, 1–100.
    pub quality: u8,
    pub color_profile: ColorProfile,
    /// Favour smaller output over encoding speed (PNG).
    pub compression: bool,
    /// Only base-14 fonts are referenced; requesting embedding adds a warning.
    pub embed_fonts: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            quality: 90,
            color_profile: ColorProfile::Srgb,
            compression: true,
            embed_fonts: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorProfile {
    #[default]
    Srgb,
    Grayscale,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OutputOptions {
    pub format: OutputFormat,
    /// Suggested file name for whoever persists the output.
    pub filename: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pdf,
    Png,
    #[serde(alias = "jpg")]
    Jpeg,
    Svg,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Svg => "svg",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Pdf => "application/pdf",
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Svg => "image/svg+xml",
        }
    }

    /// Parse a user-supplied format name (`pdf`, `png`, `jpeg`/`jpg`, `svg`).
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "pdf" => Some(OutputFormat::Pdf),
            "png" => Some(OutputFormat::Png),
            "jpeg" | "jpg" => Some(OutputFormat::Jpeg),
            "svg" => Some(OutputFormat::Svg),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Security / performance
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SecurityOptions {
    #[serde(rename = "sanitizeHTML", alias = "sanitizeHtml")]
    pub sanitize_html: bool,
    /// When non-empty, URL hosts must match one of these (or a subdomain).
    pub allowed_domains: Vec<String>,
    /// URL hosts matching one of these (or a subdomain) are always rejected.
    pub blocked_domains: Vec<String>,
    /// Maximum content size in bytes.
    pub max_file_size: usize,
    pub allow_javascript: bool,
    pub max_tree_depth: usize,
    pub max_node_count: usize,
}

impl Default for SecurityOptions {
    fn default() -> Self {
        Self {
            sanitize_html: true,
            allowed_domains: Vec::new(),
            blocked_domains: Vec::new(),
            max_file_size: 10 * 1024 * 1024,
            allow_javascript: false,
            max_tree_depth: 256,
            max_node_count: 100_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PerformanceOptions {
    pub enable_cache: bool,
    /// Cache entry lifetime in seconds.
    pub cache_ttl: u64,
    /// Upper bound in bytes for raster pixel buffers.
    pub max_memory: usize,
    /// Per-document deadline in seconds, enforced by
    /// [`process_with_timeout`](crate::pipeline::process_with_timeout).
    pub timeout: u64,
    pub concurrent_jobs: usize,
    pub max_pages: usize,
}

impl Default for PerformanceOptions {
    fn default() -> Self {
        Self {
            enable_cache: false,
            cache_ttl: 3600,
            max_memory: 512 * 1024 * 1024,
            timeout: 30,
            concurrent_jobs: 4,
            max_pages: 2000,
        }
    }
}

impl PerformanceOptions {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

// ---------------------------------------------------------------------------
// Loading and validation
// ---------------------------------------------------------------------------

impl PrintOptions {
    /// Deserialise from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            RenderError::Config(format!("cannot read '{}': {e}", path.display()))
        })?;
        Self::from_json(&text)
    }

    /// Serialise to pretty JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Clamp out-of-range values in place, returning one warning per fix.
    pub fn validate(&mut self) -> Vec<String> {
        let mut warnings = Vec::new();

        if !(self.page.scale.is_finite() && self.page.scale >= 0.1 && self.page.scale <= 10.0) {
            let fixed = if self.page.scale.is_finite() {
                self.page.scale.clamp(0.1, 10.0)
            } else {
                1.0
            };
            warnings.push(format!("page.scale {} clamped to {fixed}", self.page.scale));
            self.page.scale = fixed;
        }

        let (w, h) = self.page.size.dimensions_mm();
        if !(w.is_finite() && h.is_finite() && w >= 10.0 && h >= 10.0 && w <= 5000.0 && h <= 5000.0)
        {
            warnings.push(format!("page size {w}x{h}mm is out of range; using A4"));
            self.page.size = PageSize::A4;
        }

        let (w, h) = self.page.size.dimensions_mm();
        let m = &mut self.page.margins;
        for (name, value, limit) in [
            ("top", &mut m.top, h / 2.5),
            ("right", &mut m.right, w / 2.5),
            ("bottom", &mut m.bottom, h / 2.5),
            ("left", &mut m.left, w / 2.5),
        ] {
            if !value.is_finite() || *value < 0.0 || *value > limit {
                let fixed = if value.is_finite() {
                    value.clamp(0.0, limit)
                } else {
                    0.0
                };
                warnings.push(format!("page.margins.{name} {value} clamped to {fixed}"));
                *value = fixed;
            }
        }

        if let Some(vw) = self.layout.viewport_width {
            if !(vw.is_finite() && vw >= 50.0) {
                warnings.push(format!("layout.viewportWidth {vw} ignored"));
                self.layout.viewport_width = None;
            }
        }
        if let Some(vh) = self.layout.viewport_height {
            if !(vh.is_finite() && vh > 0.0) {
                warnings.push(format!("layout.viewportHeight {vh} ignored"));
                self.layout.viewport_height = None;
            }
        }
        if !(36..=600).contains(&self.layout.dpi) {
            let fixed = self.layout.dpi.clamp(36, 600);
            warnings.push(format!("layout.dpi {} clamped to {fixed}", self.layout.dpi));
            self.layout.dpi = fixed;
        }

        if !(1..=100).contains(&self.render.quality) {
            let fixed = self.render.quality.clamp(1, 100);
            warnings.push(format!("render.quality {} clamped to {fixed}", self.render.quality));
            self.render.quality = fixed;
        }

        let sec = &mut self.security;
        if sec.max_tree_depth == 0 || sec.max_tree_depth > MAX_TREE_DEPTH_CEILING {
            let fixed = sec.max_tree_depth.clamp(1, MAX_TREE_DEPTH_CEILING);
            warnings.push(format!(
                "security.maxTreeDepth {} clamped to {fixed}",
                sec.max_tree_depth
            ));
            sec.max_tree_depth = fixed;
        }
        if sec.max_node_count == 0 {
            warnings.push("security.maxNodeCount 0 raised to 1".to_string());
            sec.max_node_count = 1;
        }

        let perf = &mut self.performance;
        if perf.concurrent_jobs == 0 {
            warnings.push("performance.concurrentJobs 0 raised to 1".to_string());
            perf.concurrent_jobs = 1;
        }
        if perf.max_pages == 0 {
            warnings.push("performance.maxPages 0 raised to 1".to_string());
            perf.max_pages = 1;
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Page geometry
// ---------------------------------------------------------------------------

/// Page dimensions resolved from [`PageOptions`] and [`LayoutOptions`].
///
/// Physical values are CSS px on the sheet; layout values are CSS px in the
/// coordinate space the document is laid out in (physical / `scale`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub page_width: f32,
    pub page_height: f32,
    pub margin_top: f32,
    pub margin_right: f32,
    pub margin_bottom: f32,
    pub margin_left: f32,
    /// Layout px → physical px.
    pub scale: f32,
    /// Width the document is laid out at.
    pub layout_width: f32,
    /// Height of one page band in layout px.
    pub layout_page_height: f32,
    /// Initial containing block height for fixed/absolute boxes.
    pub viewport_height: f32,
}

impl PageGeometry {
    pub fn new(page: &PageOptions, layout: &LayoutOptions) -> Self {
        let (w_mm, h_mm) = page.size.dimensions_mm();
        let (w_mm, h_mm) = match page.orientation {
            PageOrientation::Portrait => (w_mm, h_mm),
            PageOrientation::Landscape => (h_mm, w_mm),
        };
        let page_width = w_mm * PX_PER_MM;
        let page_height = h_mm * PX_PER_MM;
        let m = page.margins;
        let content_width = (page_width - (m.left + m.right) * PX_PER_MM).max(1.0);
        let content_height = (page_height - (m.top + m.bottom) * PX_PER_MM).max(1.0);

        let fit = layout
            .viewport_width
            .map(|vw| content_width / vw)
            .unwrap_or(1.0);
        let scale = (page.scale * fit).max(0.01);
        let layout_page_height = content_height / scale;

        Self {
            page_width,
            page_height,
            margin_top: m.top * PX_PER_MM,
            margin_right: m.right * PX_PER_MM,
            margin_bottom: m.bottom * PX_PER_MM,
            margin_left: m.left * PX_PER_MM,
            scale,
            layout_width: content_width / scale,
            layout_page_height,
            viewport_height: layout.viewport_height.unwrap_or(layout_page_height),
        }
    }

    /// Printable height of one page in physical px.
    pub fn content_height(&self) -> f32 {
        self.page_height - self.margin_top - self.margin_bottom
    }

    /// Printable width of one page in physical px.
    pub fn content_width(&self) -> f32 {
        self.page_width - self.margin_left - self.margin_right
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_uses_defaults() {
        let opts = PrintOptions::from_json(r#"{"page": {"size": "letter"}}"#).unwrap();
        assert_eq!(opts.page.size, PageSize::Letter);
        assert_eq!(opts.page.orientation, PageOrientation::Portrait);
        assert!(opts.security.sanitize_html);
        assert_eq!(opts.output.format, OutputFormat::Pdf);
    }

    #[test]
    fn camel_case_groups_deserialize() {
        let json = r#"{
            "output": {"format": "jpg", "filename": "x.jpg"},
            "security": {"sanitizeHTML": false, "blockedDomains": ["evil.test"]},
            "performance": {"enableCache": true, "cacheTtl": 10}
        }"#;
        let opts = PrintOptions::from_json(json).unwrap();
        assert_eq!(opts.output.format, OutputFormat::Jpeg);
        assert!(!opts.security.sanitize_html);
        assert_eq!(opts.security.blocked_domains, vec!["evil.test".to_string()]);
        assert!(opts.performance.enable_cache);
        assert_eq!(opts.performance.cache_ttl, 10);
    }

    #[test]
    fn custom_page_size() {
        let opts =
            PrintOptions::from_json(r#"{"page": {"size": {"custom": {"widthMm": 100, "heightMm": 50}}}}"#)
                .unwrap();
        assert_eq!(opts.page.size.dimensions_mm(), (100.0, 50.0));
    }

    #[test]
    fn json_roundtrip() {
        let mut opts = PrintOptions::default();
        opts.page.orientation = PageOrientation::Landscape;
        let parsed = PrintOptions::from_json(&opts.to_json()).unwrap();
        assert_eq!(parsed, opts);
    }

    #[test]
    fn validate_clamps_out_of_range_values() {
        let mut opts = PrintOptions::default();
        opts.page.scale = 50.0;
        opts.render.quality = 0;
        opts.security.max_tree_depth = 100_000;
        let warnings = opts.validate();
        assert_eq!(warnings.len(), 3);
        assert_eq!(opts.page.scale, 10.0);
        assert_eq!(opts.render.quality, 1);
        assert_eq!(opts.security.max_tree_depth, MAX_TREE_DEPTH_CEILING);
        assert!(PrintOptions::default().validate().is_empty());
    }

    #[test]
    fn landscape_swaps_dimensions() {
        let mut page = PageOptions::default();
        let portrait = PageGeometry::new(&page, &LayoutOptions::default());
        page.orientation = PageOrientation::Landscape;
        let landscape = PageGeometry::new(&page, &LayoutOptions::default());
        assert!((portrait.page_width - landscape.page_height).abs() < 0.01);
        assert!(landscape.layout_width > portrait.layout_width);
    }

    #[test]
    fn viewport_width_scales_to_fit() {
        let layout = LayoutOptions {
            viewport_width: Some(1200.0),
            ..LayoutOptions::default()
        };
        let geo = PageGeometry::new(&PageOptions::default(), &layout);
        assert!((geo.layout_width - 1200.0).abs() < 0.01);
        assert!(geo.scale < 1.0);
    }
}
