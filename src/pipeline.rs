//! Pipeline – ties together content conversion, sanitizing, parsing,
//! styling, layout, pagination, and rendering into a single function call.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::cache::{cache_key, RenderCache};
use crate::cascade::{build_styled_tree, collect_stylesheets};
use crate::content::{self, ContentType};
use crate::dom::{parse_markup, MarkupNode, ParseLimits};
use crate::error::{RenderError, Result, Warnings};
use crate::layout::{compute_layout, Viewport};
use crate::options::{OutputFormat, PageGeometry, PrintOptions};
use crate::pagination::paginate_document;
use crate::paint::PaintOptions;
use crate::raster::{render_raster, RasterOptions};
use crate::render::{render_pdf, PdfMetadata};
use crate::sanitize::{validate_url, DomainPolicy, Sanitizer};
use crate::svg::render_svg;

/// Stack size for render worker threads; layout and painting recurse once
/// per tree level.
pub const RENDER_STACK_SIZE: usize = 32 * 1024 * 1024;

/// A document submitted for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub content: Vec<u8>,
    pub content_type: ContentType,
    /// Free-form metadata; `title` and `author` end up in the PDF.
    pub metadata: BTreeMap<String, String>,
    /// Overrides the options passed to [`process_document`].
    pub options: Option<PrintOptions>,
}

impl Document {
    pub fn new(id: impl Into<String>, content: impl Into<Vec<u8>>, content_type: ContentType) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            content_type,
            metadata: BTreeMap::new(),
            options: None,
        }
    }

    pub fn html(id: impl Into<String>, html: &str) -> Self {
        Self::new(id, html.as_bytes(), ContentType::Html)
    }

    pub fn markdown(id: impl Into<String>, markdown: &str) -> Self {
        Self::new(id, markdown.as_bytes(), ContentType::Markdown)
    }

    pub fn text(id: impl Into<String>, text: &str) -> Self {
        Self::new(id, text.as_bytes(), ContentType::Text)
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_options(mut self, options: PrintOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Options in effect for this document.
    pub fn effective_options(&self, fallback: &PrintOptions) -> PrintOptions {
        self.options.clone().unwrap_or_else(|| fallback.clone())
    }
}

/// Output of one successful render.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderResult {
    pub output: Vec<u8>,
    /// Set by [`RenderResult::write_to`].
    pub output_path: Option<PathBuf>,
    pub output_size: usize,
    pub page_count: usize,
    pub render_time: Duration,
    pub cache_hit: bool,
    pub format: OutputFormat,
    pub warnings: Vec<String>,
}

impl RenderResult {
    /// Persist the output bytes and remember where they went.
    pub fn write_to(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, &self.output)?;
        self.output_path = Some(path.to_path_buf());
        Ok(())
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Full pipeline: document → output bytes in the configured format.
///
/// Fails with [`RenderError::SecurityViolation`] or
/// [`RenderError::ResourceLimit`] on policy violations and with
/// [`RenderError::InvalidInput`] for content that is not UTF-8. Everything
/// recoverable ends up in [`RenderResult::warnings`].
pub fn process_document(document: &Document, options: &PrintOptions) -> Result<RenderResult> {
    let start = Instant::now();
    let mut opts = document.effective_options(options);
    let mut warnings = Warnings::new();
    warnings.extend(opts.validate());

    // 0. Content checks and conversion
    let sec = &opts.security;
    if document.content.len() > sec.max_file_size {
        return Err(RenderError::ResourceLimit(format!(
            "content is {} bytes, limit is {}",
            document.content.len(),
            sec.max_file_size
        )));
    }
    let text = std::str::from_utf8(&document.content)
        .map_err(|e| RenderError::InvalidInput(format!("content is not valid UTF-8: {e}")))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    if text.trim().is_empty() {
        warnings.push("Document content is empty");
    }
    let html = content::to_html(text, document.content_type);

    // 1. Sanitize
    let t = Instant::now();
    let markup = if sec.sanitize_html {
        let sanitized = Sanitizer::new(sec).sanitize(&html)?;
        warnings.extend(sanitized.warnings.into_vec());
        sanitized.markup
    } else {
        html
    };
    debug!("[{}] sanitize: {:?}", document.id, t.elapsed());

    // 2. Parse
    let t = Instant::now();
    let parsed = parse_markup(&markup, &ParseLimits::from(sec))?;
    warnings.extend(parsed.warnings.into_vec());
    let dom = parsed.document;
    if !sec.sanitize_html {
        check_image_sources(&dom, &DomainPolicy::from_options(sec))?;
    }
    debug!(
        "[{}] parse: {} nodes in {:?}",
        document.id,
        dom.node_count(),
        t.elapsed()
    );

    // 3–4. Style + cascade
    let t = Instant::now();
    let rules = collect_stylesheets(&dom);
    let styled = build_styled_tree(&dom, &rules);
    debug!("[{}] cascade: {} rules in {:?}", document.id, rules.len(), t.elapsed());

    // 5. Layout
    let t = Instant::now();
    let geometry = PageGeometry::new(&opts.page, &opts.layout);
    let viewport = Viewport {
        width: geometry.layout_width,
        height: geometry.viewport_height,
    };
    let root = compute_layout(&styled, viewport, &mut warnings);
    debug!(
        "[{}] layout: {} boxes in {:?}",
        document.id,
        root.node_count(),
        t.elapsed()
    );

    // 6. Paginate
    let t = Instant::now();
    let paged = paginate_document(root, geometry, opts.performance.max_pages)?;
    debug!("[{}] paginate: {} page(s) in {:?}", document.id, paged.page_count(), t.elapsed());

    // 7. Render
    if opts.render.embed_fonts {
        warnings.push("Font embedding is not supported; built-in fonts are used");
    }
    if opts.layout.wait_timeout > 0 {
        warnings.push("waitTimeout is ignored; scripts are never executed");
    }
    let t = Instant::now();
    let format = opts.output.format;
    let paint = PaintOptions::from_options(&opts);
    let output = match format {
        OutputFormat::Pdf => {
            let meta = PdfMetadata {
                title: document_title(document, &dom),
                author: document.metadata.get("author").cloned(),
                ..PdfMetadata::default()
            };
            render_pdf(&paged, &meta, paint)?
        }
        OutputFormat::Png | OutputFormat::Jpeg => {
            render_raster(&paged, format, &RasterOptions::from_options(&opts))?
        }
        OutputFormat::Svg => render_svg(&paged, paint)?,
    };
    debug!("[{}] render {}: {:?}", document.id, format.extension(), t.elapsed());

    let warnings = warnings.into_vec();
    for w in &warnings {
        debug!("[{}] warning: {w}", document.id);
    }
    Ok(RenderResult {
        output_size: output.len(),
        output,
        output_path: None,
        page_count: paged.page_count(),
        render_time: start.elapsed(),
        cache_hit: false,
        format,
        warnings,
    })
}

/// [`process_document`] behind a [`RenderCache`].
///
/// The cache is consulted only when `performance.enable_cache` is set in the
/// effective options.
pub fn process_document_cached(
    document: &Document,
    options: &PrintOptions,
    cache: &RenderCache,
) -> Result<RenderResult> {
    let opts = document.effective_options(options);
    if !opts.performance.enable_cache {
        return process_document(document, &opts);
    }
    let key = cache_key(&document.content, document.content_type, &opts);
    if let Some(hit) = cache.get(&key) {
        debug!("[{}] cache hit", document.id);
        return Ok(hit);
    }
    let result = process_document(document, &opts)?;
    cache.insert(key, &result);
    Ok(result)
}

/// Run [`process_document`] on a worker thread and give up after
/// `performance.timeout`.
///
/// A timed-out worker is abandoned, not killed; it finishes in the
/// background and its result is dropped.
pub fn process_with_timeout(document: &Document, options: &PrintOptions) -> Result<RenderResult> {
    let opts = document.effective_options(options);
    let timeout = opts.performance.timeout();
    let doc = document.clone();
    let id = document.id.clone();

    let (tx, rx) = channel();
    thread::Builder::new()
        .name(format!("pforge-render-{id}"))
        .stack_size(RENDER_STACK_SIZE)
        .spawn(move || {
            let _ = tx.send(process_document(&doc, &opts));
        })?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => {
            warn!("[{id}] render abandoned after {timeout:?}");
            Err(RenderError::ResourceLimit(format!(
                "render exceeded timeout of {}s",
                timeout.as_secs_f32()
            )))
        }
        Err(RecvTimeoutError::Disconnected) => Err(RenderError::RenderFailed(
            "render worker exited without a result".to_string(),
        )),
    }
}

/// Title from metadata, then `<title>`, then the document id.
fn document_title(document: &Document, dom: &MarkupNode) -> String {
    if let Some(title) = document.metadata.get("title").filter(|t| !t.trim().is_empty()) {
        return title.trim().to_string();
    }
    let from_markup = dom
        .find_by_tag("title")
        .first()
        .map(|e| e.text_content().split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty());
    match from_markup {
        Some(title) => title,
        None if !document.id.is_empty() => document.id.clone(),
        None => PdfMetadata::default().title,
    }
}

/// Domain checks for `<img src>` when the sanitizer is switched off.
fn check_image_sources(dom: &MarkupNode, policy: &DomainPolicy) -> Result<()> {
    for img in dom.find_by_tag("img") {
        if let Some(src) = img.src() {
            validate_url(src, policy)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_basic() {
        let doc = Document::html("basic", "<h1>Hello</h1><p>World</p>");
        let result = process_document(&doc, &PrintOptions::default()).unwrap();
        assert_eq!(&result.output[0..5], b"%PDF-");
        assert_eq!(result.page_count, 1);
        assert_eq!(result.output_size, result.output.len());
        assert!(!result.cache_hit);
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
    }

    #[test]
    fn empty_content_warns() {
        let doc = Document::html("empty", "");
        let result = process_document(&doc, &PrintOptions::default()).unwrap();
        assert_eq!(result.page_count, 1);
        assert!(result.warnings.iter().any(|w| w == "Document content is empty"));
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let doc = Document::new("bin", vec![0xff, 0xfe, 0x00], ContentType::Html);
        let err = process_document(&doc, &PrintOptions::default()).unwrap_err();
        assert!(matches!(err, RenderError::InvalidInput(_)));
    }

    #[test]
    fn oversized_content_is_rejected() {
        let mut opts = PrintOptions::default();
        opts.security.max_file_size = 10;
        let doc = Document::html("big", "<p>more than ten bytes</p>");
        let err = process_document(&doc, &opts).unwrap_err();
        assert!(matches!(err, RenderError::ResourceLimit(_)));
    }

    #[test]
    fn document_options_override() {
        let mut svg = PrintOptions::default();
        svg.output.format = OutputFormat::Svg;
        let doc = Document::html("svg", "<p>x</p>").with_options(svg);
        let result = process_document(&doc, &PrintOptions::default()).unwrap();
        assert_eq!(result.format, OutputFormat::Svg);
        assert!(result.output.starts_with(b"<svg"));
    }

    #[test]
    fn title_sources() {
        let dom = parse_markup(
            "<html><head><title> Quarterly\n Report </title></head></html>",
            &ParseLimits::default(),
        )
        .unwrap()
        .document;
        let doc = Document::html("id-1", "");
        assert_eq!(document_title(&doc, &dom), "Quarterly Report");
        let doc = doc.with_metadata("title", "Meta");
        assert_eq!(document_title(&doc, &dom), "Meta");
        let empty = parse_markup("", &ParseLimits::default()).unwrap().document;
        assert_eq!(document_title(&Document::html("id-2", ""), &empty), "id-2");
    }

    #[test]
    fn unsanitized_images_still_checked() {
        let mut opts = PrintOptions::default();
        opts.security.sanitize_html = false;
        opts.security.blocked_domains = vec!["evil.example".to_string()];
        let doc = Document::html("img", r#"<img src="https://cdn.evil.example/a.png">"#);
        let err = process_document(&doc, &opts).unwrap_err();
        assert!(matches!(err, RenderError::SecurityViolation(_)));
    }

    #[test]
    fn embed_fonts_warns() {
        let mut opts = PrintOptions::default();
        opts.render.embed_fonts = true;
        let result = process_document(&Document::html("f", "<p>x</p>"), &opts).unwrap();
        assert!(result.warnings.iter().any(|w| w.contains("Font embedding")));
    }

    #[test]
    fn wait_timeout_warns() {
        let mut opts = PrintOptions::default();
        opts.layout.wait_timeout = 500;
        let result = process_document(&Document::html("w", "<p>x</p>"), &opts).unwrap();
        assert!(result.warnings.iter().any(|w| w.contains("waitTimeout")));
    }

    #[test]
    fn cached_render_is_flagged() {
        let cache = RenderCache::new(Duration::from_secs(60));
        let doc = Document::html("c", "<p>cached</p>");
        let mut opts = PrintOptions::default();
        let uncached = process_document_cached(&doc, &opts, &cache).unwrap();
        assert!(!uncached.cache_hit);
        assert!(cache.is_empty());

        opts.performance.enable_cache = true;
        let first = process_document_cached(&doc, &opts, &cache).unwrap();
        assert!(!first.cache_hit);
        let second = process_document_cached(&doc, &opts, &cache).unwrap();
        assert!(second.cache_hit);
        assert_eq!(first.output, second.output);
    }

    #[test]
    fn timeout_wrapper_returns_result() {
        let doc = Document::markdown("md", "# Title\n\nBody");
        let result = process_with_timeout(&doc, &PrintOptions::default()).unwrap();
        assert_eq!(result.page_count, 1);
    }

    #[test]
    fn write_to_sets_path() {
        let mut result = process_document(&Document::text("t", "plain"), &PrintOptions::default()).unwrap();
        let path = std::env::temp_dir().join(format!("pforge-test-{}.pdf", std::process::id()));
        result.write_to(&path).unwrap();
        assert_eq!(result.output_path.as_deref(), Some(path.as_path()));
        assert_eq!(fs::read(&path).unwrap(), result.output);
        let _ = fs::remove_file(&path);
    }
}
