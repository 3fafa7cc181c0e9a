//! Integration tests for the print-forge pipeline.
//!
//! These tests validate:
//! - Sanitizer output is stable and script-free
//! - Layout boxes satisfy the box model
//! - Pagination conserves text and grows with content
//! - Every output format produces well-formed bytes
//! - Security and resource limits fail deterministically
//! - Cache and batch wrappers behave like the plain pipeline

use std::time::Duration;

use print_forge::batch::process_batch;
use print_forge::cache::RenderCache;
use print_forge::cascade::{build_styled_tree, collect_stylesheets};
use print_forge::content::ContentType;
use print_forge::dom::{parse_markup, ParseLimits};
use print_forge::error::{RenderError, Warnings};
use print_forge::layout::{compute_layout, LayoutNode, Viewport};
use print_forge::options::{OutputFormat, PageGeometry, PrintOptions, SecurityOptions};
use print_forge::pagination::{paginate_document, PagedDocument};
use print_forge::pipeline::{process_document, process_document_cached, process_with_timeout, Document};
use print_forge::samples;
use print_forge::sanitize::Sanitizer;

// =====================================================================
// Helpers
// =====================================================================

fn assert_valid_pdf(bytes: &[u8]) {
    assert!(bytes.len() > 100, "PDF too small: {} bytes", bytes.len());
    assert_eq!(&bytes[0..5], b"%PDF-", "Missing PDF header");
}

fn options_for(format: OutputFormat) -> PrintOptions {
    let mut opts = PrintOptions::default();
    opts.output.format = format;
    opts
}

fn layout_and_paginate(html: &str, opts: &PrintOptions) -> PagedDocument {
    let dom = parse_markup(html, &ParseLimits::default()).unwrap().document;
    let styled = build_styled_tree(&dom, &collect_stylesheets(&dom));
    let geometry = PageGeometry::new(&opts.page, &opts.layout);
    let mut warnings = Warnings::new();
    let root = compute_layout(
        &styled,
        Viewport {
            width: geometry.layout_width,
            height: geometry.viewport_height,
        },
        &mut warnings,
    );
    paginate_document(root, geometry, opts.performance.max_pages).unwrap()
}

fn all_nodes(root: &LayoutNode) -> Vec<&LayoutNode> {
    let mut out = Vec::new();
    root.walk(&mut |n| out.push(n));
    out
}

// =====================================================================
// Sanitizer
// =====================================================================

#[test]
fn sanitize_is_idempotent() {
    let sanitizer = Sanitizer::new(&SecurityOptions::default());
    let all = samples::all_elements_html();
    let styled = samples::styled_html();
    let inputs = [
        samples::invoice_html(),
        samples::multi_page_html(),
        samples::hostile_html(),
        all.as_str(),
        styled.as_str(),
        "<p>unclosed <b>bold <i>both</p> trailing",
    ];
    for html in inputs {
        let once = sanitizer.sanitize(html).unwrap().markup;
        let twice = sanitizer.sanitize(&once).unwrap().markup;
        assert_eq!(once, twice, "sanitize not idempotent for {html:?}");
    }
}

#[test]
fn sanitize_removes_scripts_and_handlers() {
    let sanitizer = Sanitizer::new(&SecurityOptions::default());
    let out = sanitizer.sanitize(samples::hostile_html()).unwrap();
    let lower = out.markup.to_ascii_lowercase();
    assert!(!lower.contains("<script"));
    assert!(!lower.contains("onclick"));
    assert!(!lower.contains("onmouseover"));
    assert!(!lower.contains("<iframe"));
    assert!(!lower.contains("javascript:"));
    assert!(!lower.contains("expression("));
    assert!(lower.contains("visible text"));
    assert!(out.warnings.iter().any(|w| w.contains("script")));
}

#[test]
fn hostile_document_renders() {
    let result = process_document(&Document::html("hostile", samples::hostile_html()), &PrintOptions::default()).unwrap();
    assert_valid_pdf(&result.output);
    assert!(result.has_warnings());
}

// =====================================================================
// Layout
// =====================================================================

#[test]
fn box_model_invariant_holds_everywhere() {
    let opts = PrintOptions::default();
    for html in [
        samples::invoice_html().to_string(),
        samples::styled_html(),
        samples::all_elements_html(),
        samples::multi_page_html().to_string(),
    ] {
        let doc = layout_and_paginate(&html, &opts);
        for node in all_nodes(&doc.root) {
            let content = node.content;
            assert!(content.width >= 0.0 && content.height >= 0.0, "negative box on node {}", node.id);
            let border = node.border_box();
            let expected_w = content.width + node.padding.horizontal() + node.border.horizontal();
            let expected_h = content.height + node.padding.vertical() + node.border.vertical();
            assert!((border.width - expected_w).abs() < 0.01, "width mismatch on node {}", node.id);
            assert!((border.height - expected_h).abs() < 0.01, "height mismatch on node {}", node.id);
            let padding = node.padding_box();
            assert!(padding.x <= content.x + 0.01 && padding.y <= content.y + 0.01);
            assert!(border.x <= padding.x + 0.01 && border.y <= padding.y + 0.01);
        }
    }
}

#[test]
fn node_ids_are_unique() {
    let doc = layout_and_paginate(&samples::long_document(80), &PrintOptions::default());
    let mut ids: Vec<usize> = all_nodes(&doc.root).iter().map(|n| n.id).collect();
    let total = ids.len();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), total);
}

// =====================================================================
// Pagination
// =====================================================================

#[test]
fn pagination_conserves_text_lines() {
    let body = (0..200).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
    let html = format!("<pre>{body}</pre>");
    let doc = layout_and_paginate(&html, &PrintOptions::default());
    assert!(doc.page_count() > 1);

    let page_h = doc.geometry.layout_page_height;
    let mut texts = Vec::new();
    for node in all_nodes(&doc.root) {
        for line in &node.lines {
            texts.push(line.text.clone());
            let first = (line.y / page_h + 1e-4).floor();
            let last = ((line.bottom() - 0.01) / page_h).floor();
            assert_eq!(first, last, "line '{}' straddles a page boundary", line.text);
        }
    }
    let expected: Vec<String> = (0..200).map(|i| format!("line {i}")).collect();
    assert_eq!(texts, expected);
}

#[test]
fn every_page_has_content() {
    let doc = layout_and_paginate(&samples::long_document(150), &PrintOptions::default());
    for (i, page) in doc.pages.iter().enumerate() {
        assert_eq!(page.page_number, i + 1);
        assert!(!page.node_ids.is_empty(), "page {} is empty", page.page_number);
    }
}

#[test]
fn page_count_is_monotonic_in_content() {
    let mut last = 0;
    for n in [1, 10, 40, 80, 160, 320] {
        let result = process_document(
            &Document::html(format!("doc-{n}"), &samples::long_document(n)),
            &PrintOptions::default(),
        )
        .unwrap();
        assert!(result.page_count >= last, "{n} paragraphs gave {} pages, fewer than {last}", result.page_count);
        last = result.page_count;
    }
    assert!(last > 1);
}

#[test]
fn forced_breaks_start_new_pages() {
    let result = process_document(&Document::html("spec", samples::multi_page_html()), &PrintOptions::default()).unwrap();
    assert!(result.page_count >= 5, "got {} pages", result.page_count);
}

#[test]
fn page_limit_is_enforced() {
    let mut opts = PrintOptions::default();
    opts.performance.max_pages = 2;
    let err = process_document(&Document::html("long", &samples::long_document(400)), &opts).unwrap_err();
    assert!(matches!(err, RenderError::ResourceLimit(_)));
}

#[test]
fn hundreds_of_pages_finish_and_respect_the_limit() {
    let html = samples::long_document(8000);
    let opts = options_for(OutputFormat::Svg);
    let result = process_document(&Document::html("huge", &html), &opts).unwrap();
    assert!(result.page_count > 150, "got {} pages", result.page_count);
    assert!(result.page_count <= opts.performance.max_pages);

    let mut limited = opts.clone();
    limited.performance.max_pages = result.page_count - 1;
    let err = process_document(&Document::html("huge", &html), &limited).unwrap_err();
    assert!(matches!(err, RenderError::ResourceLimit(_)), "{err:?}");
}

// =====================================================================
// End-to-end
// =====================================================================

#[test]
fn simple_document_is_one_clean_page() {
    let result = process_document(&Document::html("min", samples::minimal_html()), &PrintOptions::default()).unwrap();
    assert_eq!(result.page_count, 1);
    assert!(result.warnings.is_empty(), "{:?}", result.warnings);
    assert_valid_pdf(&result.output);
    assert_eq!(result.format, OutputFormat::Pdf);
}

#[test]
fn empty_document_warns() {
    for content in ["", "   \n\t "] {
        let result = process_document(&Document::html("empty", content), &PrintOptions::default()).unwrap();
        assert_eq!(result.page_count, 1);
        assert!(result.warnings.iter().any(|w| w == "Document content is empty"));
        assert_valid_pdf(&result.output);
    }
}

#[test]
fn deep_nesting_is_a_resource_limit() {
    let html = samples::nested_divs(1000);
    for _ in 0..2 {
        let err = process_document(&Document::html("deep", &html), &PrintOptions::default()).unwrap_err();
        assert!(matches!(err, RenderError::ResourceLimit(_)), "got {err:?}");
    }
}

#[test]
fn blocked_domain_image_is_a_violation() {
    let mut opts = PrintOptions::default();
    opts.security.blocked_domains = vec!["tracker.example".to_string()];
    let doc = Document::html("img", r#"<p>pixel</p><img src="https://img.tracker.example/p.png">"#);
    let err = process_document(&doc, &opts).unwrap_err();
    assert!(matches!(err, RenderError::SecurityViolation(_)));
    assert!(err.is_fatal_violation());
}

#[test]
fn allow_list_limits_hosts() {
    let mut opts = PrintOptions::default();
    opts.security.allowed_domains = vec!["cdn.example".to_string()];
    let other = Document::html("other", r#"<img src="https://other.example/a.png">"#);
    assert!(matches!(
        process_document(&other, &opts),
        Err(RenderError::SecurityViolation(_))
    ));
    let allowed = Document::html("allowed", r#"<img src="https://static.cdn.example/a.png">"#);
    let result = process_document(&allowed, &opts).unwrap();
    assert_valid_pdf(&result.output);
}

#[test]
fn javascript_url_is_a_violation() {
    let doc = Document::html("js", r#"<a href=" JaVaScRiPt:alert(1)">click</a>"#);
    let err = process_document(&doc, &PrintOptions::default()).unwrap_err();
    assert!(matches!(err, RenderError::SecurityViolation(_)));
}

#[test]
fn all_samples_render_as_pdf() {
    let docs = [
        Document::html("invoice", samples::invoice_html()),
        Document::html("styled", &samples::styled_html()),
        Document::html("all", &samples::all_elements_html()),
        Document::markdown("report", samples::report_markdown()),
        Document::text("notes", samples::plain_text()),
    ];
    for doc in &docs {
        let result = process_document(doc, &PrintOptions::default()).unwrap();
        assert_valid_pdf(&result.output);
        assert!(result.page_count >= 1, "{} produced no pages", doc.id);
    }
}

#[test]
fn png_output() {
    let result = process_document(&Document::html("png", samples::invoice_html()), &options_for(OutputFormat::Png)).unwrap();
    assert_eq!(&result.output[0..8], b"\x89PNG\r\n\x1a\n");
    assert_eq!(result.format, OutputFormat::Png);
}

#[test]
fn jpeg_output() {
    let mut opts = options_for(OutputFormat::Jpeg);
    opts.render.quality = 70;
    let result = process_document(&Document::markdown("jpeg", samples::report_markdown()), &opts).unwrap();
    assert_eq!(&result.output[0..3], &[0xFF, 0xD8, 0xFF]);
}

#[test]
fn svg_output_escapes_text() {
    let result = process_document(&Document::text("svg", samples::plain_text()), &options_for(OutputFormat::Svg)).unwrap();
    let svg = String::from_utf8(result.output).unwrap();
    assert!(svg.starts_with("<svg"));
    assert!(svg.contains("&lt;script&gt;"));
    assert!(!svg.contains("<script"));
}

#[test]
fn raster_memory_limit() {
    let mut opts = options_for(OutputFormat::Png);
    opts.performance.max_memory = 1024;
    let err = process_document(&Document::html("mem", "<p>x</p>"), &opts).unwrap_err();
    assert!(matches!(err, RenderError::ResourceLimit(_)));
}

#[test]
fn options_from_json_drive_the_pipeline() {
    let opts = PrintOptions::from_json(
        r#"{"page": {"orientation": "landscape"}, "output": {"format": "svg"}}"#,
    )
    .unwrap();
    let result = process_document(&Document::html("json", samples::minimal_html()), &opts).unwrap();
    assert_eq!(result.format, OutputFormat::Svg);
    let svg = String::from_utf8(result.output).unwrap();
    let portrait = process_document(
        &Document::html("json", samples::minimal_html()),
        &options_for(OutputFormat::Svg),
    )
    .unwrap();
    assert_ne!(svg.as_bytes(), portrait.output.as_slice());
}

#[test]
fn content_type_is_respected() {
    let md = Document::new("md", "# Heading".as_bytes().to_vec(), ContentType::Markdown);
    let result = process_document(&md, &options_for(OutputFormat::Svg)).unwrap();
    let svg = String::from_utf8(result.output).unwrap();
    assert!(svg.contains(">Heading<"));
    assert!(!svg.contains("# Heading"));
}

// =====================================================================
// Cache, batch and timeout
// =====================================================================

#[test]
fn cache_returns_identical_output() {
    let cache = RenderCache::new(Duration::from_secs(60));
    let mut opts = PrintOptions::default();
    opts.performance.enable_cache = true;
    let doc = Document::html("inv", samples::invoice_html());
    let first = process_document_cached(&doc, &opts, &cache).unwrap();
    let second = process_document_cached(&doc, &opts, &cache).unwrap();
    assert!(!first.cache_hit);
    assert!(second.cache_hit);
    assert_eq!(first.output, second.output);
    assert_eq!(first.page_count, second.page_count);

    opts.output.format = OutputFormat::Svg;
    let svg = process_document_cached(&doc, &opts, &cache).unwrap();
    assert!(!svg.cache_hit);
    assert_eq!(cache.len(), 2);
}

#[test]
fn batch_renders_every_document() {
    let docs = vec![
        Document::html("a", samples::minimal_html()),
        Document::markdown("b", samples::report_markdown()),
        Document::html("c", &samples::nested_divs(1000)),
        Document::text("d", samples::plain_text()),
    ];
    let outcomes = process_batch(&docs, &PrintOptions::default()).unwrap();
    assert_eq!(outcomes.len(), 4);
    assert!(outcomes[0].is_ok());
    assert!(outcomes[1].is_ok());
    assert!(matches!(outcomes[2].result, Err(RenderError::ResourceLimit(_))));
    assert!(outcomes[3].is_ok());
}

#[test]
fn timeout_is_a_resource_limit() {
    let mut opts = PrintOptions::default();
    opts.performance.timeout = 0;
    let err = process_with_timeout(&Document::html("slow", &samples::long_document(200)), &opts).unwrap_err();
    assert!(matches!(err, RenderError::ResourceLimit(_)));

    let result = process_with_timeout(&Document::html("fast", samples::minimal_html()), &PrintOptions::default()).unwrap();
    assert_valid_pdf(&result.output);
}
