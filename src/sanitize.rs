//! Markup sanitizer – rebuilds an untrusted document from an allow-list of
//! tags and attributes and rejects dangerous URLs.
//!
//! The input is parsed with the bounded parser in [`crate::dom`], filtered
//! tree-to-tree, and serialized again. Because the result is always the
//! serializer's output, sanitizing it a second time yields the same string.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use log::{debug, warn};
use url::Url;

use crate::dom::{self, ElementNode, MarkupNode, ParseLimits};
use crate::error::{RenderError, Result, Warnings};
use crate::options::SecurityOptions;

// ---------------------------------------------------------------------------
// Allow-lists
// ---------------------------------------------------------------------------

fn allowed_tags() -> &'static HashSet<&'static str> {
    static TAGS: OnceLock<HashSet<&'static str>> = OnceLock::new();
    TAGS.get_or_init(|| {
        [
            "html", "head", "body", "title", "style", "div", "span", "p", "a", "b", "strong",
            "i", "em", "u", "s", "strike", "del", "ins", "small", "big", "sub", "sup", "mark",
            "code", "pre", "kbd", "samp", "var", "blockquote", "q", "cite", "abbr", "h1", "h2",
            "h3", "h4", "h5", "h6", "ul", "ol", "li", "dl", "dt", "dd", "table", "caption",
            "thead", "tbody", "tfoot", "tr", "td", "th", "colgroup", "col", "img", "br", "hr",
            "section", "article", "header", "footer", "nav", "aside", "main", "figure",
            "figcaption", "address", "time", "center", "font", "wbr",
        ]
        .into_iter()
        .collect()
    })
}

fn global_attributes() -> &'static HashSet<&'static str> {
    static ATTRS: OnceLock<HashSet<&'static str>> = OnceLock::new();
    ATTRS.get_or_init(|| {
        [
            "class", "id", "style", "title", "lang", "dir", "align", "width", "height",
        ]
        .into_iter()
        .collect()
    })
}

fn tag_attributes() -> &'static HashMap<&'static str, &'static [&'static str]> {
    static ATTRS: OnceLock<HashMap<&'static str, &'static [&'static str]>> = OnceLock::new();
    ATTRS.get_or_init(|| {
        let mut m: HashMap<&'static str, &'static [&'static str]> = HashMap::new();
        m.insert("a", &["href", "target", "rel", "name"]);
        m.insert("img", &["src", "alt"]);
        m.insert("td", &["colspan", "rowspan", "valign"]);
        m.insert("th", &["colspan", "rowspan", "valign", "scope"]);
        m.insert("col", &["span"]);
        m.insert("colgroup", &["span"]);
        m.insert("ol", &["start", "type", "reversed"]);
        m.insert("ul", &["type"]);
        m.insert("li", &["value"]);
        m.insert("font", &["color", "size", "face"]);
        m.insert("table", &["border", "cellpadding", "cellspacing"]);
        m.insert("time", &["datetime"]);
        m
    })
}

fn attribute_allowed(tag: &str, attr: &str) -> bool {
    global_attributes().contains(attr)
        || tag_attributes()
            .get(tag)
            .map(|list| list.contains(&attr))
            .unwrap_or(false)
}

/// Attributes whose values are URLs.
fn is_url_attribute(attr: &str) -> bool {
    matches!(attr, "href" | "src" | "action")
}

/// Patterns removed from style text.
const DANGEROUS_CSS: [&str; 4] = ["expression", "@import", "javascript:", "behavior"];

// ---------------------------------------------------------------------------
// Domain policy
// ---------------------------------------------------------------------------

/// Host allow/block lists, applied with one precedence rule everywhere:
/// a blocked match always rejects; otherwise a non-empty allow-list must match.
/// An entry matches the host itself and any of its subdomains.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainPolicy {
    allowed: Vec<String>,
    blocked: Vec<String>,
}

impl DomainPolicy {
    pub fn new(allowed: &[String], blocked: &[String]) -> Self {
        let normalize = |list: &[String]| {
            list.iter()
                .map(|d| d.trim().trim_start_matches("*.").trim_end_matches('.').to_ascii_lowercase())
                .filter(|d| !d.is_empty())
                .collect::<Vec<_>>()
        };
        Self {
            allowed: normalize(allowed),
            blocked: normalize(blocked),
        }
    }

    pub fn from_options(sec: &SecurityOptions) -> Self {
        Self::new(&sec.allowed_domains, &sec.blocked_domains)
    }

    pub fn is_host_allowed(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        if self.blocked.iter().any(|d| host_matches(&host, d)) {
            return false;
        }
        self.allowed.is_empty() || self.allowed.iter().any(|d| host_matches(&host, d))
    }
}

fn host_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .map(|prefix| prefix.ends_with('.'))
            .unwrap_or(false)
}

/// Validate a URL-valued attribute.
///
/// Relative URLs carry no host and pass. `javascript:`/`vbscript:` schemes,
/// non-image `data:` URLs and hosts rejected by `policy` fail with
/// [`RenderError::SecurityViolation`].
pub fn validate_url(value: &str, policy: &DomainPolicy) -> Result<()> {
    // Browsers ignore embedded whitespace and control characters in schemes.
    let compact: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();

    if compact.starts_with("javascript:") || compact.starts_with("vbscript:") {
        return Err(RenderError::SecurityViolation(format!(
            "disallowed URL scheme in '{}'",
            truncate(value, 60)
        )));
    }
    if let Some(rest) = compact.strip_prefix("data:") {
        if rest.starts_with("image/") {
            return Ok(());
        }
        return Err(RenderError::SecurityViolation(
            "data: URLs are only permitted for images".into(),
        ));
    }

    let trimmed = value.trim();
    let absolute = if trimmed.starts_with("//") {
        format!("https:{trimmed}")
    } else {
        trimmed.to_string()
    };
    match Url::parse(&absolute) {
        Ok(url) => {
            if let Some(host) = url.host_str() {
                if !policy.is_host_allowed(host) {
                    return Err(RenderError::SecurityViolation(format!(
                        "domain '{host}' is not permitted"
                    )));
                }
            }
            Ok(())
        }
        // Relative references resolve against the document and have no host.
        Err(_) => Ok(()),
    }
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Remove dangerous substrings case-insensitively until none remain.
pub fn strip_dangerous_css(css: &str) -> String {
    let mut current = css.to_string();
    loop {
        let mut changed = false;
        for pattern in DANGEROUS_CSS {
            while let Some(idx) = find_ci(&current, pattern) {
                current.replace_range(idx..idx + pattern.len(), "");
                changed = true;
            }
        }
        if !changed {
            return current;
        }
    }
}

/// Byte offset of an ASCII `needle` in `haystack`, ignoring ASCII case.
fn find_ci(haystack: &str, needle: &str) -> Option<usize> {
    let h = haystack.as_bytes();
    let n = needle.as_bytes();
    if n.is_empty() || h.len() < n.len() {
        return None;
    }
    (0..=h.len() - n.len()).find(|&i| h[i..i + n.len()].eq_ignore_ascii_case(n))
}

/// Drop control characters other than tab, newline and carriage return.
pub fn strip_control_chars(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_control() || matches!(c, '\t' | '\n' | '\r'))
        .collect()
}

// ---------------------------------------------------------------------------
// Sanitizer
// ---------------------------------------------------------------------------

/// Result of [`Sanitizer::sanitize`].
#[derive(Debug, Clone)]
pub struct SanitizedMarkup {
    pub markup: String,
    pub warnings: Warnings,
}

/// Allow-list sanitizer configured from [`SecurityOptions`].
#[derive(Debug, Clone)]
pub struct Sanitizer {
    limits: ParseLimits,
    policy: DomainPolicy,
    allow_javascript: bool,
}

impl Sanitizer {
    pub fn new(sec: &SecurityOptions) -> Self {
        Self {
            limits: ParseLimits::from(sec),
            policy: DomainPolicy::from_options(sec),
            allow_javascript: sec.allow_javascript,
        }
    }

    pub fn policy(&self) -> &DomainPolicy {
        &self.policy
    }

    pub fn sanitize(&self, markup: &str) -> Result<SanitizedMarkup> {
        let parsed = dom::parse_markup(markup, &self.limits)?;
        let mut warnings = parsed.warnings;
        let mut stats = Stats::default();

        let children = self.filter_children(parsed.document.children(), &mut warnings, &mut stats)?;
        let document = MarkupNode::Document(children);

        if stats.scripts > 0 {
            warnings.push(format!("Removed {} script element(s)", stats.scripts));
            if self.allow_javascript {
                warnings.push("JavaScript is not executed; allowJavaScript has no effect");
            }
        }
        if stats.elements > 0 || stats.attributes > 0 {
            debug!(
                "sanitizer dropped {} element(s) and {} attribute(s)",
                stats.elements, stats.attributes
            );
        }

        Ok(SanitizedMarkup {
            markup: dom::to_markup(&document),
            warnings,
        })
    }

    fn filter_children(
        &self,
        nodes: &[MarkupNode],
        warnings: &mut Warnings,
        stats: &mut Stats,
    ) -> Result<Vec<MarkupNode>> {
        let mut out = Vec::with_capacity(nodes.len());
        for node in nodes {
            match node {
                MarkupNode::Element(e) => {
                    if let Some(clean) = self.filter_element(e, warnings, stats)? {
                        out.push(MarkupNode::Element(clean));
                    }
                }
                MarkupNode::Text(t) => {
                    let text = strip_control_chars(t);
                    if !text.is_empty() {
                        out.push(MarkupNode::Text(text));
                    }
                }
                MarkupNode::Comment(_) => {}
                MarkupNode::Doctype(d) => out.push(MarkupNode::Doctype(strip_control_chars(d))),
                MarkupNode::Document(children) => {
                    out.extend(self.filter_children(children, warnings, stats)?);
                }
            }
        }
        Ok(out)
    }

    fn filter_element(
        &self,
        elem: &ElementNode,
        warnings: &mut Warnings,
        stats: &mut Stats,
    ) -> Result<Option<ElementNode>> {
        if elem.tag == "script" {
            stats.scripts += 1;
            return Ok(None);
        }
        if !allowed_tags().contains(elem.tag.as_str()) {
            stats.elements += 1;
            if matches!(
                elem.tag.as_str(),
                "iframe" | "object" | "embed" | "applet" | "form" | "frame" | "frameset"
            ) {
                warn!("dropping <{}> element", elem.tag);
                warnings.push(format!("Removed <{}> element", elem.tag));
            }
            return Ok(None);
        }

        let mut clean = ElementNode::new(&elem.tag);
        for (name, value) in elem.attributes.iter() {
            if !attribute_allowed(&elem.tag, name) {
                stats.attributes += 1;
                continue;
            }
            let mut value = strip_control_chars(value);
            if is_url_attribute(name) {
                validate_url(&value, &self.policy)?;
            }
            if name == "style" {
                value = strip_dangerous_css(&value);
            }
            clean.attributes.set(name, value);
        }

        if elem.tag == "style" {
            let css = strip_dangerous_css(&strip_control_chars(&elem.text_content()));
            if !css.is_empty() {
                clean.children.push(MarkupNode::Text(css));
            }
        } else {
            clean.children = self.filter_children(&elem.children, warnings, stats)?;
        }
        Ok(Some(clean))
    }
}

#[derive(Debug, Default)]
struct Stats {
    scripts: usize,
    elements: usize,
    attributes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sanitizer() -> Sanitizer {
        Sanitizer::new(&SecurityOptions::default())
    }

    fn clean(html: &str) -> String {
        sanitizer().sanitize(html).unwrap().markup
    }

    #[test]
    fn removes_script_elements() {
        let out = clean("<p>hi</p><SCRIPT>alert(1)</SCRIPT><script src=x></script>");
        assert!(!out.to_ascii_lowercase().contains("<script"));
        assert_eq!(out, "<p>hi</p>");
    }

    #[test]
    fn drops_event_handlers_and_comments() {
        let out = clean(r#"<div onclick="x()" class="c"><!-- hidden -->ok</div>"#);
        assert_eq!(out, r#"<div class="c">ok</div>"#);
    }

    #[test]
    fn drops_disallowed_subtrees() {
        let out = clean("<div><iframe><p>inner</p></iframe>after</div>");
        assert_eq!(out, "<div>after</div>");
    }

    #[test]
    fn javascript_urls_are_violations() {
        let s = sanitizer();
        for html in [
            r#"<a href="javascript:alert(1)">x</a>"#,
            r#"<a href=" JaVaScRiPt:alert(1)">x</a>"#,
            r#"<a href="java&#x09;script:alert(1)">x</a>"#,
            r#"<img src="vbscript:msgbox">"#,
        ] {
            assert!(
                matches!(s.sanitize(html), Err(RenderError::SecurityViolation(_))),
                "{html}"
            );
        }
    }

    #[test]
    fn data_urls_only_for_images() {
        let s = sanitizer();
        assert!(s.sanitize(r#"<img src="data:image/png;base64,AAAA">"#).is_ok());
        assert!(matches!(
            s.sanitize(r#"<a href="data:text/html,<b>x</b>">x</a>"#),
            Err(RenderError::SecurityViolation(_))
        ));
    }

    #[test]
    fn blocked_domain_is_rejected() {
        let sec = SecurityOptions {
            blocked_domains: vec!["blocked.example".into()],
            ..SecurityOptions::default()
        };
        let s = Sanitizer::new(&sec);
        assert!(matches!(
            s.sanitize(r#"<img src="http://blocked.example/x.png">"#),
            Err(RenderError::SecurityViolation(_))
        ));
        assert!(matches!(
            s.sanitize(r#"<img src="//cdn.blocked.example/x.png">"#),
            Err(RenderError::SecurityViolation(_))
        ));
        assert!(s.sanitize(r#"<img src="http://ok.example/x.png">"#).is_ok());
        assert!(s.sanitize(r#"<img src="images/x.png">"#).is_ok());
    }

    #[test]
    fn domain_policy_precedence() {
        let policy = DomainPolicy::new(
            &["example.com".to_string()],
            &["ads.example.com".to_string()],
        );
        assert!(policy.is_host_allowed("example.com"));
        assert!(policy.is_host_allowed("img.example.com"));
        assert!(!policy.is_host_allowed("ads.example.com"));
        assert!(!policy.is_host_allowed("x.ads.example.com"));
        assert!(!policy.is_host_allowed("other.org"));
        assert!(!policy.is_host_allowed("badexample.com"));
    }

    #[test]
    fn dangerous_css_is_removed_until_stable() {
        assert_eq!(strip_dangerous_css("width: EXPRESSION(alert(1))"), "width: (alert(1))");
        assert_eq!(strip_dangerous_css("expreexpressionssion"), "");
        assert_eq!(strip_dangerous_css("@imp@importort url(x)"), " url(x)");
        let out = clean(r#"<style>@import url(evil.css); p { color: red }</style>"#);
        assert_eq!(out, "<style> url(evil.css); p { color: red }</style>");
    }

    #[test]
    fn control_characters_are_stripped() {
        let out = clean("<p>a\u{0}b\u{7}c\td\ne</p>");
        assert_eq!(out, "<p>abc\td\ne</p>");
    }

    #[test]
    fn allow_javascript_still_removes_scripts() {
        let sec = SecurityOptions {
            allow_javascript: true,
            ..SecurityOptions::default()
        };
        let out = Sanitizer::new(&sec).sanitize("<script>x()</script><p>y</p>").unwrap();
        assert_eq!(out.markup, "<p>y</p>");
        assert!(out.warnings.iter().any(|w| w.contains("not executed")));
    }

    #[test]
    fn sanitize_is_idempotent() {
        let inputs = [
            "<div class=a><p>x &amp; y < z</p><script>bad()</script></div>",
            "<p>unclosed <b>bold <i>both</p> tail",
            "<style>a > b { color: red } </style><title>T &amp; C</title>",
            "<table><tr><td>1</td><td colspan=2 onclick=x>2</td></tr></table>",
            "<!DOCTYPE html><html><body><img src='data:image/png;base64,AA' alt=\"q&quot;\"></body></html>",
            "plain text with <unknown>tags</unknown> and &lt;escapes&gt;",
        ];
        let s = sanitizer();
        for input in inputs {
            let once = s.sanitize(input).unwrap().markup;
            let twice = s.sanitize(&once).unwrap().markup;
            assert_eq!(once, twice, "input: {input}");
        }
    }

    #[test]
    fn deep_nesting_is_a_resource_limit() {
        let html = "<div>".repeat(1000);
        assert!(matches!(
            sanitizer().sanitize(&html),
            Err(RenderError::ResourceLimit(_))
        ));
    }
}
