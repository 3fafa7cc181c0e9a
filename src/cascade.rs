//! Cascade resolver – matches style rules against elements and builds the
//! styled tree consumed by layout.
//!
//! Order of application for one element:
//! engine defaults, inherited properties, user-agent tag defaults,
//! presentational attributes, author rules in source order, then the inline
//! `style` attribute. Neither specificity nor `!important` reorders rules.

use log::debug;

use crate::css::{parse_declarations, parse_stylesheet, Declaration, StyleRule};
use crate::dom::{Attributes, ElementNode, MarkupNode};
use crate::style::{apply_declaration, tag_defaults, BorderStyle, BoxEdges, ComputedStyle, Display, Rgba};

// ---------------------------------------------------------------------------
// Styled tree
// ---------------------------------------------------------------------------

/// A markup node annotated with its computed style.
#[derive(Debug, Clone)]
pub enum StyledNode {
    Element {
        tag: String,
        style: ComputedStyle,
        children: Vec<StyledNode>,
        /// Original attributes (image sources and the like).
        attrs: Attributes,
    },
    Text {
        text: String,
        style: ComputedStyle,
    },
}

impl StyledNode {
    pub fn style(&self) -> &ComputedStyle {
        match self {
            StyledNode::Element { style, .. } | StyledNode::Text { style, .. } => style,
        }
    }

    pub fn children(&self) -> &[StyledNode] {
        match self {
            StyledNode::Element { children, .. } => children,
            StyledNode::Text { .. } => &[],
        }
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            StyledNode::Element { tag, .. } => Some(tag),
            StyledNode::Text { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Rule collection
// ---------------------------------------------------------------------------

/// Parse every `<style>` element of the document, in document order.
pub fn collect_stylesheets(document: &MarkupNode) -> Vec<StyleRule> {
    let mut rules = Vec::new();
    for style in document.find_by_tag("style") {
        let media = style.attr("media").unwrap_or("all").to_ascii_lowercase();
        if !(media.contains("print") || media.contains("all")) {
            continue;
        }
        rules.extend(parse_stylesheet(&style.text_content()));
    }
    rules
}

// ---------------------------------------------------------------------------
// Style computation
// ---------------------------------------------------------------------------

/// Resolve the style of `element` given the rules of its document and the
/// parent's computed style.
pub fn compute_style(element: &ElementNode, rules: &[StyleRule], parent: &ComputedStyle) -> ComputedStyle {
    let mut style = ComputedStyle::default();
    style.inherit_from(parent);

    for (property, value) in tag_defaults(&element.tag) {
        let decl = Declaration {
            property: property.to_string(),
            value: value.to_string(),
            important: false,
        };
        apply_declaration(&mut style, &decl, parent);
    }

    for decl in presentational_hints(element) {
        apply_declaration(&mut style, &decl, parent);
    }

    let matched: Vec<&StyleRule> = rules
        .iter()
        .filter(|r| r.selectors.iter().any(|s| s.matches(element)))
        .collect();
    let inline = element.inline_style().map(parse_declarations).unwrap_or_default();

    // `!important` is parsed but carries no priority: later rules win and
    // inline style goes last.
    for decl in matched.iter().flat_map(|r| r.declarations.iter()) {
        apply_declaration(&mut style, decl, parent);
    }
    for decl in &inline {
        apply_declaration(&mut style, decl, parent);
    }

    style
}

/// Legacy HTML attributes expressed as declarations.
fn presentational_hints(element: &ElementNode) -> Vec<Declaration> {
    let mut out = Vec::new();
    let mut push = |property: &str, value: String| {
        out.push(Declaration {
            property: property.to_string(),
            value,
            important: false,
        })
    };
    for dim in ["width", "height"] {
        if let Some(v) = element.attr(dim) {
            let v = v.trim();
            if !v.is_empty() && v.chars().all(|c| c.is_ascii_digit() || c == '.') {
                push(dim, format!("{v}px"));
            } else if v.ends_with('%') {
                push(dim, v.to_string());
            }
        }
    }
    if let Some(align) = element.attr("align") {
        push("text-align", align.to_string());
    }
    if element.tag == "font" {
        if let Some(color) = element.attr("color") {
            push("color", color.to_string());
        }
        if let Some(face) = element.attr("face") {
            push("font-family", face.to_string());
        }
    }
    out
}

/// Style for a text node: the parent's style with the box properties reset,
/// since text renders inline and must not repeat its parent's box.
fn text_style(parent: &ComputedStyle) -> ComputedStyle {
    let mut style = parent.clone();
    style.display = Display::Inline;
    style.position = crate::style::Position::Static;
    style.z_index = None;
    style.width = "auto".to_string();
    style.height = "auto".to_string();
    style.min_width = "0".to_string();
    style.max_width = "none".to_string();
    style.min_height = "0".to_string();
    style.max_height = "none".to_string();
    style.margin = BoxEdges::uniform("0");
    style.padding = BoxEdges::uniform("0");
    style.border_width = BoxEdges::uniform("0");
    style.border_style = BorderStyle::None;
    style.background_color = Rgba::TRANSPARENT;
    style.page_break_before = false;
    style.page_break_after = false;
    style
}

/// Build the styled tree for a parsed document, resolving styles top-down.
/// `display: none` subtrees, comments and doctypes are dropped.
pub fn build_styled_tree(document: &MarkupNode, rules: &[StyleRule]) -> Vec<StyledNode> {
    let root_style = ComputedStyle::default();
    let tree = build_children(document.children(), rules, &root_style);
    debug!("cascade applied {} rules", rules.len());
    tree
}

fn build_children(nodes: &[MarkupNode], rules: &[StyleRule], parent: &ComputedStyle) -> Vec<StyledNode> {
    let mut result = Vec::new();
    for node in nodes {
        match node {
            MarkupNode::Element(e) => {
                let style = compute_style(e, rules, parent);
                if style.display == Display::None {
                    continue;
                }
                let children = build_children(&e.children, rules, &style);
                result.push(StyledNode::Element {
                    tag: e.tag.clone(),
                    style,
                    children,
                    attrs: e.attributes.clone(),
                });
            }
            MarkupNode::Text(text) => {
                if !text.is_empty() {
                    result.push(StyledNode::Text {
                        text: text.clone(),
                        style: text_style(parent),
                    });
                }
            }
            MarkupNode::Document(children) => {
                result.extend(build_children(children, rules, parent));
            }
            MarkupNode::Comment(_) | MarkupNode::Doctype(_) => {}
        }
    }
    result
}
