//! Markup parser – converts an HTML string into a [`MarkupNode`] tree.
//!
//! The parser is a tolerant, iterative scanner: it keeps an explicit stack of
//! open elements instead of recursing, so nesting depth is bounded by
//! [`ParseLimits`] rather than by the thread's stack. Mismatched and unclosed
//! tags are repaired and reported as warnings.

use crate::error::{RenderError, Result, Warnings};
use crate::options::SecurityOptions;

// ---------------------------------------------------------------------------
// DOM types
// ---------------------------------------------------------------------------

/// A node in the markup tree. Children are owned by their parent; there are no
/// parent pointers, walks that need ancestors carry them on a stack.
#[derive(Debug, Clone, PartialEq)]
pub enum MarkupNode {
    Document(Vec<MarkupNode>),
    Element(ElementNode),
    Text(String),
    Comment(String),
    Doctype(String),
}

/// An element node carrying tag, attributes, and children.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementNode {
    /// Lower-cased tag name.
    pub tag: String,
    pub attributes: Attributes,
    pub children: Vec<MarkupNode>,
}

/// Ordered attribute list with lower-cased names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes(Vec<(String, String)>);

impl Attributes {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Insert or replace, keeping the original position of an existing name.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let name = name.to_ascii_lowercase();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let idx = self.0.iter().position(|(k, _)| k.eq_ignore_ascii_case(name))?;
        Some(self.0.remove(idx).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl ElementNode {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attributes: Attributes::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name)
    }

    pub fn classes(&self) -> Vec<&str> {
        self.attributes
            .get("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().iter().any(|c| *c == class)
    }

    pub fn id(&self) -> Option<&str> {
        self.attributes.get("id")
    }

    pub fn inline_style(&self) -> Option<&str> {
        self.attributes.get("style")
    }

    pub fn src(&self) -> Option<&str> {
        self.attributes.get("src")
    }

    pub fn is_void(&self) -> bool {
        is_void_element(&self.tag)
    }
}

/// Elements that never receive children.
pub fn is_void_element(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "source"
            | "track"
            | "wbr"
    )
}

/// Elements whose content is read verbatim up to the matching close tag.
fn is_raw_text_element(tag: &str) -> bool {
    matches!(tag, "style" | "script" | "title" | "textarea")
}

/// Raw-text elements whose content still has entities decoded.
fn decodes_entities(tag: &str) -> bool {
    matches!(tag, "title" | "textarea")
}

// ---------------------------------------------------------------------------
// Tree queries
// ---------------------------------------------------------------------------

impl MarkupNode {
    pub fn children(&self) -> &[MarkupNode] {
        match self {
            MarkupNode::Document(children) => children,
            MarkupNode::Element(e) => &e.children,
            _ => &[],
        }
    }

    pub fn as_element(&self) -> Option<&ElementNode> {
        match self {
            MarkupNode::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Every element with the given tag, in document order.
    pub fn find_by_tag(&self, tag: &str) -> Vec<&ElementNode> {
        let mut out = Vec::new();
        self.collect_elements(&mut out, &|e| e.tag.eq_ignore_ascii_case(tag));
        out
    }

    /// Every element carrying the given class, in document order.
    pub fn find_by_class(&self, class: &str) -> Vec<&ElementNode> {
        let mut out = Vec::new();
        self.collect_elements(&mut out, &|e| e.has_class(class));
        out
    }

    /// First element with the given id.
    pub fn find_by_id(&self, id: &str) -> Option<&ElementNode> {
        let mut out = Vec::new();
        self.collect_elements(&mut out, &|e| e.id() == Some(id));
        out.into_iter().next()
    }

    fn collect_elements<'a>(
        &'a self,
        out: &mut Vec<&'a ElementNode>,
        pred: &dyn Fn(&ElementNode) -> bool,
    ) {
        if let MarkupNode::Element(e) = self {
            if pred(e) {
                out.push(e);
            }
        }
        for child in self.children() {
            child.collect_elements(out, pred);
        }
    }

    /// Concatenated text of this node and its descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.push_text(&mut out);
        out
    }

    fn push_text(&self, out: &mut String) {
        match self {
            MarkupNode::Text(t) => out.push_str(t),
            _ => {
                for child in self.children() {
                    child.push_text(out);
                }
            }
        }
    }

    /// The `<body>` element, searched through `<html>`.
    pub fn body(&self) -> Option<&ElementNode> {
        self.find_by_tag("body").into_iter().next()
    }

    /// Number of nodes in this subtree, including itself.
    pub fn node_count(&self) -> usize {
        1 + self.children().iter().map(MarkupNode::node_count).sum::<usize>()
    }
}

impl ElementNode {
    /// Concatenated text of all descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            child.push_text(&mut out);
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Parser – iterative scan with an open-element stack
// ---------------------------------------------------------------------------

/// Bounds applied while parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseLimits {
    pub max_depth: usize,
    pub max_nodes: usize,
}

impl Default for ParseLimits {
    fn default() -> Self {
        Self {
            max_depth: 256,
            max_nodes: 100_000,
        }
    }
}

impl From<&SecurityOptions> for ParseLimits {
    fn from(sec: &SecurityOptions) -> Self {
        Self {
            max_depth: sec.max_tree_depth,
            max_nodes: sec.max_node_count,
        }
    }
}

/// A parsed document together with the structural repairs made on the way.
#[derive(Debug, Clone)]
pub struct ParsedMarkup {
    /// Always a [`MarkupNode::Document`].
    pub document: MarkupNode,
    pub warnings: Warnings,
}

/// Parse an HTML string into a [`MarkupNode::Document`].
///
/// Fails only with [`RenderError::ResourceLimit`] when the depth or node
/// bound is exceeded; everything else is recovered.
pub fn parse_markup(html: &str, limits: &ParseLimits) -> Result<ParsedMarkup> {
    let mut parser = Parser::new(html, *limits);
    parser.run()?;
    Ok(parser.finish())
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    limits: ParseLimits,
    root: Vec<MarkupNode>,
    stack: Vec<ElementNode>,
    nodes: usize,
    warnings: Warnings,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str, limits: ParseLimits) -> Self {
        Self {
            input,
            pos: 0,
            limits,
            root: Vec::new(),
            stack: Vec::new(),
            nodes: 0,
            warnings: Warnings::new(),
        }
    }

    fn run(&mut self) -> Result<()> {
        while !self.eof() {
            if self.starts_with("<!--") {
                self.parse_comment()?;
            } else if self.starts_with_ci("<!doctype") {
                self.parse_doctype()?;
            } else if self.starts_with("<!") || self.starts_with("<?") {
                // Bogus comment / processing instruction.
                self.skip_past('>');
            } else if self.starts_with("</") && self.peek_is_alpha(2) {
                self.parse_closing_tag();
            } else if self.starts_with("<") && self.peek_is_alpha(1) {
                self.parse_element()?;
            } else {
                self.parse_text()?;
            }
        }

        while let Some(open) = self.stack.last() {
            self.warnings
                .push(format!("Unclosed <{}> element closed at end of input", open.tag));
            self.pop_element();
        }
        Ok(())
    }

    fn finish(self) -> ParsedMarkup {
        ParsedMarkup {
            document: MarkupNode::Document(self.root),
            warnings: self.warnings,
        }
    }

    // -- tree building -----------------------------------------------------

    fn count_node(&mut self) -> Result<()> {
        self.nodes += 1;
        if self.nodes > self.limits.max_nodes {
            return Err(RenderError::ResourceLimit(format!(
                "document has more than {} nodes",
                self.limits.max_nodes
            )));
        }
        Ok(())
    }

    fn append(&mut self, node: MarkupNode) {
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => self.root.push(node),
        }
    }

    fn pop_element(&mut self) {
        if let Some(elem) = self.stack.pop() {
            self.append(MarkupNode::Element(elem));
        }
    }

    // -- constructs --------------------------------------------------------

    fn parse_comment(&mut self) -> Result<()> {
        self.advance_bytes(4);
        let start = self.pos;
        let end = match self.input[start..].find("-->") {
            Some(i) => start + i,
            None => self.input.len(),
        };
        let text = self.input[start..end].to_string();
        self.pos = (end + 3).min(self.input.len());
        self.count_node()?;
        self.append(MarkupNode::Comment(text));
        Ok(())
    }

    fn parse_doctype(&mut self) -> Result<()> {
        self.advance_bytes("<!doctype".len());
        let start = self.pos;
        self.skip_past('>');
        let end = if self.input[..self.pos].ends_with('>') {
            self.pos - 1
        } else {
            self.pos
        };
        let name = self.input[start..end].trim().to_string();
        self.count_node()?;
        self.append(MarkupNode::Doctype(name));
        Ok(())
    }

    fn parse_text(&mut self) -> Result<()> {
        let start = self.pos;
        // A '<' that does not open markup is literal text.
        self.advance_char();
        while !self.eof() && !self.at_markup_start() {
            self.advance_char();
        }
        let text = decode_entities(&self.input[start..self.pos]);
        if !text.is_empty() {
            self.count_node()?;
            self.append(MarkupNode::Text(text));
        }
        Ok(())
    }

    fn parse_element(&mut self) -> Result<()> {
        // Consume '<'
        self.advance_bytes(1);
        let tag_name = self.parse_name().to_ascii_lowercase();
        let mut elem = ElementNode::new(&tag_name);

        // Parse attributes
        let mut self_closing = false;
        loop {
            self.skip_whitespace();
            if self.eof() {
                break;
            }
            if self.starts_with(">") {
                self.advance_bytes(1);
                break;
            }
            if self.starts_with("/>") {
                self.advance_bytes(2);
                self_closing = true;
                break;
            }
            if self.starts_with("/") {
                self.advance_bytes(1);
                continue;
            }
            match self.parse_attribute() {
                Some((key, value)) => {
                    if !elem.attributes.contains(&key) {
                        elem.attributes.set(&key, value);
                    }
                }
                None => self.advance_char(),
            }
        }

        if self.stack.len() + 1 > self.limits.max_depth {
            return Err(RenderError::ResourceLimit(format!(
                "element nesting deeper than {} levels",
                self.limits.max_depth
            )));
        }
        self.count_node()?;

        if elem.is_void() || self_closing {
            self.append(MarkupNode::Element(elem));
            return Ok(());
        }

        if is_raw_text_element(&tag_name) {
            let raw = self.take_raw_text(&tag_name);
            let text = if decodes_entities(&tag_name) {
                decode_entities(raw)
            } else {
                raw.to_string()
            };
            if !text.is_empty() {
                self.count_node()?;
                elem.children.push(MarkupNode::Text(text));
            }
            self.append(MarkupNode::Element(elem));
            return Ok(());
        }

        self.stack.push(elem);
        Ok(())
    }

    fn parse_closing_tag(&mut self) {
        self.advance_bytes(2);
        let name = self.parse_name().to_ascii_lowercase();
        self.skip_past('>');

        if is_void_element(&name) {
            self.warnings
                .push(format!("Ignoring closing tag for void element </{name}>"));
            return;
        }

        match self.stack.iter().rposition(|e| e.tag == name) {
            Some(idx) => {
                while self.stack.len() > idx + 1 {
                    if let Some(inner) = self.stack.last() {
                        self.warnings.push(format!(
                            "Implicitly closed <{}> before </{name}>",
                            inner.tag
                        ));
                    }
                    self.pop_element();
                }
                self.pop_element();
            }
            None => {
                self.warnings
                    .push(format!("Ignoring unmatched closing tag </{name}>"));
            }
        }
    }

    /// Consume the content of a raw-text element and its closing tag.
    fn take_raw_text(&mut self, tag: &str) -> &'a str {
        let input: &'a str = self.input;
        let start = self.pos;
        let rest = &input[start..];
        let mut end = input.len();
        for (i, _) in rest.match_indices("</") {
            let after = &rest[i + 2..];
            let matches_tag = after
                .get(..tag.len())
                .map(|s| s.eq_ignore_ascii_case(tag))
                .unwrap_or(false);
            let terminated = matches_tag
                && after.as_bytes()
                    .get(tag.len())
                    .map(|b| !b.is_ascii_alphanumeric())
                    .unwrap_or(true);
            if terminated {
                end = start + i;
                break;
            }
        }
        self.pos = end;
        if end < input.len() {
            self.skip_past('>');
        } else {
            self.warnings
                .push(format!("Unclosed <{tag}> element closed at end of input"));
        }
        &input[start..end]
    }

    fn parse_name(&mut self) -> &'a str {
        let input: &'a str = self.input;
        let start = self.pos;
        while !self.eof() {
            let c = self.current_char();
            if c.is_whitespace() || matches!(c, '>' | '/' | '=' | '"' | '\'' | '<') {
                break;
            }
            self.advance_char();
        }
        &input[start..self.pos]
    }

    fn parse_attribute(&mut self) -> Option<(String, String)> {
        let key = self.parse_name().to_ascii_lowercase();
        if key.is_empty() {
            return None;
        }
        self.skip_whitespace();
        if !self.starts_with("=") {
            return Some((key, String::new()));
        }
        self.advance_bytes(1); // skip '='
        self.skip_whitespace();
        let value = self.parse_attr_value();
        Some((key, value))
    }

    fn parse_attr_value(&mut self) -> String {
        let quote = if self.starts_with("\"") {
            Some('"')
        } else if self.starts_with("'") {
            Some('\'')
        } else {
            None
        };
        match quote {
            Some(q) => {
                self.advance_bytes(1);
                let start = self.pos;
                while !self.eof() && self.current_char() != q {
                    self.advance_char();
                }
                let val = decode_entities(&self.input[start..self.pos]);
                if !self.eof() {
                    self.advance_bytes(1);
                }
                val
            }
            None => {
                let start = self.pos;
                while !self.eof() {
                    let c = self.current_char();
                    if c.is_whitespace() || c == '>' {
                        break;
                    }
                    self.advance_char();
                }
                decode_entities(&self.input[start..self.pos])
            }
        }
    }

    // -- scanning helpers --------------------------------------------------

    fn at_markup_start(&self) -> bool {
        self.starts_with("<!")
            || self.starts_with("<?")
            || (self.starts_with("</") && self.peek_is_alpha(2))
            || (self.starts_with("<") && self.peek_is_alpha(1))
    }

    fn peek_is_alpha(&self, offset: usize) -> bool {
        self.input.as_bytes()
            .get(self.pos + offset)
            .map(|b| b.is_ascii_alphabetic())
            .unwrap_or(false)
    }

    fn skip_whitespace(&mut self) {
        while !self.eof() && self.current_char().is_whitespace() {
            self.advance_char();
        }
    }

    fn skip_past(&mut self, c: char) {
        match self.input[self.pos..].find(c) {
            Some(i) => self.pos += i + c.len_utf8(),
            None => self.pos = self.input.len(),
        }
    }

    fn starts_with(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    fn starts_with_ci(&self, s: &str) -> bool {
        self.input[self.pos..]
            .get(..s.len())
            .map(|p| p.eq_ignore_ascii_case(s))
            .unwrap_or(false)
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn current_char(&self) -> char {
        self.input[self.pos..].chars().next().unwrap_or('\0')
    }

    fn advance_char(&mut self) {
        if let Some(c) = self.input[self.pos..].chars().next() {
            self.pos += c.len_utf8();
        }
    }

    /// Advance over ASCII bytes already known to be present.
    fn advance_bytes(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.input.len());
    }
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// Decode character references in a single left-to-right pass, so `&amp;lt;`
/// becomes `&lt;` rather than `<`.
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let semi = rest[1..]
            .char_indices()
            .take(12)
            .find(|(_, c)| *c == ';')
            .map(|(i, _)| i + 1);
        let decoded = semi.and_then(|end| decode_reference(&rest[1..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_reference(name: &str) -> Option<char> {
    if let Some(num) = name.strip_prefix('#') {
        let code = if let Some(hex) = num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
            u32::from_str_radix(hex, 16).ok()?
        } else {
            num.parse::<u32>().ok()?
        };
        return Some(match char::from_u32(code) {
            Some(c) if code != 0 => c,
            _ => '\u{FFFD}',
        });
    }
    Some(match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{00A0}',
        "copy" => '\u{00A9}',
        "reg" => '\u{00AE}',
        "trade" => '\u{2122}',
        "hellip" => '\u{2026}',
        "mdash" => '\u{2014}',
        "ndash" => '\u{2013}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201C}',
        "rdquo" => '\u{201D}',
        "bull" => '\u{2022}',
        "euro" => '\u{20AC}',
        "middot" => '\u{00B7}',
        "times" => '\u{00D7}',
        _ => return None,
    })
}

// ---------------------------------------------------------------------------
// Serializer
// ---------------------------------------------------------------------------

/// Write a tree back out as markup. Text and attribute values are escaped so
/// that parsing the output reproduces the same tree.
pub fn to_markup(node: &MarkupNode) -> String {
    let mut out = String::new();
    write_node(node, &mut out);
    out
}

fn write_node(node: &MarkupNode, out: &mut String) {
    match node {
        MarkupNode::Document(children) => {
            for child in children {
                write_node(child, out);
            }
        }
        MarkupNode::Element(e) => {
            out.push('<');
            out.push_str(&e.tag);
            for (name, value) in e.attributes.iter() {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                out.push_str(&escape_attr(value));
                out.push('"');
            }
            out.push('>');
            if e.is_void() {
                return;
            }
            let raw = is_raw_text_element(&e.tag) && !decodes_entities(&e.tag);
            for child in &e.children {
                match child {
                    MarkupNode::Text(t) if raw => out.push_str(&t.replace("</", "<\\/")),
                    _ => write_node(child, out),
                }
            }
            out.push_str("</");
            out.push_str(&e.tag);
            out.push('>');
        }
        MarkupNode::Text(t) => out.push_str(&escape_text(t)),
        MarkupNode::Comment(c) => {
            out.push_str("<!--");
            out.push_str(&c.replace("-->", "- ->"));
            out.push_str("-->");
        }
        MarkupNode::Doctype(d) => {
            out.push_str("<!DOCTYPE ");
            out.push_str(&d.replace('>', ""));
            out.push('>');
        }
    }
}

/// Escape text content for markup output.
pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape an attribute value for double-quoted output.
pub fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            _ => out.push(c),
        }
    }
    out
}
