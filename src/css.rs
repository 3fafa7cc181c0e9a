//! Stylesheet parser and selector matching.
//!
//! Handles the subset of CSS that documents for print actually carry:
//! `selector { prop: value }` blocks, `!important`, `@media print|all`
//! nesting and simple selectors (type, `.class`, `#id`, `[attr]`, `*`)
//! joined by combinators. Only the subject compound is matched against an
//! element; combinators are parsed so specificity is right, but ancestors are
//! not verified.

use log::debug;

use crate::dom::ElementNode;

/// Nesting bound for `@media` blocks.
const MAX_AT_RULE_DEPTH: usize = 8;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One rule: a selector list and its declarations, in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleRule {
    pub selectors: Vec<Selector>,
    pub declarations: Vec<Declaration>,
}

/// `property: value [!important]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Lower-cased property name.
    pub property: String,
    pub value: String,
    pub important: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    /// Compounds from left to right; the last one is the subject.
    pub compounds: Vec<CompoundSelector>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompoundSelector {
    pub components: Vec<SelectorComponent>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorComponent {
    Universal,
    Element(String),
    Class(String),
    Id(String),
    Attribute { name: String, op: AttributeOp },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeOp {
    /// `[name]`
    Exists,
    /// `[name=value]`
    Equals(String),
    /// `[name~=value]`
    Includes(String),
    /// `[name|=value]`
    DashMatch(String),
    /// `[name^=value]`
    Prefix(String),
    /// `[name$=value]`
    Suffix(String),
    /// `[name*=value]`
    Substring(String),
}

/// Selector specificity `(ids, classes + attributes, elements)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Specificity(pub u32, pub u32, pub u32);

impl Specificity {
    /// Collapsed score `ids×100 + classes×10 + elements`.
    pub fn score(&self) -> u32 {
        self.0 * 100 + self.1 * 10 + self.2
    }
}

impl Selector {
    pub fn specificity(&self) -> Specificity {
        let mut spec = Specificity::default();
        for component in self.compounds.iter().flat_map(|c| &c.components) {
            match component {
                SelectorComponent::Id(_) => spec.0 += 1,
                SelectorComponent::Class(_) | SelectorComponent::Attribute { .. } => spec.1 += 1,
                SelectorComponent::Element(_) => spec.2 += 1,
                SelectorComponent::Universal => {}
            }
        }
        spec
    }

    /// Whether the subject compound matches `element`.
    pub fn matches(&self, element: &ElementNode) -> bool {
        match self.compounds.last() {
            Some(subject) => subject.matches(element),
            None => false,
        }
    }
}

impl CompoundSelector {
    pub fn matches(&self, element: &ElementNode) -> bool {
        self.components.iter().all(|c| c.matches(element))
    }
}

impl SelectorComponent {
    pub fn matches(&self, element: &ElementNode) -> bool {
        match self {
            SelectorComponent::Universal => true,
            SelectorComponent::Element(tag) => element.tag.eq_ignore_ascii_case(tag),
            SelectorComponent::Class(class) => element.has_class(class),
            SelectorComponent::Id(id) => element.id() == Some(id.as_str()),
            SelectorComponent::Attribute { name, op } => match element.attr(name) {
                None => false,
                Some(value) => op.matches(value),
            },
        }
    }
}

impl AttributeOp {
    fn matches(&self, value: &str) -> bool {
        match self {
            AttributeOp::Exists => true,
            AttributeOp::Equals(v) => value == v,
            AttributeOp::Includes(v) => value.split_whitespace().any(|w| w == v),
            AttributeOp::DashMatch(v) => {
                value == v || value.strip_prefix(v.as_str()).map_or(false, |r| r.starts_with('-'))
            }
            AttributeOp::Prefix(v) => !v.is_empty() && value.starts_with(v.as_str()),
            AttributeOp::Suffix(v) => !v.is_empty() && value.ends_with(v.as_str()),
            AttributeOp::Substring(v) => !v.is_empty() && value.contains(v.as_str()),
        }
    }
}

impl StyleRule {
    /// Highest specificity among the selectors that match `element`, if any.
    pub fn matching_specificity(&self, element: &ElementNode) -> Option<Specificity> {
        self.selectors
            .iter()
            .filter(|s| s.matches(element))
            .map(Selector::specificity)
            .max()
    }
}

// ---------------------------------------------------------------------------
// Stylesheet parsing
// ---------------------------------------------------------------------------

/// Parse stylesheet text into rules in source order. Never fails; malformed
/// blocks and unsupported at-rules are skipped.
pub fn parse_stylesheet(css: &str) -> Vec<StyleRule> {
    let cleaned = strip_comments(css);
    let mut rules = Vec::new();
    parse_block_list(&cleaned, 0, &mut rules);
    debug!("parsed {} style rules", rules.len());
    rules
}

fn parse_block_list(css: &str, depth: usize, rules: &mut Vec<StyleRule>) {
    let mut rest = css.trim_start();
    while !rest.is_empty() {
        if rest.starts_with('@') {
            rest = parse_at_rule(rest, depth, rules);
        } else if rest.starts_with('}') {
            // Stray close brace.
            rest = &rest[1..];
        } else {
            let Some(open) = rest.find('{') else { break };
            let prelude = &rest[..open];
            let body_start = open + 1;
            let close = matching_brace(rest, open).unwrap_or(rest.len());
            let body = &rest[body_start..close];
            if !body.contains('{') {
                if let Some(rule) = build_rule(prelude, body) {
                    rules.push(rule);
                }
            }
            rest = rest.get(close + 1..).unwrap_or("");
        }
        rest = rest.trim_start();
    }
}

/// Consume one at-rule starting at `css` and return the remaining input.
fn parse_at_rule<'a>(css: &'a str, depth: usize, rules: &mut Vec<StyleRule>) -> &'a str {
    let semi = css.find(';');
    let open = css.find('{');
    match (open, semi) {
        // Statement at-rule such as @import or @charset.
        (None, Some(s)) => &css[s + 1..],
        (Some(o), Some(s)) if s < o => &css[s + 1..],
        (None, None) => "",
        (Some(o), _) => {
            let close = matching_brace(css, o).unwrap_or(css.len());
            let prelude = css[..o].trim().to_ascii_lowercase();
            let body = &css[o + 1..close];
            if let Some(query) = prelude.strip_prefix("@media") {
                if depth < MAX_AT_RULE_DEPTH && media_applies(query) {
                    parse_block_list(body, depth + 1, rules);
                }
            }
            css.get(close + 1..).unwrap_or("")
        }
    }
}

/// `@media` queries that apply when printing.
fn media_applies(query: &str) -> bool {
    query.split(',').any(|q| {
        let q = q.trim();
        let q = q.strip_prefix("only ").unwrap_or(q).trim_start();
        let media_type = q.split_whitespace().next().unwrap_or("");
        matches!(media_type, "print" | "all")
    })
}

fn matching_brace(s: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, b) in s.bytes().enumerate().skip(open) {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn strip_comments(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut rest = css;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

fn build_rule(prelude: &str, body: &str) -> Option<StyleRule> {
    let selectors: Vec<Selector> = prelude.split(',').filter_map(parse_selector).collect();
    if selectors.is_empty() {
        return None;
    }
    let declarations = parse_declarations(body);
    Some(StyleRule {
        selectors,
        declarations,
    })
}

/// Parse a declaration list such as an inline `style` attribute.
pub fn parse_declarations(text: &str) -> Vec<Declaration> {
    split_declarations(text)
        .into_iter()
        .filter_map(parse_declaration)
        .collect()
}

/// Split on `;` outside of parentheses and quotes.
fn split_declarations(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = (depth - 1).max(0),
            (None, ';') if depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

fn parse_declaration(decl: &str) -> Option<Declaration> {
    let (prop, value) = decl.split_once(':')?;
    let property = prop.trim().to_ascii_lowercase();
    if property.is_empty() || property.contains(char::is_whitespace) {
        return None;
    }
    let mut value = value.trim();
    let mut important = false;
    if let Some(bang) = value.rfind('!') {
        if value[bang + 1..].trim().eq_ignore_ascii_case("important") {
            important = true;
            value = value[..bang].trim_end();
        }
    }
    if value.is_empty() {
        return None;
    }
    Some(Declaration {
        property,
        value: value.to_string(),
        important,
    })
}

// ---------------------------------------------------------------------------
// Selector parsing
// ---------------------------------------------------------------------------

/// Parse one selector of a selector list. Returns `None` for selectors using
/// pseudo-classes, pseudo-elements or anything else outside the supported set.
pub fn parse_selector(text: &str) -> Option<Selector> {
    let text = text.trim();
    if text.is_empty() || text.contains(':') {
        return None;
    }

    let mut compounds = Vec::new();
    let mut current = CompoundSelector::default();
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() || matches!(c, '>' | '+' | '~') => {
                if !current.components.is_empty() {
                    compounds.push(std::mem::take(&mut current));
                } else if matches!(c, '>' | '+' | '~') && compounds.is_empty() {
                    return None;
                }
                i += 1;
            }
            '*' => {
                current.components.push(SelectorComponent::Universal);
                i += 1;
            }
            '.' | '#' => {
                let (ident, next) = read_ident(&chars, i + 1);
                if ident.is_empty() {
                    return None;
                }
                current.components.push(if c == '.' {
                    SelectorComponent::Class(ident)
                } else {
                    SelectorComponent::Id(ident)
                });
                i = next;
            }
            '[' => {
                let close = chars[i..].iter().position(|&c| c == ']')? + i;
                let inner: String = chars[i + 1..close].iter().collect();
                current.components.push(parse_attribute_selector(&inner)?);
                i = close + 1;
            }
            c if is_ident_char(c) => {
                let (ident, next) = read_ident(&chars, i);
                current
                    .components
                    .push(SelectorComponent::Element(ident.to_ascii_lowercase()));
                i = next;
            }
            _ => return None,
        }
    }
    if current.components.is_empty() {
        // Trailing combinator.
        if compounds.is_empty() || text.ends_with(['>', '+', '~']) {
            return None;
        }
    } else {
        compounds.push(current);
    }
    Some(Selector { compounds })
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_' || !c.is_ascii()
}

fn read_ident(chars: &[char], start: usize) -> (String, usize) {
    let mut i = start;
    let mut out = String::new();
    while i < chars.len() && is_ident_char(chars[i]) {
        out.push(chars[i]);
        i += 1;
    }
    (out, i)
}

fn parse_attribute_selector(inner: &str) -> Option<SelectorComponent> {
    let inner = inner.trim();
    let ops: [(&str, fn(String) -> AttributeOp); 6] = [
        ("~=", AttributeOp::Includes),
        ("|=", AttributeOp::DashMatch),
        ("^=", AttributeOp::Prefix),
        ("$=", AttributeOp::Suffix),
        ("*=", AttributeOp::Substring),
        ("=", AttributeOp::Equals),
    ];
    for (token, make) in ops {
        if let Some((name, value)) = inner.split_once(token) {
            let name = name.trim().to_ascii_lowercase();
            if name.is_empty() {
                return None;
            }
            let value = value.trim().trim_matches(|c| c == '"' || c == '\'').to_string();
            return Some(SelectorComponent::Attribute {
                name,
                op: make(value),
            });
        }
    }
    if inner.is_empty() || !inner.chars().all(is_ident_char) {
        return None;
    }
    Some(SelectorComponent::Attribute {
        name: inner.to_ascii_lowercase(),
        op: AttributeOp::Exists,
    })
}
