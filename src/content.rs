//! Input content types and their conversion to HTML markup.
//!
//! Markdown goes through `pulldown-cmark`, plain text is escaped into a
//! `<pre>` block, and HTML passes through untouched. Whatever comes out of
//! here is still untrusted and goes through the sanitizer next.

use std::fmt;

use pulldown_cmark::{html, Options, Parser};
use serde::{Deserialize, Serialize};

use crate::dom::escape_text;

/// Kind of content carried by a [`Document`](crate::pipeline::Document).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Html,
    Markdown,
    Text,
}

impl ContentType {
    /// Parse a MIME type or short name (`html`, `markdown`, `md`, `text`, …).
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_lowercase();
        let essence = value.split(';').next().unwrap_or("").trim();
        match essence {
            "html" | "htm" | "text/html" | "application/xhtml+xml" => Some(ContentType::Html),
            "markdown" | "md" | "text/markdown" | "text/x-markdown" => Some(ContentType::Markdown),
            "text" | "txt" | "plain" | "text/plain" => Some(ContentType::Text),
            _ => None,
        }
    }

    /// Guess from a file extension, defaulting to HTML.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "md" | "markdown" => ContentType::Markdown,
            "txt" | "text" => ContentType::Text,
            _ => ContentType::Html,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ContentType::Html => "text/html",
            ContentType::Markdown => "text/markdown",
            ContentType::Text => "text/plain",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime_type())
    }
}

/// Convert `content` of type `kind` into HTML markup.
pub fn to_html(content: &str, kind: ContentType) -> String {
    match kind {
        ContentType::Html => content.to_string(),
        ContentType::Markdown => markdown_to_html(content),
        ContentType::Text => text_to_html(content),
    }
}

/// CommonMark plus tables, strikethrough and task lists.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    let parser = Parser::new_ext(markdown, options);
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

pub fn text_to_html(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n");
    format!(
        "<pre style=\"white-space: pre-wrap\">{}</pre>",
        escape_text(&normalized)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_content_types() {
        assert_eq!(ContentType::parse("text/html; charset=utf-8"), Some(ContentType::Html));
        assert_eq!(ContentType::parse("MD"), Some(ContentType::Markdown));
        assert_eq!(ContentType::parse("text/plain"), Some(ContentType::Text));
        assert_eq!(ContentType::parse("application/pdf"), None);
        assert_eq!(ContentType::from_extension("markdown"), ContentType::Markdown);
        assert_eq!(ContentType::from_extension("htm"), ContentType::Html);
    }

    #[test]
    fn markdown_becomes_html() {
        let html = markdown_to_html("# Title\n\nSome *emphasis* and `code`.\n\n- a\n- b\n");
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<em>emphasis</em>"));
        assert!(html.contains("<code>code</code>"));
        assert!(html.contains("<li>a</li>"));
    }

    #[test]
    fn markdown_tables() {
        let html = markdown_to_html("| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(html.contains("<table>"));
        assert!(html.contains("<td>1</td>"));
    }

    #[test]
    fn text_is_escaped_into_pre() {
        let html = text_to_html("<script>x</script>\r\nline 2");
        assert!(html.starts_with("<pre"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("\nline 2"));
    }

    #[test]
    fn html_passes_through() {
        assert_eq!(to_html("<p>x</p>", ContentType::Html), "<p>x</p>");
    }
}
