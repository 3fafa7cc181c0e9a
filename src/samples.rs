//! Sample documents for tests, benchmarks and demonstration.
//!
//! Each sample exercises a different part of the pipeline: stylesheet
//! cascade, tables, flex rows, lists, positioned boxes, page breaks,
//! Markdown and plain-text input, and hostile markup for the sanitizer.

/// 1×1 PNG used by the image samples.
pub const TINY_PNG: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";

/// Invoice with an embedded stylesheet, a two-column header and a table.
pub fn invoice_html() -> &'static str {
    r##"<!DOCTYPE html>
<html>
<head>
<title>Invoice 2024-001</title>
<style>
    body { font-family: Helvetica, sans-serif; font-size: 14px; color: #222; }
    h1 { color: #1a365d; margin-bottom: 16px; }
    .parties { display: flex; gap: 24px; margin-bottom: 24px; }
    .label { font-weight: bold; }
    table { width: 100%; margin-bottom: 24px; }
    th { text-align: left; background-color: #e2e8f0; }
    .total { text-align: right; font-size: 20px; font-weight: bold; }
</style>
</head>
<body>
    <h1>Invoice #2024-001</h1>

    <div class="parties">
        <div>
            <p class="label">From:</p>
            <p>Acme Corp</p>
            <p>123 Business St</p>
            <p>New York, NY 10001</p>
        </div>
        <div>
            <p class="label">To:</p>
            <p>Client Inc</p>
            <p>456 Client Ave</p>
            <p>Los Angeles, CA 90001</p>
        </div>
    </div>

    <table>
        <tr><th>Item</th><th>Qty</th><th>Price</th><th>Total</th></tr>
        <tr><td>Web Development</td><td>40</td><td>$150.00</td><td>$6,000.00</td></tr>
        <tr><td>Design Services</td><td>20</td><td>$125.00</td><td>$2,500.00</td></tr>
        <tr><td>Hosting (Annual)</td><td>1</td><td>$500.00</td><td>$500.00</td></tr>
    </table>

    <p class="total">Total: $9,000.00</p>
</body>
</html>
"##
}

/// Quarterly report written in Markdown.
pub fn report_markdown() -> &'static str {
    r##"# Quarterly Report

Q4 2025, **Confidential**

## Executive Summary

Revenue grew by **23%** year-over-year, reaching a total of **$4.2M** for the
quarter. Our customer base expanded significantly with *notable wins in the
enterprise segment*.

## Key Highlights

- Customer acquisition cost reduced by 15%
- Net promoter score improved to 72
- Three new enterprise partnerships signed
- Product reliability reached 99.97% uptime

## Action Items

1. Expand sales team by Q1 2026
2. Launch mobile application beta
3. Complete SOC2 Type II certification

### Revenue Breakdown

| Segment    | Revenue | Growth |
|------------|---------|--------|
| Enterprise | $2.1M   | +31%   |
| Mid-Market | $1.4M   | +18%   |
| SMB        | $0.7M   | +12%   |

> This document is confidential. Do not distribute without authorization.
"##
}

/// Specification document with explicit page breaks, long enough to paginate.
pub fn multi_page_html() -> &'static str {
    r##"<html>
<head>
<title>Product Specification</title>
<style>
    h2 { page-break-before: always; color: #2b6cb0; }
    h2.first { page-break-before: auto; }
    table { width: 100%; }
    th { background-color: #e2e8f0; }
    .keep { page-break-inside: avoid; border: 1px solid #999; padding: 8px; }
</style>
</head>
<body>
    <h1>Product Specification Document</h1>

    <h2 class="first">1. Introduction</h2>
    <p>This document provides a comprehensive specification for the next
    generation platform. It covers architecture decisions, API design,
    security requirements, and deployment considerations.</p>

    <h2>2. Architecture Overview</h2>
    <p>The system follows a microservices architecture with the following key components:</p>
    <ul>
        <li>API Gateway: authentication and rate limiting</li>
        <li>User Service: user accounts and permissions</li>
        <li>Order Service: orders and payments</li>
        <li>Notification Service: emails and push notifications</li>
        <li>Analytics Service: usage telemetry</li>
    </ul>

    <h2>3. API Design</h2>
    <p>All APIs follow RESTful conventions with JSON payloads.</p>
    <table>
        <tr><th>Endpoint</th><th>Method</th><th>Description</th></tr>
        <tr><td>/api/users</td><td>GET</td><td>List users</td></tr>
        <tr><td>/api/users</td><td>POST</td><td>Create user</td></tr>
        <tr><td>/api/orders</td><td>GET</td><td>List orders</td></tr>
        <tr><td>/api/orders</td><td>POST</td><td>Create order</td></tr>
        <tr><td>/api/orders/:id</td><td>PUT</td><td>Update order</td></tr>
        <tr><td>/api/orders/:id</td><td>DELETE</td><td>Cancel order</td></tr>
    </table>

    <h2>4. Security Requirements</h2>
    <div class="keep">
    <ol>
        <li>All data at rest must be encrypted using AES-256</li>
        <li>All data in transit must use TLS 1.3</li>
        <li>Authentication via OAuth 2.0 with PKCE</li>
        <li>Role-based access control for all endpoints</li>
        <li>Audit logging for all state mutations</li>
    </ol>
    </div>

    <h2>5. Conclusion</h2>
    <p>This specification provides the foundation for the next generation of our
    platform. All teams should review and provide feedback by end of Q1 2026.</p>

    <p style="font-size: 11px; color: #718096">Document version 1.0, last updated February 2026</p>
</body>
</html>
"##
}

/// Flex cards, an image, a positioned badge and inline styling.
pub fn styled_html() -> String {
    format!(
        r##"<html>
<head>
<style>
    .header {{ display: flex; gap: 16px; margin-bottom: 24px; position: relative; }}
    .badge {{ position: absolute; top: 0; right: 0; background: #e53e3e; color: white; padding: 2px 6px; z-index: 2; }}
    .cards {{ display: flex; gap: 16px; }}
    .card {{ background-color: #f7fafc; padding: 16px; border: 1px dashed #a0aec0; }}
    .card .title {{ font-weight: bold; margin-bottom: 4px; }}
    #tagline {{ color: #718096; font-size: 0.875em; }}
</style>
</head>
<body>
    <div class="header">
        <img src="{png}" style="width: 64px; height: 64px" alt="logo">
        <div>
            <h1>Company Name</h1>
            <p id="tagline">Building the future</p>
        </div>
        <span class="badge">NEW</span>
    </div>

    <h2 style="color: #2b6cb0">Product Overview</h2>
    <p>Our <b>flagship product</b> combines <i>cutting-edge technology</i> with
    <u>user-friendly design</u>. It handles <span style="color: #e53e3e">critical
    workflows</span> across <s>some</s> many industries.</p>

    <div class="cards">
        <div class="card"><p class="title">Fast</p><p>Sub-second response times</p></div>
        <div class="card"><p class="title">Secure</p><p>Enterprise-grade encryption</p></div>
        <div class="card"><p class="title">Scalable</p><p>Handles millions of requests</p></div>
    </div>

    <hr>
    <p style="text-align: center; text-transform: uppercase; letter-spacing: 1px">centered footer</p>
</body>
</html>
"##,
        png = TINY_PNG
    )
}

/// Smallest useful document.
pub fn minimal_html() -> &'static str {
    "<div><h1>Title</h1><p>Body text</p></div>"
}

/// Plain-text input, including characters that look like markup.
pub fn plain_text() -> &'static str {
    "Release notes\n=============\n\n  * fixed <script> handling\n  * tabs\tand   spaces are kept\n\nThanks & goodbye.\n"
}

/// One of every supported element.
pub fn all_elements_html() -> String {
    format!(
        r##"<div style="padding: 16px">
    <h1>Heading 1</h1>
    <h2>Heading 2</h2>
    <h3>Heading 3</h3>
    <h4>Heading 4</h4>

    <p>This is a paragraph with <strong>bold</strong>, <em>italic</em>,
    <u>underlined</u>, <code>code</code>, <mark>marked</mark> and
    <a href="https://example.com/docs">linked</a> text.<br>After a line break.</p>

    <blockquote>A quoted passage.</blockquote>
    <pre>preformatted
    text   block</pre>

    <ul><li>Unordered item 1</li><li>Unordered item 2</li></ul>
    <ol start="3"><li>Ordered item 3</li><li>Ordered item 4</li></ol>
    <dl><dt>Term</dt><dd>Definition</dd></dl>

    <table>
        <tr><th>Header A</th><th>Header B</th></tr>
        <tr><td>Cell A1</td><td>Cell B1</td></tr>
        <tr><td>Cell A2</td><td>Cell B2</td></tr>
    </table>

    <hr>
    <img src="{png}" style="width: 100px; height: 60px" alt="pixel">
</div>
"##,
        png = TINY_PNG
    )
}

/// Markup full of things the sanitizer must remove, but no hard violations.
pub fn hostile_html() -> &'static str {
    r##"<div onclick="steal()" style="color: red; background: url(javascript:alert(1))">
    <script>document.cookie</script>
    <p onmouseover="x()">Visible text</p>
    <iframe src="https://example.com"></iframe>
    <style>p { behavior: url(x.htc); width: expression(alert(1)); }</style>
    <!-- a comment -->
    <object data="x.swf"></object>
</div>"##
}

/// `depth` nested `<div>` elements around a short text.
pub fn nested_divs(depth: usize) -> String {
    let mut out = String::with_capacity(depth * 11 + 8);
    for _ in 0..depth {
        out.push_str("<div>");
    }
    out.push_str("deep");
    for _ in 0..depth {
        out.push_str("</div>");
    }
    out
}

/// `paragraphs` numbered paragraphs of filler text.
pub fn long_document(paragraphs: usize) -> String {
    let mut out = String::from("<html><body>");
    for i in 0..paragraphs {
        out.push_str(&format!(
            "<p>Paragraph {i}. The quick brown fox jumps over the lazy dog while the \
             printer keeps feeding paper through the rollers.</p>"
        ));
    }
    out.push_str("</body></html>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{parse_markup, ParseLimits};

    #[test]
    fn samples_parse() {
        let samples: Vec<(&str, String)> = vec![
            ("invoice", invoice_html().to_string()),
            ("multipage", multi_page_html().to_string()),
            ("styled", styled_html()),
            ("minimal", minimal_html().to_string()),
            ("all_elements", all_elements_html()),
            ("hostile", hostile_html().to_string()),
        ];

        for (name, html) in samples {
            let parsed = parse_markup(&html, &ParseLimits::default()).unwrap();
            assert!(
                parsed.document.node_count() > 1,
                "Sample '{}' should parse to a non-empty tree",
                name
            );
        }
    }

    #[test]
    fn generators() {
        assert_eq!(nested_divs(2), "<div><div>deep</div></div>");
        assert_eq!(long_document(3).matches("<p>").count(), 3);
    }
}
