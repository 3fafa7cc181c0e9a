//! # print-forge – untrusted markup → paginated PDF, PNG, JPEG or SVG
//!
//! This crate converts HTML, Markdown or plain-text documents with embedded
//! CSS into print-ready output. It never executes scripts and is built to
//! stay within fixed resource bounds on adversarial input. The pipeline
//! stages are:
//!
//! 1. **Convert** – Markdown / plain text → HTML ([`content`])
//! 2. **Sanitize** – allow-list filtering and URL policy ([`sanitize`])
//! 3. **Parse** – markup string → tree ([`dom`])
//! 4. **Style** – stylesheet parsing and cascade ([`css`], [`cascade`], [`style`])
//! 5. **Layout** – block, inline, flex and positioned boxes ([`layout`])
//! 6. **Paginate** – page fragments with text splitting ([`pagination`])
//! 7. **Render** – PDF via printpdf ([`render`]), raster via tiny-skia
//!    ([`raster`]) or SVG ([`svg`]), all driven by one painter ([`paint`])
//!
//! [`pipeline::process_document`] runs the whole chain; [`cache`] and
//! [`batch`] wrap it for repeated and parallel use.

pub mod batch;
pub mod cache;
pub mod cascade;
pub mod content;
pub mod css;
pub mod dom;
pub mod error;
pub mod fonts;
pub mod glyphs;
pub mod layout;
pub mod length;
pub mod options;
pub mod pagination;
pub mod paint;
pub mod pipeline;
pub mod raster;
pub mod render;
pub mod samples;
pub mod sanitize;
pub mod style;
pub mod svg;

// Re-exports for convenience
pub use content::ContentType;
pub use error::{RenderError, Result};
pub use options::{OutputFormat, PrintOptions};
pub use pipeline::{process_document, process_with_timeout, Document, RenderResult};
