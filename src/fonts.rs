//! Font selection and text measurement.
//!
//! No font files are loaded. Families map onto the three PDF base-14 groups
//! and widths are estimated from an average character advance, which keeps
//! layout deterministic across renderers.

use crate::style::{ComputedStyle, FontStretch, FontStyle, FontWeight};

/// Average advance as a fraction of the font size.
const AVG_CHAR_FACTOR: f32 = 0.5;
/// Ascent as a fraction of the font size, used for baselines.
const ASCENT_FACTOR: f32 = 0.8;

/// Base font group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseFont {
    Helvetica,
    Times,
    Courier,
}

/// Weight and slant combined into one style code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontVariant {
    Regular,
    Bold,
    Italic,
    BoldItalic,
}

impl FontVariant {
    pub fn new(bold: bool, italic: bool) -> Self {
        match (bold, italic) {
            (false, false) => FontVariant::Regular,
            (true, false) => FontVariant::Bold,
            (false, true) => FontVariant::Italic,
            (true, true) => FontVariant::BoldItalic,
        }
    }

    pub fn is_bold(&self) -> bool {
        matches!(self, FontVariant::Bold | FontVariant::BoldItalic)
    }

    pub fn is_italic(&self) -> bool {
        matches!(self, FontVariant::Italic | FontVariant::BoldItalic)
    }
}

/// Map a CSS `font-family` list onto a base font. The first family that is
/// recognized wins; unknown lists fall back to Helvetica.
pub fn base_font_for_family(family: &str) -> BaseFont {
    for name in family.split(',') {
        let name = name
            .trim()
            .trim_matches(|c| c == '"' || c == '\'')
            .to_ascii_lowercase();
        if name.contains("mono") || name.contains("courier") || name == "consolas" || name == "menlo" {
            return BaseFont::Courier;
        }
        if name.contains("sans") {
            return BaseFont::Helvetica;
        }
        if name.contains("serif")
            || name.contains("times")
            || name.contains("georgia")
            || name.contains("garamond")
            || name.contains("cambria")
            || name.contains("palatino")
        {
            return BaseFont::Times;
        }
        if matches!(
            name.as_str(),
            "helvetica" | "arial" | "verdana" | "tahoma" | "system-ui" | "segoe ui" | "roboto"
        ) {
            return BaseFont::Helvetica;
        }
    }
    BaseFont::Helvetica
}

/// Width and vertical metrics for one font at one size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontMetrics {
    pub font_size: f32,
    pub base: BaseFont,
    pub variant: FontVariant,
    /// Estimated advance of one character in px.
    pub char_width: f32,
}

impl FontMetrics {
    pub fn for_style(style: &ComputedStyle) -> Self {
        let base = base_font_for_family(&style.font_family);
        let family = style.font_family.to_ascii_lowercase();
        let condensed = style.font_stretch == FontStretch::Condensed
            || family.contains("condensed")
            || family.contains("narrow");

        let mut factor = AVG_CHAR_FACTOR;
        match style.font_weight {
            FontWeight::Bold => factor *= 1.1,
            FontWeight::Light => factor *= 0.9,
            FontWeight::Normal => {}
        }
        if base == BaseFont::Courier {
            factor *= 1.2;
        }
        if condensed {
            factor *= 0.8;
        }

        let font_size = style.font_size.max(0.0);
        Self {
            font_size,
            base,
            variant: FontVariant::new(
                style.font_weight == FontWeight::Bold,
                style.font_style == FontStyle::Italic,
            ),
            char_width: font_size * factor,
        }
    }

    /// Estimated width of `text` in px.
    pub fn measure(&self, text: &str) -> f32 {
        text.chars().count() as f32 * self.char_width
    }

    pub fn ascent(&self) -> f32 {
        self.font_size * ASCENT_FACTOR
    }
}

/// One line produced by [`wrap_text`].
#[derive(Debug, Clone, PartialEq)]
pub struct WrappedLine {
    /// Text as drawn; trailing collapsible spaces removed.
    pub text: String,
    /// Width of `text`.
    pub width: f32,
    /// Horizontal advance including trailing spaces, used to continue the line.
    pub advance: f32,
}

/// Greedy word wrap.
///
/// `first_width` is the room left on the line the text starts on; later lines
/// get `max_width`. When the first word does not fit into a partially used
/// line, the first returned line is empty, meaning "break before". A word
/// wider than `max_width` occupies a line of its own and is never split.
/// With `wrap == false` everything stays on one line.
pub fn wrap_text(
    text: &str,
    metrics: &FontMetrics,
    first_width: f32,
    max_width: f32,
    wrap: bool,
    preserve_spaces: bool,
) -> Vec<WrappedLine> {
    const EPS: f32 = 0.01;
    let cw = metrics.char_width;
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;
    let mut limit = first_width;

    for piece in text.split_inclusive(' ') {
        let word_chars = piece.trim_end_matches(' ').chars().count();
        let piece_chars = piece.chars().count();
        if wrap && word_chars > 0 {
            let needed = (current_chars + word_chars) as f32 * cw;
            if !current.is_empty() && needed > limit + EPS {
                lines.push(finish_line(&current, metrics, preserve_spaces));
                current.clear();
                current_chars = 0;
                limit = max_width;
            } else if current.is_empty()
                && lines.is_empty()
                && limit < max_width - EPS
                && word_chars as f32 * cw > limit + EPS
            {
                lines.push(WrappedLine {
                    text: String::new(),
                    width: 0.0,
                    advance: 0.0,
                });
                limit = max_width;
            }
        }
        current.push_str(piece);
        current_chars += piece_chars;
    }
    lines.push(finish_line(&current, metrics, preserve_spaces));
    lines
}

fn finish_line(line: &str, metrics: &FontMetrics, preserve_spaces: bool) -> WrappedLine {
    let advance = metrics.measure(line);
    let text = if preserve_spaces {
        line.to_string()
    } else {
        line.trim_end_matches(' ').to_string()
    };
    WrappedLine {
        width: metrics.measure(&text),
        text,
        advance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(style: &ComputedStyle) -> FontMetrics {
        FontMetrics::for_style(style)
    }

    #[test]
    fn heuristic_text_width() {
        let style = ComputedStyle::default();
        let m = metrics(&style);
        // 5 chars × 16 × 0.5 = 40
        assert!((m.measure("Hello") - 40.0).abs() < 0.1);
    }

    #[test]
    fn width_factors() {
        let mut style = ComputedStyle::default();
        style.font_weight = FontWeight::Bold;
        assert!((metrics(&style).char_width - 8.8).abs() < 0.01);
        style.font_weight = FontWeight::Light;
        assert!((metrics(&style).char_width - 7.2).abs() < 0.01);
        style.font_weight = FontWeight::Normal;
        style.font_family = "courier new, monospace".into();
        assert!((metrics(&style).char_width - 9.6).abs() < 0.01);
        style.font_family = "arial narrow".into();
        assert!((metrics(&style).char_width - 6.4).abs() < 0.01);
    }

    #[test]
    fn family_mapping() {
        assert_eq!(base_font_for_family("Georgia, serif"), BaseFont::Times);
        assert_eq!(base_font_for_family("'Helvetica Neue', sans-serif"), BaseFont::Helvetica);
        assert_eq!(base_font_for_family("unknown, monospace"), BaseFont::Courier);
        assert_eq!(base_font_for_family("fancy"), BaseFont::Helvetica);
        assert_eq!(FontVariant::new(true, true), FontVariant::BoldItalic);
    }

    #[test]
    fn word_wrap_basic() {
        let m = metrics(&ComputedStyle::default()); // 8px per char
        let lines = wrap_text("Hello world foo bar", &m, 80.0, 80.0, true, false);
        let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["Hello", "world foo", "bar"]);
        assert_eq!(lines[1].width, 72.0);
    }

    #[test]
    fn long_word_gets_own_line() {
        let m = metrics(&ComputedStyle::default());
        let lines = wrap_text("a supercalifragilistic b", &m, 40.0, 40.0, true, false);
        let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "supercalifragilistic", "b"]);
    }

    #[test]
    fn break_before_when_line_is_partly_used() {
        let m = metrics(&ComputedStyle::default());
        let lines = wrap_text("word", &m, 16.0, 200.0, true, false);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].text.is_empty());
        assert_eq!(lines[1].text, "word");
    }

    #[test]
    fn nowrap_keeps_one_line() {
        let m = metrics(&ComputedStyle::default());
        let lines = wrap_text("a b c d e f g", &m, 8.0, 8.0, false, false);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].advance, 13.0 * 8.0);
    }
}
