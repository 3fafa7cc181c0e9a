//! CSS length resolution.
//!
//! Lengths stay as strings in [`ComputedStyle`](crate::style::ComputedStyle)
//! until layout, where the containing block is known. Everything resolves to
//! CSS pixels (96 per inch).

use crate::error::Warnings;

/// Font size that both `em` and `rem` resolve against.
pub const BASE_FONT_SIZE: f32 = 16.0;

/// Resolved lengths are clamped to this magnitude.
pub const MAX_LENGTH: f32 = 100_000.0;

const PX_PER_IN: f32 = 96.0;

/// A parsed but unresolved length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Length {
    Auto,
    /// Absolute length already converted to px.
    Px(f32),
    Percent(f32),
    Em(f32),
    Rem(f32),
    Vw(f32),
    Vh(f32),
}

/// What relative units resolve against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LengthContext {
    /// Base for percentages.
    pub percent_base: f32,
    pub viewport_width: f32,
    pub viewport_height: f32,
}

impl LengthContext {
    pub fn with_percent_base(&self, base: f32) -> Self {
        Self {
            percent_base: base,
            ..*self
        }
    }
}

impl Default for LengthContext {
    fn default() -> Self {
        Self {
            percent_base: 0.0,
            viewport_width: 0.0,
            viewport_height: 0.0,
        }
    }
}

impl Length {
    /// Parse a single length token. `auto` and `none` both parse as [`Length::Auto`].
    pub fn parse(value: &str) -> Option<Length> {
        let v = value.trim().to_ascii_lowercase();
        if v == "auto" || v == "none" || v.is_empty() {
            return Some(Length::Auto);
        }
        if let Some(num) = v.strip_suffix('%') {
            return parse_number(num).map(Length::Percent);
        }

        // Unit is the trailing alphabetic run, so exponents like `1e3px` survive.
        let split = v
            .char_indices()
            .rev()
            .find(|(_, c)| !c.is_ascii_alphabetic())
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        let (num, unit) = v.split_at(split);
        let n = parse_number(num)?;
        let length = match unit {
            "" | "px" => Length::Px(n),
            "pt" => Length::Px(n * PX_PER_IN / 72.0),
            "pc" => Length::Px(n * PX_PER_IN / 6.0),
            "in" => Length::Px(n * PX_PER_IN),
            "cm" => Length::Px(n * PX_PER_IN / 2.54),
            "mm" => Length::Px(n * PX_PER_IN / 25.4),
            "q" => Length::Px(n * PX_PER_IN / 101.6),
            "em" => Length::Em(n),
            "rem" => Length::Rem(n),
            "vw" => Length::Vw(n),
            "vh" => Length::Vh(n),
            _ => return None,
        };
        Some(length)
    }

    /// Resolve to px; `None` for `auto`.
    pub fn to_px(&self, ctx: &LengthContext) -> Option<f32> {
        let px = match *self {
            Length::Auto => return None,
            Length::Px(n) => n,
            Length::Percent(p) => ctx.percent_base * p / 100.0,
            Length::Em(n) | Length::Rem(n) => n * BASE_FONT_SIZE,
            Length::Vw(n) => ctx.viewport_width * n / 100.0,
            Length::Vh(n) => ctx.viewport_height * n / 100.0,
        };
        Some(clamp_length(px))
    }
}

fn parse_number(s: &str) -> Option<f32> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<f32>().ok().filter(|n| n.is_finite())
}

/// Clamp to ±[`MAX_LENGTH`]; NaN becomes 0.
pub fn clamp_length(px: f32) -> f32 {
    if px.is_nan() {
        0.0
    } else {
        px.clamp(-MAX_LENGTH, MAX_LENGTH)
    }
}

/// Resolve a length string to px. `auto`/`none` yield `None`; anything that
/// cannot be measured yields `Some(0.0)` and a warning.
pub fn resolve_length(value: &str, ctx: &LengthContext, warnings: &mut Warnings) -> Option<f32> {
    match Length::parse(value) {
        Some(length) => length.to_px(ctx),
        None => {
            warnings.push(format!("Unresolvable length '{}' treated as 0", value.trim()));
            Some(0.0)
        }
    }
}
