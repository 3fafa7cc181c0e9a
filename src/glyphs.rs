//! Built-in 8×8 bitmap font for raster output.
//!
//! Letters are drawn in one case. Characters without a pattern render as a
//! hollow box so missing glyphs stay visible.

/// Rows top to bottom; bit 7 is the leftmost column.
pub type Glyph = [u8; 8];

const MISSING: Glyph = [
    0b01111110, 0b01000010, 0b01000010, 0b01000010, 0b01000010, 0b01000010, 0b01111110, 0b00000000,
];

/// Bitmap for `c`, or `None` for blank characters.
pub fn glyph(c: char) -> Option<Glyph> {
    if c.is_whitespace() {
        return None;
    }
    let g: Glyph = match c.to_ascii_lowercase() {
        'a' => [0b00111100, 0b01000010, 0b01000010, 0b01111110, 0b01000010, 0b01000010, 0b01000010, 0b00000000],
        'b' => [0b01111100, 0b01000010, 0b01000010, 0b01111100, 0b01000010, 0b01000010, 0b01111100, 0b00000000],
        'c' => [0b00111100, 0b01000010, 0b01000000, 0b01000000, 0b01000000, 0b01000010, 0b00111100, 0b00000000],
        'd' => [0b01111000, 0b01000100, 0b01000010, 0b01000010, 0b01000010, 0b01000100, 0b01111000, 0b00000000],
        'e' => [0b01111110, 0b01000000, 0b01000000, 0b01111100, 0b01000000, 0b01000000, 0b01111110, 0b00000000],
        'f' => [0b01111110, 0b01000000, 0b01000000, 0b01111100, 0b01000000, 0b01000000, 0b01000000, 0b00000000],
        'g' => [0b00111100, 0b01000010, 0b01000000, 0b01001110, 0b01000010, 0b01000010, 0b00111100, 0b00000000],
        'h' => [0b01000010, 0b01000010, 0b01000010, 0b01111110, 0b01000010, 0b01000010, 0b01000010, 0b00000000],
        'i' => [0b00111100, 0b00011000, 0b00011000, 0b00011000, 0b00011000, 0b00011000, 0b00111100, 0b00000000],
        'j' => [0b00001110, 0b00000100, 0b00000100, 0b00000100, 0b00000100, 0b01000100, 0b00111000, 0b00000000],
        'k' => [0b01000100, 0b01001000, 0b01010000, 0b01100000, 0b01010000, 0b01001000, 0b01000100, 0b00000000],
        'l' => [0b01000000, 0b01000000, 0b01000000, 0b01000000, 0b01000000, 0b01000000, 0b01111110, 0b00000000],
        'm' => [0b01000010, 0b01100110, 0b01011010, 0b01000010, 0b01000010, 0b01000010, 0b01000010, 0b00000000],
        'n' => [0b01000010, 0b01100010, 0b01010010, 0b01001010, 0b01000110, 0b01000010, 0b01000010, 0b00000000],
        'o' => [0b00111100, 0b01000010, 0b01000010, 0b01000010, 0b01000010, 0b01000010, 0b00111100, 0b00000000],
        'p' => [0b01111100, 0b01000010, 0b01000010, 0b01111100, 0b01000000, 0b01000000, 0b01000000, 0b00000000],
        'q' => [0b00111100, 0b01000010, 0b01000010, 0b01000010, 0b01001010, 0b01000100, 0b00111010, 0b00000000],
        'r' => [0b01111100, 0b01000010, 0b01000010, 0b01111100, 0b01010000, 0b01001000, 0b01000100, 0b00000000],
        's' => [0b00111100, 0b01000010, 0b01000000, 0b00111100, 0b00000010, 0b01000010, 0b00111100, 0b00000000],
        't' => [0b01111110, 0b00011000, 0b00011000, 0b00011000, 0b00011000, 0b00011000, 0b00011000, 0b00000000],
        'u' => [0b01000010, 0b01000010, 0b01000010, 0b01000010, 0b01000010, 0b01000010, 0b00111100, 0b00000000],
        'v' => [0b01000010, 0b01000010, 0b01000010, 0b01000010, 0b00100100, 0b00100100, 0b00011000, 0b00000000],
        'w' => [0b01000010, 0b01000010, 0b01000010, 0b01000010, 0b01011010, 0b01100110, 0b01000010, 0b00000000],
        'x' => [0b01000010, 0b00100100, 0b00011000, 0b00011000, 0b00011000, 0b00100100, 0b01000010, 0b00000000],
        'y' => [0b01000010, 0b01000010, 0b00100100, 0b00011000, 0b00011000, 0b00011000, 0b00011000, 0b00000000],
        'z' => [0b01111110, 0b00000100, 0b00001000, 0b00010000, 0b00100000, 0b01000000, 0b01111110, 0b00000000],
        '0' => [0b00111100, 0b01000110, 0b01001010, 0b01010010, 0b01100010, 0b01000010, 0b00111100, 0b00000000],
        '1' => [0b00011000, 0b00111000, 0b00011000, 0b00011000, 0b00011000, 0b00011000, 0b00111100, 0b00000000],
        '2' => [0b00111100, 0b01000010, 0b00000010, 0b00001100, 0b00110000, 0b01000000, 0b01111110, 0b00000000],
        '3' => [0b00111100, 0b01000010, 0b00000010, 0b00011100, 0b00000010, 0b01000010, 0b00111100, 0b00000000],
        '4' => [0b00000100, 0b00001100, 0b00010100, 0b00100100, 0b01111110, 0b00000100, 0b00000100, 0b00000000],
        '5' => [0b01111110, 0b01000000, 0b01111100, 0b00000010, 0b00000010, 0b01000010, 0b00111100, 0b00000000],
        '6' => [0b00111100, 0b01000000, 0b01111100, 0b01000010, 0b01000010, 0b01000010, 0b00111100, 0b00000000],
        '7' => [0b01111110, 0b00000010, 0b00000100, 0b00001000, 0b00010000, 0b00010000, 0b00010000, 0b00000000],
        '8' => [0b00111100, 0b01000010, 0b01000010, 0b00111100, 0b01000010, 0b01000010, 0b00111100, 0b00000000],
        '9' => [0b00111100, 0b01000010, 0b01000010, 0b00111110, 0b00000010, 0b00000010, 0b00111100, 0b00000000],
        '.' => [0b00000000, 0b00000000, 0b00000000, 0b00000000, 0b00000000, 0b00011000, 0b00011000, 0b00000000],
        ',' => [0b00000000, 0b00000000, 0b00000000, 0b00000000, 0b00011000, 0b00011000, 0b00110000, 0b00000000],
        ':' => [0b00000000, 0b00011000, 0b00011000, 0b00000000, 0b00011000, 0b00011000, 0b00000000, 0b00000000],
        ';' => [0b00000000, 0b00011000, 0b00011000, 0b00000000, 0b00011000, 0b00011000, 0b00110000, 0b00000000],
        '!' => [0b00011000, 0b00011000, 0b00011000, 0b00011000, 0b00011000, 0b00000000, 0b00011000, 0b00000000],
        '?' => [0b00111100, 0b01000010, 0b00000100, 0b00001000, 0b00001000, 0b00000000, 0b00001000, 0b00000000],
        '-' => [0b00000000, 0b00000000, 0b00000000, 0b01111110, 0b00000000, 0b00000000, 0b00000000, 0b00000000],
        '_' => [0b00000000, 0b00000000, 0b00000000, 0b00000000, 0b00000000, 0b00000000, 0b01111110, 0b00000000],
        '+' => [0b00000000, 0b00011000, 0b00011000, 0b01111110, 0b00011000, 0b00011000, 0b00000000, 0b00000000],
        '=' => [0b00000000, 0b00000000, 0b01111110, 0b00000000, 0b01111110, 0b00000000, 0b00000000, 0b00000000],
        '*' => [0b00000000, 0b01011010, 0b00111100, 0b01111110, 0b00111100, 0b01011010, 0b00000000, 0b00000000],
        '/' => [0b00000010, 0b00000100, 0b00001000, 0b00010000, 0b00100000, 0b01000000, 0b00000000, 0b00000000],
        '\\' => [0b01000000, 0b00100000, 0b00010000, 0b00001000, 0b00000100, 0b00000010, 0b00000000, 0b00000000],
        '(' => [0b00001100, 0b00010000, 0b00100000, 0b00100000, 0b00100000, 0b00010000, 0b00001100, 0b00000000],
        ')' => [0b00110000, 0b00001000, 0b00000100, 0b00000100, 0b00000100, 0b00001000, 0b00110000, 0b00000000],
        '[' => [0b00111100, 0b00100000, 0b00100000, 0b00100000, 0b00100000, 0b00100000, 0b00111100, 0b00000000],
        ']' => [0b00111100, 0b00000100, 0b00000100, 0b00000100, 0b00000100, 0b00000100, 0b00111100, 0b00000000],
        '<' => [0b00000110, 0b00011000, 0b01100000, 0b01100000, 0b00011000, 0b00000110, 0b00000000, 0b00000000],
        '>' => [0b01100000, 0b00011000, 0b00000110, 0b00000110, 0b00011000, 0b01100000, 0b00000000, 0b00000000],
        '\'' => [0b00011000, 0b00011000, 0b00010000, 0b00000000, 0b00000000, 0b00000000, 0b00000000, 0b00000000],
        '"' => [0b01100110, 0b01100110, 0b00100100, 0b00000000, 0b00000000, 0b00000000, 0b00000000, 0b00000000],
        '#' => [0b00100100, 0b01111110, 0b00100100, 0b00100100, 0b01111110, 0b00100100, 0b00000000, 0b00000000],
        '%' => [0b01100010, 0b01100100, 0b00001000, 0b00010000, 0b00100110, 0b01000110, 0b00000000, 0b00000000],
        '&' => [0b00110000, 0b01001000, 0b00110000, 0b01010110, 0b01001000, 0b00110110, 0b00000000, 0b00000000],
        '@' => [0b00111100, 0b01000010, 0b01011010, 0b01011110, 0b01000000, 0b00111100, 0b00000000, 0b00000000],
        '$' => [0b00011000, 0b00111110, 0b01000000, 0b00111100, 0b00000010, 0b01111100, 0b00011000, 0b00000000],
        '|' => [0b00011000, 0b00011000, 0b00011000, 0b00011000, 0b00011000, 0b00011000, 0b00011000, 0b00000000],
        '\u{2022}' | '\u{00b7}' => [0b00000000, 0b00000000, 0b00011000, 0b00111100, 0b00111100, 0b00011000, 0b00000000, 0b00000000],
        _ => MISSING,
    };
    Some(g)
}

/// Horizontal runs of set bits in one glyph row, as `(start_column, length)`.
pub fn row_runs(bits: u8) -> impl Iterator<Item = (u32, u32)> {
    let mut col = 0u32;
    std::iter::from_fn(move || {
        while col < 8 && (bits >> (7 - col)) & 1 == 0 {
            col += 1;
        }
        if col >= 8 {
            return None;
        }
        let start = col;
        while col < 8 && (bits >> (7 - col)) & 1 == 1 {
            col += 1;
        }
        Some((start, col - start))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_and_known_glyphs() {
        assert!(glyph(' ').is_none());
        assert_eq!(glyph('A'), glyph('a'));
        assert_ne!(glyph('1'), glyph('0'));
        assert_eq!(glyph('\u{4e2d}'), Some(MISSING));
    }

    #[test]
    fn runs_merge_adjacent_bits() {
        let runs: Vec<_> = row_runs(0b01100110).collect();
        assert_eq!(runs, vec![(1, 2), (5, 2)]);
        assert_eq!(row_runs(0).count(), 0);
        assert_eq!(row_runs(0xFF).collect::<Vec<_>>(), vec![(0, 8)]);
    }
}
