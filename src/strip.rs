//! Strip composition: lay the glyphs of a text side by side in one bitmap.

use crate::glyph::GlyphTable;

/// The full unrolled bitmap for a text, `height` rows by
/// `char_count * advance` columns, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Strip {
    width: usize,
    height: usize,
    bits: Vec<bool>,
}

impl Strip {
    /// A strip with no lit cells.
    pub fn blank(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            bits: vec![false; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Whether the cell at `(row, col)` is lit. Anything outside the strip,
    /// negative coordinates included, is unlit.
    pub fn lit(&self, row: isize, col: isize) -> bool {
        if row < 0 || col < 0 {
            return false;
        }
        let (row, col) = (row as usize, col as usize);
        row < self.height && col < self.width && self.bits[row * self.width + col]
    }

    fn light(&mut self, row: usize, col: usize) {
        self.bits[row * self.width + col] = true;
    }
}

/// Compose the strip for `text`.
///
/// Text is uppercased first, so case never changes the result. Character
/// `i` has its glyph origin at column `i * advance`; glyphs are centered
/// vertically in `height` rows. Characters missing from `table` use its
/// fallback glyph. Pixels that land outside the strip are dropped, and
/// overlapping glyphs (wider than the advance) combine their lit pixels.
pub fn compose(text: &str, table: &GlyphTable, height: usize, advance: usize) -> Strip {
    let upper = text.to_uppercase();
    let char_count = upper.chars().count();
    let mut strip = Strip::blank(char_count * advance, height);

    for (index, ch) in upper.chars().enumerate() {
        let glyph = table.get(ch);
        let origin = index * advance;
        // floor((H - glyph_height) / 2), negative when the glyph is taller
        let row_offset = (height as isize - glyph.height() as isize).div_euclid(2);

        for (glyph_row, glyph_col) in glyph.lit_pixels() {
            let row = glyph_row as isize + row_offset;
            let col = origin + glyph_col;
            if row >= 0 && (row as usize) < strip.height && col < strip.width {
                strip.light(row as usize, col);
            }
        }
    }

    strip
}
