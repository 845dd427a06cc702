//! Character bitmaps: the glyph table the strip composer reads from.
//!
//! A [`GlyphTable`] maps single uppercase characters to fixed-height
//! [`Glyph`] bitmaps and carries a fallback glyph for anything it has no
//! entry for (space included). The table is built once at startup, either
//! from the built-in 5x7 font or from a JSON file, and never mutated after.
//!
//! ## Glyph file format
//! ```json
//! {
//!   "fallback": [".....", ".....", "....."],
//!   "glyphs": {
//!     "I": ["###", ".#.", "###"]
//!   }
//! }
//! ```
//! `#` is a lit pixel, `.` or a space is unlit. Every glyph must be as tall
//! as the fallback.

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

/// Width of the built-in font's glyphs, in columns.
pub const BUILTIN_GLYPH_WIDTH: usize = 5;
/// Height of the built-in font's glyphs, in rows.
pub const BUILTIN_GLYPH_HEIGHT: usize = 7;

#[derive(Debug, thiserror::Error)]
pub enum GlyphTableError {
    #[error("failed to read glyph file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse glyph file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("glyph key {0:?} must be exactly one character")]
    BadKey(String),
    #[error("glyph key {0:?} must be uppercase")]
    LowercaseKey(char),
    #[error("more than one glyph for {0:?}")]
    Duplicate(char),
    #[error("glyph {glyph} has no rows")]
    Empty { glyph: String },
    #[error("glyph {glyph} has rows of differing width")]
    RaggedRows { glyph: String },
    #[error("glyph {glyph} is {found} rows tall, expected {expected}")]
    HeightMismatch {
        glyph: String,
        expected: usize,
        found: usize,
    },
    #[error("glyph {glyph} contains {found:?}, expected '#', '.' or ' '")]
    InvalidPixel { glyph: String, found: char },
}

// ── Glyph ────────────────────────────────────────────────────────────

/// An immutable bitmap for one character, stored row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Glyph {
    width: usize,
    height: usize,
    bits: Vec<bool>,
}

impl Glyph {
    /// A glyph with no lit pixels.
    pub fn blank(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            bits: vec![false; width * height],
        }
    }

    /// Build a glyph from one bitmask per row, most significant of the
    /// `width` low bits being the leftmost column. `width` is at most 8.
    pub fn from_bitmasks(width: usize, rows: &[u8]) -> Self {
        let width = width.min(8);
        let bits = rows
            .iter()
            .flat_map(|&mask| (0..width).rev().map(move |bit| mask & (1 << bit) != 0))
            .collect();
        Self {
            width,
            height: rows.len(),
            bits,
        }
    }

    /// Build a glyph from ASCII art rows (`#` lit, `.` or space unlit).
    ///
    /// `name` only labels errors.
    pub fn from_art<S: AsRef<str>>(name: &str, rows: &[S]) -> Result<Self, GlyphTableError> {
        if rows.is_empty() {
            return Err(GlyphTableError::Empty {
                glyph: name.to_string(),
            });
        }

        let width = rows[0].as_ref().chars().count();
        let mut bits = Vec::with_capacity(width * rows.len());
        for row in rows {
            let row = row.as_ref();
            if row.chars().count() != width {
                return Err(GlyphTableError::RaggedRows {
                    glyph: name.to_string(),
                });
            }
            for pixel in row.chars() {
                match pixel {
                    '#' => bits.push(true),
                    '.' | ' ' => bits.push(false),
                    found => {
                        return Err(GlyphTableError::InvalidPixel {
                            glyph: name.to_string(),
                            found,
                        });
                    }
                }
            }
        }

        Ok(Self {
            width,
            height: rows.len(),
            bits,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Whether the pixel at `(row, col)` is lit. Out of range is unlit.
    pub fn lit(&self, row: usize, col: usize) -> bool {
        row < self.height && col < self.width && self.bits[row * self.width + col]
    }

    /// Coordinates `(row, col)` of every lit pixel, row-major.
    pub fn lit_pixels(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.bits
            .iter()
            .enumerate()
            .filter(|(_, lit)| **lit)
            .map(|(i, _)| (i / self.width, i % self.width))
    }
}

// ── GlyphTable ───────────────────────────────────────────────────────

/// Character → glyph lookup with a fallback for misses.
///
/// All glyphs share one height, checked when the table is built.
#[derive(Clone, Debug)]
pub struct GlyphTable {
    glyphs: HashMap<char, Glyph>,
    fallback: Glyph,
}

#[derive(Deserialize)]
struct GlyphFile {
    fallback: Vec<String>,
    glyphs: BTreeMap<String, Vec<String>>,
}

impl GlyphTable {
    /// Build a table, checking that keys are uppercase and unique and that
    /// every glyph is as tall as the fallback.
    pub fn new(
        fallback: Glyph,
        glyphs: impl IntoIterator<Item = (char, Glyph)>,
    ) -> Result<Self, GlyphTableError> {
        if fallback.height() == 0 {
            return Err(GlyphTableError::Empty {
                glyph: "fallback".to_string(),
            });
        }

        let mut table = HashMap::new();
        for (ch, glyph) in glyphs {
            if ch.is_lowercase() {
                return Err(GlyphTableError::LowercaseKey(ch));
            }
            if glyph.height() != fallback.height() {
                return Err(GlyphTableError::HeightMismatch {
                    glyph: ch.to_string(),
                    expected: fallback.height(),
                    found: glyph.height(),
                });
            }
            if table.insert(ch, glyph).is_some() {
                return Err(GlyphTableError::Duplicate(ch));
            }
        }

        Ok(Self {
            glyphs: table,
            fallback,
        })
    }

    /// The built-in 5x7 font: A-Z, 0-9 and common punctuation, with a blank
    /// fallback for space and everything else.
    pub fn builtin() -> Self {
        let glyphs = BUILTIN_FONT
            .iter()
            .map(|(ch, rows)| (*ch, Glyph::from_bitmasks(BUILTIN_GLYPH_WIDTH, rows)))
            .collect();
        Self {
            glyphs,
            fallback: Glyph::blank(BUILTIN_GLYPH_WIDTH, BUILTIN_GLYPH_HEIGHT),
        }
    }

    /// Parse a table from the JSON glyph file format (see module docs).
    pub fn from_json_str(json: &str) -> Result<Self, GlyphTableError> {
        let file: GlyphFile = serde_json::from_str(json)?;
        let fallback = Glyph::from_art("fallback", file.fallback.as_slice())?;

        let mut glyphs = Vec::with_capacity(file.glyphs.len());
        for (key, rows) in &file.glyphs {
            let mut chars = key.chars();
            let ch = match (chars.next(), chars.next()) {
                (Some(ch), None) => ch,
                _ => return Err(GlyphTableError::BadKey(key.clone())),
            };
            glyphs.push((ch, Glyph::from_art(key, rows.as_slice())?));
        }

        Self::new(fallback, glyphs)
    }

    /// Read and parse a JSON glyph file.
    pub fn load(path: &Path) -> Result<Self, GlyphTableError> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Glyph for `ch`, or the fallback if the table has none.
    ///
    /// Lookup is exact; callers uppercase text first.
    pub fn get(&self, ch: char) -> &Glyph {
        self.glyphs.get(&ch).unwrap_or(&self.fallback)
    }

    pub fn contains(&self, ch: char) -> bool {
        self.glyphs.contains_key(&ch)
    }

    pub fn fallback(&self) -> &Glyph {
        &self.fallback
    }

    /// Height shared by every glyph in the table.
    pub fn height(&self) -> usize {
        self.fallback.height()
    }

    /// Number of characters with their own glyph (the fallback not counted).
    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }
}

impl Default for GlyphTable {
    fn default() -> Self {
        Self::builtin()
    }
}

// ── Built-in font ────────────────────────────────────────────────────

#[rustfmt::skip]
const BUILTIN_FONT: &[(char, [u8; BUILTIN_GLYPH_HEIGHT])] = &[
    ('A', [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11]),
    ('B', [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E]),
    ('C', [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E]),
    ('D', [0x1C, 0x12, 0x11, 0x11, 0x11, 0x12, 0x1C]),
    ('E', [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F]),
    ('F', [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10]),
    ('G', [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F]),
    ('H', [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11]),
    ('I', [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E]),
    ('J', [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C]),
    ('K', [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11]),
    ('L', [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F]),
    ('M', [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11]),
    ('N', [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11]),
    ('O', [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E]),
    ('P', [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10]),
    ('Q', [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D]),
    ('R', [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11]),
    ('S', [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E]),
    ('T', [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04]),
    ('U', [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E]),
    ('V', [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04]),
    ('W', [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A]),
    ('X', [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11]),
    ('Y', [0x11, 0x11, 0x11, 0x0A, 0x04, 0x04, 0x04]),
    ('Z', [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F]),
    ('0', [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E]),
    ('1', [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E]),
    ('2', [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F]),
    ('3', [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E]),
    ('4', [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02]),
    ('5', [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E]),
    ('6', [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E]),
    ('7', [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08]),
    ('8', [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E]),
    ('9', [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C]),
    ('!', [0x04, 0x04, 0x04, 0x04, 0x04, 0x00, 0x04]),
    ('?', [0x0E, 0x11, 0x01, 0x02, 0x04, 0x00, 0x04]),
    ('.', [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C]),
    (',', [0x00, 0x00, 0x00, 0x00, 0x0C, 0x04, 0x08]),
    ('-', [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00]),
    (':', [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00]),
    ('\'', [0x0C, 0x04, 0x08, 0x00, 0x00, 0x00, 0x00]),
    ('/', [0x00, 0x01, 0x02, 0x04, 0x08, 0x10, 0x00]),
    ('+', [0x00, 0x04, 0x04, 0x1F, 0x04, 0x04, 0x00]),
    ('=', [0x00, 0x00, 0x1F, 0x00, 0x1F, 0x00, 0x00]),
    ('(', [0x02, 0x04, 0x08, 0x08, 0x08, 0x04, 0x02]),
    (')', [0x08, 0x04, 0x02, 0x02, 0x02, 0x04, 0x08]),
    ('&', [0x0C, 0x12, 0x14, 0x08, 0x15, 0x12, 0x0D]),
    ('#', [0x0A, 0x0A, 0x1F, 0x0A, 0x1F, 0x0A, 0x0A]),
    ('*', [0x00, 0x04, 0x15, 0x0E, 0x15, 0x04, 0x00]),
];
