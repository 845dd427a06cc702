//! Scrolling dot-matrix text sign.
//!
//! This crate turns a text string into a marquee animation on a small grid
//! of lit/unlit cells:
//! - [`glyph`]: the character → bitmap table
//! - [`strip`]: lays glyphs side by side into one long bitmap
//! - [`viewport`]: samples the visible window at a scroll offset
//! - [`scroll`]: the wrapping scroll-offset clock
//! - [`color_state`]: fixed vs. random-cycling display color
//! - [`marquee`]: the session state tying all of the above together
//! - [`engine`]: async timers + command channel driving a [`marquee::Marquee`]
//! - [`server`]: HTTP API for setting text/color and reading frames
//! - [`render`]: maps frames onto an RGB LED panel (driven with the
//!   `hardware` feature)

pub mod color_state;
pub mod engine;
pub mod glyph;
pub mod marquee;
pub mod render;
pub mod scroll;
pub mod server;
pub mod strip;
pub mod viewport;

#[cfg(feature = "hardware")]
use rpi_led_matrix::{LedMatrix, LedMatrixOptions, LedRuntimeOptions};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

// ── Defaults ───────────────────────────────────────────────────────

/// Rows of cells in the sign.
pub const VIEWPORT_ROWS: usize = 15;
/// Columns of cells in the sign.
pub const VIEWPORT_COLS: usize = 20;
/// Horizontal distance between the origins of two neighbouring characters
/// (5-column glyph + 3 columns of spacing).
pub const CHAR_ADVANCE: usize = 8;
/// How often the text moves one column to the left.
pub const SCROLL_INTERVAL: Duration = Duration::from_millis(200);
/// How often a new random color is rolled while random mode is on.
pub const COLOR_INTERVAL: Duration = Duration::from_millis(2000);

// ── Viewport configuration ─────────────────────────────────────────

/// Dimensions of the visible window, in cells.
///
/// # Rust concept: derive macros
/// `Clone, Copy` make this cheaply copyable (it's just two usizes).
/// Passing it by value keeps every component explicit about the geometry
/// it works with, with no hidden global state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewportConfig {
    pub rows: usize,
    pub cols: usize,
}

impl ViewportConfig {
    /// A window of at least one row and one column.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows: rows.max(1),
            cols: cols.max(1),
        }
    }

    /// Total number of cells in the window.
    pub fn cell_count(&self) -> usize {
        self.rows * self.cols
    }
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            rows: VIEWPORT_ROWS,
            cols: VIEWPORT_COLS,
        }
    }
}

/// Geometry and timing of a marquee session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MarqueeConfig {
    pub viewport: ViewportConfig,
    /// Column distance between consecutive character origins.
    pub advance: usize,
    pub scroll_interval: Duration,
    pub color_interval: Duration,
}

impl Default for MarqueeConfig {
    fn default() -> Self {
        Self {
            viewport: ViewportConfig::default(),
            advance: CHAR_ADVANCE,
            scroll_interval: SCROLL_INTERVAL,
            color_interval: COLOR_INTERVAL,
        }
    }
}

// ── Color ──────────────────────────────────────────────────────────

/// Our own color type, decoupled from the hardware crate.
///
/// Formats and parses as `#rrggbb`, which is also its JSON form.
/// At the hardware boundary, we convert via `Into<LedColor>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Build a color from a `0xRRGGBB` literal.
    pub const fn from_rgb24(rgb: u32) -> Self {
        Self::new((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8)
    }

    /// Apply brightness scaling (0-100) to this color.
    pub fn apply_brightness(self, brightness: u8) -> Self {
        if brightness >= 100 {
            return self;
        }
        Self {
            r: ((self.r as u16 * brightness as u16) / 100) as u8,
            g: ((self.g as u16 * brightness as u16) / 100) as u8,
            b: ((self.b as u16 * brightness as u16) / 100) as u8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid color {0:?}, expected #rrggbb")]
pub struct ColorParseError(pub String);

impl FromStr for Color {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ColorParseError(s.to_string());
        let hex = s.strip_prefix('#').ok_or_else(err)?;
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(err());
        }
        let rgb = u32::from_str_radix(hex, 16).map_err(|_| err())?;
        Ok(Self::from_rgb24(rgb))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Convert our Color to the hardware crate's LedColor at the boundary.
#[cfg(feature = "hardware")]
impl From<Color> for rpi_led_matrix::LedColor {
    fn from(c: Color) -> Self {
        rpi_led_matrix::LedColor {
            red: c.r,
            green: c.g,
            blue: c.b,
        }
    }
}

// ── Matrix initialization ──────────────────────────────────────────

/// Physical LED panel dimensions, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PanelConfig {
    pub rows: u32,
    pub cols: u32,
}

impl PanelConfig {
    pub fn new(rows: u32, cols: u32) -> Self {
        Self { rows, cols }
    }
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self { rows: 64, cols: 64 }
    }
}

/// Create a matrix configured for a Pi + Adafruit Bonnet and the given panel.
///
/// # Rust concept: Result and the ? operator
/// Matrix initialization can fail (e.g. not running as root, or no GPIO),
/// so this returns `Result` and the caller decides what to do.
#[cfg(feature = "hardware")]
pub fn create_matrix(panel: PanelConfig) -> Result<LedMatrix, Box<dyn std::error::Error>> {
    let mut options = LedMatrixOptions::new();
    options.set_rows(panel.rows);
    options.set_cols(panel.cols);
    options.set_hardware_mapping("adafruit-hat");
    options.set_pwm_bits(8)?;
    options.set_pwm_lsb_nanoseconds(130);

    let mut rt_options = LedRuntimeOptions::new();
    rt_options.set_gpio_slowdown(2); // Pi Zero 2 W requires slowdown=2

    let matrix = LedMatrix::new(Some(options), Some(rt_options))?;
    Ok(matrix)
}

// ── Tests ──────────────────────────────────────────────────────────
