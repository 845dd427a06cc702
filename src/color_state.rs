//! Display color selection: a fixed user choice, or random picks on a timer.
//!
//! The user's fixed selection and the random-mode flag are kept in separate
//! slots, so turning random mode off always lands back on the last color the
//! user picked.

use crate::Color;
use rand::Rng;

/// The 24 colors offered by the sign's picker, in display order.
pub const DEFAULT_PALETTE: [Color; 24] = [
    Color::from_rgb24(0xff0000),
    Color::from_rgb24(0x00ff00),
    Color::from_rgb24(0x0000ff),
    Color::from_rgb24(0xffff00),
    Color::from_rgb24(0xff00ff),
    Color::from_rgb24(0x00ffff),
    Color::from_rgb24(0xff8800),
    Color::from_rgb24(0xff0088),
    Color::from_rgb24(0x800000),
    Color::from_rgb24(0x808000),
    Color::from_rgb24(0x008000),
    Color::from_rgb24(0x800080),
    Color::from_rgb24(0x008080),
    Color::from_rgb24(0x000080),
    Color::from_rgb24(0xffa500),
    Color::from_rgb24(0xa52a2a),
    Color::from_rgb24(0x8a2be2),
    Color::from_rgb24(0x5f9ea0),
    Color::from_rgb24(0xd2691e),
    Color::from_rgb24(0xff7f50),
    Color::from_rgb24(0x6495ed),
    Color::from_rgb24(0xdc143c),
    Color::from_rgb24(0x00ced1),
    Color::from_rgb24(0x9400d3),
];

/// Fixed color a new session starts with.
pub const DEFAULT_COLOR: Color = Color::from_rgb24(0xff0000);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaletteError {
    #[error("palette must contain at least one color")]
    Empty,
}

/// A non-empty, ordered list of colors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<Color>,
}

impl Palette {
    pub fn new(colors: Vec<Color>) -> Result<Self, PaletteError> {
        if colors.is_empty() {
            return Err(PaletteError::Empty);
        }
        Ok(Self { colors })
    }

    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    pub fn contains(&self, color: Color) -> bool {
        self.colors.contains(&color)
    }

    /// A uniformly random palette entry. Repeats are allowed.
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> Color {
        self.colors[rng.random_range(0..self.colors.len())]
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            colors: DEFAULT_PALETTE.to_vec(),
        }
    }
}

/// Which way a random-mode toggle went.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeChange {
    /// Already in the requested mode; nothing changed.
    Unchanged,
    /// Switched to random cycling; the color timer should start.
    EnteredRandom,
    /// Switched back to the fixed selection; the color timer should stop.
    LeftRandom,
}

/// Fixed / random-cycling color state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColorState {
    selected: Color,
    random: bool,
    display: Color,
}

impl ColorState {
    /// Start in fixed mode showing `selected`.
    pub fn new(selected: Color) -> Self {
        Self {
            selected,
            random: false,
            display: selected,
        }
    }

    /// The color the renderer should use right now.
    pub fn display(&self) -> Color {
        self.display
    }

    /// The user's last fixed selection, remembered through random mode.
    pub fn selected(&self) -> Color {
        self.selected
    }

    pub fn is_random(&self) -> bool {
        self.random
    }

    /// Pick a fixed color. Only accepted in fixed mode; while random mode is
    /// on the picker is disabled and this returns `false` without changes.
    pub fn select(&mut self, color: Color) -> bool {
        if self.random {
            return false;
        }
        self.selected = color;
        self.display = color;
        true
    }

    /// Turn random mode on or off.
    ///
    /// Entering random mode rolls a new color right away; leaving it shows
    /// the remembered selection right away.
    pub fn set_random<R: Rng + ?Sized>(
        &mut self,
        on: bool,
        palette: &Palette,
        rng: &mut R,
    ) -> ModeChange {
        match (self.random, on) {
            (false, true) => {
                self.random = true;
                self.display = palette.choose(rng);
                ModeChange::EnteredRandom
            }
            (true, false) => {
                self.random = false;
                self.display = self.selected;
                ModeChange::LeftRandom
            }
            _ => ModeChange::Unchanged,
        }
    }

    /// Roll a new display color. Does nothing (and returns `None`) in fixed
    /// mode.
    pub fn reroll<R: Rng + ?Sized>(&mut self, palette: &Palette, rng: &mut R) -> Option<Color> {
        if !self.random {
            return None;
        }
        self.display = palette.choose(rng);
        Some(self.display)
    }
}
