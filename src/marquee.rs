//! One marquee session: text, cached strip, scroll clock and color state.
//!
//! `Marquee` is the single writer of all animation state. Every method is
//! one complete transition, and [`Marquee::frame`] always samples a strip
//! together with an offset that belongs to it.

use crate::color_state::{ColorState, ModeChange, Palette};
use crate::glyph::GlyphTable;
use crate::scroll::ScrollClock;
use crate::strip::{Strip, compose};
use crate::viewport::{Grid, sample};
use crate::{Color, MarqueeConfig, ViewportConfig};
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;

/// Everything a renderer needs for one tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub grid: Grid,
    pub color: Color,
    pub offset: usize,
}

/// Session state as reported to API clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct MarqueeStatus {
    /// Current text, uppercased
    pub text: String,
    /// Last fixed color picked by the user
    #[schema(value_type = String, example = "#ff0000")]
    pub selected_color: Color,
    /// Color currently lighting the sign
    #[schema(value_type = String, example = "#ff0000")]
    pub display_color: Color,
    /// Whether the color is cycling randomly
    pub random_mode: bool,
    /// Current scroll offset, in `[0, wrap_period)`
    pub offset: usize,
    /// Strip width plus viewport width
    pub wrap_period: usize,
    /// Width of the composed text strip, in columns
    pub strip_width: usize,
    pub rows: usize,
    pub cols: usize,
    /// Server version
    pub version: String,
}

pub struct Marquee {
    config: MarqueeConfig,
    table: Arc<GlyphTable>,
    palette: Arc<Palette>,
    text: String,
    strip: Strip,
    scroll: ScrollClock,
    colors: ColorState,
}

impl Marquee {
    /// Start a session. The viewport is passed through
    /// [`ViewportConfig::new`], so sampling and the scroll period always
    /// agree on a width of at least one column.
    pub fn new(
        mut config: MarqueeConfig,
        table: Arc<GlyphTable>,
        palette: Arc<Palette>,
        text: &str,
        color: Color,
    ) -> Self {
        config.viewport = ViewportConfig::new(config.viewport.rows, config.viewport.cols);
        let text = text.to_uppercase();
        let strip = compose(&text, &table, config.viewport.rows, config.advance);
        let scroll = ScrollClock::new(config.viewport.cols, strip.width());
        Self {
            config,
            table,
            palette,
            text,
            strip,
            scroll,
            colors: ColorState::new(color),
        }
    }

    pub fn config(&self) -> MarqueeConfig {
        self.config
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn strip(&self) -> &Strip {
        &self.strip
    }

    pub fn offset(&self) -> usize {
        self.scroll.offset()
    }

    pub fn colors(&self) -> &ColorState {
        &self.colors
    }

    /// Replace the text. Recomposes the strip and rewinds the scroll clock
    /// in one step; returns `false` (and keeps scrolling) if the text is the
    /// same once uppercased. Color state is never touched.
    pub fn set_text(&mut self, text: &str) -> bool {
        let text = text.to_uppercase();
        if text == self.text {
            return false;
        }
        self.strip = compose(
            &text,
            &self.table,
            self.config.viewport.rows,
            self.config.advance,
        );
        self.scroll.reset(self.strip.width());
        self.text = text;
        true
    }

    /// Advance the scroll one column; returns the new offset.
    pub fn tick_scroll(&mut self) -> usize {
        self.scroll.tick()
    }

    /// Pick a fixed color. Refused while random mode is on.
    pub fn select_color(&mut self, color: Color) -> bool {
        self.colors.select(color)
    }

    pub fn set_random_mode<R: Rng + ?Sized>(&mut self, on: bool, rng: &mut R) -> ModeChange {
        self.colors.set_random(on, &self.palette, rng)
    }

    /// Roll a new random color; `None` in fixed mode.
    pub fn tick_color<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<Color> {
        self.colors.reroll(&self.palette, rng)
    }

    /// Sample the current strip at the current offset.
    pub fn frame(&self) -> Frame {
        Frame {
            grid: sample(&self.strip, self.scroll.offset(), self.config.viewport),
            color: self.colors.display(),
            offset: self.scroll.offset(),
        }
    }

    pub fn status(&self) -> MarqueeStatus {
        MarqueeStatus {
            text: self.text.clone(),
            selected_color: self.colors.selected(),
            display_color: self.colors.display(),
            random_mode: self.colors.is_random(),
            offset: self.scroll.offset(),
            wrap_period: self.scroll.period(),
            strip_width: self.strip.width(),
            rows: self.config.viewport.rows,
            cols: self.config.viewport.cols,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
