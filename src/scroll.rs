//! The scroll clock: a wrapping column counter advanced once per tick.

/// Scroll offset state, always in `[0, period)` where
/// `period = strip_width + viewport_cols`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScrollClock {
    offset: usize,
    period: usize,
    viewport_cols: usize,
}

impl ScrollClock {
    /// A clock at offset 0 for a strip of `strip_width` columns.
    ///
    /// `viewport_cols` is taken as given, so callers pass the same width the
    /// viewport is sampled with ([`crate::ViewportConfig::new`] keeps it at
    /// 1 or more). A zero period leaves the offset pinned at 0.
    pub fn new(viewport_cols: usize, strip_width: usize) -> Self {
        Self {
            offset: 0,
            period: strip_width + viewport_cols,
            viewport_cols,
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of ticks after which the animation repeats.
    pub fn period(&self) -> usize {
        self.period
    }

    /// Width of the strip the period was computed for.
    pub fn strip_width(&self) -> usize {
        self.period - self.viewport_cols
    }

    /// Move one column, wrapping back to 0 after `period - 1`.
    pub fn tick(&mut self) -> usize {
        self.offset = (self.offset + 1).checked_rem(self.period).unwrap_or(0);
        self.offset
    }

    /// Start over for a new strip: offset 0, period recomputed.
    pub fn reset(&mut self, strip_width: usize) {
        self.offset = 0;
        self.period = strip_width + self.viewport_cols;
    }
}
