//! Panel output: draw marquee frames onto an RGB LED matrix.
//!
//! Each sign cell becomes a square block of panel pixels, as large as fits,
//! centered on the panel. With the `hardware` feature, [`panel_loop`] runs
//! on a dedicated thread that owns the `rpi-led-matrix` canvas (the C
//! library is not thread-safe) and redraws whenever the engine publishes a
//! new snapshot.

use crate::marquee::Frame;
use crate::{Color, PanelConfig, ViewportConfig};

/// Color of an unlit cell, before brightness.
pub const UNLIT_COLOR: Color = Color::from_rgb24(0x333333);

/// Where the sign's cells land on the panel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PanelLayout {
    /// Side of one cell's block, in pixels
    pub block: u32,
    /// Lit pixels per block side; one pixel of gap once blocks are 3+ wide
    pub dot: u32,
    pub x0: u32,
    pub y0: u32,
}

impl PanelLayout {
    pub fn new(panel: PanelConfig, viewport: ViewportConfig) -> Self {
        let cols = viewport.cols.max(1) as u32;
        let rows = viewport.rows.max(1) as u32;
        let block = (panel.cols / cols).min(panel.rows / rows).max(1);
        let dot = if block >= 3 { block - 1 } else { block };
        Self {
            block,
            dot,
            x0: panel.cols.saturating_sub(block * cols) / 2,
            y0: panel.rows.saturating_sub(block * rows) / 2,
        }
    }

    /// Every panel pixel to set for `frame`, as `(x, y, color)`.
    pub fn pixels(self, frame: &Frame, brightness: u8) -> impl Iterator<Item = (u32, u32, Color)> {
        let layout = self;
        let lit = frame.color.apply_brightness(brightness);
        let unlit = UNLIT_COLOR.apply_brightness(brightness);
        let grid = &frame.grid;

        (0..grid.rows()).flat_map(move |row| {
            (0..grid.cols()).flat_map(move |col| {
                let color = if grid.lit(row, col) { lit } else { unlit };
                let x = layout.x0 + col as u32 * layout.block;
                let y = layout.y0 + row as u32 * layout.block;
                (0..layout.dot)
                    .flat_map(move |dy| (0..layout.dot).map(move |dx| (x + dx, y + dy, color)))
            })
        })
    }
}

/// Redraw the panel on every new snapshot until the engine goes away.
///
/// If the matrix cannot be initialized this logs and returns; the rest of
/// the program carries on without panel output.
#[cfg(feature = "hardware")]
pub fn panel_loop(
    mut snapshots: tokio::sync::watch::Receiver<crate::engine::Snapshot>,
    panel: PanelConfig,
    brightness: u8,
) {
    use crate::create_matrix;
    use std::thread;
    use std::time::Duration;

    let matrix = match create_matrix(panel) {
        Ok(m) => m,
        Err(e) => {
            tracing::error!("Failed to initialize LED matrix: {}", e);
            return;
        }
    };

    let mut canvas = matrix.offscreen_canvas();
    let brightness = brightness.min(100);
    let mut layout: Option<PanelLayout> = None;
    snapshots.mark_changed();

    tracing::info!("Panel thread started ({}x{})", panel.cols, panel.rows);

    loop {
        match snapshots.has_changed() {
            Ok(true) => {
                let frame = snapshots.borrow_and_update().frame.clone();
                let viewport = ViewportConfig::new(frame.grid.rows(), frame.grid.cols());
                let layout = *layout.get_or_insert_with(|| PanelLayout::new(panel, viewport));

                canvas.clear();
                for (x, y, color) in layout.pixels(&frame, brightness) {
                    canvas.set(x as i32, y as i32, &color.into());
                }
                canvas = matrix.swap(canvas);
            }
            Ok(false) => {}
            Err(_) => {
                tracing::info!("Panel thread: engine gone, shutting down.");
                break;
            }
        }

        thread::sleep(Duration::from_millis(16));
    }

    canvas.clear();
    matrix.swap(canvas);
}
