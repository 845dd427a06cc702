//! Engine task: owns the [`Marquee`] and drives it from timers and commands.
//!
//! The HTTP server (and anything else) never touches the marquee directly.
//! It sends `MarqueeCommand` values through an `mpsc` channel and reads
//! whole [`Snapshot`]s from a `watch` channel. Because one task applies
//! every transition, a reader can never see a new strip paired with a stale
//! offset, or a color change applied halfway.
//!
//! ## Rust concepts
//! - `tokio::select!` over a channel and several timers
//! - `biased;` so queued commands always run before a ready timer tick
//! - `Option<Interval>` for a timer that only exists in one mode
//! - `watch` channels for "latest value" broadcasting

use crate::Color;
use crate::color_state::ModeChange;
use crate::marquee::{Frame, Marquee, MarqueeStatus};
use rand::Rng;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Commands queued before the engine gets to them; senders wait beyond this.
const COMMAND_QUEUE: usize = 32;

// ── Commands ─────────────────────────────────────────────────────────

/// Commands sent to the engine task.
#[derive(Debug)]
pub enum MarqueeCommand {
    /// Replace the scrolling text
    SetText(String),
    /// Pick a fixed color. The engine answers `false` on `reply` if it
    /// refused because random mode is on.
    SelectColor {
        color: Color,
        reply: oneshot::Sender<bool>,
    },
    /// Turn random color cycling on or off
    SetRandomMode(bool),
    /// Stop the engine and release its timers
    Shutdown,
}

/// The latest frame and the status it was sampled from, published as one
/// value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub frame: Frame,
    pub status: MarqueeStatus,
}

impl Snapshot {
    pub fn of(marquee: &Marquee) -> Self {
        Self {
            frame: marquee.frame(),
            status: marquee.status(),
        }
    }
}

/// The running engine: where to send commands and where to read snapshots.
pub struct EngineHandle {
    pub commands: mpsc::Sender<MarqueeCommand>,
    pub snapshots: watch::Receiver<Snapshot>,
    pub task: JoinHandle<()>,
}

impl EngineHandle {
    /// Ask the engine to stop and wait until it has.
    pub async fn shutdown(self) {
        // A send error means the engine already stopped.
        let _ = self.commands.send(MarqueeCommand::Shutdown).await;
        if let Err(e) = self.task.await {
            tracing::error!("Marquee engine task failed: {}", e);
        }
    }
}

/// Spawn the engine on the current tokio runtime.
pub fn spawn_engine<R>(marquee: Marquee, rng: R) -> EngineHandle
where
    R: Rng + Send + 'static,
{
    let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE);
    let (snapshot_tx, snapshot_rx) = watch::channel(Snapshot::of(&marquee));
    let task = tokio::spawn(run_engine(marquee, rng, command_rx, snapshot_tx));

    EngineHandle {
        commands: command_tx,
        snapshots: snapshot_rx,
        task,
    }
}

// ── Engine loop ──────────────────────────────────────────────────────

/// A timer whose first tick is one full `period` from now.
fn periodic(period: Duration) -> Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Wait for the next tick of `timer`, or forever if there is no timer.
async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Run until `Shutdown` arrives or every command sender is dropped.
///
/// The scroll timer runs for the whole lifetime of the loop; the color timer
/// only while random mode is on. Both are dropped when the loop returns.
pub async fn run_engine<R: Rng>(
    mut marquee: Marquee,
    mut rng: R,
    mut commands: mpsc::Receiver<MarqueeCommand>,
    snapshots: watch::Sender<Snapshot>,
) {
    let config = marquee.config();
    let mut scroll_timer = periodic(config.scroll_interval);
    let mut color_timer = marquee
        .colors()
        .is_random()
        .then(|| periodic(config.color_interval));

    tracing::info!(
        "Marquee engine started: {:?} ({}x{}, scroll every {}ms)",
        marquee.text(),
        config.viewport.cols,
        config.viewport.rows,
        config.scroll_interval.as_millis()
    );

    loop {
        // Answered only once the snapshot reflecting it is published.
        let mut reply = None;

        tokio::select! {
            biased;

            cmd = commands.recv() => {
                let Some(cmd) = cmd else {
                    tracing::info!("Marquee engine: command channel closed, shutting down.");
                    break;
                };
                match cmd {
                    MarqueeCommand::Shutdown => {
                        tracing::info!("Marquee engine: shutdown requested.");
                        break;
                    }
                    MarqueeCommand::SetText(text) => {
                        if marquee.set_text(&text) {
                            tracing::info!(
                                "Text set to {:?} (strip {} columns)",
                                marquee.text(),
                                marquee.strip().width()
                            );
                        }
                    }
                    MarqueeCommand::SelectColor { color, reply: tx } => {
                        let accepted = marquee.select_color(color);
                        if accepted {
                            tracing::info!("Color set to {}", color);
                        } else {
                            tracing::warn!("Refusing color {} while random mode is on", color);
                        }
                        reply = Some((tx, accepted));
                    }
                    MarqueeCommand::SetRandomMode(on) => {
                        match marquee.set_random_mode(on, &mut rng) {
                            ModeChange::EnteredRandom => {
                                color_timer = Some(periodic(config.color_interval));
                                tracing::info!(
                                    "Random colors on (every {}ms), starting with {}",
                                    config.color_interval.as_millis(),
                                    marquee.colors().display()
                                );
                            }
                            ModeChange::LeftRandom => {
                                color_timer = None;
                                tracing::info!(
                                    "Random colors off, back to {}",
                                    marquee.colors().selected()
                                );
                            }
                            ModeChange::Unchanged => {}
                        }
                    }
                }
            }

            _ = scroll_timer.tick() => {
                let offset = marquee.tick_scroll();
                tracing::trace!("Scroll offset {}", offset);
            }

            _ = next_tick(&mut color_timer) => {
                if let Some(color) = marquee.tick_color(&mut rng) {
                    tracing::debug!("Random color {}", color);
                }
            }
        }

        snapshots.send_replace(Snapshot::of(&marquee));
        if let Some((tx, accepted)) = reply {
            // The caller may have given up waiting.
            let _ = tx.send(accepted);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MarqueeConfig;
    use crate::color_state::{DEFAULT_COLOR, Palette};
    use crate::glyph::GlyphTable;
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::sync::Arc;
    use tokio::time::sleep;

    fn start(text: &str) -> EngineHandle {
        let marquee = Marquee::new(
            MarqueeConfig::default(),
            Arc::new(GlyphTable::builtin()),
            Arc::new(Palette::default()),
            text,
            DEFAULT_COLOR,
        );
        spawn_engine(marquee, StdRng::seed_from_u64(42))
    }

    fn current(handle: &EngineHandle) -> Snapshot {
        handle.snapshots.borrow().clone()
    }

    async fn select(handle: &EngineHandle, color: Color) -> bool {
        let (reply, answer) = oneshot::channel();
        handle
            .commands
            .send(MarqueeCommand::SelectColor { color, reply })
            .await
            .unwrap();
        answer.await.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_initial_snapshot() {
        let handle = start("hi");
        let snap = current(&handle);
        assert_eq!(snap.status.text, "HI");
        assert_eq!(snap.frame.offset, 0);
        assert!(snap.frame.grid.is_blank());
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn scrolls_one_column_per_interval() {
        let handle = start("HI");
        sleep(Duration::from_millis(650)).await;
        assert_eq!(current(&handle).frame.offset, 3);

        // 36-tick period: 3 + 36 ticks later we are back at 3
        sleep(Duration::from_millis(200 * 36)).await;
        assert_eq!(current(&handle).frame.offset, 3);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn text_change_resets_offset_before_next_tick() {
        let mut handle = start("HELLO");
        sleep(Duration::from_millis(1050)).await;
        assert_eq!(current(&handle).frame.offset, 5);

        handle
            .commands
            .send(MarqueeCommand::SetText("abc".into()))
            .await
            .unwrap();
        let snap = handle
            .snapshots
            .wait_for(|s| s.status.text == "ABC")
            .await
            .unwrap()
            .clone();
        assert_eq!(snap.frame.offset, 0);
        assert_eq!(snap.status.strip_width, 24);
        assert_eq!(snap.status.wrap_period, 44);
        assert!(snap.frame.grid.is_blank());
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn random_mode_cycles_palette_colors() {
        let mut handle = start("HI");
        let palette = Palette::default();
        let green = Color::from_rgb24(0x00ff00);

        assert!(select(&handle, green).await);
        assert_eq!(current(&handle).frame.color, green);
        handle.commands.send(MarqueeCommand::SetRandomMode(true)).await.unwrap();
        let snap = handle
            .snapshots
            .wait_for(|s| s.status.random_mode)
            .await
            .unwrap()
            .clone();
        assert_eq!(snap.status.selected_color, green);
        assert!(palette.contains(snap.frame.color));

        for _ in 0..5 {
            sleep(Duration::from_millis(2000)).await;
            let snap = current(&handle);
            assert!(palette.contains(snap.frame.color));
            assert_eq!(snap.frame.color, snap.status.display_color);
        }

        assert!(!select(&handle, DEFAULT_COLOR).await);
        assert_eq!(current(&handle).status.selected_color, green);
        handle.commands.send(MarqueeCommand::SetRandomMode(false)).await.unwrap();
        let snap = handle
            .snapshots
            .wait_for(|s| !s.status.random_mode)
            .await
            .unwrap()
            .clone();
        assert_eq!(snap.frame.color, green);
        assert_eq!(snap.status.selected_color, green);

        // no more rolls once the color timer is gone
        sleep(Duration::from_millis(10_000)).await;
        assert_eq!(current(&handle).frame.color, green);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_publishing() {
        let handle = start("HI");
        let mut snapshots = handle.snapshots.clone();
        handle.shutdown().await;
        assert!(snapshots.changed().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_senders_ends_the_loop() {
        let EngineHandle {
            commands,
            snapshots,
            task,
        } = start("HI");
        drop(commands);
        task.await.unwrap();
        assert!(snapshots.has_changed().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn select_queued_behind_random_mode_is_refused() {
        let handle = start("HI");
        handle.commands.send(MarqueeCommand::SetRandomMode(true)).await.unwrap();
        assert!(!select(&handle, Color::from_rgb24(0x00ff00)).await);

        let snap = current(&handle);
        assert!(snap.status.random_mode);
        assert_eq!(snap.status.selected_color, DEFAULT_COLOR);
        handle.shutdown().await;
    }
}
