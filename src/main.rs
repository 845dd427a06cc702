//! LED Marquee HTTP API Server
//!
//! Runs the scrolling-text engine and a web server that controls it. Any
//! device on the LAN can change the text, pick a color, toggle random
//! colors, or watch the frames via simple HTTP requests.
//!
//! ## Architecture
//! - **Engine task** (tokio): owns the marquee state, scroll and color timers
//! - **HTTP server** (tokio/axum): sends commands, reads published snapshots
//! - **Panel thread** (std::thread, `hardware` feature): draws frames on the LED matrix
//!
//! ## Usage
//! ```sh
//! ./target/release/led-marquee --port 8080 --text "Hello world" --random
//! ```

use clap::Parser;
use led_marquee::color_state::{DEFAULT_COLOR, Palette};
use led_marquee::engine::{MarqueeCommand, spawn_engine};
use led_marquee::glyph::GlyphTable;
use led_marquee::marquee::Marquee;
use led_marquee::server::{self, AppState};
use led_marquee::{Color, MarqueeConfig, ViewportConfig};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// LED Marquee HTTP API Server
#[derive(Parser)]
#[command(name = "led-marquee")]
#[command(about = "Scrolling dot-matrix text sign with an HTTP control API")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(long, default_value = "8080")]
    port: u16,

    /// Text to scroll at startup
    #[arg(long, default_value = "HELLO")]
    text: String,

    /// Fixed color at startup (#rrggbb, must be in the palette)
    #[arg(long, default_value_t = DEFAULT_COLOR)]
    color: Color,

    /// Start with random color cycling on
    #[arg(long)]
    random: bool,

    /// JSON glyph table to use instead of the built-in 5x7 font
    #[arg(long)]
    glyphs: Option<PathBuf>,

    /// Rows of cells in the sign
    #[arg(long, default_value = "15", value_parser = clap::value_parser!(u32).range(1..))]
    rows: u32,

    /// Columns of cells in the sign
    #[arg(long, default_value = "20", value_parser = clap::value_parser!(u32).range(1..))]
    cols: u32,

    /// Columns between the origins of neighbouring characters
    #[arg(long, default_value = "8", value_parser = clap::value_parser!(u32).range(1..))]
    advance: u32,

    /// Milliseconds per scroll step
    #[arg(long, default_value = "200", value_parser = clap::value_parser!(u64).range(1..))]
    scroll_ms: u64,

    /// Milliseconds between random colors
    #[arg(long, default_value = "2000", value_parser = clap::value_parser!(u64).range(1..))]
    color_ms: u64,

    /// Number of rows on the LED panel
    #[cfg(feature = "hardware")]
    #[arg(long, default_value = "64")]
    panel_rows: u32,

    /// Number of columns on the LED panel
    #[cfg(feature = "hardware")]
    #[arg(long, default_value = "64")]
    panel_cols: u32,

    /// Panel brightness (0-100)
    #[cfg(feature = "hardware")]
    #[arg(long, default_value = "75", value_parser = clap::value_parser!(u8).range(0..=100))]
    brightness: u8,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false) // Disable ANSI color codes for systemd/journald
        .compact()
        .init();

    let config = MarqueeConfig {
        viewport: ViewportConfig::new(args.rows as usize, args.cols as usize),
        advance: args.advance as usize,
        scroll_interval: Duration::from_millis(args.scroll_ms),
        color_interval: Duration::from_millis(args.color_ms),
    };

    let table = match &args.glyphs {
        Some(path) => {
            let table = GlyphTable::load(path)?;
            tracing::info!("Loaded {} glyphs from {}", table.len(), path.display());
            table
        }
        None => GlyphTable::builtin(),
    };

    let palette = Arc::new(Palette::default());
    if !palette.contains(args.color) {
        return Err(format!("color {} is not in the palette", args.color).into());
    }

    tracing::info!("LED Marquee v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Sign: {}x{} cells", config.viewport.cols, config.viewport.rows);
    tracing::info!("Port: {}", args.port);

    let mut rng = StdRng::from_os_rng();
    let mut marquee = Marquee::new(
        config,
        Arc::new(table),
        palette.clone(),
        &args.text,
        args.color,
    );
    if args.random {
        marquee.set_random_mode(true, &mut rng);
    }

    let engine = spawn_engine(marquee, rng);

    #[cfg(feature = "hardware")]
    let panel_handle = {
        let snapshots = engine.snapshots.clone();
        let panel = led_marquee::PanelConfig::new(args.panel_rows, args.panel_cols);
        let brightness = args.brightness;
        std::thread::spawn(move || led_marquee::render::panel_loop(snapshots, panel, brightness))
    };

    let app_state = AppState {
        command_tx: engine.commands.clone(),
        snapshots: engine.snapshots.clone(),
        palette,
    };
    let app = server::create_router(app_state);

    let addr = format!("0.0.0.0:{}", args.port);
    tracing::info!("Listening on http://{}", addr);
    tracing::info!("API Documentation: http://localhost:{}/docs", args.port);
    tracing::info!("Try: curl http://localhost:{}/api/v1/frame", args.port);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(engine.commands.clone()))
        .await?;

    engine.shutdown().await;

    #[cfg(feature = "hardware")]
    {
        if panel_handle.join().is_err() {
            tracing::error!("Panel thread panicked");
        }
    }

    tracing::info!("Shut down cleanly.");
    Ok(())
}

/// Resolve on Ctrl+C, after telling the engine to stop so that open
/// WebSocket streams end and the server can drain.
async fn shutdown_signal(commands: mpsc::Sender<MarqueeCommand>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Ctrl+C received, shutting down...");
    let _ = commands.send(MarqueeCommand::Shutdown).await;
}
