//! HTTP API server: axum router and request handlers.
//!
//! Handlers stand in for the sign's controls (text field, color picker,
//! random toggle) and for its renderer (frame JSON, WebSocket stream). They
//! talk to the engine task only through its command and snapshot channels.
//!
//! ## Rust concepts
//! - axum extractors: `State`, `Json`
//! - `watch::Receiver` cloned per request/socket to read the latest snapshot
//! - Serde `Deserialize` for parsing JSON request bodies
//! - `tower-http` middleware for CORS and request tracing

use crate::Color;
use crate::color_state::Palette;
use crate::engine::{MarqueeCommand, Snapshot};
use crate::marquee::MarqueeStatus;
use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

// ── App State ────────────────────────────────────────────────────────

/// Shared application state, passed to every handler via axum's `State` extractor.
///
/// axum clones the state for each request, so everything inside is cheap
/// to clone: channel handles and an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Channel to send commands to the engine task
    pub command_tx: mpsc::Sender<MarqueeCommand>,
    /// Latest snapshot published by the engine
    pub snapshots: watch::Receiver<Snapshot>,
    /// Colors the picker offers
    pub palette: Arc<Palette>,
}

// ── OpenAPI Documentation ────────────────────────────────────────────

#[derive(OpenApi)]
#[openapi(
    paths(
        get_status,
        get_frame,
        get_palette,
        post_text,
        post_color,
        post_random,
    ),
    components(schemas(
        MarqueeStatus,
        FrameResponse,
        TextRequest,
        ColorRequest,
        RandomRequest,
    )),
    tags(
        (name = "display", description = "Sign control endpoints"),
        (name = "system", description = "Status and frame endpoints"),
    ),
    info(
        title = "LED Marquee API",
        version = env!("CARGO_PKG_VERSION"),
        description = "HTTP API for a scrolling dot-matrix text sign"
    )
)]
pub struct ApiDoc;

// ── Request/Response types ───────────────────────────────────────────

#[derive(Deserialize, utoipa::ToSchema)]
pub struct TextRequest {
    /// Text to scroll. Case is ignored; characters without a glyph show as blanks.
    #[schema(example = "HELLO")]
    text: String,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct ColorRequest {
    /// Fixed color as #rrggbb. Must be one of GET /api/v1/palette.
    #[schema(example = "#00ff00")]
    color: String,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct RandomRequest {
    /// Cycle through random palette colors (true) or show the selected color (false)
    #[schema(example = true)]
    enabled: bool,
}

/// One rendered frame of the sign.
#[derive(Serialize, utoipa::ToSchema)]
pub struct FrameResponse {
    pub rows: usize,
    pub cols: usize,
    /// Scroll offset the frame was sampled at
    pub offset: usize,
    /// Color of the lit cells
    #[schema(value_type = String, example = "#ff0000")]
    pub color: Color,
    /// `rows` arrays of `cols` values, 1 = lit, 0 = unlit
    pub cells: Vec<Vec<u8>>,
}

impl From<&Snapshot> for FrameResponse {
    fn from(snapshot: &Snapshot) -> Self {
        let grid = &snapshot.frame.grid;
        Self {
            rows: grid.rows(),
            cols: grid.cols(),
            offset: snapshot.frame.offset,
            color: snapshot.frame.color,
            cells: grid.to_bits(),
        }
    }
}

// ── Router ───────────────────────────────────────────────────────────

/// Build the axum router with all API endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(
            SwaggerUi::new("/docs")
                .url("/api-docs/openapi.json", ApiDoc::openapi())
                .config(utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"]).validator_url("none")),
        )
        .route("/api/v1/status", get(get_status))
        .route("/api/v1/frame", get(get_frame))
        .route("/api/v1/frame/stream", get(ws_frame_stream))
        .route("/api/v1/palette", get(get_palette))
        .route("/api/v1/text", post(post_text))
        .route("/api/v1/color", post(post_color))
        .route("/api/v1/random", post(post_random))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Handlers ─────────────────────────────────────────────────────────

/// GET /api/v1/status: return current marquee state
#[utoipa::path(
    get,
    path = "/api/v1/status",
    tag = "system",
    responses(
        (status = 200, description = "Current marquee status", body = MarqueeStatus)
    )
)]
async fn get_status(State(state): State<AppState>) -> Json<MarqueeStatus> {
    let status = state.snapshots.borrow().status.clone();
    Json(status)
}

/// GET /api/v1/frame: return the frame currently on the sign
#[utoipa::path(
    get,
    path = "/api/v1/frame",
    tag = "system",
    responses(
        (status = 200, description = "Current frame", body = FrameResponse)
    )
)]
async fn get_frame(State(state): State<AppState>) -> Json<FrameResponse> {
    let frame = FrameResponse::from(&*state.snapshots.borrow());
    Json(frame)
}

/// GET /api/v1/palette: list the selectable colors
#[utoipa::path(
    get,
    path = "/api/v1/palette",
    tag = "display",
    responses(
        (status = 200, description = "Palette colors as #rrggbb", body = Vec<String>)
    )
)]
async fn get_palette(State(state): State<AppState>) -> Json<Vec<String>> {
    let colors = state.palette.colors().iter().map(Color::to_string).collect();
    Json(colors)
}

/// POST /api/v1/text: change the scrolling text
#[utoipa::path(
    post,
    path = "/api/v1/text",
    tag = "display",
    request_body = TextRequest,
    responses(
        (status = 200, description = "Text updated"),
    )
)]
async fn post_text(
    State(state): State<AppState>,
    Json(req): Json<TextRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    send_command(&state, MarqueeCommand::SetText(req.text)).await
}

/// POST /api/v1/color: pick a fixed color
#[utoipa::path(
    post,
    path = "/api/v1/color",
    tag = "display",
    request_body = ColorRequest,
    responses(
        (status = 200, description = "Color updated"),
        (status = 400, description = "Malformed color or not in the palette"),
        (status = 409, description = "Random mode is on; the picker is disabled")
    )
)]
async fn post_color(
    State(state): State<AppState>,
    Json(req): Json<ColorRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    let color = validate_color(&state.palette, &req.color)?;

    // The engine decides, so a random-mode toggle still in the queue counts.
    let (reply, accepted) = oneshot::channel();
    send_command(&state, MarqueeCommand::SelectColor { color, reply }).await?;
    match accepted.await {
        Ok(true) => Ok(StatusCode::OK),
        Ok(false) => Err((
            StatusCode::CONFLICT,
            "Random mode is on; turn it off to pick a color".to_string(),
        )),
        Err(_) => Err(engine_gone()),
    }
}

/// POST /api/v1/random: turn random color cycling on or off
#[utoipa::path(
    post,
    path = "/api/v1/random",
    tag = "display",
    request_body = RandomRequest,
    responses(
        (status = 200, description = "Random mode updated"),
    )
)]
async fn post_random(
    State(state): State<AppState>,
    Json(req): Json<RandomRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    send_command(&state, MarqueeCommand::SetRandomMode(req.enabled)).await
}

async fn send_command(
    state: &AppState,
    cmd: MarqueeCommand,
) -> Result<StatusCode, (StatusCode, String)> {
    state.command_tx.send(cmd).await.map_err(|_| engine_gone())?;

    Ok(StatusCode::OK)
}

fn engine_gone() -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Marquee engine gone".to_string(),
    )
}

// ── WebSocket streaming ─────────────────────────────────────────────

/// GET /api/v1/frame/stream: WebSocket endpoint streaming frames.
///
/// Sends the current frame on connect, then one JSON text message (same
/// shape as GET /api/v1/frame) every time the engine publishes a snapshot.
/// Incoming messages other than Close are ignored.
async fn ws_frame_stream(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_stream_socket(socket, state.snapshots))
}

async fn handle_stream_socket(socket: WebSocket, snapshots: watch::Receiver<Snapshot>) {
    tracing::info!("WebSocket frame client connected");
    let (sink, stream) = socket.split();
    let frame_count = stream_frames(sink, stream, snapshots).await;
    tracing::info!(
        "WebSocket frame client disconnected ({} frames sent)",
        frame_count
    );
}

/// Push one frame per published snapshot into `sink` until the client
/// closes, the socket fails, or the engine goes away. Returns the number of
/// frames sent.
async fn stream_frames<W, R>(
    mut sink: W,
    mut stream: R,
    mut snapshots: watch::Receiver<Snapshot>,
) -> u64
where
    W: Sink<Message> + Unpin,
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    snapshots.mark_changed();

    let mut frame_count: u64 = 0;

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    tracing::info!("Marquee engine gone, closing WebSocket");
                    break;
                }
                let json = {
                    let snapshot = snapshots.borrow_and_update();
                    serde_json::to_string(&FrameResponse::from(&*snapshot))
                };
                let json = match json {
                    Ok(j) => j,
                    Err(e) => {
                        tracing::error!("Failed to encode frame: {}", e);
                        break;
                    }
                };
                if sink.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
                frame_count += 1;
            }

            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::warn!("WebSocket receive error: {}", e);
                        break;
                    }
                    Some(Ok(_)) => {} // ping/pong handled by axum
                }
            }
        }
    }

    frame_count
}

// ── Validation ───────────────────────────────────────────────────────

/// Parse a requested color and check that the picker offers it.
fn validate_color(palette: &Palette, requested: &str) -> Result<Color, (StatusCode, String)> {
    let color: Color = requested
        .parse()
        .map_err(|e: crate::ColorParseError| (StatusCode::BAD_REQUEST, e.to_string()))?;

    if !palette.contains(color) {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("Color {color} is not in the palette"),
        ));
    }

    Ok(color)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MarqueeConfig;
    use crate::color_state::DEFAULT_COLOR;
    use crate::glyph::GlyphTable;
    use crate::engine::{EngineHandle, spawn_engine};
    use crate::marquee::Marquee;
    use axum::body::Body;
    use axum::http::{Request, header};
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use serde_json::Value;
    use tower::ServiceExt;

    fn engine(text: &str) -> EngineHandle {
        let marquee = Marquee::new(
            MarqueeConfig::default(),
            Arc::new(GlyphTable::builtin()),
            Arc::new(Palette::default()),
            text,
            DEFAULT_COLOR,
        );
        spawn_engine(marquee, StdRng::seed_from_u64(7))
    }

    fn router(handle: &EngineHandle) -> Router {
        create_router(AppState {
            command_tx: handle.commands.clone(),
            snapshots: handle.snapshots.clone(),
            palette: Arc::new(Palette::default()),
        })
    }

    async fn get(app: &Router, uri: &str) -> (StatusCode, String) {
        let req = Request::get(uri).body(Body::empty()).unwrap();
        respond(app, req).await
    }

    async fn post(app: &Router, uri: &str, json: &str) -> (StatusCode, String) {
        let req = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap();
        respond(app, req).await
    }

    async fn respond(app: &Router, req: Request<Body>) -> (StatusCode, String) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn snapshot(text: &str) -> Snapshot {
        let marquee = Marquee::new(
            MarqueeConfig::default(),
            Arc::new(GlyphTable::builtin()),
            Arc::new(Palette::default()),
            text,
            DEFAULT_COLOR,
        );
        Snapshot::of(&marquee)
    }

    #[test]
    fn validate_color_accepts_palette_entries() {
        let palette = Palette::default();
        assert_eq!(
            validate_color(&palette, "#00FF00"),
            Ok(Color::new(0, 255, 0))
        );
    }

    #[test]
    fn validate_color_rejects_malformed_and_unknown() {
        let palette = Palette::default();
        let (status, _) = validate_color(&palette, "green").unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, msg) = validate_color(&palette, "#123456").unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(msg.contains("#123456"));
    }

    #[test]
    fn frame_response_json_shape() {
        let json = serde_json::to_value(FrameResponse::from(&snapshot("HI"))).unwrap();
        assert_eq!(json["rows"], 15);
        assert_eq!(json["cols"], 20);
        assert_eq!(json["offset"], 0);
        assert_eq!(json["color"], "#ff0000");
        let cells = json["cells"].as_array().unwrap();
        assert_eq!(cells.len(), 15);
        assert_eq!(cells[0].as_array().unwrap().len(), 20);
    }

    #[test]
    fn status_json_uses_hex_colors() {
        let json = serde_json::to_value(&snapshot("hi").status).unwrap();
        assert_eq!(json["text"], "HI");
        assert_eq!(json["selected_color"], "#ff0000");
        assert_eq!(json["display_color"], "#ff0000");
        assert_eq!(json["random_mode"], false);
        assert_eq!(json["wrap_period"], 36);
    }

    #[tokio::test]
    async fn send_command_fails_when_engine_gone() {
        let (command_tx, command_rx) = mpsc::channel(1);
        let (_snapshot_tx, snapshots) = watch::channel(snapshot("HI"));
        drop(command_rx);
        let state = AppState {
            command_tx,
            snapshots,
            palette: Arc::new(Palette::default()),
        };
        let (status, _) = send_command(&state, MarqueeCommand::SetText("x".into()))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn send_command_reaches_engine_queue() {
        let (command_tx, mut command_rx) = mpsc::channel(1);
        let (_snapshot_tx, snapshots) = watch::channel(snapshot("HI"));
        let state = AppState {
            command_tx,
            snapshots,
            palette: Arc::new(Palette::default()),
        };
        let status = send_command(&state, MarqueeCommand::SetRandomMode(true))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::OK);
        assert!(matches!(
            command_rx.recv().await,
            Some(MarqueeCommand::SetRandomMode(true))
        ));
    }

    // ── Router ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn get_routes_answer_json() {
        let handle = engine("hi");
        let app = router(&handle);

        let (status, body) = get(&app, "/api/v1/status").await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["text"], "HI");
        assert_eq!(json["random_mode"], false);

        let (status, body) = get(&app, "/api/v1/frame").await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["rows"], 15);
        assert_eq!(json["cols"], 20);
        assert_eq!(json["cells"].as_array().unwrap().len(), 15);

        let (status, body) = get(&app, "/api/v1/palette").await;
        assert_eq!(status, StatusCode::OK);
        let colors: Vec<String> = serde_json::from_str(&body).unwrap();
        assert_eq!(colors.len(), 24);
        assert!(colors.contains(&"#ff0000".to_string()));

        let (status, _) = get(&app, "/api-docs/openapi.json").await;
        assert_eq!(status, StatusCode::OK);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn post_text_updates_status() {
        let mut handle = engine("HI");
        let app = router(&handle);

        let (status, _) = post(&app, "/api/v1/text", r##"{"text": "abc"}"##).await;
        assert_eq!(status, StatusCode::OK);
        handle
            .snapshots
            .wait_for(|s| s.status.text == "ABC")
            .await
            .unwrap();

        let (_, body) = get(&app, "/api/v1/status").await;
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["text"], "ABC");
        assert_eq!(json["strip_width"], 24);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn post_color_applies_palette_color() {
        let handle = engine("HI");
        let app = router(&handle);

        let (status, _) = post(&app, "/api/v1/color", r##"{"color": "#00FF00"}"##).await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = get(&app, "/api/v1/status").await;
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["selected_color"], "#00ff00");
        assert_eq!(json["display_color"], "#00ff00");

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn post_color_rejects_bad_requests() {
        let handle = engine("HI");
        let app = router(&handle);

        let (status, _) = post(&app, "/api/v1/color", r##"{"color": "green"}"##).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, body) = post(&app, "/api/v1/color", r##"{"color": "#123456"}"##).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("#123456"));
        let (status, _) = post(&app, "/api/v1/color", "{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = get(&app, "/api/v1/status").await;
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["selected_color"], "#ff0000");

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn post_color_conflicts_once_random_mode_is_requested() {
        let handle = engine("HI");
        let app = router(&handle);

        // no waiting for the toggle to be applied before picking a color
        let (status, _) = post(&app, "/api/v1/random", r##"{"enabled": true}"##).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = post(&app, "/api/v1/color", r##"{"color": "#00ff00"}"##).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body.contains("Random mode"));

        let (_, body) = get(&app, "/api/v1/status").await;
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["random_mode"], true);
        assert_eq!(json["selected_color"], "#ff0000");

        let (status, _) = post(&app, "/api/v1/random", r##"{"enabled": false}"##).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = post(&app, "/api/v1/color", r##"{"color": "#00ff00"}"##).await;
        assert_eq!(status, StatusCode::OK);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn commands_fail_once_engine_stopped() {
        let handle = engine("HI");
        let app = router(&handle);
        handle.shutdown().await;

        let (status, _) = post(&app, "/api/v1/text", r##"{"text": "x"}"##).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let (status, _) = post(&app, "/api/v1/color", r##"{"color": "#00ff00"}"##).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let (status, _) = post(&app, "/api/v1/random", r##"{"enabled": true}"##).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        // last snapshot is still readable
        let (status, _) = get(&app, "/api/v1/frame").await;
        assert_eq!(status, StatusCode::OK);
    }

    // ── Frame stream ────────────────────────────────────────────────

    use futures::channel::mpsc as socket;

    fn frame_json(msg: Message) -> Value {
        match msg {
            Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
            other => panic!("expected a text frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stream_sends_current_frame_then_ends_with_engine() {
        let (snapshot_tx, snapshots) = watch::channel(snapshot("HI"));
        let (sink, mut sent) = socket::channel(16);
        let (_client, stream) = socket::channel::<Result<Message, axum::Error>>(16);
        let task = tokio::spawn(stream_frames(sink, stream, snapshots));

        let first = frame_json(sent.next().await.unwrap());
        assert_eq!(first["offset"], 0);
        assert_eq!(first["rows"], 15);

        let mut next = snapshot("HI");
        next.frame.offset = 1;
        snapshot_tx.send_replace(next);
        let second = frame_json(sent.next().await.unwrap());
        assert_eq!(second["offset"], 1);

        drop(snapshot_tx);
        assert_eq!(task.await.unwrap(), 2);
    }

    #[tokio::test]
    async fn stream_ends_when_client_closes() {
        let (_snapshot_tx, snapshots) = watch::channel(snapshot("HI"));
        let (sink, mut sent) = socket::channel(16);
        let (mut client, stream) = socket::channel::<Result<Message, axum::Error>>(16);
        let task = tokio::spawn(stream_frames(sink, stream, snapshots));

        frame_json(sent.next().await.unwrap());
        client.send(Ok(Message::Close(None))).await.unwrap();
        assert_eq!(task.await.unwrap(), 1);
    }
}
